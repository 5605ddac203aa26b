//! Actor worker: sequential run execution and event broadcasting
//!
//! One worker per actor. `work` calls against the same worker are processed
//! as a single ordered sequence: a second call queues behind the in-flight
//! run. Every state change is emitted as a typed event and broadcast
//! synchronously to all subscribers, in registration order, with the full
//! cumulative buffer each time.

use crate::db::actors::ActorStateStore;
use crate::db::long_term::LongTermMemoryStore;
use crate::db::short_term::ShortTermMemoryStore;
use crate::engine::{EngineEventKind, ReasoningEngine};
use crate::error::{EngramError, Result};
use crate::search::{SearchBackend, SearchRequest};
use crate::types::{
    ActorEvent, ActorId, ActorResponse, ActorState, ActorStatus, LongTermMemory, MemoryId,
    SearchActorMemoryResult, ShortTermMemory, WorkInput, WorkRequest,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Handle returned by [`ActorWorker::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SubscriberFn = Box<dyn Fn(ActorResponse) + Send>;

struct Observers {
    status: ActorStatus,
    events: Vec<ActorEvent>,
    subscribers: Vec<(SubscriptionId, SubscriberFn)>,
    next_subscription: u64,
}

impl Observers {
    fn response(&self) -> ActorResponse {
        ActorResponse {
            status: self.status,
            events: self.events.clone(),
        }
    }

    fn broadcast(&self) {
        let response = self.response();
        for (_, subscriber) in &self.subscribers {
            subscriber(response.clone());
        }
    }
}

/// Worker owning one actor's lifecycle
pub struct ActorWorker {
    actor_id: ActorId,
    engine: Arc<dyn ReasoningEngine>,
    states: ActorStateStore,
    short_term: Arc<ShortTermMemoryStore>,
    long_term: Arc<LongTermMemoryStore>,
    search: Arc<dyn SearchBackend>,
    /// Serializes runs: two `work` calls never interleave their buffers
    run_lock: tokio::sync::Mutex<()>,
    observers: Mutex<Observers>,
}

impl ActorWorker {
    /// Wire a worker to its engine and the shared stores
    pub fn new(
        actor_id: ActorId,
        engine: Arc<dyn ReasoningEngine>,
        states: ActorStateStore,
        short_term: Arc<ShortTermMemoryStore>,
        long_term: Arc<LongTermMemoryStore>,
        search: Arc<dyn SearchBackend>,
    ) -> Self {
        Self {
            actor_id,
            engine,
            states,
            short_term,
            long_term,
            search,
            run_lock: tokio::sync::Mutex::new(()),
            observers: Mutex::new(Observers {
                status: ActorStatus::Idle,
                events: Vec::new(),
                subscribers: Vec::new(),
                next_subscription: 0,
            }),
        }
    }

    /// The actor this worker is bound to
    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    /// Current status
    pub fn status(&self) -> ActorStatus {
        self.observers.lock().unwrap().status
    }

    /// Register a subscriber
    ///
    /// The current `{status, events}` snapshot is delivered synchronously
    /// before any new event, so a late subscriber is never silent. The
    /// callback runs on the worker's broadcast path and must not call back
    /// into this worker.
    pub fn subscribe(&self, callback: impl Fn(ActorResponse) + Send + 'static) -> SubscriptionId {
        let mut observers = self.observers.lock().unwrap();
        let id = SubscriptionId(observers.next_subscription);
        observers.next_subscription += 1;

        callback(observers.response());
        observers.subscribers.push((id, Box::new(callback)));
        debug!(actor_id = self.actor_id, ?id, "subscriber added");
        id
    }

    /// Remove a subscriber; idempotent, a no-op for unknown ids
    ///
    /// Takes effect only for future events: it does not retroactively cancel
    /// an in-flight run.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut observers = self.observers.lock().unwrap();
        observers.subscribers.retain(|(known, _)| *known != id);
    }

    /// Process one ordered input sequence to completion
    ///
    /// Accepts exactly one text input. The run's event buffer is cleared, a
    /// receipt message is emitted, the text is forwarded to the reasoning
    /// engine, and every engine event is broadcast as it arrives. The worker
    /// returns to idle and broadcasts the final state on every exit path;
    /// an engine failure is re-raised to the caller, never swallowed.
    pub async fn work(&self, request: WorkRequest) -> Result<()> {
        let text = Self::single_text_input(&request.inputs)?;

        let _run = self.run_lock.lock().await;
        {
            let mut observers = self.observers.lock().unwrap();
            observers.status = ActorStatus::Running;
            observers.events.clear();
        }
        let _idle = IdleGuard { worker: self };

        self.emit_event(ActorEvent::Message {
            content: "message received".to_string(),
        });

        let result = self.drive_engine(&text, request.metadata).await;
        if let Err(err) = &result {
            warn!(actor_id = self.actor_id, %err, "run failed");
        }
        result
    }

    /// Fetch this actor's durable state; `NotFound` if never written
    pub async fn state(&self) -> Result<ActorState> {
        self.states
            .get(self.actor_id)
            .await?
            .ok_or_else(|| EngramError::NotFound(format!("actor {}", self.actor_id)))
    }

    /// Overwrite the memory buffer via read-merge-write
    ///
    /// Fetches the current state (or a default one for an unknown actor),
    /// replaces `memory_buffer`, and upserts the whole document. Safe under
    /// the per-worker run serialization; callers must not bypass the worker
    /// to write the state store directly.
    pub async fn update_state(&self, state: ActorState) -> Result<()> {
        let mut current = self
            .states
            .get(self.actor_id)
            .await?
            .unwrap_or_else(|| ActorState::with_defaults(self.actor_id));
        current.memory_buffer = state.memory_buffer;
        self.states.upsert(&current).await
    }

    /// Search this actor's long-term memory
    pub async fn search(&self, keywords: Vec<String>) -> Result<SearchActorMemoryResult> {
        let items = self
            .search
            .search_long_term_memories(&SearchRequest::keywords(self.actor_id, keywords))
            .await?;
        Ok(SearchActorMemoryResult { items })
    }

    /// Append a short-term memory, stamping this actor's id
    ///
    /// The store is unbounded: nothing evicts old entries.
    pub async fn add_short_term_memory(&self, item: ShortTermMemory) -> Result<MemoryId> {
        let item = ShortTermMemory {
            actor_id: self.actor_id,
            ..item
        };
        self.short_term.append(&item).await
    }

    /// Append a long-term memory, stamping this actor's id
    ///
    /// The store is unbounded: nothing evicts old entries.
    pub async fn add_long_term_memory(&self, item: LongTermMemory) -> Result<MemoryId> {
        let item = LongTermMemory {
            actor_id: self.actor_id,
            ..item
        };
        self.long_term.append(&item).await
    }

    fn single_text_input(inputs: &[WorkInput]) -> Result<String> {
        if inputs.is_empty() {
            return Err(EngramError::InvalidInput(
                "inputs must not be empty".to_string(),
            ));
        }
        if inputs.len() > 1 {
            return Err(EngramError::InvalidInput(
                "only a single input is supported".to_string(),
            ));
        }
        match &inputs[0] {
            WorkInput::Text { content } => Ok(content.clone()),
            other => Err(EngramError::InvalidInput(format!(
                "unsupported input kind: {:?}",
                other
            ))),
        }
    }

    async fn drive_engine(&self, text: &str, metadata: serde_json::Value) -> Result<()> {
        self.engine.append_context(text).await?;

        // scoped listener: detaches on every exit path
        let mut listener = self.engine.attach_listener(&EngineEventKind::ALL);
        let run = self.engine.run(metadata);
        tokio::pin!(run);

        let mut listening = true;
        let result = loop {
            tokio::select! {
                res = &mut run => break res,
                event = listener.recv(), if listening => match event {
                    Some(event) => self.emit_event(ActorEvent::AgentEvent {
                        name: event.kind,
                        content: event.content,
                    }),
                    None => listening = false,
                },
            }
        };

        // events that raced with run completion are still in the channel
        while let Some(event) = listener.try_recv() {
            self.emit_event(ActorEvent::AgentEvent {
                name: event.kind,
                content: event.content,
            });
        }

        result
    }

    /// Append to the buffer and broadcast the full cumulative state
    fn emit_event(&self, event: ActorEvent) {
        let mut observers = self.observers.lock().unwrap();
        observers.events.push(event);
        observers.broadcast();
    }

    fn finish_run(&self) {
        let mut observers = self.observers.lock().unwrap();
        observers.status = ActorStatus::Idle;
        observers.broadcast();
    }
}

/// Broadcasts the idle transition when the run scope exits, whether the run
/// succeeded, failed, or was cancelled
struct IdleGuard<'a> {
    worker: &'a ActorWorker,
}

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        self.worker.finish_run();
    }
}
