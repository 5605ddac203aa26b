//! Reasoning engine interface consumed by actor workers
//!
//! The engine is an external collaborator: it exposes a context-append
//! operation, a run-to-completion operation, and a typed event-subscription
//! mechanism keyed by event kind. Workers attach listeners for the duration
//! of a run and forward engine events to their subscribers.

use crate::error::{EngramError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Event kinds a reasoning engine can emit during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineEventKind {
    /// The run reached its terminal state
    RunFinished,
    /// Token accounting for the run so far
    TokenUsage,
}

impl EngineEventKind {
    /// Every kind an engine can emit; workers listen to all of them
    pub const ALL: [EngineEventKind; 2] = [EngineEventKind::RunFinished, EngineEventKind::TokenUsage];
}

impl std::fmt::Display for EngineEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEventKind::RunFinished => write!(f, "runFinished"),
            EngineEventKind::TokenUsage => write!(f, "tokenUsage"),
        }
    }
}

/// One event emitted by a reasoning engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Event kind
    pub kind: EngineEventKind,
    /// Engine-defined payload
    pub content: serde_json::Value,
}

/// A scoped subscription to engine events
///
/// Detaches from the engine when dropped, so a listener attached around a
/// fallible run is removed on every exit path.
pub struct EngineListener {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl EngineListener {
    /// Build a listener from a receiving channel and a detach hook
    pub fn new(
        rx: mpsc::UnboundedReceiver<EngineEvent>,
        detach: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            detach: Some(Box::new(detach)),
        }
    }

    /// Wait for the next event; `None` once the engine drops its sender
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.rx.recv().await
    }

    /// Drain an already-delivered event without waiting
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for EngineListener {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// Reasoning engine contract
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Append text to the engine's pending context for the next run
    async fn append_context(&self, text: &str) -> Result<()>;

    /// Attach a listener for the given event kinds
    fn attach_listener(&self, kinds: &[EngineEventKind]) -> EngineListener;

    /// Drive the engine to completion for the current context
    async fn run(&self, metadata: serde_json::Value) -> Result<()>;
}

type ListenerEntry = (Vec<EngineEventKind>, mpsc::UnboundedSender<EngineEvent>);

/// Deterministic engine used in tests and local wiring
///
/// Replays a fixed sequence of events during `run`, then resolves to the
/// configured outcome. Context appends are recorded for inspection.
pub struct ScriptedEngine {
    events: Vec<EngineEvent>,
    failure: Option<String>,
    context: Mutex<Vec<String>>,
    listeners: Arc<Mutex<HashMap<u64, ListenerEntry>>>,
    next_listener: AtomicU64,
}

impl ScriptedEngine {
    /// Engine that emits `events` and completes successfully
    pub fn new(events: Vec<EngineEvent>) -> Self {
        Self {
            events,
            failure: None,
            context: Mutex::new(Vec::new()),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Engine that emits `events` and then fails with `message`
    pub fn failing(events: Vec<EngineEvent>, message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(events)
        }
    }

    /// Context lines appended so far
    pub fn appended_context(&self) -> Vec<String> {
        self.context.lock().unwrap().clone()
    }

    fn dispatch(&self, event: &EngineEvent) {
        let listeners = self.listeners.lock().unwrap();
        for (kinds, tx) in listeners.values() {
            if kinds.contains(&event.kind) {
                let _ = tx.send(event.clone());
            }
        }
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn append_context(&self, text: &str) -> Result<()> {
        self.context.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn attach_listener(&self, kinds: &[EngineEventKind]) -> EngineListener {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap()
            .insert(id, (kinds.to_vec(), tx));

        let listeners = Arc::clone(&self.listeners);
        EngineListener::new(rx, move || {
            listeners.lock().unwrap().remove(&id);
        })
    }

    async fn run(&self, _metadata: serde_json::Value) -> Result<()> {
        for event in &self.events {
            self.dispatch(event);
            // suspension point between events, as a real engine would have
            tokio::task::yield_now().await;
        }

        match &self.failure {
            Some(message) => Err(EngramError::Engine(message.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run_finished() -> EngineEvent {
        EngineEvent {
            kind: EngineEventKind::RunFinished,
            content: json!({ "ok": true }),
        }
    }

    #[tokio::test]
    async fn test_listener_receives_subscribed_kinds() {
        let engine = ScriptedEngine::new(vec![run_finished()]);
        let mut listener = engine.attach_listener(&EngineEventKind::ALL);

        engine.run(serde_json::Value::Null).await.unwrap();

        let event = listener.try_recv().unwrap();
        assert_eq!(event.kind, EngineEventKind::RunFinished);
        assert!(listener.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_listener_filters_by_kind() {
        let engine = ScriptedEngine::new(vec![run_finished()]);
        let mut listener = engine.attach_listener(&[EngineEventKind::TokenUsage]);

        engine.run(serde_json::Value::Null).await.unwrap();

        assert!(listener.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_listener_detaches_on_drop() {
        let engine = ScriptedEngine::new(vec![run_finished()]);
        {
            let _listener = engine.attach_listener(&EngineEventKind::ALL);
            assert_eq!(engine.listeners.lock().unwrap().len(), 1);
        }
        assert_eq!(engine.listeners.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_failing_engine_emits_then_errors() {
        let engine = ScriptedEngine::failing(vec![run_finished()], "boom");
        let mut listener = engine.attach_listener(&EngineEventKind::ALL);

        let result = engine.run(serde_json::Value::Null).await;
        assert!(matches!(result, Err(EngramError::Engine(_))));
        assert!(listener.try_recv().is_some());
    }
}
