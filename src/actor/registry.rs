//! Actor registry: one live worker per actor id
//!
//! Workers are constructed lazily on first access and live for the process
//! lifetime. The id→worker map is the one structure mutated by multiple
//! concurrent callers, so lookup-or-create runs inside a single critical
//! section.

use crate::actor::worker::ActorWorker;
use crate::db::actors::ActorStateStore;
use crate::db::long_term::LongTermMemoryStore;
use crate::db::short_term::ShortTermMemoryStore;
use crate::engine::ReasoningEngine;
use crate::search::SearchBackend;
use crate::types::ActorId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Produces the reasoning engine a newly constructed worker is wired to
pub type EngineFactory = Arc<dyn Fn(ActorId) -> Arc<dyn ReasoningEngine> + Send + Sync>;

/// Process-lifetime map from actor id to its worker
pub struct ActorRegistry {
    workers: Mutex<HashMap<ActorId, Arc<ActorWorker>>>,
    states: ActorStateStore,
    short_term: Arc<ShortTermMemoryStore>,
    long_term: Arc<LongTermMemoryStore>,
    search: Arc<dyn SearchBackend>,
    engines: EngineFactory,
}

impl ActorRegistry {
    /// Create a registry wiring new workers to the shared stores
    pub fn new(
        states: ActorStateStore,
        short_term: Arc<ShortTermMemoryStore>,
        long_term: Arc<LongTermMemoryStore>,
        search: Arc<dyn SearchBackend>,
        engines: EngineFactory,
    ) -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            states,
            short_term,
            long_term,
            search,
            engines,
        }
    }

    /// Return the worker for `actor_id`, constructing it on first access
    pub fn get_or_create(&self, actor_id: ActorId) -> Arc<ActorWorker> {
        let mut workers = self.workers.lock().unwrap();
        workers
            .entry(actor_id)
            .or_insert_with(|| {
                debug!(actor_id, "constructing worker");
                Arc::new(ActorWorker::new(
                    actor_id,
                    (self.engines)(actor_id),
                    self.states.clone(),
                    self.short_term.clone(),
                    self.long_term.clone(),
                    self.search.clone(),
                ))
            })
            .clone()
    }

    /// Number of live workers
    pub fn len(&self) -> usize {
        self.workers.lock().unwrap().len()
    }

    /// Whether any worker has been constructed yet
    pub fn is_empty(&self) -> bool {
        self.workers.lock().unwrap().is_empty()
    }
}
