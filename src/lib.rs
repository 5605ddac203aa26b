//! Engram - Actor Runtime with Searchable Memory
//!
//! A Rust actor runtime where independent actors (agent instances bound to a
//! user/role) process inputs sequentially, emit a live event stream to
//! observers, and accumulate short-term and long-term memories that can later
//! be searched:
//! - Per-actor sequential work execution with multi-subscriber broadcasting
//! - Short/long-term memory stores over pluggable document databases
//! - Exact-match and vector-similarity search backends
//! - Transactional snapshot/restore of all persisted actor state
//!
//! # Architecture
//!
//! The system is organized into several layers:
//! - **Types**: Core data structures (ActorState, LongTermMemory, events)
//! - **Db**: Document database backends (in-memory, SQLite) and stores
//! - **Search**: Exact and vector search backends plus the index boundary
//! - **Actor**: Workers and the process-wide registry
//! - **Snapshot**: Consistent multi-collection capture and restore
//!
//! # Example
//!
//! ```ignore
//! use engram::{ActorRuntime, EngramConfig, WorkRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngramConfig::load(Some("engram.yaml".as_ref()))?;
//!     let runtime = ActorRuntime::build(&config, engines, None).await?;
//!
//!     let worker = runtime.registry.get_or_create(1);
//!     let subscription = worker.subscribe(|response| {
//!         println!("{:?} ({} events)", response.status, response.events.len());
//!     });
//!
//!     worker.work(WorkRequest::text("hello")).await?;
//!     worker.unsubscribe(subscription);
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod runtime;
pub mod search;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use actor::{ActorRegistry, ActorWorker, EngineFactory, SubscriptionId};
pub use config::EngramConfig;
pub use db::{CollectionSet, Database, DocumentFilter, Snapshot};
pub use engine::{EngineEvent, EngineEventKind, ReasoningEngine, ScriptedEngine};
pub use error::{EngramError, Result};
pub use runtime::ActorRuntime;
pub use search::{SearchBackend, SearchRequest};
pub use snapshot::SnapshotCoordinator;
pub use types::{
    ActorEvent, ActorId, ActorResponse, ActorState, ActorStatus, LongTermMemory, MemoryId,
    SearchActorMemoryResult, ShortTermMemory, WorkInput, WorkRequest,
};
