//! Actor runtime: per-actor workers and the process-wide registry
//!
//! A worker owns one actor's lifecycle: sequential run execution, status,
//! the recent-event buffer, and the subscriber set. The registry hands out
//! exactly one live worker per actor id for the process lifetime.

pub mod registry;
pub mod worker;

pub use registry::{ActorRegistry, EngineFactory};
pub use worker::{ActorWorker, SubscriptionId};
