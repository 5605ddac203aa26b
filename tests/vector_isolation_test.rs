//! Vector search actor-isolation tests
//!
//! Inserts near-identical memories for two actors through the full append
//! path (store + synchronous indexing) and asserts that search never crosses
//! the actor boundary, even when a higher-scoring candidate belongs to the
//! other actor.

mod common;

use common::{long_term_memory, quiet_engines, StubEmbedder};
use engram::config::{SearchKind, VectorIndexKind};
use engram::{ActorRuntime, EngramConfig, SearchRequest};
use std::sync::Arc;

async fn vector_runtime() -> ActorRuntime {
    let mut config = EngramConfig::default();
    config.search.backend = SearchKind::Vector;
    config.search.index = VectorIndexKind::Memory;
    config.search.dimensions = 16;

    ActorRuntime::build(&config, quiet_engines(), Some(Arc::new(StubEmbedder)))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_search_never_returns_another_actors_memory() {
    let runtime = vector_runtime().await;

    // near-identical content for both actors; actor 2 additionally holds an
    // exact match for the query
    runtime
        .long_term
        .append(&long_term_memory(1, &["coffee", "mornings"]))
        .await
        .unwrap();
    runtime
        .long_term
        .append(&long_term_memory(2, &["coffee", "morning"]))
        .await
        .unwrap();
    runtime
        .long_term
        .append(&long_term_memory(2, &["coffee", "mornings"]))
        .await
        .unwrap();

    let items = runtime
        .search
        .search_long_term_memories(&SearchRequest::keywords(
            1,
            vec!["coffee".to_string(), "morning".to_string()],
        ))
        .await
        .unwrap();

    assert!(!items.is_empty());
    assert!(
        items.iter().all(|item| item.actor_id == 1),
        "cross-actor leakage: {:?}",
        items
    );
}

#[tokio::test]
async fn test_worker_search_is_scoped_to_its_actor() {
    let runtime = vector_runtime().await;

    let worker1 = runtime.registry.get_or_create(1);
    let worker2 = runtime.registry.get_or_create(2);

    worker1
        .add_long_term_memory(long_term_memory(0, &["tea", "evening"]))
        .await
        .unwrap();
    worker2
        .add_long_term_memory(long_term_memory(0, &["tea", "evening"]))
        .await
        .unwrap();

    let found = worker1.search(vec!["tea".to_string()]).await.unwrap();
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].actor_id, 1);
}

#[tokio::test]
async fn test_appended_memory_is_immediately_searchable() {
    let runtime = vector_runtime().await;
    let worker = runtime.registry.get_or_create(7);

    let id = worker
        .add_long_term_memory(long_term_memory(0, &["harbor", "lighthouse"]))
        .await
        .unwrap();

    // no separate indexing step: the append already fed the vector index
    let found = worker
        .search(vec!["harbor".to_string(), "lighthouse".to_string()])
        .await
        .unwrap();
    assert_eq!(found.items.first().and_then(|item| item.id), Some(id));
}
