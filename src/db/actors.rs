//! Actor state store
//!
//! Persists each actor's durable state (role binding, memory buffer) keyed by
//! actor id. Documents in the `actors` collection use the actor id as the
//! document id, so writes go through `upsert` rather than `insert`.

use crate::db::{CollectionSet, Database, DocumentFilter};
use crate::error::Result;
use crate::types::{ActorId, ActorState};
use std::sync::Arc;

pub(crate) const ACTORS_COLLECTION: &str = "actors";

/// Store for durable per-actor state
#[derive(Clone)]
pub struct ActorStateStore {
    db: Arc<dyn Database>,
}

impl ActorStateStore {
    /// Create a store over the given database
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Fetch the state for an actor, if it has ever been written
    pub async fn get(&self, actor_id: ActorId) -> Result<Option<ActorState>> {
        let docs = self
            .db
            .find(ACTORS_COLLECTION, &DocumentFilter::by_ids(vec![actor_id]))
            .await?;
        match docs.into_iter().next() {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Insert or replace the state for `state.id`
    pub async fn upsert(&self, state: &ActorState) -> Result<()> {
        let doc = serde_json::to_value(state)?;
        self.db.upsert(ACTORS_COLLECTION, state.id, doc).await
    }
}

impl CollectionSet for ActorStateStore {
    fn collections(&self) -> Vec<String> {
        vec![ACTORS_COLLECTION.to_string()]
    }
}
