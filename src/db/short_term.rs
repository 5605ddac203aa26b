//! Short-term memory store
//!
//! Append-only records kept for recent context and debugging. No update or
//! dedup; bulk removal only happens through snapshot restore.

use crate::db::{CollectionSet, Database, DocumentFilter};
use crate::error::{EngramError, Result};
use crate::types::{MemoryId, ShortTermMemory};
use std::sync::Arc;

pub(crate) const SHORT_TERM_COLLECTION: &str = "short_term_memories";

/// Store for ephemeral short-term memories
#[derive(Clone)]
pub struct ShortTermMemoryStore {
    db: Arc<dyn Database>,
}

impl ShortTermMemoryStore {
    /// Create a store over the given database
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// List memories matching the filter (actor, createdAt range)
    pub async fn list(&self, filter: &DocumentFilter) -> Result<Vec<ShortTermMemory>> {
        let docs = self.db.find(SHORT_TERM_COLLECTION, filter).await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(EngramError::from))
            .collect()
    }

    /// Append a memory; the store assigns the id
    pub async fn append(&self, memory: &ShortTermMemory) -> Result<MemoryId> {
        if memory.id.is_some() {
            return Err(EngramError::InvalidInput(
                "id must not be set on insert".to_string(),
            ));
        }
        let doc = serde_json::to_value(memory)?;
        self.db.insert(SHORT_TERM_COLLECTION, doc).await
    }

    /// Delete by id; returns whether a record was removed
    pub async fn delete(&self, id: MemoryId) -> Result<bool> {
        self.db.delete(SHORT_TERM_COLLECTION, id).await
    }
}

impl CollectionSet for ShortTermMemoryStore {
    fn collections(&self) -> Vec<String> {
        vec![SHORT_TERM_COLLECTION.to_string()]
    }
}
