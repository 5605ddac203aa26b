//! In-memory database backend
//!
//! Keeps every collection as a vector of JSON documents behind one RwLock.
//! The lock doubles as the session boundary: snapshot holds the read guard
//! across all collections, restore holds the write guard, so neither can be
//! observed half-applied. Supports snapshot restore (`can_set_snapshot`).

use crate::db::{Database, Document, DocumentFilter, Snapshot};
use crate::error::{EngramError, Result};
use crate::types::MemoryId;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory document database
#[derive(Default)]
pub struct MemoryDatabase {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(docs: &[Document]) -> MemoryId {
        docs.iter()
            .filter_map(|doc| doc.get("id").and_then(Document::as_i64))
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn can_set_snapshot(&self) -> bool {
        true
    }

    async fn find(&self, collection: &str, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let docs = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default();
        Ok(docs)
    }

    async fn insert(&self, collection: &str, mut doc: Document) -> Result<MemoryId> {
        if doc.get("id").is_some() {
            return Err(EngramError::InvalidInput(
                "id must not be set on insert".to_string(),
            ));
        }

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let id = Self::next_id(docs);

        doc.as_object_mut()
            .ok_or_else(|| EngramError::InvalidInput("document must be an object".to_string()))?
            .insert("id".to_string(), id.into());
        docs.push(doc);

        debug!(collection, id, "inserted document");
        Ok(id)
    }

    async fn upsert(&self, collection: &str, id: MemoryId, mut doc: Document) -> Result<()> {
        doc.as_object_mut()
            .ok_or_else(|| EngramError::InvalidInput("document must be an object".to_string()))?
            .insert("id".to_string(), id.into());

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs
            .iter_mut()
            .find(|existing| existing.get("id").and_then(Document::as_i64) == Some(id))
        {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: MemoryId) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|doc| doc.get("id").and_then(Document::as_i64) != Some(id));
        Ok(docs.len() != before)
    }

    async fn snapshot(&self, collections: &[String]) -> Result<Snapshot> {
        // one read guard across every collection: a consistent point in time
        let guard = self.collections.read().await;
        let mut snapshot = Snapshot::new();
        for name in collections {
            snapshot.insert(name.clone(), guard.get(name).cloned().unwrap_or_default());
        }
        Ok(snapshot)
    }

    async fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        // one write guard: no reader sees a collection mid-replace
        let mut guard = self.collections.write().await;
        for (name, records) in snapshot {
            let docs = guard.entry(name.clone()).or_default();
            docs.clear();
            if !records.is_empty() {
                docs.extend(records.iter().cloned());
            }
        }
        debug!(collections = snapshot.len(), "restored snapshot");
        Ok(())
    }
}
