//! Long-term memory store
//!
//! Append-only, categorized statement records. Every append runs each
//! registered indexer synchronously, so a successfully-appended memory is
//! immediately searchable. If any indexer fails, the indexers that already
//! ran are unwound and the record itself is deleted: the append is
//! all-or-nothing, never partially indexed.

use crate::db::{CollectionSet, Database, DocumentFilter};
use crate::error::{EngramError, Result};
use crate::types::{LongTermMemory, MemoryId};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

pub(crate) const LONG_TERM_COLLECTION: &str = "long_term_memories";

/// A search index fed synchronously on every long-term memory append
#[async_trait]
pub trait LongTermMemoryIndexer: Send + Sync {
    /// Stable name used to reject duplicate registration
    fn name(&self) -> &str;

    /// Index one appended memory (its id is already assigned)
    async fn index_long_term_memory(&self, memory: &LongTermMemory) -> Result<()>;

    /// Remove a memory from the index, used to unwind a failed append
    async fn remove_long_term_memory(&self, id: MemoryId) -> Result<()>;
}

/// Store for durable long-term memories
pub struct LongTermMemoryStore {
    db: Arc<dyn Database>,
    indexers: RwLock<Vec<Arc<dyn LongTermMemoryIndexer>>>,
}

impl LongTermMemoryStore {
    /// Create a store with no indexers registered
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            indexers: RwLock::new(Vec::new()),
        }
    }

    /// Register an indexer; fails with `AlreadyLoaded` on a duplicate name
    pub fn register_indexer(&self, indexer: Arc<dyn LongTermMemoryIndexer>) -> Result<()> {
        let mut indexers = self.indexers.write().unwrap();
        if indexers.iter().any(|known| known.name() == indexer.name()) {
            return Err(EngramError::AlreadyLoaded(format!(
                "indexer {}",
                indexer.name()
            )));
        }
        indexers.push(indexer);
        Ok(())
    }

    /// List memories matching the filter (actor, ids, createdAt range)
    pub async fn list(&self, filter: &DocumentFilter) -> Result<Vec<LongTermMemory>> {
        let docs = self.db.find(LONG_TERM_COLLECTION, filter).await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(EngramError::from))
            .collect()
    }

    /// Append a memory and index it, all-or-nothing
    ///
    /// Fails with `InvalidInput` if the caller supplies an id.
    pub async fn append(&self, memory: &LongTermMemory) -> Result<MemoryId> {
        if memory.id.is_some() {
            return Err(EngramError::InvalidInput(
                "id must not be set on insert".to_string(),
            ));
        }

        let doc = serde_json::to_value(memory)?;
        let id = self.db.insert(LONG_TERM_COLLECTION, doc).await?;

        let mut appended = memory.clone();
        appended.id = Some(id);

        let indexers = self.indexers.read().unwrap().clone();
        for (done, indexer) in indexers.iter().enumerate() {
            if let Err(err) = indexer.index_long_term_memory(&appended).await {
                self.unwind(id, &indexers[..done]).await;
                return Err(err);
            }
        }

        debug!(id, indexers = indexers.len(), "appended long-term memory");
        Ok(id)
    }

    /// Delete by id; returns whether a record was removed
    pub async fn delete(&self, id: MemoryId) -> Result<bool> {
        self.db.delete(LONG_TERM_COLLECTION, id).await
    }

    /// Best-effort unwind of a failed append: drop the partial index state,
    /// then the record itself
    async fn unwind(&self, id: MemoryId, indexed: &[Arc<dyn LongTermMemoryIndexer>]) {
        for indexer in indexed {
            if let Err(err) = indexer.remove_long_term_memory(id).await {
                warn!(id, indexer = indexer.name(), %err, "failed to unwind index");
            }
        }
        if let Err(err) = self.db.delete(LONG_TERM_COLLECTION, id).await {
            warn!(id, %err, "failed to delete record while unwinding append");
        }
    }
}

impl CollectionSet for LongTermMemoryStore {
    fn collections(&self) -> Vec<String> {
        vec![LONG_TERM_COLLECTION.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDatabase;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn memory(actor_id: i64) -> LongTermMemory {
        LongTermMemory {
            id: None,
            actor_id,
            index0: "food".to_string(),
            index1: "fruit".to_string(),
            keywords: vec!["apple".to_string()],
            os: "linux".to_string(),
            statement: "likes apples".to_string(),
            created_at: Utc::now(),
        }
    }

    /// Indexer that records calls and optionally fails
    struct ProbeIndexer {
        name: String,
        fail: bool,
        indexed: Mutex<Vec<MemoryId>>,
        removed: AtomicUsize,
    }

    impl ProbeIndexer {
        fn new(name: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail,
                indexed: Mutex::new(Vec::new()),
                removed: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LongTermMemoryIndexer for ProbeIndexer {
        fn name(&self) -> &str {
            &self.name
        }

        async fn index_long_term_memory(&self, memory: &LongTermMemory) -> Result<()> {
            if self.fail {
                return Err(EngramError::EmbeddingUnavailable);
            }
            self.indexed.lock().unwrap().push(memory.id.unwrap());
            Ok(())
        }

        async fn remove_long_term_memory(&self, _id: MemoryId) -> Result<()> {
            self.removed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_append_assigns_fresh_ids() {
        let store = LongTermMemoryStore::new(Arc::new(MemoryDatabase::new()));
        assert_eq!(store.append(&memory(1)).await.unwrap(), 1);
        assert_eq!(store.append(&memory(1)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_append_rejects_preset_id() {
        let store = LongTermMemoryStore::new(Arc::new(MemoryDatabase::new()));
        let mut item = memory(1);
        item.id = Some(1);
        let result = store.append(&item).await;
        assert!(matches!(result, Err(EngramError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_append_feeds_indexers() {
        let store = LongTermMemoryStore::new(Arc::new(MemoryDatabase::new()));
        let indexer = ProbeIndexer::new("probe", false);
        store.register_indexer(indexer.clone()).unwrap();

        let id = store.append(&memory(1)).await.unwrap();
        assert_eq!(*indexer.indexed.lock().unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_duplicate_indexer_registration_fails() {
        let store = LongTermMemoryStore::new(Arc::new(MemoryDatabase::new()));
        store.register_indexer(ProbeIndexer::new("probe", false)).unwrap();
        let result = store.register_indexer(ProbeIndexer::new("probe", false));
        assert!(matches!(result, Err(EngramError::AlreadyLoaded(_))));
    }

    #[tokio::test]
    async fn test_failed_indexer_unwinds_append() {
        let store = LongTermMemoryStore::new(Arc::new(MemoryDatabase::new()));
        let first = ProbeIndexer::new("first", false);
        let failing = ProbeIndexer::new("failing", true);
        store.register_indexer(first.clone()).unwrap();
        store.register_indexer(failing).unwrap();

        let result = store.append(&memory(1)).await;
        assert!(matches!(result, Err(EngramError::EmbeddingUnavailable)));

        // the indexer that ran was unwound, and the record is gone
        assert_eq!(first.removed.load(Ordering::SeqCst), 1);
        let items = store.list(&DocumentFilter::by_actor(1)).await.unwrap();
        assert!(items.is_empty());
    }
}
