//! Vector-similarity search backend
//!
//! Maintains a separate embedding index fed on every long-term memory append
//! (it registers as an indexer on the store) and resolves queries by
//! nearest-neighbor lookup restricted to the requesting actor. Ids coming
//! back from the index are resolved to full records through the store, in
//! similarity order.

use crate::db::long_term::{LongTermMemoryIndexer, LONG_TERM_COLLECTION};
use crate::db::{Database, DocumentFilter};
use crate::embeddings::{EmbeddingFields, EmbeddingGenerator};
use crate::error::{EngramError, Result};
use crate::search::{require_actor_id, SearchBackend, SearchRequest, VectorIndex, DEFAULT_SEARCH_LIMIT};
use crate::types::{LongTermMemory, MemoryId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

const INDEXER_NAME: &str = "vector";

/// Embedding-similarity search backend
pub struct VectorSearchBackend {
    db: Arc<dyn Database>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingGenerator>,
    initialized: AtomicBool,
}

impl VectorSearchBackend {
    /// Create a backend; call [`create_indices`](Self::create_indices)
    /// before indexing or querying
    pub fn new(
        db: Arc<dyn Database>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingGenerator>,
    ) -> Self {
        Self {
            db,
            index,
            embedder,
            initialized: AtomicBool::new(false),
        }
    }

    /// Open the embedding index if it exists, else create it; idempotent
    pub async fn create_indices(&self) -> Result<()> {
        self.index.ensure_ready().await?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn check_initialized(&self) -> Result<()> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(EngramError::IndexNotInitialized);
        }
        Ok(())
    }

    async fn embed(&self, fields: &EmbeddingFields) -> Result<Vec<f32>> {
        self.embedder
            .embed(self.index.dimensions(), fields)
            .await?
            .ok_or(EngramError::EmbeddingUnavailable)
    }

    /// Resolve the request to memory ids, ordered by similarity
    async fn do_search(&self, request: &SearchRequest) -> Result<Vec<MemoryId>> {
        let actor_id = require_actor_id(request)?;
        self.check_initialized()?;

        let embedding = self.embed(&EmbeddingFields::from(request)).await?;
        let limit = request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        self.index.knn(actor_id, &embedding, limit).await
    }
}

#[async_trait]
impl SearchBackend for VectorSearchBackend {
    async fn search_long_term_memories(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<LongTermMemory>> {
        let actor_id = require_actor_id(request)?;
        let ids = self.do_search(request).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // resolve ids to full records, still scoped to the actor
        let filter = DocumentFilter {
            actor_id: Some(actor_id),
            ids: Some(ids.clone()),
            ..DocumentFilter::default()
        };
        let docs = self.db.find(LONG_TERM_COLLECTION, &filter).await?;
        let mut by_id: HashMap<MemoryId, LongTermMemory> = HashMap::new();
        for doc in docs {
            let memory: LongTermMemory = serde_json::from_value(doc)?;
            if let Some(id) = memory.id {
                by_id.insert(id, memory);
            }
        }

        // keep similarity order
        let items: Vec<LongTermMemory> =
            ids.iter().filter_map(|id| by_id.remove(id)).collect();
        debug!(actor_id, found = items.len(), "vector search");
        Ok(items)
    }
}

#[async_trait]
impl LongTermMemoryIndexer for VectorSearchBackend {
    fn name(&self) -> &str {
        INDEXER_NAME
    }

    async fn index_long_term_memory(&self, memory: &LongTermMemory) -> Result<()> {
        let id = memory.id.ok_or_else(|| {
            EngramError::InvalidInput("id must be assigned before indexing".to_string())
        })?;
        self.check_initialized()?;

        let embedding = self.embed(&EmbeddingFields::from(memory)).await?;
        self.index.add(id, memory.actor_id, embedding).await
    }

    async fn remove_long_term_memory(&self, id: MemoryId) -> Result<()> {
        self.index.remove(id).await
    }
}
