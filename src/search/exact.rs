//! Exact/keyword search backend
//!
//! Resolves queries directly against the long-term memory collection: the
//! request is the filter, translated to store predicates plus in-process
//! keyword matching. No separate index is maintained.

use crate::db::long_term::LONG_TERM_COLLECTION;
use crate::db::{Database, DocumentFilter};
use crate::error::{EngramError, Result};
use crate::search::{require_actor_id, SearchBackend, SearchRequest, DEFAULT_SEARCH_LIMIT};
use crate::types::LongTermMemory;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Store-filter search backend
pub struct ExactSearchBackend {
    db: Arc<dyn Database>,
}

impl ExactSearchBackend {
    /// Create a backend over the given database
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    fn matches(memory: &LongTermMemory, request: &SearchRequest) -> bool {
        if let Some(index0) = &request.index0 {
            if &memory.index0 != index0 {
                return false;
            }
        }
        if let Some(index1) = &request.index1 {
            if &memory.index1 != index1 {
                return false;
            }
        }
        if !request.keywords.is_empty() {
            let known: Vec<String> = memory
                .keywords
                .iter()
                .map(|keyword| keyword.to_lowercase())
                .collect();
            let hit = request
                .keywords
                .iter()
                .any(|keyword| known.contains(&keyword.to_lowercase()));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl SearchBackend for ExactSearchBackend {
    async fn search_long_term_memories(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<LongTermMemory>> {
        let actor_id = require_actor_id(request)?;

        let docs = self
            .db
            .find(LONG_TERM_COLLECTION, &DocumentFilter::by_actor(actor_id))
            .await?;
        let mut items = docs
            .into_iter()
            .map(|doc| serde_json::from_value::<LongTermMemory>(doc).map_err(EngramError::from))
            .collect::<Result<Vec<_>>>()?;

        items.retain(|memory| Self::matches(memory, request));
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT));

        debug!(actor_id, found = items.len(), "exact search");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::long_term::LongTermMemoryStore;
    use crate::db::memory::MemoryDatabase;
    use chrono::Utc;

    fn memory(actor_id: i64, index0: &str, keywords: &[&str]) -> LongTermMemory {
        LongTermMemory {
            id: None,
            actor_id,
            index0: index0.to_string(),
            index1: "general".to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            os: "linux".to_string(),
            statement: format!("about {}", index0),
            created_at: Utc::now(),
        }
    }

    async fn seeded() -> (Arc<MemoryDatabase>, ExactSearchBackend) {
        let db = Arc::new(MemoryDatabase::new());
        let store = LongTermMemoryStore::new(db.clone());
        store.append(&memory(1, "food", &["apple", "pear"])).await.unwrap();
        store.append(&memory(1, "travel", &["train"])).await.unwrap();
        store.append(&memory(2, "food", &["apple"])).await.unwrap();
        let backend = ExactSearchBackend::new(db.clone());
        (db, backend)
    }

    #[tokio::test]
    async fn test_search_requires_actor_id() {
        let (_db, backend) = seeded().await;
        let result = backend
            .search_long_term_memories(&SearchRequest::default())
            .await;
        assert!(matches!(result, Err(EngramError::MissingActorId)));
    }

    #[tokio::test]
    async fn test_keyword_match_is_scoped_to_actor() {
        let (_db, backend) = seeded().await;
        let items = backend
            .search_long_term_memories(&SearchRequest::keywords(1, vec!["apple".to_string()]))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].actor_id, 1);
        assert_eq!(items[0].index0, "food");
    }

    #[tokio::test]
    async fn test_keyword_match_is_case_insensitive() {
        let (_db, backend) = seeded().await;
        let items = backend
            .search_long_term_memories(&SearchRequest::keywords(1, vec!["APPLE".to_string()]))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_category_filter() {
        let (_db, backend) = seeded().await;
        let request = SearchRequest {
            actor_id: Some(1),
            index0: Some("travel".to_string()),
            ..SearchRequest::default()
        };
        let items = backend.search_long_term_memories(&request).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].index0, "travel");
    }

    #[tokio::test]
    async fn test_empty_query_lists_actor_memories() {
        let (_db, backend) = seeded().await;
        let items = backend
            .search_long_term_memories(&SearchRequest::keywords(1, vec![]))
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.actor_id == 1));
    }
}
