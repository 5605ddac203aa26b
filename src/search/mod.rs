//! Pluggable long-term memory search
//!
//! A search backend resolves a keyword/semantic query to long-term memory
//! records. Two variants ship with the runtime: the exact backend filters the
//! store directly, the vector backend ranks by embedding similarity over a
//! separate index. Results are always scoped to the requesting actor.

pub mod exact;
pub mod index;
pub mod vector;

pub use exact::ExactSearchBackend;
pub use index::{MemoryVectorIndex, VectorIndex};
pub use vector::VectorSearchBackend;

use crate::error::{EngramError, Result};
use crate::types::{ActorId, LongTermMemory};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result cap applied when a request carries no limit
pub const DEFAULT_SEARCH_LIMIT: usize = 100;

/// A long-term memory search query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// The requesting actor; results never cross this boundary
    pub actor_id: Option<ActorId>,

    /// Keywords to search for
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Primary category
    pub index0: Option<String>,

    /// Secondary category
    pub index1: Option<String>,

    /// Maximum number of results
    pub limit: Option<usize>,
}

impl SearchRequest {
    /// Keyword query scoped to one actor
    pub fn keywords(actor_id: ActorId, keywords: Vec<String>) -> Self {
        Self {
            actor_id: Some(actor_id),
            keywords,
            ..Self::default()
        }
    }
}

/// Search backend contract
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Resolve the request to full records, in backend-defined order,
    /// filtered to the requesting actor only
    async fn search_long_term_memories(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<LongTermMemory>>;
}

pub(crate) fn require_actor_id(request: &SearchRequest) -> Result<ActorId> {
    request.actor_id.ok_or(EngramError::MissingActorId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_actor_id() {
        let request = SearchRequest::default();
        assert!(matches!(
            require_actor_id(&request),
            Err(EngramError::MissingActorId)
        ));

        let request = SearchRequest::keywords(3, vec![]);
        assert_eq!(require_actor_id(&request).unwrap(), 3);
    }
}
