//! Vector index boundary
//!
//! The runtime does not ship its own approximate-nearest-neighbor engine; it
//! defines the interface a vector backend must satisfy and provides two
//! implementations: the sqlite-vec table in `db::vectors` and the exhaustive
//! in-memory index below, used for tests and small local deployments.

use crate::embeddings::cosine_similarity;
use crate::error::{EngramError, Result};
use crate::types::{ActorId, MemoryId};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Storage for embeddings, queryable by nearest neighbor
///
/// Every query is restricted to one actor's rows before ranking; a record of
/// another actor is never a candidate, whatever its similarity.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Open the index if it exists, otherwise create it empty; idempotent
    async fn ensure_ready(&self) -> Result<()>;

    /// Insert one embedding row
    async fn add(&self, id: MemoryId, actor_id: ActorId, embedding: Vec<f32>) -> Result<()>;

    /// Remove the row for `id`, if present
    async fn remove(&self, id: MemoryId) -> Result<()>;

    /// Up to `limit` ids belonging to `actor_id`, ordered by similarity
    async fn knn(&self, actor_id: ActorId, query: &[f32], limit: usize) -> Result<Vec<MemoryId>>;

    /// Fixed embedding length accepted by the index
    fn dimensions(&self) -> usize;
}

struct IndexRow {
    id: MemoryId,
    actor_id: ActorId,
    embedding: Vec<f32>,
}

/// Exhaustive in-memory vector index
pub struct MemoryVectorIndex {
    dimensions: usize,
    rows: RwLock<Vec<IndexRow>>,
}

impl MemoryVectorIndex {
    /// Create an empty index accepting `dimensions`-length vectors
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            rows: RwLock::new(Vec::new()),
        }
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(EngramError::Embedding(format!(
                "embedding dimension mismatch: expected {}, got {}",
                self.dimensions,
                embedding.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn add(&self, id: MemoryId, actor_id: ActorId, embedding: Vec<f32>) -> Result<()> {
        self.check_dimensions(&embedding)?;
        self.rows.write().await.push(IndexRow {
            id,
            actor_id,
            embedding,
        });
        Ok(())
    }

    async fn remove(&self, id: MemoryId) -> Result<()> {
        self.rows.write().await.retain(|row| row.id != id);
        Ok(())
    }

    async fn knn(&self, actor_id: ActorId, query: &[f32], limit: usize) -> Result<Vec<MemoryId>> {
        self.check_dimensions(query)?;

        let rows = self.rows.read().await;
        // actor restriction applies before ranking
        let mut scored: Vec<(MemoryId, f32)> = rows
            .iter()
            .filter(|row| row.actor_id == actor_id)
            .map(|row| (row.id, cosine_similarity(&row.embedding, query)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored.into_iter().map(|(id, _)| id).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_knn_orders_by_similarity() {
        let index = MemoryVectorIndex::new(3);
        index.add(1, 1, vec![1.0, 0.0, 0.0]).await.unwrap();
        index.add(2, 1, vec![0.9, 0.1, 0.0]).await.unwrap();
        index.add(3, 1, vec![0.0, 0.0, 1.0]).await.unwrap();

        let ids = index.knn(1, &[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_knn_never_crosses_actors() {
        let index = MemoryVectorIndex::new(3);
        index.add(1, 1, vec![0.5, 0.5, 0.0]).await.unwrap();
        // a perfect match belonging to another actor
        index.add(2, 2, vec![1.0, 0.0, 0.0]).await.unwrap();

        let ids = index.knn(1, &[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let index = MemoryVectorIndex::new(3);
        let result = index.add(1, 1, vec![1.0, 0.0]).await;
        assert!(matches!(result, Err(EngramError::Embedding(_))));

        let result = index.knn(1, &[1.0, 0.0], 10).await;
        assert!(matches!(result, Err(EngramError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_remove() {
        let index = MemoryVectorIndex::new(3);
        index.add(1, 1, vec![1.0, 0.0, 0.0]).await.unwrap();
        index.remove(1).await.unwrap();

        let ids = index.knn(1, &[1.0, 0.0, 0.0], 10).await.unwrap();
        assert!(ids.is_empty());
    }
}
