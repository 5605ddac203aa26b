//! Embedding generation for vector similarity search
//!
//! The generator consumes the category and keyword fields of a long-term
//! memory (or of a search request) and produces a fixed-length vector, or
//! nothing when the upstream model yields no embedding.

pub mod remote;

pub use remote::{GeminiEmbeddingGenerator, GEMINI_EMBEDDING_DIM};

use crate::error::Result;
use crate::search::SearchRequest;
use crate::types::LongTermMemory;
use async_trait::async_trait;

/// The long-term memory fields that participate in embedding content
#[derive(Debug, Clone, Default)]
pub struct EmbeddingFields {
    /// Primary category
    pub index0: Option<String>,
    /// Secondary category
    pub index1: Option<String>,
    /// Search keywords
    pub keywords: Vec<String>,
}

impl EmbeddingFields {
    /// Concatenate the fields in order, skipping absent ones
    pub fn to_contents(&self) -> Vec<String> {
        let mut contents = Vec::new();
        if let Some(index0) = &self.index0 {
            contents.push(index0.clone());
        }
        if let Some(index1) = &self.index1 {
            contents.push(index1.clone());
        }
        contents.extend(self.keywords.iter().cloned());
        contents
    }
}

impl From<&LongTermMemory> for EmbeddingFields {
    fn from(memory: &LongTermMemory) -> Self {
        Self {
            index0: Some(memory.index0.clone()),
            index1: Some(memory.index1.clone()),
            keywords: memory.keywords.clone(),
        }
    }
}

impl From<&SearchRequest> for EmbeddingFields {
    fn from(request: &SearchRequest) -> Self {
        Self {
            index0: request.index0.clone(),
            index1: request.index1.clone(),
            keywords: request.keywords.clone(),
        }
    }
}

/// Embedding generator contract consumed by the vector search backend
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    /// Produce a `dim`-length vector for the fields, or `None` when the
    /// model returns no embedding
    async fn embed(&self, dim: usize, fields: &EmbeddingFields) -> Result<Option<Vec<f32>>>;
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
