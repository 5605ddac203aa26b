//! Shared test helpers
#![allow(dead_code)]

use async_trait::async_trait;
use engram::embeddings::{EmbeddingFields, EmbeddingGenerator};
use engram::{EngineFactory, LongTermMemory, ReasoningEngine, Result, ScriptedEngine};
use std::sync::Arc;

/// Deterministic embedder: spreads each term's bytes over the vector so
/// near-identical content lands near-identically
pub struct StubEmbedder;

#[async_trait]
impl EmbeddingGenerator for StubEmbedder {
    async fn embed(&self, dim: usize, fields: &EmbeddingFields) -> Result<Option<Vec<f32>>> {
        let mut vector = vec![0.0; dim];
        for content in fields.to_contents() {
            for (i, byte) in content.bytes().enumerate() {
                vector[i % dim] += byte as f32;
            }
        }
        if vector.iter().all(|v| *v == 0.0) {
            return Ok(None);
        }
        Ok(Some(vector))
    }
}

/// Engine factory where every actor gets a quiet scripted engine
pub fn quiet_engines() -> EngineFactory {
    Arc::new(|_| Arc::new(ScriptedEngine::new(vec![])) as Arc<dyn ReasoningEngine>)
}

/// A long-term memory ready for appending
pub fn long_term_memory(actor_id: i64, keywords: &[&str]) -> LongTermMemory {
    LongTermMemory {
        id: None,
        actor_id,
        index0: "notes".to_string(),
        index1: "general".to_string(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        os: "linux".to_string(),
        statement: keywords.join(" "),
        created_at: chrono::Utc::now(),
    }
}
