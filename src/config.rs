//! Configuration for the Engram runtime
//!
//! Backends are a small closed set selected at startup: the database kind,
//! the search backend, and the vector index are all picked here. Values come
//! from an optional config file overlaid with `ENGRAM_*` environment
//! variables.

use crate::embeddings::remote::{DEFAULT_EMBEDDING_BASE_URL, DEFAULT_EMBEDDING_MODEL};
use crate::embeddings::GEMINI_EMBEDDING_DIM;
use crate::error::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Database backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseKind {
    /// In-memory store; supports snapshot restore
    Memory,
    /// SQLite store; production-shaped, forbids snapshot restore
    Sqlite,
}

/// Search backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    /// Store-filter keyword search
    Exact,
    /// Embedding-similarity search
    Vector,
}

/// Vector index selection (vector search only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorIndexKind {
    /// Exhaustive in-memory index
    Memory,
    /// sqlite-vec table
    Sqlite,
}

/// Database section
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Which backend to construct
    pub kind: DatabaseKind,
    /// Database file path (sqlite only)
    pub path: Option<PathBuf>,
}

/// Search section
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Which backend to construct
    pub backend: SearchKind,
    /// Embedding dimension (vector only)
    pub dimensions: usize,
    /// Which vector index to construct (vector only)
    pub index: VectorIndexKind,
    /// Vector index file path (sqlite index only)
    pub index_path: Option<PathBuf>,
}

/// Embedding generator section (vector search only)
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Gemini API key; `ENGRAM_EMBEDDING__API_KEY` in the environment
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// API base URL
    pub base_url: String,
}

/// Snapshot section
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// Directory holding named snapshot files
    pub dir: PathBuf,
}

/// Top-level runtime configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngramConfig {
    /// Database section
    pub database: DatabaseConfig,
    /// Search section
    pub search: SearchConfig,
    /// Embedding section
    pub embedding: EmbeddingConfig,
    /// Snapshot section
    pub snapshot: SnapshotConfig,
}

impl EngramConfig {
    /// Load configuration: defaults, then an optional file, then the
    /// `ENGRAM_*` environment overlay
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("database.kind", "memory")?
            .set_default("search.backend", "exact")?
            .set_default("search.dimensions", GEMINI_EMBEDDING_DIM as i64)?
            .set_default("search.index", "memory")?
            .set_default("embedding.model", DEFAULT_EMBEDDING_MODEL)?
            .set_default("embedding.base_url", DEFAULT_EMBEDDING_BASE_URL)?
            .set_default("snapshot.dir", "./snapshots")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix("ENGRAM").separator("__"));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

impl Default for EngramConfig {
    fn default() -> Self {
        Self::load(None).expect("default configuration is valid")
    }
}
