//! Runtime wiring: configuration to a ready actor registry
//!
//! Builds the closed set of backends the configuration selects, registers
//! the vector backend as a long-term memory indexer when vector search is
//! enabled, and hands out the registry plus the snapshot coordinator.

use crate::actor::{ActorRegistry, EngineFactory};
use crate::config::{DatabaseKind, EngramConfig, SearchKind, VectorIndexKind};
use crate::db::actors::ActorStateStore;
use crate::db::long_term::LongTermMemoryStore;
use crate::db::memory::MemoryDatabase;
use crate::db::short_term::ShortTermMemoryStore;
use crate::db::sqlite::SqliteDatabase;
use crate::db::vectors::SqliteVectorIndex;
use crate::db::{CollectionSet, Database, Snapshot};
use crate::embeddings::{EmbeddingGenerator, GeminiEmbeddingGenerator};
use crate::error::{EngramError, Result};
use crate::search::{ExactSearchBackend, MemoryVectorIndex, SearchBackend, VectorSearchBackend};
use crate::snapshot::SnapshotCoordinator;
use std::sync::Arc;
use tracing::info;

/// A fully wired runtime
pub struct ActorRuntime {
    /// The document database every store shares
    pub db: Arc<dyn Database>,
    /// Durable actor state
    pub actors: ActorStateStore,
    /// Short-term memories
    pub short_term: Arc<ShortTermMemoryStore>,
    /// Long-term memories
    pub long_term: Arc<LongTermMemoryStore>,
    /// The configured search backend
    pub search: Arc<dyn SearchBackend>,
    /// One worker per actor id
    pub registry: ActorRegistry,
    /// Snapshot/restore over the shared database
    pub snapshots: SnapshotCoordinator,
}

impl ActorRuntime {
    /// Build a runtime from configuration
    ///
    /// `engines` produces the reasoning engine for each actor; `embedder`
    /// overrides the Gemini generator (vector search only), which otherwise
    /// requires `embedding.api_key`.
    pub async fn build(
        config: &EngramConfig,
        engines: EngineFactory,
        embedder: Option<Arc<dyn EmbeddingGenerator>>,
    ) -> Result<Self> {
        let db: Arc<dyn Database> = match config.database.kind {
            DatabaseKind::Memory => Arc::new(MemoryDatabase::new()),
            DatabaseKind::Sqlite => {
                let path = config.database.path.as_ref().ok_or_else(|| {
                    EngramError::Config(config::ConfigError::Message(
                        "database.path is required for the sqlite database".to_string(),
                    ))
                })?;
                Arc::new(SqliteDatabase::new(path)?)
            }
        };

        let actors = ActorStateStore::new(db.clone());
        let short_term = Arc::new(ShortTermMemoryStore::new(db.clone()));
        let long_term = Arc::new(LongTermMemoryStore::new(db.clone()));

        let search: Arc<dyn SearchBackend> = match config.search.backend {
            SearchKind::Exact => Arc::new(ExactSearchBackend::new(db.clone())),
            SearchKind::Vector => {
                let index: Arc<dyn crate::search::VectorIndex> = match config.search.index {
                    VectorIndexKind::Memory => {
                        Arc::new(MemoryVectorIndex::new(config.search.dimensions))
                    }
                    VectorIndexKind::Sqlite => {
                        let path = config.search.index_path.as_ref().ok_or_else(|| {
                            EngramError::Config(config::ConfigError::Message(
                                "search.index_path is required for the sqlite index".to_string(),
                            ))
                        })?;
                        Arc::new(SqliteVectorIndex::new(
                            path,
                            &config.embedding.model,
                            config.search.dimensions,
                        )?)
                    }
                };

                let embedder: Arc<dyn EmbeddingGenerator> = match embedder {
                    Some(embedder) => embedder,
                    None => {
                        let api_key = config.embedding.api_key.clone().ok_or_else(|| {
                            EngramError::Config(config::ConfigError::Message(
                                "embedding.api_key is required for vector search".to_string(),
                            ))
                        })?;
                        Arc::new(GeminiEmbeddingGenerator::new(
                            api_key,
                            Some(config.embedding.model.clone()),
                            Some(config.embedding.base_url.clone()),
                        )?)
                    }
                };

                let backend =
                    Arc::new(VectorSearchBackend::new(db.clone(), index, embedder));
                backend.create_indices().await?;
                long_term.register_indexer(backend.clone())?;
                backend
            }
        };

        let registry = ActorRegistry::new(
            actors.clone(),
            short_term.clone(),
            long_term.clone(),
            search.clone(),
            engines,
        );
        let snapshots = SnapshotCoordinator::new(db.clone());

        info!(
            database = ?config.database.kind,
            search = ?config.search.backend,
            "runtime built"
        );

        Ok(Self {
            db,
            actors,
            short_term,
            long_term,
            search,
            registry,
            snapshots,
        })
    }

    /// Snapshot every collection the runtime's stores declare
    pub async fn snapshot_all(&self) -> Result<Snapshot> {
        let stores: [&dyn CollectionSet; 3] =
            [&self.actors, &*self.short_term, &*self.long_term];
        self.snapshots.snapshot(&stores).await
    }
}
