//! Vector index implementation using sqlite-vec
//!
//! Stores long-term memory embeddings in a vec0 virtual table, partitioned by
//! actor so the actor restriction applies before ranking, not after.
//! Connection pooling via deadpool-sqlite for concurrent access.

use crate::error::{EngramError, Result};
use crate::search::VectorIndex;
use crate::types::{ActorId, MemoryId};
use async_trait::async_trait;
use deadpool_sqlite::{Config, Object, Pool, Runtime};
use rusqlite::Result as SqliteResult;
use std::path::Path;
use tracing::{debug, info};

/// sqlite-vec backed vector index
pub struct SqliteVectorIndex {
    pool: Pool,
    dimensions: usize,
    table: String,
}

impl SqliteVectorIndex {
    /// Create a new vector index over the given database file
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `model` - Embedding model name, part of the index table name
    /// * `dimensions` - Vector dimension size
    pub fn new<P: AsRef<Path>>(db_path: P, model: &str, dimensions: usize) -> Result<Self> {
        let path_str = db_path.as_ref().to_string_lossy().to_string();
        info!(
            "Creating vector index pool at: {} (model: {}, dimensions: {})",
            path_str, model, dimensions
        );

        // Load sqlite-vec as an auto-extension so it's available for every
        // connection in the pool
        unsafe {
            use rusqlite::ffi::sqlite3_auto_extension;

            #[allow(clippy::missing_transmute_annotations)]
            sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }

        let config = Config::new(path_str);
        let pool = config.create_pool(Runtime::Tokio1).map_err(|e| {
            EngramError::Database(format!("Failed to create connection pool: {}", e))
        })?;

        let sanitized: String = model
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let table = format!("long_term_memory_vectors_{}_{}", sanitized, dimensions);

        Ok(Self {
            pool,
            dimensions,
            table,
        })
    }

    async fn conn(&self) -> Result<Object> {
        self.pool.get().await.map_err(|e| {
            EngramError::Database(format!("Failed to get connection from pool: {}", e))
        })
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
impl VectorIndex for SqliteVectorIndex {
    async fn ensure_ready(&self) -> Result<()> {
        let sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS \"{}\" USING vec0(
                memory_id INTEGER PRIMARY KEY,
                actor_id INTEGER PARTITION KEY,
                embedding FLOAT[{}]
            )",
            self.table, self.dimensions
        );

        let conn = self.conn().await?;
        conn.interact(move |conn| {
            conn.execute(&sql, [])
                .map_err(|e| EngramError::Database(format!("Failed to create vec0 table: {}", e)))
        })
        .await
        .map_err(|e| EngramError::Database(format!("Pool interaction failed: {}", e)))??;

        debug!(table = %self.table, "vector table ready");
        Ok(())
    }

    async fn add(&self, id: MemoryId, actor_id: ActorId, embedding: Vec<f32>) -> Result<()> {
        self.check_dimensions(&embedding)?;

        let embedding_json = serde_json::to_string(&embedding)?;
        let table = self.table.clone();
        let conn = self.conn().await?;

        conn.interact(move |conn| -> Result<()> {
            // Virtual tables don't support INSERT OR REPLACE, so delete first
            conn.execute(
                &format!("DELETE FROM \"{}\" WHERE memory_id = ?", table),
                rusqlite::params![id],
            )
            .map_err(|e| {
                EngramError::Database(format!("Failed to delete existing vector: {}", e))
            })?;

            conn.execute(
                &format!(
                    "INSERT INTO \"{}\" (memory_id, actor_id, embedding) VALUES (?, ?, vec_f32(?))",
                    table
                ),
                rusqlite::params![id, actor_id, embedding_json],
            )
            .map_err(|e| EngramError::Database(format!("Failed to store vector: {}", e)))?;

            Ok(())
        })
        .await
        .map_err(|e| EngramError::Database(format!("Pool interaction failed: {}", e)))??;

        debug!(id, actor_id, "vector stored");
        Ok(())
    }

    async fn remove(&self, id: MemoryId) -> Result<()> {
        let table = self.table.clone();
        let conn = self.conn().await?;

        conn.interact(move |conn| -> Result<()> {
            conn.execute(
                &format!("DELETE FROM \"{}\" WHERE memory_id = ?", table),
                rusqlite::params![id],
            )
            .map_err(|e| EngramError::Database(format!("Failed to delete vector: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| EngramError::Database(format!("Pool interaction failed: {}", e)))??;

        Ok(())
    }

    async fn knn(&self, actor_id: ActorId, query: &[f32], limit: usize) -> Result<Vec<MemoryId>> {
        self.check_dimensions(query)?;

        let query_json = serde_json::to_string(query)?;
        let table = self.table.clone();
        let conn = self.conn().await?;

        let ids = conn
            .interact(move |conn| -> Result<Vec<MemoryId>> {
                // the partition-key equality narrows candidates before ranking
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT memory_id, distance
                         FROM \"{}\"
                         WHERE embedding MATCH vec_f32(?) AND actor_id = ?
                         ORDER BY distance
                         LIMIT ?",
                        table
                    ))
                    .map_err(|e| {
                        EngramError::Database(format!("Failed to prepare search: {}", e))
                    })?;

                let ids: SqliteResult<Vec<MemoryId>> = stmt
                    .query_map(
                        rusqlite::params![query_json, actor_id, limit as i64],
                        |row| row.get::<_, i64>(0),
                    )
                    .and_then(|mapped| mapped.collect());

                ids.map_err(|e| {
                    EngramError::Database(format!("Failed to execute vector search: {}", e))
                })
            })
            .await
            .map_err(|e| EngramError::Database(format!("Pool interaction failed: {}", e)))??;

        debug!(actor_id, found = ids.len(), "vector search");
        Ok(ids)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
