//! SQLite database backend
//!
//! Persists each collection as its own table of JSON documents with typed
//! `actor_id` / `created_at` columns for filtering, using deadpool-sqlite for
//! pooled connections. This is the production-shaped store: it answers reads
//! and appends but declares itself unable to set arbitrary state, so snapshot
//! restore against it fails with `RestoreUnsupported`.

use crate::db::{Database, Document, DocumentFilter, Snapshot};
use crate::error::{EngramError, Result};
use crate::types::MemoryId;
use async_trait::async_trait;
use chrono::DateTime;
use deadpool_sqlite::{Config, Object, Pool, Runtime};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

static COLLECTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-z][a-z0-9_]*$").expect("collection name pattern"));

/// SQLite-backed document database
pub struct SqliteDatabase {
    pool: Pool,
}

impl SqliteDatabase {
    /// Open (or create) the database file and build a connection pool
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path_str = db_path.as_ref().to_string_lossy().to_string();
        info!("Opening sqlite database at: {}", path_str);

        let config = Config::new(path_str);
        let pool = config.create_pool(Runtime::Tokio1).map_err(|e| {
            EngramError::Database(format!("Failed to create connection pool: {}", e))
        })?;

        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<Object> {
        self.pool.get().await.map_err(|e| {
            EngramError::Database(format!("Failed to get connection from pool: {}", e))
        })
    }

    fn check_name(collection: &str) -> Result<String> {
        if !COLLECTION_NAME.is_match(collection) {
            return Err(EngramError::InvalidInput(format!(
                "invalid collection name: {}",
                collection
            )));
        }
        Ok(collection.to_string())
    }

    fn ensure_table(conn: &Connection, collection: &str) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (
                id INTEGER PRIMARY KEY,
                actor_id INTEGER,
                created_at INTEGER,
                doc TEXT NOT NULL
            )",
            collection
        );
        conn.execute(&sql, [])
            .map_err(|e| EngramError::Database(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    fn doc_columns(doc: &Document) -> (Option<i64>, Option<i64>) {
        let actor_id = doc.get("actorId").and_then(Document::as_i64);
        let created_at = doc
            .get("createdAt")
            .and_then(Document::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp_millis());
        (actor_id, created_at)
    }

    fn read_collection(conn: &Connection, collection: &str) -> Result<Vec<Document>> {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                [collection],
                |row| row.get::<_, i64>(0).map(|n| n > 0),
            )
            .map_err(|e| EngramError::Database(format!("Failed to probe table: {}", e)))?;
        if !exists {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT doc FROM \"{}\" ORDER BY id", collection);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| EngramError::Database(format!("Failed to prepare query: {}", e)))?;
        let docs = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| EngramError::Database(format!("Failed to read collection: {}", e)))?;

        docs.into_iter()
            .map(|raw| serde_json::from_str(&raw).map_err(EngramError::from))
            .collect()
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn can_set_snapshot(&self) -> bool {
        false
    }

    async fn find(&self, collection: &str, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let collection = Self::check_name(collection)?;
        if matches!(&filter.ids, Some(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }
        let filter = filter.clone();
        let conn = self.conn().await?;

        conn.interact(move |conn| -> Result<Vec<Document>> {
            Self::ensure_table(conn, &collection)?;

            let mut sql = format!("SELECT doc FROM \"{}\" WHERE 1 = 1", collection);
            let mut params: Vec<SqlValue> = Vec::new();
            if let Some(actor_id) = filter.actor_id {
                sql.push_str(" AND actor_id = ?");
                params.push(SqlValue::Integer(actor_id));
            }
            if let Some(after) = filter.created_after {
                sql.push_str(" AND created_at >= ?");
                params.push(SqlValue::Integer(after.timestamp_millis()));
            }
            if let Some(before) = filter.created_before {
                sql.push_str(" AND created_at <= ?");
                params.push(SqlValue::Integer(before.timestamp_millis()));
            }
            if let Some(ids) = &filter.ids {
                let placeholders = vec!["?"; ids.len()].join(", ");
                sql.push_str(&format!(" AND id IN ({})", placeholders));
                params.extend(ids.iter().map(|id| SqlValue::Integer(*id)));
            }
            sql.push_str(" ORDER BY id");

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| EngramError::Database(format!("Failed to prepare query: {}", e)))?;
            let docs = stmt
                .query_map(rusqlite::params_from_iter(params), |row| {
                    row.get::<_, String>(0)
                })
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| EngramError::Database(format!("Failed to execute query: {}", e)))?;

            docs.into_iter()
                .map(|raw| serde_json::from_str(&raw).map_err(EngramError::from))
                .collect()
        })
        .await
        .map_err(|e| EngramError::Database(format!("Pool interaction failed: {}", e)))?
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<MemoryId> {
        if doc.get("id").is_some() {
            return Err(EngramError::InvalidInput(
                "id must not be set on insert".to_string(),
            ));
        }
        let collection = Self::check_name(collection)?;
        let conn = self.conn().await?;

        let id = conn
            .interact(move |conn| -> Result<MemoryId> {
                let tx = conn.transaction().map_err(|e| {
                    EngramError::Database(format!("Failed to begin transaction: {}", e))
                })?;
                Self::ensure_table(&tx, &collection)?;

                let sql = format!("SELECT COALESCE(MAX(id), 0) + 1 FROM \"{}\"", collection);
                let id: i64 = tx
                    .query_row(&sql, [], |row| row.get(0))
                    .map_err(|e| EngramError::Database(format!("Failed to assign id: {}", e)))?;

                let mut doc = doc;
                doc.as_object_mut()
                    .ok_or_else(|| {
                        EngramError::InvalidInput("document must be an object".to_string())
                    })?
                    .insert("id".to_string(), id.into());
                let (actor_id, created_at) = Self::doc_columns(&doc);

                let sql = format!(
                    "INSERT INTO \"{}\" (id, actor_id, created_at, doc) VALUES (?, ?, ?, ?)",
                    collection
                );
                tx.execute(
                    &sql,
                    rusqlite::params![id, actor_id, created_at, serde_json::to_string(&doc)?],
                )
                .map_err(|e| EngramError::Database(format!("Failed to insert document: {}", e)))?;

                tx.commit().map_err(|e| {
                    EngramError::Database(format!("Failed to commit transaction: {}", e))
                })?;
                Ok(id)
            })
            .await
            .map_err(|e| EngramError::Database(format!("Pool interaction failed: {}", e)))??;

        debug!(id, "inserted document");
        Ok(id)
    }

    async fn upsert(&self, collection: &str, id: MemoryId, doc: Document) -> Result<()> {
        let collection = Self::check_name(collection)?;
        let conn = self.conn().await?;

        conn.interact(move |conn| -> Result<()> {
            Self::ensure_table(conn, &collection)?;

            let mut doc = doc;
            doc.as_object_mut()
                .ok_or_else(|| EngramError::InvalidInput("document must be an object".to_string()))?
                .insert("id".to_string(), id.into());
            let (actor_id, created_at) = Self::doc_columns(&doc);

            let sql = format!(
                "INSERT OR REPLACE INTO \"{}\" (id, actor_id, created_at, doc) VALUES (?, ?, ?, ?)",
                collection
            );
            conn.execute(
                &sql,
                rusqlite::params![id, actor_id, created_at, serde_json::to_string(&doc)?],
            )
            .map_err(|e| EngramError::Database(format!("Failed to upsert document: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| EngramError::Database(format!("Pool interaction failed: {}", e)))?
    }

    async fn delete(&self, collection: &str, id: MemoryId) -> Result<bool> {
        let collection = Self::check_name(collection)?;
        let conn = self.conn().await?;

        conn.interact(move |conn| -> Result<bool> {
            Self::ensure_table(conn, &collection)?;
            let sql = format!("DELETE FROM \"{}\" WHERE id = ?", collection);
            let removed = conn
                .execute(&sql, [id])
                .map_err(|e| EngramError::Database(format!("Failed to delete document: {}", e)))?;
            Ok(removed > 0)
        })
        .await
        .map_err(|e| EngramError::Database(format!("Pool interaction failed: {}", e)))?
    }

    async fn snapshot(&self, collections: &[String]) -> Result<Snapshot> {
        for name in collections {
            Self::check_name(name)?;
        }
        let names = collections.to_vec();
        let conn = self.conn().await?;

        conn.interact(move |conn| -> Result<Snapshot> {
            // one transaction so every collection is read at the same point
            let tx = conn
                .transaction()
                .map_err(|e| EngramError::Database(format!("Failed to begin transaction: {}", e)))?;
            let mut snapshot = Snapshot::new();
            for name in &names {
                snapshot.insert(name.clone(), Self::read_collection(&tx, name)?);
            }
            tx.commit()
                .map_err(|e| EngramError::Database(format!("Failed to commit transaction: {}", e)))?;
            Ok(snapshot)
        })
        .await
        .map_err(|e| EngramError::Database(format!("Pool interaction failed: {}", e)))?
    }

    async fn restore(&self, _snapshot: &Snapshot) -> Result<()> {
        Err(EngramError::RestoreUnsupported)
    }
}
