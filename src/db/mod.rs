//! Document database layer for the Engram runtime
//!
//! Persists actor state and memory records as raw JSON documents grouped into
//! named collections, and carries the transactional snapshot/restore contract
//! the snapshot coordinator relies on.

pub mod actors;
pub mod long_term;
pub mod memory;
pub mod short_term;
pub mod sqlite;
pub mod vectors;

use crate::error::Result;
use crate::types::{ActorId, MemoryId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A raw record as persisted in a collection
pub type Document = serde_json::Value;

/// Point-in-time copy of collections: name -> ordered records
///
/// Keys are sorted for deterministic serialization.
pub type Snapshot = BTreeMap<String, Vec<Document>>;

/// Filter predicates understood by every database backend
///
/// Backends translate these into their own query language; the in-memory
/// backend evaluates them directly via [`DocumentFilter::matches`].
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    /// Exact match on the owning actor
    pub actor_id: Option<ActorId>,

    /// Membership in a set of record ids
    pub ids: Option<Vec<MemoryId>>,

    /// Inclusive lower bound on `createdAt`
    pub created_after: Option<DateTime<Utc>>,

    /// Inclusive upper bound on `createdAt`
    pub created_before: Option<DateTime<Utc>>,
}

impl DocumentFilter {
    /// Filter scoped to a single actor
    pub fn by_actor(actor_id: ActorId) -> Self {
        Self {
            actor_id: Some(actor_id),
            ..Self::default()
        }
    }

    /// Filter on record-id membership
    pub fn by_ids(ids: Vec<MemoryId>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }

    /// Evaluate the filter against one document
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(actor_id) = self.actor_id {
            if doc.get("actorId").and_then(Document::as_i64) != Some(actor_id) {
                return false;
            }
        }

        if let Some(ids) = &self.ids {
            match doc.get("id").and_then(Document::as_i64) {
                Some(id) if ids.contains(&id) => {}
                _ => return false,
            }
        }

        if self.created_after.is_some() || self.created_before.is_some() {
            let created = doc
                .get("createdAt")
                .and_then(Document::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            let Some(created) = created else {
                return false;
            };
            if let Some(after) = self.created_after {
                if created < after {
                    return false;
                }
            }
            if let Some(before) = self.created_before {
                if created > before {
                    return false;
                }
            }
        }

        true
    }
}

/// Document database contract consumed by the stores and the snapshot
/// coordinator
///
/// `insert` assigns a fresh integer id and fails if the document already
/// carries one. `snapshot` and `restore` each run inside one session so a
/// reader never observes a collection mid-delete-mid-insert.
#[async_trait]
pub trait Database: Send + Sync {
    /// Whether the backend permits bulk overwrite via `restore`
    fn can_set_snapshot(&self) -> bool;

    /// List documents in a collection matching the filter
    async fn find(&self, collection: &str, filter: &DocumentFilter) -> Result<Vec<Document>>;

    /// Append a document, assigning and returning a fresh id
    async fn insert(&self, collection: &str, doc: Document) -> Result<MemoryId>;

    /// Insert or replace the document with the given id
    async fn upsert(&self, collection: &str, id: MemoryId, doc: Document) -> Result<()>;

    /// Delete by id; returns whether a document was removed
    async fn delete(&self, collection: &str, id: MemoryId) -> Result<bool>;

    /// Read the named collections fully, within one session
    async fn snapshot(&self, collections: &[String]) -> Result<Snapshot>;

    /// Replace every collection named in the snapshot, within one session
    ///
    /// Collections not mentioned are left untouched.
    async fn restore(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Declares which collections a store reads and writes
///
/// The snapshot coordinator unions these across stores to decide what to
/// capture.
pub trait CollectionSet {
    /// Collection names accessed by this store
    fn collections(&self) -> Vec<String>;
}
