//! Snapshot coordinator
//!
//! Takes and restores a consistent, multi-collection point-in-time copy of
//! store state as a single transactional unit, and persists named snapshots
//! as JSON files for file-based backup.

use crate::db::{CollectionSet, Database, Snapshot};
use crate::error::{EngramError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

static SNAPSHOT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-zA-Z0-9_-]+$").expect("snapshot name pattern"));

/// Coordinates snapshot and restore over one database
pub struct SnapshotCoordinator {
    db: Arc<dyn Database>,
}

impl SnapshotCoordinator {
    /// Create a coordinator over the given database
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Union of the collection names declared by the given stores,
    /// deduplicated and sorted for determinism
    pub fn collection_union(stores: &[&dyn CollectionSet]) -> Vec<String> {
        stores
            .iter()
            .flat_map(|store| store.collections())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Read every collection declared by the stores into a snapshot,
    /// within one database session
    pub async fn snapshot(&self, stores: &[&dyn CollectionSet]) -> Result<Snapshot> {
        let collections = Self::collection_union(stores);
        debug!(collections = collections.len(), "taking snapshot");
        self.db.snapshot(&collections).await
    }

    /// Replace every collection named in the snapshot, within one session
    ///
    /// Fails with `RestoreUnsupported` if the database forbids bulk
    /// overwrite; collections not mentioned in the snapshot are untouched.
    pub async fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        if !self.db.can_set_snapshot() {
            return Err(EngramError::RestoreUnsupported);
        }
        info!(collections = snapshot.len(), "restoring snapshot");
        self.db.restore(snapshot).await
    }

    /// Persist a snapshot under a user-chosen name
    ///
    /// One JSON document per name, written atomically (temp file + rename on
    /// the same filesystem). Returns the file path.
    pub async fn save_to_file(
        &self,
        dir: &Path,
        name: &str,
        snapshot: &Snapshot,
    ) -> Result<PathBuf> {
        validate_name(name)?;
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(format!("{}.json", name));
        let content = serde_json::to_vec_pretty(snapshot)?;

        // rename is atomic when source and destination share a filesystem,
        // so the temp file lives next to the target
        let tmp = dir.join(format!("{}.json.tmp", name));
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;

        info!(name, path = %path.display(), "snapshot saved");
        Ok(path)
    }

    /// Load a named snapshot written by [`save_to_file`](Self::save_to_file)
    pub async fn load_from_file(&self, dir: &Path, name: &str) -> Result<Snapshot> {
        validate_name(name)?;
        let path = dir.join(format!("{}.json", name));
        let content = tokio::fs::read(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                EngramError::NotFound(format!("snapshot {}", name))
            } else {
                EngramError::Io(err)
            }
        })?;
        Ok(serde_json::from_slice(&content)?)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if !SNAPSHOT_NAME.is_match(name) {
        return Err(EngramError::InvalidSnapshotName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::actors::ActorStateStore;
    use crate::db::long_term::LongTermMemoryStore;
    use crate::db::memory::MemoryDatabase;
    use crate::db::short_term::ShortTermMemoryStore;
    use crate::db::DocumentFilter;
    use crate::types::{ActorState, ShortTermMemory};
    use chrono::Utc;
    use tempfile::TempDir;

    struct Fixture {
        actors: ActorStateStore,
        short_term: ShortTermMemoryStore,
        long_term: LongTermMemoryStore,
        coordinator: SnapshotCoordinator,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(MemoryDatabase::new());
        Fixture {
            actors: ActorStateStore::new(db.clone()),
            short_term: ShortTermMemoryStore::new(db.clone()),
            long_term: LongTermMemoryStore::new(db.clone()),
            coordinator: SnapshotCoordinator::new(db),
        }
    }

    fn short_memory() -> ShortTermMemory {
        ShortTermMemory {
            id: None,
            actor_id: 1,
            os: "linux".to_string(),
            statement: "saw a message".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_collection_union_is_sorted_and_deduplicated() {
        let f = fixture();
        let union = SnapshotCoordinator::collection_union(&[
            &f.short_term,
            &f.actors,
            &f.long_term,
            &f.short_term,
        ]);
        assert_eq!(union, vec!["actors", "long_term_memories", "short_term_memories"]);
    }

    #[tokio::test]
    async fn test_snapshot_restore_round_trip() {
        let f = fixture();
        f.actors.upsert(&ActorState::with_defaults(1)).await.unwrap();
        let id = f.short_term.append(&short_memory()).await.unwrap();

        let stores: [&dyn CollectionSet; 3] = [&f.actors, &f.short_term, &f.long_term];
        let snapshot = f.coordinator.snapshot(&stores).await.unwrap();

        // mutate after the capture
        f.short_term.delete(id).await.unwrap();
        f.short_term.append(&short_memory()).await.unwrap();
        f.short_term.append(&short_memory()).await.unwrap();

        f.coordinator.restore(&snapshot).await.unwrap();

        let items = f.short_term.list(&DocumentFilter::default()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, Some(id));
        assert!(f.actors.get(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_restore_leaves_unmentioned_collections_untouched() {
        let f = fixture();
        f.short_term.append(&short_memory()).await.unwrap();

        // snapshot only declares the actors collection
        let stores: [&dyn CollectionSet; 1] = [&f.actors];
        let snapshot = f.coordinator.snapshot(&stores).await.unwrap();
        f.coordinator.restore(&snapshot).await.unwrap();

        let items = f.short_term.list(&DocumentFilter::default()).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_restore_unsupported_database() {
        use crate::db::sqlite::SqliteDatabase;

        let temp = TempDir::new().unwrap();
        let db = Arc::new(SqliteDatabase::new(temp.path().join("test.db")).unwrap());
        let coordinator = SnapshotCoordinator::new(db);

        let result = coordinator.restore(&Snapshot::new()).await;
        assert!(matches!(result, Err(EngramError::RestoreUnsupported)));
    }

    #[tokio::test]
    async fn test_named_file_round_trip() {
        let f = fixture();
        f.short_term.append(&short_memory()).await.unwrap();
        let temp = TempDir::new().unwrap();

        let stores: [&dyn CollectionSet; 2] = [&f.actors, &f.short_term];
        let snapshot = f.coordinator.snapshot(&stores).await.unwrap();
        f.coordinator
            .save_to_file(temp.path(), "nightly-1", &snapshot)
            .await
            .unwrap();

        let loaded = f
            .coordinator
            .load_from_file(temp.path(), "nightly-1")
            .await
            .unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_invalid_snapshot_names_rejected() {
        let f = fixture();
        let temp = TempDir::new().unwrap();

        for name in ["", "bad name", "../escape", "dot.dot"] {
            let result = f
                .coordinator
                .save_to_file(temp.path(), name, &Snapshot::new())
                .await;
            assert!(
                matches!(result, Err(EngramError::InvalidSnapshotName(_))),
                "name {:?} should be rejected",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_load_unknown_snapshot_is_not_found() {
        let f = fixture();
        let temp = TempDir::new().unwrap();
        let result = f.coordinator.load_from_file(temp.path(), "missing").await;
        assert!(matches!(result, Err(EngramError::NotFound(_))));
    }
}
