//! Database State and Persistence
//!
//! Holds every collection in memory and persists them wholesale to a single
//! JSON file. Writes are visible immediately; they become durable on the next
//! autosave tick (or an explicit flush).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::domain::{DomainError, DomainResult, Group, GroupTag, Image, ImageTag, Tag};
use super::collection::{Collection, Document, StoredCollection};

pub const GROUPS: &str = "groups";
pub const TAGS: &str = "tags";
pub const IMAGES: &str = "images";
pub const GROUP_TAGS: &str = "group_tags";
pub const IMAGE_TAGS: &str = "image_tags";

const NAME_UNIQUE: &[&str] = &["name"];
const NO_UNIQUE: &[&str] = &[];

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredDatabase {
    #[serde(default)]
    collections: Vec<StoredCollection>,
}

/// All collections of the library, initialized eagerly
pub struct Database {
    pub groups: Collection<Group>,
    pub tags: Collection<Tag>,
    pub images: Collection<Image>,
    pub group_tags: Collection<GroupTag>,
    pub image_tags: Collection<ImageTag>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    pub fn new() -> Self {
        Self {
            groups: Collection::new(GROUPS, NAME_UNIQUE),
            tags: Collection::new(TAGS, NAME_UNIQUE),
            images: Collection::new(IMAGES, NO_UNIQUE),
            group_tags: Collection::new(GROUP_TAGS, NO_UNIQUE),
            image_tags: Collection::new(IMAGE_TAGS, NO_UNIQUE),
        }
    }

    /// Parse a persisted database; collections absent from the file start empty
    pub fn from_json(bytes: &[u8]) -> DomainResult<Self> {
        let stored: StoredDatabase = serde_json::from_slice(bytes)?;
        let mut by_name: std::collections::HashMap<String, StoredCollection> = stored
            .collections
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();

        fn take<T: Document>(
            by_name: &mut std::collections::HashMap<String, StoredCollection>,
            name: &'static str,
            unique: &'static [&'static str],
        ) -> DomainResult<Collection<T>> {
            match by_name.remove(name) {
                Some(stored) => Collection::restore(name, unique, stored),
                None => Ok(Collection::new(name, unique)),
            }
        }

        Ok(Self {
            groups: take(&mut by_name, GROUPS, NAME_UNIQUE)?,
            tags: take(&mut by_name, TAGS, NAME_UNIQUE)?,
            images: take(&mut by_name, IMAGES, NO_UNIQUE)?,
            group_tags: take(&mut by_name, GROUP_TAGS, NO_UNIQUE)?,
            image_tags: take(&mut by_name, IMAGE_TAGS, NO_UNIQUE)?,
        })
    }

    pub fn to_json(&self) -> DomainResult<Vec<u8>> {
        let stored = StoredDatabase {
            collections: vec![
                self.groups.to_stored()?,
                self.tags.to_stored()?,
                self.images.to_stored()?,
                self.group_tags.to_stored()?,
                self.image_tags.to_stored()?,
            ],
        };
        Ok(serde_json::to_vec(&stored)?)
    }

    pub fn is_dirty(&self) -> bool {
        self.groups.is_dirty()
            || self.tags.is_dirty()
            || self.images.is_dirty()
            || self.group_tags.is_dirty()
            || self.image_tags.is_dirty()
    }

    /// Sum of the collection revisions; changes whenever any collection does
    pub fn revision(&self) -> u64 {
        self.groups.revision()
            + self.tags.revision()
            + self.images.revision()
            + self.group_tags.revision()
            + self.image_tags.revision()
    }

    fn mark_clean(&mut self) {
        self.groups.mark_clean();
        self.tags.mark_clean();
        self.images.mark_clean();
        self.group_tags.mark_clean();
        self.image_tags.mark_clean();
    }
}

/// Shared handle to the database and its persistence
#[derive(Clone)]
pub struct DbState {
    db: Arc<Mutex<Database>>,
    path: Option<PathBuf>,
    /// Serializes file writes
    writer: Arc<Mutex<()>>,
    autosave: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl DbState {
    /// Store with no backing file; flushes are no-ops
    pub fn in_memory() -> Self {
        Self::with_database(Database::new(), None)
    }

    fn with_database(db: Database, path: Option<PathBuf>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            path,
            writer: Arc::new(Mutex::new(())),
            autosave: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// Load `path` if it exists, otherwise start empty
    pub async fn open(path: &Path) -> DomainResult<Self> {
        let db = match tokio::fs::read(path).await {
            Ok(bytes) => {
                let db = Database::from_json(&bytes)?;
                log::info!("Database loaded: {}", path.display());
                db
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Database file not found, starting empty: {}", path.display());
                Database::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self::with_database(db, Some(path.to_path_buf())))
    }

    pub fn handle(&self) -> Arc<Mutex<Database>> {
        self.db.clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the database if anything changed since the last flush
    ///
    /// Returns whether a write happened. The dirty flags are cleared only once
    /// the file is in place, and only if nothing changed while it was written.
    pub async fn flush(&self) -> DomainResult<bool> {
        let Some(path) = self.path.as_ref() else {
            return Ok(false);
        };
        let _writer = self.writer.lock().await;

        let (bytes, revision) = {
            let db = self.db.lock().await;
            if !db.is_dirty() {
                return Ok(false);
            }
            (db.to_json()?, db.revision())
        };

        write_atomic(path, &bytes).await?;

        let mut db = self.db.lock().await;
        if db.revision() == revision {
            db.mark_clean();
        }
        log::debug!("Database flushed: {} bytes", bytes.len());
        Ok(true)
    }

    /// Spawn the periodic flush task; replaces a running one
    pub fn start_autosave(&self, interval: Duration) {
        let state = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = state.flush().await {
                    log::error!("Autosave failed: {}", e);
                }
            }
        });

        let mut slot = self.autosave.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    pub fn autosave_running(&self) -> bool {
        let slot = self.autosave.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|task| !task.is_finished()).unwrap_or(false)
    }

    /// Stop autosave and flush pending changes
    pub async fn close(&self) -> DomainResult<()> {
        let task = {
            let mut slot = self.autosave.lock().unwrap_or_else(|e| e.into_inner());
            slot.take()
        };
        if let Some(task) = task {
            // let an in-flight autosave finish its write first
            let _writer = self.writer.lock().await;
            task.abort();
        }
        self.flush().await?;
        Ok(())
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Open the database at `db_path` and start autosaving it
pub async fn init_db(db_path: &Path, autosave_interval: Duration) -> DomainResult<DbState> {
    if autosave_interval.is_zero() {
        return Err(DomainError::InvalidInput("autosave interval must be positive".into()));
    }
    let state = DbState::open(db_path).await?;
    state.start_autosave(autosave_interval);
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flush_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harem.db");

        let state = DbState::open(&path).await.unwrap();
        {
            let db = state.handle();
            let mut db = db.lock().await;
            db.groups.insert(Group::new(0, "Genshin".into())).unwrap();
            db.tags.insert(Tag::new(0, "Raiden".into())).unwrap();
            db.group_tags.link(1, 1).unwrap();
        }
        assert!(state.flush().await.unwrap());
        assert!(!state.flush().await.unwrap());

        let reloaded = DbState::open(&path).await.unwrap();
        let db = reloaded.handle();
        let db = db.lock().await;
        assert_eq!(db.groups.len(), 1);
        assert_eq!(db.tags.find_one_by("name", "Raiden").map(|t| t.id), Some(1));
        assert!(db.group_tags.has_link(1, 1));
        assert!(!db.is_dirty());
    }

    #[tokio::test]
    async fn test_reload_enforces_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harem.db");
        let state = DbState::open(&path).await.unwrap();
        state.handle().lock().await.tags.insert(Tag::new(0, "a".into())).unwrap();
        state.close().await.unwrap();

        let reloaded = DbState::open(&path).await.unwrap();
        let db = reloaded.handle();
        let err = db.lock().await.tags.insert(Tag::new(0, "a".into())).unwrap_err();
        assert!(matches!(err, DomainError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn test_in_memory_flush_is_noop() {
        let state = DbState::in_memory();
        state.handle().lock().await.tags.insert(Tag::new(0, "a".into())).unwrap();
        assert!(!state.flush().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_collections_start_empty() {
        let db = Database::from_json(br#"{"collections": [{"name": "tags", "data": [{"id": 4, "name": "x"}]}]}"#).unwrap();
        assert_eq!(db.tags.len(), 1);
        assert!(db.groups.is_empty());

        let mut db = db;
        assert_eq!(db.tags.insert(Tag::new(0, "y".into())).unwrap().id, 5);
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_changes_pending() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        let path = blocker.join("harem.db");
        let state = DbState::open(&path).await.unwrap();
        assert_eq!(state.path(), Some(path.as_path()));

        state.handle().lock().await.tags.insert(Tag::new(0, "a".into())).unwrap();
        // a plain file where the parent directory should be
        std::fs::write(&blocker, b"").unwrap();
        assert!(matches!(state.flush().await, Err(DomainError::Io(_))));
        assert!(state.handle().lock().await.is_dirty());

        std::fs::remove_file(&blocker).unwrap();
        assert!(state.flush().await.unwrap());
        assert!(!state.handle().lock().await.is_dirty());

        let reloaded = DbState::open(&path).await.unwrap();
        let db = reloaded.handle();
        assert!(db.lock().await.tags.find_one_by("name", "a").is_some());
    }

    #[tokio::test]
    async fn test_revision_tracks_mutations() {
        let mut db = Database::new();
        let before = db.revision();
        let tag = db.tags.insert(Tag::new(0, "a".into())).unwrap();
        db.image_tags.link(1, tag.id).unwrap();
        assert_eq!(db.revision(), before + 2);

        // rejected writes leave the revision alone
        db.tags.insert(Tag::new(0, "a".into())).unwrap_err();
        assert_eq!(db.revision(), before + 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harem.db");
        let interval = Duration::from_secs(5);
        let state = init_db(&path, interval).await.unwrap();
        assert!(state.autosave_running());
        assert!(DbState::in_memory().path().is_none());

        state.handle().lock().await.tags.insert(Tag::new(0, "a".into())).unwrap();
        // clock is paused; this returns once the autosave tick has fired
        tokio::time::sleep(interval + Duration::from_secs(1)).await;
        state.writer.lock().await;
        assert!(!state.handle().lock().await.is_dirty());
        assert!(path.exists());

        state.close().await.unwrap();
        assert!(!state.autosave_running());
    }
}
