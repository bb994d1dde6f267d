//! File-backed session store: one pretty-printed JSON file per session.
//!
//! Layout inside the data directory:
//! - `game_<id>.json` is the canonical document,
//! - `game_<id>.json.bak` is the last known-good copy before the latest save,
//! - `game_<id>.json.tmp-<nonce>` are in-flight writes, renamed over the
//!   canonical file once fully flushed.

use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use futures::future::BoxFuture;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::dao::{
    models::SessionDocument,
    retry::{RetryError, RetryPolicy},
    session_store::SessionStore,
    storage::{LoadError, StorageError, StorageResult, is_valid_session_id},
};

const FILE_PREFIX: &str = "game_";
const FILE_EXTENSION: &str = ".json";
/// Suffix appended to the canonical file name for the backup copy.
pub const BACKUP_SUFFIX: &str = ".bak";
const TEMP_MARKER: &str = ".tmp-";
const HEALTH_PROBE: &str = ".health-probe";

/// Moves a fully written temp file over the canonical path.
type RenameFn = for<'a> fn(&'a Path, &'a Path) -> BoxFuture<'a, io::Result<()>>;

fn rename_file<'a>(from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<()>> {
    Box::pin(fs::rename(from, to))
}

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    data_dir: PathBuf,
    retry: RetryPolicy,
    rename: RenameFn,
}

impl FileSessionStore {
    /// Open (and create if needed) the data directory, removing temp files
    /// left behind by an interrupted save.
    pub async fn open(data_dir: impl Into<PathBuf>, retry: RetryPolicy) -> StorageResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).await.map_err(|source| {
            StorageError::unavailable(
                format!("failed to create data directory `{}`", data_dir.display()),
                source,
            )
        })?;

        let store = Self {
            data_dir,
            retry,
            rename: rename_file,
        };
        store.sweep_temp_files().await?;
        Ok(store)
    }

    #[cfg(test)]
    fn with_rename(mut self, rename: RenameFn) -> Self {
        self.rename = rename;
        self
    }

    async fn sweep_temp_files(&self) -> StorageResult<()> {
        let mut entries = fs::read_dir(&self.data_dir).await.map_err(|source| {
            StorageError::unavailable(
                format!("failed to list `{}`", self.data_dir.display()),
                source,
            )
        })?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let file_name = entry.file_name();
            let is_temp = file_name
                .to_str()
                .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.contains(TEMP_MARKER));
            if !is_temp {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => debug!(path = %entry.path().display(), "removed stale temporary file"),
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "failed to remove stale temporary file")
                }
            }
        }
        Ok(())
    }

    /// Directory holding the session files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Canonical path of a session, rejecting ids that are not plain file-name fragments.
    pub fn document_path(&self, id: &str) -> StorageResult<PathBuf> {
        if !is_valid_session_id(id) {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        Ok(self
            .data_dir
            .join(format!("{FILE_PREFIX}{id}{FILE_EXTENSION}")))
    }

    async fn load_document(&self, id: &str) -> Result<SessionDocument, LoadError> {
        let path = self
            .document_path(id)
            .map_err(|_| LoadError::NotFound(id.to_string()))?;

        let primary_failure = match read_document(&path).await {
            ReadOutcome::Loaded(document) => return Ok(document),
            ReadOutcome::Missing => return Err(LoadError::NotFound(id.to_string())),
            ReadOutcome::Unreadable(reason) => reason,
        };

        match read_document(&backup_path(&path)).await {
            ReadOutcome::Loaded(document) => {
                warn!(
                    session_id = %id,
                    reason = %primary_failure,
                    "canonical session file unreadable; recovered from backup"
                );
                Ok(document)
            }
            ReadOutcome::Missing => {
                error!(
                    session_id = %id,
                    reason = %primary_failure,
                    "session document corrupt and no backup available"
                );
                Err(LoadError::Corrupt {
                    id: id.to_string(),
                    reason: primary_failure,
                })
            }
            ReadOutcome::Unreadable(backup_failure) => {
                error!(
                    session_id = %id,
                    reason = %primary_failure,
                    backup_reason = %backup_failure,
                    "session document and backup both corrupt"
                );
                Err(LoadError::Corrupt {
                    id: id.to_string(),
                    reason: format!("{primary_failure}; backup: {backup_failure}"),
                })
            }
        }
    }

    async fn save_bytes(&self, id: &str, bytes: Vec<u8>) -> StorageResult<()> {
        let path = self.document_path(id)?;
        let temp = temp_path(&path);

        if let Err(source) = write_synced(&temp, &bytes).await {
            remove_temp(&temp).await;
            return Err(StorageError::unavailable(
                format!("failed to write temporary file `{}`", temp.display()),
                source,
            ));
        }

        self.refresh_backup(id, &path).await;

        let outcome = self
            .retry
            .run("rename", || (self.rename)(&temp, &path), is_lock_contention)
            .await;

        match outcome {
            Ok(()) => {
                debug!(session_id = %id, bytes = bytes.len(), "session saved");
                Ok(())
            }
            Err(err) => {
                remove_temp(&temp).await;
                Err(match err {
                    RetryError::Permanent(source) => StorageError::unavailable(
                        format!("failed to replace `{}`", path.display()),
                        source,
                    ),
                    RetryError::Exhausted { attempts, last } => {
                        error!(session_id = %id, attempts, error = %last, "giving up on session save");
                        StorageError::exhausted("rename", attempts, last)
                    }
                })
            }
        }
    }

    /// Copy the canonical file to the backup path when it still parses.
    ///
    /// A corrupt canonical file never overwrites the previous backup.
    async fn refresh_backup(&self, id: &str, path: &Path) {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return,
            Err(err) => {
                warn!(session_id = %id, error = %err, "could not read session for backup");
                return;
            }
        };

        if let Err(err) = serde_json::from_slice::<SessionDocument>(&bytes) {
            warn!(session_id = %id, error = %err, "canonical copy unreadable; keeping previous backup");
            return;
        }

        if let Err(err) = fs::write(backup_path(path), &bytes).await {
            warn!(session_id = %id, error = %err, "failed to refresh session backup");
        }
    }

    async fn delete_document(&self, id: &str) -> StorageResult<bool> {
        let path = self.document_path(id)?;
        let existed = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(err) => {
                return Err(StorageError::unavailable(
                    format!("failed to delete `{}`", path.display()),
                    err,
                ));
            }
        };

        match fs::remove_file(backup_path(&path)).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(session_id = %id, error = %err, "failed to delete session backup"),
        }

        Ok(existed)
    }

    async fn list_documents(&self) -> StorageResult<Vec<SessionDocument>> {
        let read_dir_error = |source: io::Error| {
            StorageError::unavailable(
                format!("failed to list `{}`", self.data_dir.display()),
                source,
            )
        };

        let mut entries = fs::read_dir(&self.data_dir).await.map_err(read_dir_error)?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_dir_error)? {
            let file_name = entry.file_name();
            if let Some(id) = file_name.to_str().and_then(session_id_from_file_name) {
                ids.push(id.to_string());
            }
        }
        ids.sort();

        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load_document(&id).await {
                Ok(document) => documents.push(document),
                Err(err) => warn!(session_id = %id, error = %err, "skipping unreadable session"),
            }
        }
        Ok(documents)
    }

    async fn probe(&self) -> StorageResult<()> {
        let probe = self.data_dir.join(HEALTH_PROBE);
        fs::write(&probe, b"ok").await.map_err(|source| {
            StorageError::unavailable(
                format!("data directory `{}` is not writable", self.data_dir.display()),
                source,
            )
        })?;
        let _ = fs::remove_file(&probe).await;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, id: &str) -> BoxFuture<'static, Result<SessionDocument, LoadError>> {
        let store = self.clone();
        let id = id.to_string();
        Box::pin(async move { store.load_document(&id).await })
    }

    fn save(&self, id: &str, document: &SessionDocument) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let id = id.to_string();
        let bytes = serde_json::to_vec_pretty(document).map_err(|source| StorageError::Serialize {
            id: id.clone(),
            source,
        });
        Box::pin(async move { store.save_bytes(&id, bytes?).await })
    }

    fn delete(&self, id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let id = id.to_string();
        Box::pin(async move { store.delete_document(&id).await })
    }

    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<SessionDocument>>> {
        let store = self.clone();
        Box::pin(async move { store.list_documents().await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.probe().await })
    }
}

enum ReadOutcome {
    Loaded(SessionDocument),
    Missing,
    Unreadable(String),
}

async fn read_document(path: &Path) -> ReadOutcome {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return ReadOutcome::Missing,
        Err(err) => return ReadOutcome::Unreadable(err.to_string()),
    };

    match serde_json::from_slice::<SessionDocument>(&bytes) {
        Ok(document) => ReadOutcome::Loaded(document.migrate()),
        Err(err) => ReadOutcome::Unreadable(err.to_string()),
    }
}

async fn remove_temp(temp: &Path) {
    match fs::remove_file(temp).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %temp.display(), error = %err, "failed to remove temporary file"),
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// Backup path for a canonical document path.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!("{TEMP_MARKER}{}", Uuid::new_v4().simple()));
    PathBuf::from(name)
}

fn session_id_from_file_name(name: &str) -> Option<&str> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_EXTENSION)
        .filter(|id| is_valid_session_id(id))
}

/// Whether a rename failure looks like another process briefly holding the file.
fn is_lock_contention(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        ErrorKind::PermissionDenied | ErrorKind::ResourceBusy | ErrorKind::WouldBlock
    ) {
        return true;
    }

    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
    #[cfg(windows)]
    if matches!(err.raw_os_error(), Some(32 | 33)) {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    use tempfile::TempDir;

    use super::*;
    use crate::{
        dao::models::{BacklogTask, Phase, PhaseRecord},
        testing::sample_document,
    };

    async fn store() -> (TempDir, FileSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(
            dir.path().join("speldata"),
            RetryPolicy::linear(3, Duration::from_millis(1)),
        )
        .await
        .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn save_then_load_is_lossless() {
        let (_dir, store) = store().await;
        let document = sample_document("20250101120000-ab12", 30);
        assert!(document.has_team("SÄPO"));
        assert!(
            document.backlog["Alfa"]
                .iter()
                .any(|task| matches!(task, BacklogTask::Staged { .. }))
        );
        assert!(!document.orders.is_empty());

        store.save(&document.id, &document).await.unwrap();
        let loaded = store.load(&document.id).await.unwrap();

        assert_eq!(loaded, document);
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let (_dir, store) = store().await;
        let err = store.load("20990101000000").await.unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[tokio::test]
    async fn interrupted_save_leaves_previous_document() {
        let (_dir, store) = store().await;
        let first = sample_document("s1", 20);
        store.save("s1", &first).await.unwrap();

        let mut second = first.clone();
        second.phase = Phase::Diplomacy;
        let bytes = serde_json::to_vec_pretty(&second).unwrap();
        let path = store.document_path("s1").unwrap();
        // Crash after a partial temp write, before the rename.
        fs::write(temp_path(&path), &bytes[..bytes.len() / 2])
            .await
            .unwrap();

        assert_eq!(store.load("s1").await.unwrap(), first);
        assert_eq!(store.list().await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn corrupt_canonical_falls_back_to_backup() {
        let (_dir, store) = store().await;
        let first = sample_document("s2", 20);
        store.save("s2", &first).await.unwrap();
        let mut second = first.clone();
        second.round = 2;
        store.save("s2", &second).await.unwrap();

        let path = store.document_path("s2").unwrap();
        fs::write(&path, b"{\"id\": \"s2\", \"date\"").await.unwrap();

        assert_eq!(store.load("s2").await.unwrap(), first);
    }

    #[tokio::test]
    async fn corrupt_backup_is_not_refreshed_from_corrupt_canonical() {
        let (_dir, store) = store().await;
        let first = sample_document("s3", 20);
        store.save("s3", &first).await.unwrap();
        let mut second = first.clone();
        second.round = 2;
        store.save("s3", &second).await.unwrap();

        let path = store.document_path("s3").unwrap();
        fs::write(&path, b"garbage").await.unwrap();
        let mut third = first.clone();
        third.round = 3;
        third.history = vec![PhaseRecord::ongoing(3, Phase::Order)];
        store.save("s3", &third).await.unwrap();

        let backup = fs::read(backup_path(&path)).await.unwrap();
        let backup: SessionDocument = serde_json::from_slice(&backup).unwrap();
        assert_eq!(backup, first);
        assert_eq!(store.load("s3").await.unwrap(), third);
    }

    #[tokio::test]
    async fn unrecoverable_document_is_reported_corrupt() {
        let (_dir, store) = store().await;
        let path = store.document_path("s4").unwrap();
        fs::write(&path, b"not json").await.unwrap();

        let err = store.load("s4").await.unwrap_err();
        assert!(matches!(err, LoadError::Corrupt { .. }));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_drops_backup() {
        let (_dir, store) = store().await;
        let document = sample_document("s5", 20);
        store.save("s5", &document).await.unwrap();
        store.save("s5", &document).await.unwrap();

        assert!(store.delete("s5").await.unwrap());
        assert!(!store.delete("s5").await.unwrap());
        assert!(matches!(
            store.load("s5").await.unwrap_err(),
            LoadError::NotFound(_)
        ));
        let path = store.document_path("s5").unwrap();
        assert!(!backup_path(&path).exists());
    }

    #[tokio::test]
    async fn path_like_ids_are_rejected() {
        let (_dir, store) = store().await;
        let document = sample_document("s6", 20);

        let err = store.save("../escape", &document).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidId(_)));
        assert!(matches!(
            store.load("../escape").await.unwrap_err(),
            LoadError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn list_is_sorted_by_id() {
        let (_dir, store) = store().await;
        for id in ["b", "a", "c"] {
            store.save(id, &sample_document(id, 20)).await.unwrap();
        }

        let ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.id)
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn health_check_passes_on_writable_directory() {
        let (_dir, store) = store().await;
        store.health_check().await.unwrap();
    }

    fn always_locked<'a>(_: &'a Path, _: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async { Err(io::Error::from(ErrorKind::PermissionDenied)) })
    }

    static FLAKY_RENAMES: AtomicU32 = AtomicU32::new(0);

    fn locked_twice<'a>(from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        if FLAKY_RENAMES.fetch_add(1, Ordering::SeqCst) < 2 {
            Box::pin(async { Err(io::Error::from(ErrorKind::PermissionDenied)) })
        } else {
            rename_file(from, to)
        }
    }

    async fn temp_files(store: &FileSessionStore) -> Vec<String> {
        let mut entries = fs::read_dir(store.data_dir()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.contains(TEMP_MARKER) {
                names.push(name);
            }
        }
        names
    }

    #[tokio::test]
    async fn persistent_lock_exhausts_retries() {
        let (_dir, store) = store().await;
        let document = sample_document("s7", 20);
        store.save("s7", &document).await.unwrap();

        let locked = store.clone().with_rename(always_locked);
        let mut changed = document.clone();
        changed.location = "Boden".into();
        let err = locked.save("s7", &changed).await.unwrap_err();

        assert!(matches!(err, StorageError::Exhausted { attempts: 4, .. }));
        assert!(temp_files(&store).await.is_empty());
        assert_eq!(store.load("s7").await.unwrap(), document);
    }

    #[tokio::test]
    async fn transient_lock_is_retried() {
        let (_dir, store) = store().await;
        let store = store.with_rename(locked_twice);
        let document = sample_document("s8", 20);

        store.save("s8", &document).await.unwrap();

        assert_eq!(FLAKY_RENAMES.load(Ordering::SeqCst), 3);
        assert_eq!(store.load("s8").await.unwrap(), document);
    }

    #[tokio::test]
    async fn open_sweeps_stale_temp_files() {
        let (dir, store) = store().await;
        let document = sample_document("s9", 20);
        store.save("s9", &document).await.unwrap();
        let path = store.document_path("s9").unwrap();
        fs::write(temp_path(&path), b"{\"id\"").await.unwrap();
        fs::write(store.data_dir().join("notes.txt"), b"keep").await.unwrap();
        assert_eq!(temp_files(&store).await.len(), 1);

        let reopened = FileSessionStore::open(dir.path().join("speldata"), RetryPolicy::default())
            .await
            .unwrap();

        assert!(temp_files(&reopened).await.is_empty());
        assert!(reopened.data_dir().join("notes.txt").exists());
        assert_eq!(reopened.load("s9").await.unwrap(), document);
    }

    #[test]
    fn lock_contention_detection() {
        assert!(is_lock_contention(&io::Error::from(ErrorKind::PermissionDenied)));
        assert!(!is_lock_contention(&io::Error::from(ErrorKind::NotFound)));
    }
}
