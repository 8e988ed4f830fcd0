//! Blob Store Port and its filesystem implementation

use async_trait::async_trait;
use convoke_core::{ConvokeError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tokio::fs;
use tracing::{debug, warn};

const MAX_ID_LEN: usize = 64;
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How a write was performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Written while holding the record lock
    Locked,
    /// The lock could not be acquired in time; written without it
    UnlockedDegraded,
}

/// A stored blob and its last modification time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub id: String,
    pub modified: SystemTime,
}

/// Trait for reading and writing small named blobs with per-blob locking
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read(&self, id: &str) -> Result<Option<String>>;

    async fn write(&self, id: &str, contents: &str) -> Result<WriteOutcome>;

    /// Remove a blob and its lock sidecar; missing blobs are not an error
    async fn delete(&self, id: &str) -> Result<()>;

    async fn entries(&self) -> Result<Vec<BlobEntry>>;
}

/// Reject ids that are not `[A-Za-z0-9_-]{1,64}`
pub fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(ConvokeError::InvalidRecordId(id.to_string()))
    }
}

/// Held advisory lock on a sidecar file; released on drop
struct SidecarLock {
    file: File,
}

impl Drop for SidecarLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            debug!("Failed to release record lock: {}", e);
        }
    }
}

/// Directory-backed blob store: `<dir>/<id>.json` plus `<id>.json.lock`
pub struct FsBlobStore {
    dir: PathBuf,
    lock_timeout: Duration,
    temp_seq: AtomicU64,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout,
            temp_seq: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn lock_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json.lock", id))
    }

    fn temp_path(&self, id: &str) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!("{}.json.{}-{}.tmp", id, std::process::id(), seq))
    }

    /// Poll for the sidecar lock until the timeout; `None` means it timed out
    async fn acquire(&self, id: &str) -> Result<Option<SidecarLock>> {
        // fs2 locks a std handle; only the open goes through the runtime
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path(id))
            .await?
            .into_std()
            .await;

        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match fs2::FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(Some(SidecarLock { file })),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn read(&self, id: &str) -> Result<Option<String>> {
        validate_id(id)?;
        let path = self.blob_path(id);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }

        let guard = self.acquire(id).await?;
        if guard.is_none() {
            warn!(
                "Lock on {} not acquired within {:?}, reading unlocked",
                id, self.lock_timeout
            );
        }

        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, id: &str, contents: &str) -> Result<WriteOutcome> {
        validate_id(id)?;
        fs::create_dir_all(&self.dir).await?;

        let guard = self.acquire(id).await?;
        let outcome = if guard.is_some() {
            WriteOutcome::Locked
        } else {
            warn!(
                "Lock on {} not acquired within {:?}, writing unlocked",
                id, self.lock_timeout
            );
            WriteOutcome::UnlockedDegraded
        };

        // Readers never observe a partially written record
        let temp = self.temp_path(id);
        fs::write(&temp, contents).await?;
        if let Err(e) = fs::rename(&temp, self.blob_path(id)).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!("Wrote {} ({:?})", id, outcome);
        Ok(outcome)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        remove_if_exists(&self.blob_path(id)).await?;
        remove_if_exists(&self.lock_path(id)).await
    }

    async fn entries(&self) -> Result<Vec<BlobEntry>> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if validate_id(id).is_err() {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    debug!("Skipping {}: {}", id, e);
                    continue;
                }
            };
            entries.push(BlobEntry {
                id: id.to_string(),
                modified,
            });
        }
        Ok(entries)
    }
}
