//! Typed record persistence with quota enforcement

use convoke_core::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::blob::{validate_id, BlobEntry, BlobStore, FsBlobStore, WriteOutcome};

/// A JSON-serializable record with a stable id
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    fn record_id(&self) -> &str;
}

/// Store of one record type inside one blob namespace
pub struct RecordStore<R> {
    blobs: Arc<dyn BlobStore>,
    max_records: usize,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> RecordStore<R> {
    pub fn new(blobs: Arc<dyn BlobStore>, max_records: usize) -> Self {
        Self {
            blobs,
            max_records: max_records.max(1),
            _record: PhantomData,
        }
    }

    /// Filesystem-backed store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>, max_records: usize, lock_timeout: Duration) -> Self {
        Self::new(Arc::new(FsBlobStore::new(dir, lock_timeout)), max_records)
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Persist a record, then prune the namespace to its quota
    ///
    /// Pruning failures are logged; the save itself has already succeeded.
    pub async fn save(&self, record: &R) -> Result<WriteOutcome> {
        let id = record.record_id();
        let json = serde_json::to_string_pretty(record)?;
        let outcome = self.blobs.write(id, &json).await?;

        if outcome == WriteOutcome::UnlockedDegraded {
            warn!("Record {} saved without its lock", id);
        }

        if let Err(e) = self.enforce_quota().await {
            warn!("Failed to enforce record quota: {}", e);
        }
        Ok(outcome)
    }

    /// Load a record; a missing or corrupt record is `None`
    pub async fn load(&self, id: &str) -> Result<Option<R>> {
        validate_id(id)?;
        let Some(json) = self.blobs.read(id).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Failed to parse record {}: {}", id, e);
                Ok(None)
            }
        }
    }

    /// Most recently modified records first, skipping unreadable ones
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<R>> {
        let mut entries = self.blobs.entries().await?;
        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.id.cmp(&a.id)));

        let mut records = Vec::new();
        for entry in entries {
            if records.len() >= limit {
                break;
            }
            match self.load(&entry.id).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => debug!("Skipping record {}: {}", entry.id, e),
            }
        }
        Ok(records)
    }

    /// Delete the least recently modified records beyond the quota
    ///
    /// Returns the number of records removed.
    pub async fn enforce_quota(&self) -> Result<usize> {
        let mut entries: Vec<BlobEntry> = self.blobs.entries().await?;
        if entries.len() <= self.max_records {
            return Ok(0);
        }

        entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.id.cmp(&b.id)));
        let excess = entries.len() - self.max_records;

        for entry in entries.iter().take(excess) {
            self.blobs.delete(&entry.id).await?;
            debug!("Pruned old record: {}", entry.id);
        }
        Ok(excess)
    }
}
