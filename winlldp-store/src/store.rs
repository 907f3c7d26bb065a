//! Durable, cross-process neighbor table
//!
//! The table is one JSON file shared by the capture worker (writer) and CLI
//! readers. Writers hold an exclusive advisory lock on a `.lock` sidecar
//! across the read-modify-write and publish through a sibling temp file plus
//! rename, so readers always observe a complete snapshot. Readers do not
//! take the lock; on a parse failure they retry once and then treat the
//! table as empty for that call.

use crate::record::{NeighborKey, NeighborRecord};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use winlldp_core::{Config, Error, Result};

/// Backoff before the single lock-free read retry
const READ_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Top-level on-disk document
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct NeighborTable {
    pub neighbors: Vec<NeighborRecord>,
}

impl NeighborTable {
    fn find_mut(&mut self, key: &NeighborKey) -> Option<&mut NeighborRecord> {
        self.neighbors.iter_mut().find(|r| r.key() == *key)
    }
}

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Handle to the neighbor table file
pub struct NeighborStore {
    path: PathBuf,
    lock_path: PathBuf,
    warned_corrupt: AtomicBool,
}

impl NeighborStore {
    /// Store over an explicit file path; the lock sidecar is `<path>.lock`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let mut lock_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);

        NeighborStore {
            path,
            lock_path,
            warned_corrupt: AtomicBool::new(false),
        }
    }

    /// Store at the configured location.
    pub fn open(config: &Config) -> Self {
        Self::new(config.neighbors_file.clone())
    }

    /// Path of the table file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the table without the lock.
    ///
    /// Absent file is an empty table. A parse failure is retried once after
    /// a brief backoff (the writer may be mid-rename), then treated as empty
    /// for this call; the corruption is logged once per store handle.
    pub fn load(&self) -> NeighborTable {
        match self.try_read() {
            Ok(table) => table,
            Err(Error::Io(_)) | Err(Error::StoreCorrupt(_)) => {
                std::thread::sleep(READ_RETRY_DELAY);
                match self.try_read() {
                    Ok(table) => table,
                    Err(e) => {
                        if !self.warned_corrupt.swap(true, Ordering::Relaxed) {
                            warn!(path = %self.path.display(), error = %e,
                                  "neighbor table unreadable, treating as empty");
                        }
                        NeighborTable::default()
                    }
                }
            }
            Err(e) => {
                if !self.warned_corrupt.swap(true, Ordering::Relaxed) {
                    warn!(path = %self.path.display(), error = %e,
                          "neighbor table unreadable, treating as empty");
                }
                NeighborTable::default()
            }
        }
    }

    /// Merge-or-insert `record` under the exclusive lock.
    ///
    /// An existing record with the same key keeps its `first_seen`; all
    /// other fields refresh. If the existing file cannot be parsed the
    /// upsert is aborted with `StoreCorrupt` rather than overwriting
    /// whatever is there.
    pub fn upsert(&self, record: NeighborRecord) -> Result<UpsertOutcome> {
        let _lock = self.lock_exclusive()?;
        let mut table = self.try_read()?;

        let outcome = match table.find_mut(&record.key()) {
            Some(existing) => {
                existing.absorb(record);
                UpsertOutcome::Updated
            }
            None => {
                table.neighbors.push(record);
                UpsertOutcome::Created
            }
        };

        self.commit(&table)?;
        debug!(outcome = ?outcome, path = %self.path.display(), "neighbor table updated");
        Ok(outcome)
    }

    /// Non-expired records, ordered by interface then most recently seen.
    pub fn list_live(&self, now: DateTime<Utc>) -> Vec<NeighborRecord> {
        let mut live: Vec<NeighborRecord> = self
            .load()
            .neighbors
            .into_iter()
            .filter(|r| r.is_live(now))
            .collect();
        live.sort_by(|a, b| {
            a.interface
                .cmp(&b.interface)
                .then(b.last_seen.cmp(&a.last_seen))
        });
        live
    }

    /// Physically remove expired records. Returns how many were dropped.
    pub fn age_out(&self, now: DateTime<Utc>) -> Result<usize> {
        let _lock = self.lock_exclusive()?;
        let mut table = self.try_read()?;

        let before = table.neighbors.len();
        table.neighbors.retain(|r| r.is_live(now));
        let dropped = before - table.neighbors.len();
        if dropped > 0 {
            self.commit(&table)?;
            debug!(dropped, "aged out expired neighbors");
        }
        Ok(dropped)
    }

    /// Truncate the table to empty.
    pub fn clear(&self) -> Result<()> {
        let _lock = self.lock_exclusive()?;
        self.commit(&NeighborTable::default())
    }

    fn try_read(&self) -> Result<NeighborTable> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(NeighborTable::default())
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw).map_err(|_| Error::StoreCorrupt(self.path.clone()))
    }

    /// Write the table to a sibling temp file and rename it over the target.
    fn commit(&self, table: &NeighborTable) -> Result<()> {
        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);
        let json = serde_json::to_vec_pretty(table)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;

        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&json)?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn lock_exclusive(&self) -> Result<StoreLock> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;
        file.lock_exclusive()?;
        Ok(StoreLock(file))
    }
}

/// Held advisory lock; released on drop
struct StoreLock(File);

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}
