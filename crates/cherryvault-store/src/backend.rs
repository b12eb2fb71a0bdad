//! Backing-store collaborator for versioned entry records.
//!
//! The engine offers per-record atomic saves, single-field equality
//! filters with an optional result bound, and delete-by-identity. No
//! cross-record transactions: a multi-target write that fails midway
//! leaves the records persisted so far in place.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cherryvault_core::{VaultEntry, VaultError};

// ---------------------------------------------------------------------------
// Stored record
// ---------------------------------------------------------------------------

/// A persisted entry version with its storage envelope. The `removed`
/// soft-delete flag is the only attribute that ever changes after insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredEntry {
    /// Engine-assigned, monotonically increasing insertion sequence.
    pub seq: u64,

    /// Insertion timestamp.
    pub created_at: DateTime<Utc>,

    /// Soft-delete marker. The sealed entry underneath is never discarded.
    pub removed: bool,

    /// The sealed record.
    pub entry: VaultEntry,
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// The persistence contract for entry versions. Callers run the checksum
/// guard immediately before `insert`/`update`; engines persist verbatim.
pub trait EntryBackend: fmt::Debug + Send + Sync {
    /// Persist a new sealed entry, assigning its sequence number.
    fn insert(&self, entry: VaultEntry) -> Result<StoredEntry, VaultError>;

    /// Re-save an existing record, matched by sequence number.
    fn update(&self, record: &StoredEntry) -> Result<(), VaultError>;

    /// Records whose entry carries `secret_id`, optionally filtered by
    /// target equality, capped at `limit`, in insertion order.
    fn find(
        &self,
        secret_id: &str,
        target: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEntry>, VaultError>;

    /// Remove a record by sequence number.
    fn delete(&self, seq: u64) -> Result<(), VaultError>;
}

// ---------------------------------------------------------------------------
// Memory engine
// ---------------------------------------------------------------------------

/// An in-memory engine: a mutex-guarded record list plus an atomic
/// sequence counter.
#[derive(Debug, Default)]
pub struct MemoryEntryBackend {
    records: Mutex<Vec<StoredEntry>>,
    next_seq: AtomicU64,
}

impl MemoryEntryBackend {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredEntry>> {
        self.records.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl EntryBackend for MemoryEntryBackend {
    fn insert(&self, entry: VaultEntry) -> Result<StoredEntry, VaultError> {
        let record = StoredEntry {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            created_at: Utc::now(),
            removed: false,
            entry,
        };
        self.lock().push(record.clone());
        Ok(record)
    }

    fn update(&self, record: &StoredEntry) -> Result<(), VaultError> {
        let mut records = self.lock();
        match records.iter_mut().find(|r| r.seq == record.seq) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(VaultError::Storage(format!(
                "no record with seq {}",
                record.seq
            ))),
        }
    }

    fn find(
        &self,
        secret_id: &str,
        target: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEntry>, VaultError> {
        let records = self.lock();
        let matches = records
            .iter()
            .filter(|r| r.entry.secret_id() == secret_id)
            .filter(|r| target.is_none_or(|t| r.entry.target() == t))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matches)
    }

    fn delete(&self, seq: u64) -> Result<(), VaultError> {
        self.lock().retain(|r| r.seq != seq);
        Ok(())
    }
}
