//! Per-record sync metadata.
//!
//! Every record in the Local Store carries exactly one envelope. The
//! DAL strips envelopes before records reach application code and
//! attaches them on write; only the DAL and the sync engine ever see
//! them.

use chrono::{DateTime, Utc};

/// Synchronization state of a locally stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Acknowledged by the remote; `last_synced_at` is set and
    /// `retry_count` is zero.
    Synced,
    /// Mutated locally since the last acknowledgment.
    Pending,
    /// The last push attempt failed; retried on every pass.
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Pending => "pending",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<SyncStatus> {
        match s {
            "synced" => Some(SyncStatus::Synced),
            "pending" => Some(SyncStatus::Pending),
            "failed" => Some(SyncStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciliation state attached to every stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEnvelope {
    pub status: SyncStatus,
    /// Timestamp of the last local mutation.
    pub local_updated_at: DateTime<Utc>,
    /// Timestamp of the last successful remote acknowledgment.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Last push error; present only while `status` is `Failed`.
    pub sync_error: Option<String>,
    /// Consecutive failed push attempts; reset to zero on success.
    pub retry_count: i64,
}

impl SyncEnvelope {
    /// Envelope for a fresh local mutation that has never been pushed.
    pub fn pending(now: DateTime<Utc>) -> Self {
        Self {
            status: SyncStatus::Pending,
            local_updated_at: now,
            last_synced_at: None,
            sync_error: None,
            retry_count: 0,
        }
    }

    /// Envelope for a record acknowledged by, or received from, the
    /// remote.
    pub fn synced(local_updated_at: DateTime<Utc>, synced_at: DateTime<Utc>) -> Self {
        Self {
            status: SyncStatus::Synced,
            local_updated_at,
            last_synced_at: Some(synced_at),
            sync_error: None,
            retry_count: 0,
        }
    }

    /// Re-stamps the envelope after a local mutation. Keeps
    /// `last_synced_at` (so the engine still knows create vs update)
    /// and `retry_count` (so retry bookkeeping survives edits).
    pub fn touch_pending(&mut self, now: DateTime<Utc>) {
        self.status = SyncStatus::Pending;
        self.local_updated_at = now;
        self.sync_error = None;
    }

    /// Records a successful push acknowledgment.
    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.status = SyncStatus::Synced;
        self.last_synced_at = Some(now);
        self.sync_error = None;
        self.retry_count = 0;
    }

    /// Records a failed push attempt. The record stays in place and is
    /// retried on the next pass.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = SyncStatus::Failed;
        self.sync_error = Some(message.into());
        self.retry_count += 1;
    }
}

/// A record plus its envelope, the shape rows take inside the store.
#[derive(Debug, Clone)]
pub struct Stored<E> {
    pub entity: E,
    pub envelope: SyncEnvelope,
}
