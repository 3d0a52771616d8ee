//! The sync engine: reconciles the Local Store with the remote store.
//!
//! Each pass over a kind pushes locally pending/failed records, then
//! pulls the remote's current snapshot wholesale. Conflict resolution
//! is last-writer-wins: whichever write (local push or remote pull)
//! lands last in wall-clock terms sticks. With two clients editing the
//! same record while intermittently online, one edit can be silently
//! overwritten; this is a documented limitation of the design, not a
//! correct distributed algorithm.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::{Stored, StoreError, SyncEnvelope, Table};
use crate::models::{EntityKind, Menu, PantryItem, Recipe, SyncEntity};
use crate::remote::{RemoteClient, RemoteCollection, RemoteError};
use crate::sync::Connectivity;

/// Errors that abort a sync pass.
///
/// Per-record push failures are not pass errors; they are recorded on
/// the record's envelope and retried next pass.
#[derive(Debug)]
pub enum SyncPassError {
    Store(StoreError),
    Remote(RemoteError),
}

impl std::fmt::Display for SyncPassError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPassError::Store(e) => write!(f, "Store error: {}", e),
            SyncPassError::Remote(e) => write!(f, "Remote error: {}", e),
        }
    }
}

impl std::error::Error for SyncPassError {}

impl From<StoreError> for SyncPassError {
    fn from(e: StoreError) -> Self {
        SyncPassError::Store(e)
    }
}

impl From<RemoteError> for SyncPassError {
    fn from(e: RemoteError) -> Self {
        SyncPassError::Remote(e)
    }
}

/// What one pass over one kind did.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub kind: EntityKind,
    /// Records pushed and acknowledged.
    pub pushed: usize,
    /// Records whose push failed this pass.
    pub push_failed: usize,
    /// Records upserted from the remote snapshot.
    pub pulled: usize,
    /// True when the pass was dropped because one was already running.
    pub skipped: bool,
}

impl PassReport {
    fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            pushed: 0,
            push_failed: 0,
            pulled: 0,
            skipped: false,
        }
    }

    fn skipped(kind: EntityKind) -> Self {
        Self {
            skipped: true,
            ..Self::new(kind)
        }
    }
}

/// Aggregate reconciliation state, for user-facing sync indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatusSummary {
    pub pending_count: i64,
    pub failed_count: i64,
    pub is_online: bool,
}

/// Push-then-pull reconciliation for one entity kind.
pub struct Syncer<E: SyncEntity> {
    table: Table<E>,
    remote: RemoteCollection<E>,
    in_flight: AtomicBool,
}

impl<E: SyncEntity> Syncer<E> {
    pub fn new(table: Table<E>, remote: RemoteCollection<E>) -> Self {
        Self {
            table,
            remote,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Runs one push-then-pull pass.
    ///
    /// Single-flight: a pass requested while one is already running
    /// for this kind returns a skipped report. Never queued.
    pub async fn sync_pass(&self) -> Result<PassReport, SyncPassError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!(kind = %E::KIND, "sync pass already running, skipping");
            return Ok(PassReport::skipped(E::KIND));
        }

        let result = self.run_pass().await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Runs the pull phase only, under the same single-flight guard.
    /// Used by the startup catch-up.
    pub async fn pull_pass(&self) -> Result<PassReport, SyncPassError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Ok(PassReport::skipped(E::KIND));
        }

        let mut report = PassReport::new(E::KIND);
        let result = self.pull(&mut report).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result.map(|_| report)
    }

    async fn run_pass(&self) -> Result<PassReport, SyncPassError> {
        let mut report = PassReport::new(E::KIND);
        self.push(&mut report).await?;
        self.pull(&mut report).await?;
        Ok(report)
    }

    /// Push phase: attempt every pending/failed record. A record that
    /// has never been acknowledged (`last_synced_at` absent) is sent as
    /// a create; anything else as an update.
    async fn push(&self, report: &mut PassReport) -> Result<(), SyncPassError> {
        for mut record in self.table.unsynced().await? {
            let id = record.entity.id();

            let outcome = if record.envelope.last_synced_at.is_none() {
                self.remote.create(&record.entity).await.map(|_| ())
            } else {
                let body = serde_json::to_value(&record.entity).map_err(StoreError::from)?;
                self.remote.update(id, &body).await.map(|_| ())
            };

            match outcome {
                Ok(()) => {
                    record.envelope.mark_synced(Utc::now());
                    report.pushed += 1;
                }
                Err(e) => {
                    tracing::warn!(kind = %E::KIND, id = %id, error = %e, "push failed");
                    record.envelope.mark_failed(e.to_string());
                    report.push_failed += 1;
                }
            }

            // The record stays in place either way; no data loss.
            self.table.put(&record).await?;
        }
        Ok(())
    }

    /// Pull phase: upsert the remote snapshot wholesale. Re-applying
    /// the same snapshot is idempotent.
    async fn pull(&self, report: &mut PassReport) -> Result<(), SyncPassError> {
        let snapshot = self.remote.list(&[]).await?;
        let now = Utc::now();

        let records: Vec<Stored<E>> = snapshot
            .into_iter()
            .map(|entity| {
                let local_updated_at = entity.updated_at().unwrap_or(now);
                Stored {
                    entity,
                    envelope: SyncEnvelope::synced(local_updated_at, now),
                }
            })
            .collect();

        report.pulled = records.len();
        self.table.bulk_put(&records).await?;
        Ok(())
    }

    async fn status_counts(&self) -> Result<(i64, i64), StoreError> {
        self.table.status_counts().await
    }
}

/// Reconciles every entity kind against the remote store.
pub struct SyncEngine {
    recipes: Syncer<Recipe>,
    menus: Syncer<Menu>,
    pantry: Syncer<PantryItem>,
    connectivity: Connectivity,
}

impl SyncEngine {
    pub fn new(pool: &SqlitePool, remote: &RemoteClient, connectivity: Connectivity) -> Self {
        Self {
            recipes: Syncer::new(Table::new(pool.clone()), remote.collection()),
            menus: Syncer::new(Table::new(pool.clone()), remote.collection()),
            pantry: Syncer::new(Table::new(pool.clone()), remote.collection()),
            connectivity,
        }
    }

    /// Runs one pass for a single kind.
    pub async fn sync_kind(&self, kind: EntityKind) -> Result<PassReport, SyncPassError> {
        match kind {
            EntityKind::Recipes => self.recipes.sync_pass().await,
            EntityKind::Menus => self.menus.sync_pass().await,
            EntityKind::PantryItems => self.pantry.sync_pass().await,
        }
    }

    /// Runs push-then-pull for every kind, in fixed order. A failure
    /// in one kind's pass does not stop the remaining kinds.
    pub async fn sync_all(&self) -> Vec<PassReport> {
        let mut reports = Vec::with_capacity(EntityKind::ALL.len());

        for kind in EntityKind::ALL {
            match self.sync_kind(kind).await {
                Ok(report) => {
                    if !report.skipped {
                        tracing::debug!(
                            kind = %kind,
                            pushed = report.pushed,
                            push_failed = report.push_failed,
                            pulled = report.pulled,
                            "sync pass complete"
                        );
                    }
                    reports.push(report);
                }
                Err(e) => {
                    tracing::warn!(kind = %kind, error = %e, "sync pass failed");
                }
            }
        }

        reports
    }

    /// Startup catch-up: pull every kind once if online. Offline
    /// startup serves local data only and relies on the next online
    /// transition.
    pub async fn initial_sync(&self) {
        if !self.connectivity.is_online() {
            tracing::info!("offline at startup, serving local data only");
            return;
        }

        for kind in EntityKind::ALL {
            let result = match kind {
                EntityKind::Recipes => self.recipes.pull_pass().await,
                EntityKind::Menus => self.menus.pull_pass().await,
                EntityKind::PantryItems => self.pantry.pull_pass().await,
            };
            match result {
                Ok(report) => {
                    tracing::info!(kind = %kind, pulled = report.pulled, "initial pull complete")
                }
                Err(e) => tracing::warn!(kind = %kind, error = %e, "initial pull failed"),
            }
        }
    }

    /// Aggregate pending/failed counts plus the connectivity flag.
    pub async fn status(&self) -> Result<SyncStatusSummary, StoreError> {
        let mut pending_count = 0;
        let mut failed_count = 0;

        for (pending, failed) in [
            self.recipes.status_counts().await?,
            self.menus.status_counts().await?,
            self.pantry.status_counts().await?,
        ] {
            pending_count += pending;
            failed_count += failed;
        }

        Ok(SyncStatusSummary {
            pending_count,
            failed_count,
            is_online: self.connectivity.is_online(),
        })
    }
}
