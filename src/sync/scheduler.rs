//! Drives when sync passes run.
//!
//! A resident task reacts to three inputs: a fixed interval, online
//! transitions, and advisory requests from the DAL. Everything is
//! fire-and-forget from the caller's perspective; the DAL never awaits
//! a sync.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::EntityKind;
use crate::sync::{Connectivity, SyncEngine};

/// An advisory request for the scheduler. Requests are dropped while
/// offline; requests that arrive while a pass is running collapse
/// into at most one follow-up pass, never a replay per request.
#[derive(Debug, Clone, Copy)]
pub enum SyncRequest {
    All,
    Kind(EntityKind),
}

/// Cheap cloneable handle the DAL uses to hint that a sync would be
/// worthwhile. Sends never block and never fail visibly; a request
/// after the scheduler has shut down is a no-op.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: Option<mpsc::UnboundedSender<SyncRequest>>,
}

impl SyncHandle {
    pub fn request(&self, kind: EntityKind) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(SyncRequest::Kind(kind));
        }
    }

    pub fn request_all(&self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(SyncRequest::All);
        }
    }

    /// A handle wired to nothing. For collections used without a
    /// running scheduler (tests, one-shot tools).
    pub fn detached() -> Self {
        Self { tx: None }
    }
}

/// Owns the scheduler task. Dropping without calling
/// [`shutdown`](SchedulerHandle::shutdown) leaves the task running for
/// the life of the runtime.
pub struct SchedulerHandle {
    handle: SyncHandle,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn sync_handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    pub fn shutdown(self) {
        tracing::debug!("stopping sync scheduler");
        self.task.abort();
    }
}

pub struct Scheduler;

impl Scheduler {
    /// Spawns the scheduler task.
    ///
    /// Ticks while offline are no-ops, and a failed pass never stops
    /// the next tick from firing.
    pub fn spawn(
        engine: Arc<SyncEngine>,
        connectivity: Connectivity,
        period: Duration,
    ) -> SchedulerHandle {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut online_rx = connectivity.subscribe();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; startup catch-up is
            // the engine's initial_sync, so swallow it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if connectivity.is_online() {
                            engine.sync_all().await;
                        }
                    }
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if *online_rx.borrow_and_update() {
                            tracing::info!("back online, starting sync");
                            engine.sync_all().await;
                        }
                    }
                    request = rx.recv() => {
                        let Some(request) = request else {
                            break;
                        };
                        // Drain everything that piled up while the last
                        // pass was running; N buffered hints become one
                        // pass, not N.
                        let mut all = matches!(request, SyncRequest::All);
                        let mut kinds: Vec<EntityKind> = Vec::new();
                        if let SyncRequest::Kind(kind) = request {
                            kinds.push(kind);
                        }
                        while let Ok(next) = rx.try_recv() {
                            match next {
                                SyncRequest::All => all = true,
                                SyncRequest::Kind(kind) => {
                                    if !kinds.contains(&kind) {
                                        kinds.push(kind);
                                    }
                                }
                            }
                        }
                        if !connectivity.is_online() {
                            continue;
                        }
                        if all {
                            engine.sync_all().await;
                        } else {
                            for kind in kinds {
                                if let Err(e) = engine.sync_kind(kind).await {
                                    tracing::warn!(kind = %kind, error = %e, "requested sync failed");
                                }
                            }
                        }
                    }
                }
            }
        });

        SchedulerHandle {
            handle: SyncHandle { tx: Some(tx) },
            task,
        }
    }
}
