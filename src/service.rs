//! Top-level wiring: one call to open the store, the remote client,
//! the engine, and the scheduler together.

use std::sync::Arc;

use crate::config::Config;
use crate::dal::Collection;
use crate::db::{self, StoreError, Table};
use crate::models::{Menu, PantryItem, Recipe};
use crate::remote::{RemoteClient, RemoteError};
use crate::sync::{
    Connectivity, Scheduler, SchedulerHandle, SyncEngine, SyncHandle, SyncStatusSummary,
};

/// Errors from [`Larder::open`].
#[derive(Debug)]
pub enum OpenError {
    /// No `server_url` configured.
    NotConfigured,
    /// Database could not be opened or migrated.
    Db(sqlx::Error),
    /// Remote client could not be built.
    Remote(RemoteError),
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenError::NotConfigured => {
                write!(f, "Sync not configured. Add server_url to config.")
            }
            OpenError::Db(e) => write!(f, "Database error: {}", e),
            OpenError::Remote(e) => write!(f, "Remote client error: {}", e),
        }
    }
}

impl std::error::Error for OpenError {}

impl From<sqlx::Error> for OpenError {
    fn from(e: sqlx::Error) -> Self {
        OpenError::Db(e)
    }
}

impl From<RemoteError> for OpenError {
    fn from(e: RemoteError) -> Self {
        OpenError::Remote(e)
    }
}

/// The assembled engine: collections for application code, plus the
/// connectivity and status surface the UI sits on.
pub struct Larder {
    pub recipes: Collection<Recipe>,
    pub menus: Collection<Menu>,
    pub pantry: Collection<PantryItem>,
    engine: Arc<SyncEngine>,
    connectivity: Connectivity,
    scheduler: SchedulerHandle,
}

impl Larder {
    /// Opens the local database (running migrations), wires the engine
    /// and scheduler, and runs the startup pull before returning.
    /// When `initially_online` is false the startup pull is skipped
    /// and the first online transition catches up instead.
    pub async fn open(config: &Config, initially_online: bool) -> Result<Self, OpenError> {
        let server_url = config.server_url.clone().ok_or(OpenError::NotConfigured)?;

        let pool = db::init_db(config.database_path.clone()).await?;
        let remote = RemoteClient::new(server_url, config.api_key.clone(), config.request_timeout())?;
        let connectivity = Connectivity::new(initially_online);

        let engine = Arc::new(SyncEngine::new(&pool, &remote, connectivity.clone()));
        engine.initial_sync().await;

        let scheduler = Scheduler::spawn(engine.clone(), connectivity.clone(), config.sync_interval());
        let sync = scheduler.sync_handle();

        let recipes = Collection::new(
            Table::new(pool.clone()),
            remote.collection(),
            connectivity.clone(),
            sync.clone(),
        );
        let menus = Collection::new(
            Table::new(pool.clone()),
            remote.collection(),
            connectivity.clone(),
            sync.clone(),
        );
        let pantry = Collection::new(
            Table::new(pool.clone()),
            remote.collection(),
            connectivity.clone(),
            sync,
        );

        Ok(Self {
            recipes,
            menus,
            pantry,
            engine,
            connectivity,
            scheduler,
        })
    }

    /// The injectable online/offline flag. The embedding application
    /// maps its platform connectivity signal onto this.
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity.clone()
    }

    /// `{ pending, failed, online }` for user-facing sync indicators.
    pub async fn status(&self) -> Result<SyncStatusSummary, StoreError> {
        self.engine.status().await
    }

    /// A handle for requesting out-of-band sync passes.
    pub fn sync_handle(&self) -> SyncHandle {
        self.scheduler.sync_handle()
    }

    /// Stops the scheduler task. In-flight passes are allowed to
    /// finish failing naturally; local data is already durable.
    pub fn shutdown(self) {
        self.scheduler.shutdown();
    }
}
