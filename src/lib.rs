//! Larder: a local-first data sync engine for household food planning.
//!
//! Application code reads and writes through per-kind
//! [`Collection`]s, which land every change in an embedded SQLite
//! store immediately and mark it pending. A background
//! [`SyncEngine`], driven by the [`Scheduler`](sync::Scheduler),
//! pushes pending and failed records to a remote HTTP API and pulls
//! the remote snapshot back, tracking per-record state in a
//! [`SyncEnvelope`]. Going offline never blocks a read or a write;
//! reconciliation resumes on the next online transition.
//!
//! ```no_run
//! use larder::{Config, Larder, Recipe};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let larder = Larder::open(&config, true).await?;
//!
//! let recipe = larder.recipes.create(Recipe::new("Tomato Soup")).await?;
//! assert!(larder.recipes.get(recipe.id).await?.is_some());
//!
//! let status = larder.status().await?;
//! println!("pending: {}", status.pending_count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dal;
pub mod db;
pub mod models;
pub mod remote;
pub mod service;
pub mod sync;

pub use config::{Config, ConfigError};
pub use dal::{Collection, DalError};
pub use db::{init_db, Stored, StoreError, SyncEnvelope, SyncStatus, Table};
pub use models::{EntityKind, Menu, PantryItem, Recipe, SyncEntity};
pub use remote::{check_server, RemoteClient, RemoteCollection, RemoteError};
pub use service::{Larder, OpenError};
pub use sync::{
    Connectivity, PassReport, Scheduler, SchedulerHandle, SyncEngine, SyncHandle, SyncPassError,
    SyncStatusSummary,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
