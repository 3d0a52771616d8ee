//! Domain entities synchronized by the engine.
//!
//! Each entity kind maps to one Local Store table and one remote
//! collection. Identity is client-generated at creation time; the
//! entity's own `updated_at` doubles as the freshness stamp used when
//! a remote-sourced record is cached locally.

mod menu;
mod pantry_item;
mod recipe;

pub use menu::Menu;
pub use pantry_item::PantryItem;
pub use recipe::Recipe;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// The entity kinds known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Recipes,
    Menus,
    PantryItems,
}

impl EntityKind {
    /// All kinds, in the fixed order `sync_all` visits them.
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Recipes,
        EntityKind::Menus,
        EntityKind::PantryItems,
    ];

    /// Local Store table name for this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Recipes => "recipes",
            EntityKind::Menus => "menus",
            EntityKind::PantryItems => "pantry_items",
        }
    }

    /// Remote API base path for this kind.
    pub fn base_path(&self) -> &'static str {
        match self {
            EntityKind::Recipes => "/api/recipes",
            EntityKind::Menus => "/api/menus",
            EntityKind::PantryItems => "/api/pantry-items",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// An entity the engine can store locally and reconcile remotely.
///
/// `INDEX_COLUMNS` and `index_values` must stay aligned: values are
/// bound positionally to the columns when a record is written, and the
/// columns must exist in the kind's table schema.
pub trait SyncEntity:
    Clone + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static
{
    /// The kind this entity belongs to.
    const KIND: EntityKind;

    /// Secondary index columns maintained on every write.
    const INDEX_COLUMNS: &'static [&'static str];

    /// Stable, client-assigned identifier.
    fn id(&self) -> Uuid;

    /// Freshness stamp applied as `local_updated_at` when a record
    /// arrives from the remote.
    fn updated_at(&self) -> Option<DateTime<Utc>>;

    /// Values for `INDEX_COLUMNS`, in the same order.
    fn index_values(&self) -> Vec<Option<String>>;
}
