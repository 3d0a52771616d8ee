//! The Data Access Layer: the only surface application code uses.
//!
//! Reads and writes land in the Local Store synchronously from the
//! caller's perspective; every mutation marks the record pending and
//! hints the scheduler. Remote reconciliation failures never surface
//! through this API; the local write is the unit of correctness.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::db::{Stored, StoreError, SyncEnvelope, Table};
use crate::models::{Menu, PantryItem, Recipe, SyncEntity};
use crate::remote::RemoteCollection;
use crate::sync::{Connectivity, SyncHandle};

/// Errors surfaced to application code.
#[derive(Debug)]
pub enum DalError {
    /// Local write could not be honored.
    Store(StoreError),
    /// No record with this id (update only).
    NotFound(Uuid),
    /// The update patch was not a JSON object, tried to change the
    /// id, or produced a body that no longer parses as the entity.
    InvalidPatch(String),
}

impl std::fmt::Display for DalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DalError::Store(e) => write!(f, "Store error: {}", e),
            DalError::NotFound(id) => write!(f, "Record not found: {}", id),
            DalError::InvalidPatch(e) => write!(f, "Invalid patch: {}", e),
        }
    }
}

impl std::error::Error for DalError {}

impl From<StoreError> for DalError {
    fn from(e: StoreError) -> Self {
        DalError::Store(e)
    }
}

/// Local-first read/write access to one entity kind.
///
/// One instance per kind, all built from this generic implementation;
/// a kind supplies only its entity type (index needs and freshness
/// field come from [`SyncEntity`]).
pub struct Collection<E: SyncEntity> {
    table: Table<E>,
    remote: RemoteCollection<E>,
    connectivity: Connectivity,
    sync: SyncHandle,
}

impl<E: SyncEntity> Collection<E> {
    pub fn new(
        table: Table<E>,
        remote: RemoteCollection<E>,
        connectivity: Connectivity,
        sync: SyncHandle,
    ) -> Self {
        Self {
            table,
            remote,
            connectivity,
            sync,
        }
    }

    /// All records, envelopes stripped. Never blocks on the network:
    /// a local read failure degrades to a direct remote list when
    /// online, or an empty collection.
    pub async fn list(&self) -> Result<Vec<E>, DalError> {
        match self.table.get_all().await {
            Ok(records) => {
                self.hint_sync();
                Ok(strip(records))
            }
            Err(e) => {
                tracing::warn!(table = E::KIND.table(), error = %e, "local read failed, degrading");
                if self.connectivity.is_online() {
                    match self.remote.list(&[]).await {
                        Ok(entities) => Ok(entities),
                        Err(e) => {
                            tracing::warn!(table = E::KIND.table(), error = %e, "remote fallback failed");
                            Ok(Vec::new())
                        }
                    }
                } else {
                    Ok(Vec::new())
                }
            }
        }
    }

    /// Read by key; falls through to the remote when absent and
    /// online, caching a hit with a synced envelope.
    pub async fn get(&self, id: Uuid) -> Result<Option<E>, DalError> {
        match self.table.get(id).await {
            Ok(Some(record)) => {
                self.hint_sync();
                return Ok(Some(record.entity));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(table = E::KIND.table(), id = %id, error = %e, "local read failed, degrading");
            }
        }

        if !self.connectivity.is_online() {
            return Ok(None);
        }

        match self.remote.get(id).await {
            Ok(Some(entity)) => {
                let now = Utc::now();
                let cached = Stored {
                    entity: entity.clone(),
                    envelope: SyncEnvelope::synced(entity.updated_at().unwrap_or(now), now),
                };
                if let Err(e) = self.table.put(&cached).await {
                    tracing::warn!(table = E::KIND.table(), id = %id, error = %e, "failed to cache remote record");
                }
                Ok(Some(entity))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(table = E::KIND.table(), id = %id, error = %e, "remote fallback failed");
                Ok(None)
            }
        }
    }

    /// Optimistic create: the record lands locally as pending and is
    /// pushed by the engine later. Never calls the remote here.
    pub async fn create(&self, item: E) -> Result<E, DalError> {
        let record = Stored {
            entity: item.clone(),
            envelope: SyncEnvelope::pending(Utc::now()),
        };
        self.table.put(&record).await?;
        self.hint_sync();
        Ok(item)
    }

    /// Shallow-merges a JSON object patch onto the stored record and
    /// re-stamps it pending. Fails with [`DalError::NotFound`] when
    /// the id is absent.
    pub async fn update(&self, id: Uuid, patch: serde_json::Value) -> Result<E, DalError> {
        let Some(patch) = patch.as_object() else {
            return Err(DalError::InvalidPatch(
                "patch must be a JSON object".to_string(),
            ));
        };
        if patch.contains_key("id") {
            return Err(DalError::InvalidPatch(
                "patch must not change the record id".to_string(),
            ));
        }

        let mut record = self.table.get(id).await?.ok_or(DalError::NotFound(id))?;

        let mut body = serde_json::to_value(&record.entity).map_err(StoreError::from)?;
        let Some(fields) = body.as_object_mut() else {
            return Err(DalError::InvalidPatch(
                "stored body is not a JSON object".to_string(),
            ));
        };
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }

        record.entity =
            serde_json::from_value(body).map_err(|e| DalError::InvalidPatch(e.to_string()))?;
        record.envelope.touch_pending(Utc::now());

        self.table.put(&record).await?;
        self.hint_sync();
        Ok(record.entity)
    }

    /// Deletes locally, then issues a best-effort remote delete in the
    /// background. The local delete is the source of truth for the
    /// caller; a remote failure is logged and retried never.
    pub async fn delete(&self, id: Uuid) -> Result<(), DalError> {
        self.table.delete(id).await?;

        if self.connectivity.is_online() {
            let remote = self.remote.clone();
            tokio::spawn(async move {
                if let Err(e) = remote.delete(id).await {
                    tracing::warn!(table = E::KIND.table(), id = %id, error = %e, "best-effort remote delete failed");
                }
            });
        }

        self.hint_sync();
        Ok(())
    }

    /// Equality lookup on one of the kind's secondary indexes,
    /// envelopes stripped. Degrades like `list`: a store failure falls
    /// back to a filtered remote list when online, else empty. An
    /// unknown column is a caller error and propagates.
    pub async fn find_by_index(&self, column: &str, value: &str) -> Result<Vec<E>, DalError> {
        match self.table.query_by_index(column, value).await {
            Ok(records) => {
                self.hint_sync();
                Ok(strip(records))
            }
            Err(e @ StoreError::UnknownIndex { .. }) => Err(e.into()),
            Err(e) => {
                tracing::warn!(table = E::KIND.table(), error = %e, "local read failed, degrading");
                if !self.connectivity.is_online() {
                    return Ok(Vec::new());
                }
                match self.remote.list(&[(column, value.to_string())]).await {
                    Ok(entities) => Ok(entities),
                    Err(e) => {
                        tracing::warn!(table = E::KIND.table(), error = %e, "remote fallback failed");
                        Ok(Vec::new())
                    }
                }
            }
        }
    }

    /// Range lookup on one of the kind's secondary indexes. Degrades
    /// the same way, filtering the remote snapshot on the indexed
    /// value (dates compare lexicographically in their stored form).
    pub async fn find_by_index_range(
        &self,
        column: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<E>, DalError> {
        match self.table.query_by_index_range(column, from, to).await {
            Ok(records) => {
                self.hint_sync();
                Ok(strip(records))
            }
            Err(e @ StoreError::UnknownIndex { .. }) => Err(e.into()),
            Err(e) => {
                tracing::warn!(table = E::KIND.table(), error = %e, "local read failed, degrading");
                if !self.connectivity.is_online() {
                    return Ok(Vec::new());
                }
                let Some(position) = E::INDEX_COLUMNS.iter().position(|c| *c == column) else {
                    return Ok(Vec::new());
                };
                match self.remote.list(&[]).await {
                    Ok(entities) => Ok(entities
                        .into_iter()
                        .filter(|entity| {
                            entity
                                .index_values()
                                .get(position)
                                .and_then(|v| v.clone())
                                .map_or(false, |v| from <= v.as_str() && v.as_str() <= to)
                        })
                        .collect()),
                    Err(e) => {
                        tracing::warn!(table = E::KIND.table(), error = %e, "remote fallback failed");
                        Ok(Vec::new())
                    }
                }
            }
        }
    }

    /// Advisory only: scheduled, never awaited, dropped when offline.
    fn hint_sync(&self) {
        if self.connectivity.is_online() {
            self.sync.request(E::KIND);
        }
    }
}

impl Collection<Menu> {
    /// Menus planned for one date.
    pub async fn for_date(&self, date: NaiveDate) -> Result<Vec<Menu>, DalError> {
        self.find_by_index("menu_date", &date.to_string()).await
    }

    /// Menus planned for today.
    pub async fn current(&self) -> Result<Vec<Menu>, DalError> {
        self.for_date(Utc::now().date_naive()).await
    }

    /// Menus in an inclusive date range.
    pub async fn between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Menu>, DalError> {
        self.find_by_index_range("menu_date", &from.to_string(), &to.to_string())
            .await
    }
}

impl Collection<Recipe> {
    pub async fn in_category(&self, category: &str) -> Result<Vec<Recipe>, DalError> {
        self.find_by_index("category", category).await
    }
}

impl Collection<PantryItem> {
    pub async fn in_category(&self, category: &str) -> Result<Vec<PantryItem>, DalError> {
        self.find_by_index("category", category).await
    }
}

fn strip<E>(records: Vec<Stored<E>>) -> Vec<E> {
    records.into_iter().map(|r| r.entity).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_db, SyncStatus};
    use crate::remote::RemoteClient;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Offline collection against an unreachable remote: any remote
    /// call would fail loudly, so passing tests also show no remote
    /// call was made on the success paths.
    async fn offline_setup<E: SyncEntity>() -> (Collection<E>, Table<E>, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(temp_dir.path().join("test.db")).await.unwrap();
        let remote = RemoteClient::new("http://127.0.0.1:1", None, Duration::from_millis(200)).unwrap();
        let table: Table<E> = Table::new(pool);
        let collection = Collection::new(
            table.clone(),
            remote.collection(),
            Connectivity::new(false),
            SyncHandle::detached(),
        );
        (collection, table, temp_dir)
    }

    #[tokio::test]
    async fn test_create_is_optimistic_and_pending() {
        let (collection, table, _temp) = offline_setup::<Recipe>().await;

        let recipe = Recipe::new("Soup");
        let returned = collection.create(recipe.clone()).await.unwrap();
        assert_eq!(returned.id, recipe.id);

        let stored = table.get(recipe.id).await.unwrap().unwrap();
        assert_eq!(stored.entity.title, "Soup");
        assert_eq!(stored.envelope.status, SyncStatus::Pending);
        assert_eq!(stored.envelope.retry_count, 0);
        assert!(stored.envelope.last_synced_at.is_none());
    }

    #[tokio::test]
    async fn test_list_strips_envelopes() {
        let (collection, _table, _temp) = offline_setup::<Recipe>().await;

        collection.create(Recipe::new("Soup")).await.unwrap();
        collection.create(Recipe::new("Bread")).await.unwrap();

        let recipes = collection.list().await.unwrap();
        assert_eq!(recipes.len(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_offline_returns_none() {
        let (collection, _table, _temp) = offline_setup::<Recipe>().await;
        assert!(collection.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let (collection, table, _temp) = offline_setup::<Recipe>().await;

        let recipe = Recipe::new("Soup").with_category("soups");
        collection.create(recipe.clone()).await.unwrap();

        let before = table.get(recipe.id).await.unwrap().unwrap();

        let updated = collection
            .update(recipe.id, json!({"title": "Tomato Soup"}))
            .await
            .unwrap();

        assert_eq!(updated.title, "Tomato Soup");
        // Untouched fields survive the merge.
        assert_eq!(updated.category.as_deref(), Some("soups"));

        let stored = table.get(recipe.id).await.unwrap().unwrap();
        assert_eq!(stored.envelope.status, SyncStatus::Pending);
        assert!(stored.envelope.local_updated_at >= before.envelope.local_updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (collection, _table, _temp) = offline_setup::<Recipe>().await;

        let id = Uuid::new_v4();
        let result = collection.update(id, json!({"title": "x"})).await;
        assert!(matches!(result, Err(DalError::NotFound(got)) if got == id));
    }

    #[tokio::test]
    async fn test_update_rejects_non_object_patch() {
        let (collection, _table, _temp) = offline_setup::<Recipe>().await;

        let result = collection.update(Uuid::new_v4(), json!("nope")).await;
        assert!(matches!(result, Err(DalError::InvalidPatch(_))));
    }

    #[tokio::test]
    async fn test_update_rejects_id_change() {
        let (collection, _table, _temp) = offline_setup::<Recipe>().await;

        let recipe = Recipe::new("Soup");
        collection.create(recipe.clone()).await.unwrap();

        let result = collection
            .update(recipe.id, json!({"id": Uuid::new_v4()}))
            .await;
        assert!(matches!(result, Err(DalError::InvalidPatch(_))));
    }

    #[tokio::test]
    async fn test_update_preserves_retry_count() {
        let (collection, table, _temp) = offline_setup::<Recipe>().await;

        let recipe = Recipe::new("Soup");
        collection.create(recipe.clone()).await.unwrap();

        let mut stored = table.get(recipe.id).await.unwrap().unwrap();
        stored.envelope.mark_failed("HTTP 500");
        stored.envelope.mark_failed("HTTP 500");
        table.put(&stored).await.unwrap();

        collection
            .update(recipe.id, json!({"title": "Tomato Soup"}))
            .await
            .unwrap();

        let stored = table.get(recipe.id).await.unwrap().unwrap();
        assert_eq!(stored.envelope.status, SyncStatus::Pending);
        assert_eq!(stored.envelope.retry_count, 2);
    }

    #[tokio::test]
    async fn test_delete_offline_is_local_only() {
        let (collection, table, _temp) = offline_setup::<Recipe>().await;

        let recipe = Recipe::new("Soup");
        collection.create(recipe.clone()).await.unwrap();

        collection.delete(recipe.id).await.unwrap();

        assert!(collection.get(recipe.id).await.unwrap().is_none());
        assert!(table.get(recipe.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_menu_date_reads() {
        let (collection, _table, _temp) = offline_setup::<Menu>().await;

        let jan1 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let jan5 = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        let jan9 = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();

        for (date, title) in [(jan1, "Jan 1"), (jan5, "Jan 5"), (jan9, "Jan 9")] {
            collection
                .create(Menu::new(date, "dinner", title))
                .await
                .unwrap();
        }

        let on_jan5 = collection.for_date(jan5).await.unwrap();
        assert_eq!(on_jan5.len(), 1);
        assert_eq!(on_jan5[0].title, "Jan 5");

        let first_week = collection.between(jan1, jan5).await.unwrap();
        assert_eq!(first_week.len(), 2);
    }

    #[tokio::test]
    async fn test_recipe_category_read() {
        let (collection, _table, _temp) = offline_setup::<Recipe>().await;

        collection
            .create(Recipe::new("Soup").with_category("soups"))
            .await
            .unwrap();
        collection
            .create(Recipe::new("Bread").with_category("baking"))
            .await
            .unwrap();

        let soups = collection.in_category("soups").await.unwrap();
        assert_eq!(soups.len(), 1);
        assert_eq!(soups[0].title, "Soup");
    }

    #[tokio::test]
    async fn test_find_by_unknown_index_rejected() {
        let (collection, _table, _temp) = offline_setup::<Recipe>().await;

        let result = collection.find_by_index("title", "Soup").await;
        assert!(matches!(
            result,
            Err(DalError::Store(StoreError::UnknownIndex { .. }))
        ));
    }
}
