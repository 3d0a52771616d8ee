//! Local Store schema, versioned.
//!
//! Each version is additive: it runs DDL and may backfill existing
//! rows once (version 2 populates `pantry_items.category` from the
//! stored bodies). Applied versions are recorded in
//! `schema_migrations`, so running on every open is idempotent.

use sqlx::SqlitePool;

struct Migration {
    version: i64,
    ddl: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        ddl: V1_BASE_TABLES,
    },
    Migration {
        version: 2,
        ddl: V2_PANTRY_CATEGORY,
    },
];

const V1_BASE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS recipes (
    id TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    category TEXT,
    sync_status TEXT NOT NULL,
    local_updated_at TEXT NOT NULL,
    last_synced_at TEXT,
    sync_error TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_recipes_category ON recipes(category);
CREATE INDEX IF NOT EXISTS idx_recipes_sync_status ON recipes(sync_status);

CREATE TABLE IF NOT EXISTS menus (
    id TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    menu_date TEXT,
    sync_status TEXT NOT NULL,
    local_updated_at TEXT NOT NULL,
    last_synced_at TEXT,
    sync_error TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_menus_date ON menus(menu_date);
CREATE INDEX IF NOT EXISTS idx_menus_sync_status ON menus(sync_status);

CREATE TABLE IF NOT EXISTS pantry_items (
    id TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    sync_status TEXT NOT NULL,
    local_updated_at TEXT NOT NULL,
    last_synced_at TEXT,
    sync_error TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_pantry_sync_status ON pantry_items(sync_status);
"#;

const V2_PANTRY_CATEGORY: &str = r#"
ALTER TABLE pantry_items ADD COLUMN category TEXT;
CREATE INDEX IF NOT EXISTS idx_pantry_category ON pantry_items(category);
"#;

/// Runs all pending migrations. Safe to call on every open.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    apply(pool, None).await
}

/// Applies migrations up to `upto` (inclusive), or all of them.
///
/// The bound exists so tests can stage a database at an older schema
/// version before exercising a backfill.
pub(crate) async fn apply(pool: &SqlitePool, upto: Option<i64>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    let applied: Vec<(i64,)> = sqlx::query_as("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await?;
    let applied: std::collections::HashSet<i64> = applied.into_iter().map(|r| r.0).collect();

    for migration in MIGRATIONS {
        if let Some(bound) = upto {
            if migration.version > bound {
                break;
            }
        }
        if applied.contains(&migration.version) {
            continue;
        }

        tracing::info!(version = migration.version, "applying migration");

        if let Err(e) = sqlx::raw_sql(migration.ddl).execute(pool).await {
            // A partially applied ALTER TABLE from an interrupted run
            // leaves the column in place with no ledger row.
            if e.to_string().contains("duplicate column name") {
                tracing::warn!(
                    version = migration.version,
                    "column already present, marking migration complete"
                );
            } else {
                return Err(e);
            }
        }

        backfill(pool, migration.version).await?;

        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
            .bind(migration.version)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// One-time data fixups that accompany a schema version.
async fn backfill(pool: &SqlitePool, version: i64) -> Result<(), sqlx::Error> {
    match version {
        2 => backfill_pantry_category(pool).await,
        _ => Ok(()),
    }
}

/// Populates `pantry_items.category` from each row's stored body.
async fn backfill_pantry_category(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT id, body FROM pantry_items WHERE category IS NULL")
            .fetch_all(pool)
            .await?;

    for (id, body) in rows {
        let category = match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => value
                .get("category")
                .and_then(|c| c.as_str())
                .map(str::to_string),
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "skipping unparseable pantry row in backfill");
                continue;
            }
        };

        if let Some(category) = category {
            sqlx::query("UPDATE pantry_items SET category = ? WHERE id = ?")
                .bind(&category)
                .bind(&id)
                .execute(pool)
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().in_memory(true))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_migrations_fresh_db() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_v2_backfills_category_from_body() {
        let pool = memory_pool().await;
        apply(&pool, Some(1)).await.unwrap();

        // A row written before the category column existed.
        sqlx::query(
            "INSERT INTO pantry_items (id, body, sync_status, local_updated_at, retry_count)
             VALUES (?, ?, 'synced', ?, 0)",
        )
        .bind("item-1")
        .bind(r#"{"id":"item-1","name":"Flour","category":"baking"}"#)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();

        run_migrations(&pool).await.unwrap();

        let row: (Option<String>,) =
            sqlx::query_as("SELECT category FROM pantry_items WHERE id = 'item-1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(row.0.as_deref(), Some("baking"));
    }

    #[tokio::test]
    async fn test_v2_backfill_skips_bodies_without_category() {
        let pool = memory_pool().await;
        apply(&pool, Some(1)).await.unwrap();

        sqlx::query(
            "INSERT INTO pantry_items (id, body, sync_status, local_updated_at, retry_count)
             VALUES (?, ?, 'synced', ?, 0)",
        )
        .bind("item-2")
        .bind(r#"{"id":"item-2","name":"Salt"}"#)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();

        run_migrations(&pool).await.unwrap();

        let row: (Option<String>,) =
            sqlx::query_as("SELECT category FROM pantry_items WHERE id = 'item-2'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(row.0.is_none());
    }
}
