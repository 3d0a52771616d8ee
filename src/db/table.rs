//! Generic key-addressed storage for one entity kind.
//!
//! Each kind's table stores the entity body as JSON alongside its sync
//! envelope and the kind's secondary index columns. All writes are
//! whole-record upserts; nothing updates a field in place.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::envelope::{Stored, SyncEnvelope, SyncStatus};
use crate::models::SyncEntity;

/// Errors from the Local Store.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite failure.
    Sqlite(sqlx::Error),
    /// Entity body could not be serialized or deserialized.
    Body(serde_json::Error),
    /// `query_by_index` was given a column the kind does not index.
    UnknownIndex {
        table: &'static str,
        column: String,
    },
    /// A stored row no longer parses (bad status or timestamp).
    Corrupt {
        table: &'static str,
        id: String,
        detail: String,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "SQLite error: {}", e),
            StoreError::Body(e) => write!(f, "Body serialization error: {}", e),
            StoreError::UnknownIndex { table, column } => {
                write!(f, "Table '{}' has no index column '{}'", table, column)
            }
            StoreError::Corrupt { table, id, detail } => {
                write!(f, "Corrupt row in '{}' (id {}): {}", table, id, detail)
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Body(e)
    }
}

const ENVELOPE_COLUMNS: &str =
    "id, body, sync_status, local_updated_at, last_synced_at, sync_error, retry_count";

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: String,
    body: String,
    sync_status: String,
    local_updated_at: String,
    last_synced_at: Option<String>,
    sync_error: Option<String>,
    retry_count: i64,
}

impl RecordRow {
    fn decode<E: SyncEntity>(self) -> Result<Stored<E>, StoreError> {
        let table = E::KIND.table();
        let corrupt = |detail: String| StoreError::Corrupt {
            table,
            id: self.id.clone(),
            detail,
        };

        let entity: E = serde_json::from_str(&self.body)?;
        let status = SyncStatus::parse(&self.sync_status)
            .ok_or_else(|| corrupt(format!("unknown sync status '{}'", self.sync_status)))?;
        let local_updated_at = parse_timestamp(&self.local_updated_at)
            .map_err(|e| corrupt(format!("bad local_updated_at: {}", e)))?;
        let last_synced_at = match &self.last_synced_at {
            Some(ts) => {
                Some(parse_timestamp(ts).map_err(|e| corrupt(format!("bad last_synced_at: {}", e)))?)
            }
            None => None,
        };

        Ok(Stored {
            entity,
            envelope: SyncEnvelope {
                status,
                local_updated_at,
                last_synced_at,
                sync_error: self.sync_error,
                retry_count: self.retry_count,
            },
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Key-addressed storage for one entity kind.
pub struct Table<E: SyncEntity> {
    pool: SqlitePool,
    _marker: PhantomData<E>,
}

impl<E: SyncEntity> Clone for Table<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E: SyncEntity> Table<E> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Stored<E>>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            ENVELOPE_COLUMNS,
            E::KIND.table()
        );
        let row: Option<RecordRow> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(RecordRow::decode).transpose()
    }

    pub async fn get_all(&self) -> Result<Vec<Stored<E>>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY id",
            ENVELOPE_COLUMNS,
            E::KIND.table()
        );
        let rows: Vec<RecordRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter().map(RecordRow::decode).collect()
    }

    /// Equality lookup against one of the kind's secondary indexes.
    pub async fn query_by_index(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Vec<Stored<E>>, StoreError> {
        self.check_index(column)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ? ORDER BY id",
            ENVELOPE_COLUMNS,
            E::KIND.table(),
            column
        );
        let rows: Vec<RecordRow> = sqlx::query_as(&sql).bind(value).fetch_all(&self.pool).await?;

        rows.into_iter().map(RecordRow::decode).collect()
    }

    /// Inclusive range lookup against one of the kind's secondary
    /// indexes (dates sort lexicographically in their stored form).
    pub async fn query_by_index_range(
        &self,
        column: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<Stored<E>>, StoreError> {
        self.check_index(column)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} BETWEEN ? AND ? ORDER BY {}, id",
            ENVELOPE_COLUMNS,
            E::KIND.table(),
            column,
            column
        );
        let rows: Vec<RecordRow> = sqlx::query_as(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(RecordRow::decode).collect()
    }

    /// Upserts one record, envelope and index columns included.
    pub async fn put(&self, record: &Stored<E>) -> Result<(), StoreError> {
        let sql = upsert_sql::<E>();
        let query = bind_record(sqlx::query(&sql), record)?;
        query.execute(&self.pool).await?;
        Ok(())
    }

    /// Upserts a batch of records in one transaction.
    pub async fn bulk_put(&self, records: &[Stored<E>]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let sql = upsert_sql::<E>();
        let mut tx = self.pool.begin().await?;
        for record in records {
            let query = bind_record(sqlx::query(&sql), record)?;
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", E::KIND.table());
        sqlx::query(&sql)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn bulk_delete(&self, ids: &[Uuid]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let sql = format!("DELETE FROM {} WHERE id = ?", E::KIND.table());
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query(&sql).bind(id.to_string()).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Records awaiting a push: status pending or failed.
    pub async fn unsynced(&self) -> Result<Vec<Stored<E>>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE sync_status IN ('pending', 'failed') ORDER BY local_updated_at",
            ENVELOPE_COLUMNS,
            E::KIND.table()
        );
        let rows: Vec<RecordRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter().map(RecordRow::decode).collect()
    }

    /// (pending, failed) record counts for the status surface.
    pub async fn status_counts(&self) -> Result<(i64, i64), StoreError> {
        let sql = format!(
            "SELECT sync_status, COUNT(*) FROM {} WHERE sync_status IN ('pending', 'failed') GROUP BY sync_status",
            E::KIND.table()
        );
        let rows: Vec<(String, i64)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let mut pending = 0;
        let mut failed = 0;
        for (status, count) in rows {
            match status.as_str() {
                "pending" => pending = count,
                "failed" => failed = count,
                _ => {}
            }
        }
        Ok((pending, failed))
    }

    fn check_index(&self, column: &str) -> Result<(), StoreError> {
        if E::INDEX_COLUMNS.contains(&column) {
            Ok(())
        } else {
            Err(StoreError::UnknownIndex {
                table: E::KIND.table(),
                column: column.to_string(),
            })
        }
    }
}

fn upsert_sql<E: SyncEntity>() -> String {
    let mut columns = vec![
        "id",
        "body",
        "sync_status",
        "local_updated_at",
        "last_synced_at",
        "sync_error",
        "retry_count",
    ];
    columns.extend_from_slice(E::INDEX_COLUMNS);

    let placeholders = vec!["?"; columns.len()].join(", ");
    let updates = columns
        .iter()
        .skip(1)
        .map(|c| format!("{} = excluded.{}", c, c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        E::KIND.table(),
        columns.join(", "),
        placeholders,
        updates
    )
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_record<'q, E: SyncEntity>(
    query: SqliteQuery<'q>,
    record: &Stored<E>,
) -> Result<SqliteQuery<'q>, StoreError> {
    let body = serde_json::to_string(&record.entity)?;
    let envelope = &record.envelope;

    let mut query = query
        .bind(record.entity.id().to_string())
        .bind(body)
        .bind(envelope.status.as_str())
        .bind(envelope.local_updated_at.to_rfc3339())
        .bind(envelope.last_synced_at.map(|ts| ts.to_rfc3339()))
        .bind(envelope.sync_error.clone())
        .bind(envelope.retry_count);

    for value in record.entity.index_values() {
        query = query.bind(value);
    }

    Ok(query)
}
