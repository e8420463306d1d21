//! SQLite-backed log store.
//!
//! Persists one row per event into the `application_logs` table. Each
//! `persist` attempt runs in its own transaction so a failed attempt leaves
//! no partial batch behind. Timestamps are stored in their naive form,
//! without a zone offset.

use sqlx::SqlitePool;

use super::{LogEvent, LogStore, StoreError};

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Production `LogStore` over a SQLite connection pool.
#[derive(Clone)]
pub struct SqliteLogStore {
    pool: SqlitePool,
}

impl SqliteLogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl LogStore for SqliteLogStore {
    async fn persist(&self, batch: &[LogEvent]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        for event in batch {
            sqlx::query(
                "INSERT INTO application_logs (message, level, context, creation_date)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&event.message)
            .bind(event.level.as_str())
            .bind(&event.context)
            .bind(event.timestamp.naive_utc())
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        }

        tx.commit().await.map_err(classify)?;
        Ok(())
    }
}

/// Sort a sqlx failure into the retry taxonomy. Connectivity, pool and
/// database-reported errors are worth retrying; encode/decode/configuration
/// failures are programming or data errors and are not.
fn classify(err: sqlx::Error) -> StoreError {
    let transient = matches!(
        &err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Database(_)
    );
    if transient {
        StoreError::Transient(err.to_string())
    } else {
        StoreError::Terminal(err.to_string())
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LogLevel;
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");

        sqlx::query(
            "CREATE TABLE application_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message TEXT NOT NULL,
                level TEXT NOT NULL,
                context TEXT NOT NULL,
                creation_date TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .expect("Failed to create test table");

        pool
    }

    fn event(message: &str, level: LogLevel) -> LogEvent {
        LogEvent {
            message: message.to_string(),
            level,
            context: "tests".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn persist_writes_one_row_per_event() {
        let pool = create_test_pool().await;
        let store = SqliteLogStore::new(pool.clone());

        let batch = vec![
            event("first", LogLevel::Info),
            event("second", LogLevel::Error),
        ];
        store.persist(&batch).await.expect("persist failed");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM application_logs")
            .fetch_one(&pool)
            .await
            .expect("Failed to count rows");
        assert_eq!(count, 2);

        let level: String =
            sqlx::query_scalar("SELECT level FROM application_logs ORDER BY id LIMIT 1")
                .fetch_one(&pool)
                .await
                .expect("Failed to read level");
        assert_eq!(level, "INFO");
    }

    #[tokio::test]
    async fn timestamps_are_stored_without_zone_offset() {
        let pool = create_test_pool().await;
        let store = SqliteLogStore::new(pool.clone());

        store
            .persist(&[event("stamped", LogLevel::Debug)])
            .await
            .expect("persist failed");

        let stored: String = sqlx::query_scalar("SELECT creation_date FROM application_logs")
            .fetch_one(&pool)
            .await
            .expect("Failed to read timestamp");
        assert!(
            !stored.contains('+') && !stored.ends_with('Z'),
            "expected naive timestamp, got {}",
            stored
        );
    }

    #[tokio::test]
    async fn failed_attempt_is_classified_and_commits_nothing() {
        // No application_logs table at all, so the insert fails inside the
        // transaction and the attempt reports a database-level error.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");
        let store = SqliteLogStore::new(pool);

        let err = store
            .persist(&[event("doomed", LogLevel::Info)])
            .await
            .expect_err("persist should fail without the table");
        assert!(matches!(err, StoreError::Transient(_)), "got {:?}", err);
    }

    #[test]
    fn classification_splits_connectivity_from_programming_errors() {
        assert!(matches!(
            classify(sqlx::Error::PoolTimedOut),
            StoreError::Transient(_)
        ));
        assert!(matches!(
            classify(sqlx::Error::RowNotFound),
            StoreError::Terminal(_)
        ));
    }
}
