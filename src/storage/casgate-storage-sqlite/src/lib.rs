//! # Casgate Storage - SQLite Backend
//!
//! SQLite implementation of [`ProxyTicketStore`]. The proxy callback and the
//! reconciler may run in different processes; both open the same file.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use casgate_storage::{unix_now, PendingProxyIou, ProxyTicketRecord, ProxyTicketStore, StorageError};

/// SQLite proxy ticket store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Opens or creates the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The parent directory cannot be created
    /// - Database connection fails
    /// - Migrations fail
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db_path = path.as_ref().to_path_buf();
        if db_path.as_os_str().is_empty() {
            return Err(StorageError::InvalidInput("database path cannot be empty".into()));
        }

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::ConnectionFailed(format!("failed to create directory: {e}"))
            })?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        debug!(path = %db_path.display(), "Opening SQLite database");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let store = Self { pool, db_path };

        store.migrate().await?;

        info!(path = %store.db_path.display(), "SQLite proxy ticket store ready");

        Ok(store)
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Runs database migrations.
    async fn migrate(&self) -> Result<(), StorageError> {
        debug!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pgt_ious (
                iou        TEXT PRIMARY KEY,
                tgt        TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::ConnectionFailed(format!("migration failed: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS proxy_tickets (
                username   TEXT PRIMARY KEY,
                tgt        TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::ConnectionFailed(format!("migration failed: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pgt_ious_created ON pgt_ious (created_at)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("migration failed: {e}")))?;

        debug!("Migrations complete");

        Ok(())
    }
}

#[async_trait]
impl ProxyTicketStore for SqliteStore {
    async fn put_iou(&self, iou: &PendingProxyIou) -> Result<(), StorageError> {
        if iou.iou.is_empty() {
            return Err(StorageError::InvalidInput("iou cannot be empty".into()));
        }

        sqlx::query(
            r#"
            INSERT INTO pgt_ious (iou, tgt, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(iou) DO UPDATE SET
                tgt = excluded.tgt,
                created_at = excluded.created_at
            "#,
        )
        .bind(&iou.iou)
        .bind(&iou.ticket_granting_ticket)
        .bind(iou.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn get_iou(&self, iou: &str) -> Result<Option<PendingProxyIou>, StorageError> {
        let row: Option<(String, String, i64)> =
            sqlx::query_as("SELECT iou, tgt, created_at FROM pgt_ious WHERE iou = ?")
                .bind(iou)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(row.map(into_iou))
    }

    async fn delete_iou(&self, iou: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM pgt_ious WHERE iou = ?")
            .bind(iou)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn take_iou(&self, iou: &str) -> Result<Option<PendingProxyIou>, StorageError> {
        // Single statement: concurrent callers cannot both receive the row.
        let row: Option<(String, String, i64)> =
            sqlx::query_as("DELETE FROM pgt_ious WHERE iou = ? RETURNING iou, tgt, created_at")
                .bind(iou)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(row.map(into_iou))
    }

    async fn purge_ious(&self, cutoff: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM pgt_ious WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn get_record(&self, username: &str) -> Result<Option<ProxyTicketRecord>, StorageError> {
        let row: Option<(String, String, i64)> =
            sqlx::query_as("SELECT username, tgt, updated_at FROM proxy_tickets WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(row.map(|(username, ticket_granting_ticket, updated_at)| ProxyTicketRecord {
            username,
            ticket_granting_ticket,
            updated_at,
        }))
    }

    async fn upsert_record(
        &self,
        username: &str,
        ticket_granting_ticket: &str,
    ) -> Result<(), StorageError> {
        if username.is_empty() {
            return Err(StorageError::InvalidInput("username cannot be empty".into()));
        }

        let now = unix_now();

        sqlx::query(
            r#"
            INSERT INTO proxy_tickets (username, tgt, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET
                tgt = excluded.tgt,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(username)
        .bind(ticket_granting_ticket)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }
}

fn into_iou((iou, ticket_granting_ticket, created_at): (String, String, i64)) -> PendingProxyIou {
    PendingProxyIou {
        iou,
        ticket_granting_ticket,
        created_at,
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(tmp.path().join("casgate.db"))
            .await
            .unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn test_open_creates_db() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("casgate.db");
        let _store = SqliteStore::open(&db_path).await.unwrap();

        assert!(db_path.exists(), "database file should be created");
    }

    #[tokio::test]
    async fn test_open_rejects_empty_path() {
        let result = SqliteStore::open("").await;
        assert!(matches!(result, Err(StorageError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_iou_roundtrip() {
        let (_tmp, store) = setup().await;

        assert!(store.get_iou("PGTIOU-1").await.unwrap().is_none());

        let iou = PendingProxyIou::new("PGTIOU-1", "PGT-1");
        store.put_iou(&iou).await.unwrap();
        assert_eq!(store.get_iou("PGTIOU-1").await.unwrap(), Some(iou));

        store.delete_iou("PGTIOU-1").await.unwrap();
        assert!(store.get_iou("PGTIOU-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_ok() {
        let (_tmp, store) = setup().await;

        store.delete_iou("nonexistent").await.unwrap();
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let (_tmp, store) = setup().await;
        store
            .put_iou(&PendingProxyIou::new("PGTIOU-2", "PGT-2"))
            .await
            .unwrap();

        let first = store.take_iou("PGTIOU-2").await.unwrap().unwrap();
        assert_eq!(first.ticket_granting_ticket, "PGT-2");

        assert!(store.take_iou("PGTIOU-2").await.unwrap().is_none());
        assert!(store.get_iou("PGTIOU-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_take_single_winner() {
        let (_tmp, store) = setup().await;
        store
            .put_iou(&PendingProxyIou::new("PGTIOU-race", "PGT-race"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.take_iou("PGTIOU-race").await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_record_upsert_overwrites() {
        let (_tmp, store) = setup().await;

        store.upsert_record("alice", "PGT-1").await.unwrap();
        store.upsert_record("alice", "PGT-2").await.unwrap();

        let record = store.get_record("alice").await.unwrap().unwrap();
        assert_eq!(record.username, "alice");
        assert_eq!(record.ticket_granting_ticket, "PGT-2");

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM proxy_tickets")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_purge_stale_ious() {
        let (_tmp, store) = setup().await;

        let mut stale = PendingProxyIou::new("stale", "PGT-stale");
        stale.created_at = 10;
        store.put_iou(&stale).await.unwrap();
        store
            .put_iou(&PendingProxyIou::new("fresh", "PGT-fresh"))
            .await
            .unwrap();

        let removed = store.purge_ious(unix_now() - 60).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_iou("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("casgate.db");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.upsert_record("bob", "PGT-bob").await.unwrap();
        }

        let store = SqliteStore::open(&path).await.unwrap();
        let record = store.get_record("bob").await.unwrap().unwrap();
        assert_eq!(record.ticket_granting_ticket, "PGT-bob");
    }
}
