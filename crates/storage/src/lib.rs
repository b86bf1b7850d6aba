use std::str::FromStr;

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use tracing::{debug, info};

pub const INIT_SQL: &str = include_str!("../../../scripts/init_db.sql");

const MEMORY_PREFIX: &str = "sqlite::memory:";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("invalid sqlite url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SnapshotId(pub i64);

/// One immutable row of the balance log.
///
/// Balances are in native units (ETH, SOL). The USD columns exist in the
/// schema but the recorder never fills them.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Snapshot {
    pub id: i64,
    pub timestamp: i64,
    pub eth_balance: f64,
    pub sol_balance: f64,
    pub eth_usd: Option<f64>,
    pub sol_usd: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceAverages {
    pub eth: f64,
    pub sol: f64,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|err| StorageError::InvalidUrl {
                url: url.to_string(),
                reason: err.to_string(),
            })?
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Full);

        // Every connection to `:memory:` opens its own database, so the pool
        // is pinned to one connection that is never recycled.
        let pool = if url.starts_with(MEMORY_PREFIX) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await?
        };
        run_init_sql(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn in_memory() -> StorageResult<Self> {
        Self::connect(MEMORY_PREFIX).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn append(
        &self,
        timestamp_ms: i64,
        eth_balance: f64,
        sol_balance: f64,
    ) -> StorageResult<SnapshotId> {
        let result = sqlx::query(
            "INSERT INTO snapshots (timestamp, eth_balance, sol_balance) VALUES (?1, ?2, ?3)",
        )
        .bind(timestamp_ms)
        .bind(eth_balance)
        .bind(sol_balance)
        .execute(&self.pool)
        .await?;
        let id = SnapshotId(result.last_insert_rowid());
        debug!(id = id.0, ts_ms = timestamp_ms, "snapshot appended");
        Ok(id)
    }

    pub async fn count(&self) -> StorageResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn first(&self) -> StorageResult<Option<Snapshot>> {
        let row = sqlx::query_as::<_, Snapshot>(
            "SELECT id, timestamp, eth_balance, sol_balance, eth_usd, sol_usd
             FROM snapshots ORDER BY timestamp ASC, id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn latest(&self) -> StorageResult<Option<Snapshot>> {
        let row = sqlx::query_as::<_, Snapshot>(
            "SELECT id, timestamp, eth_balance, sol_balance, eth_usd, sol_usd
             FROM snapshots ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Rows strictly newer than `threshold_ms`, oldest first.
    pub async fn range_since(&self, threshold_ms: i64) -> StorageResult<Vec<Snapshot>> {
        let rows = sqlx::query_as::<_, Snapshot>(
            "SELECT id, timestamp, eth_balance, sol_balance, eth_usd, sol_usd
             FROM snapshots WHERE timestamp > ?1 ORDER BY timestamp ASC, id ASC",
        )
        .bind(threshold_ms)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_since(&self, threshold_ms: i64) -> StorageResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM snapshots WHERE timestamp > ?1")
            .bind(threshold_ms)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Mean balances over the window, or `None` when the window holds no rows.
    pub async fn average_since(&self, threshold_ms: i64) -> StorageResult<Option<BalanceAverages>> {
        let (eth, sol): (Option<f64>, Option<f64>) = sqlx::query_as(
            "SELECT AVG(eth_balance), AVG(sol_balance) FROM snapshots WHERE timestamp > ?1",
        )
        .bind(threshold_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(match (eth, sol) {
            (Some(eth), Some(sol)) => Some(BalanceAverages { eth, sol }),
            _ => None,
        })
    }

    pub async fn validate_required_tables(&self) -> StorageResult<Vec<String>> {
        let present: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'index')",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(["snapshots", "idx_snapshots_timestamp"]
            .into_iter()
            .filter(|name| !present.iter().any(|p| p.as_str() == *name))
            .map(String::from)
            .collect())
    }
}

pub async fn init_sqlite(url: &str) -> StorageResult<Store> {
    let store = Store::connect(url).await?;
    info!(path = url, "sqlite initialized");
    Ok(store)
}

async fn run_init_sql(pool: &SqlitePool) -> StorageResult<()> {
    for statement in INIT_SQL.split(';') {
        let trimmed = statement.trim();
        if trimmed.is_empty() {
            continue;
        }
        sqlx::query(trimmed).execute(pool).await?;
    }
    Ok(())
}
