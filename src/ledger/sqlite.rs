//! SQLite-backed local ledger
//!
//! One append-only table, insertion-ordered, with a UNIQUE record id.

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqlitePool, SqlitePoolOptions},
    FromRow,
};
use tracing::debug;

use super::{LedgerBackend, LedgerError, LedgerWriteError};
use crate::domain::{Digest, Identity, LedgerEntry, RecordId, StorageLink};

/// Ledger stored in a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Create a ledger over an existing connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a database URL (e.g. `sqlite://ledger.db?mode=rwc`)
    pub async fn connect(url: &str) -> Result<Self, LedgerError> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| LedgerError::Read(format!("cannot open ledger database: {e}")))?;
        Ok(Self { pool })
    }

    /// Private in-memory database with the schema applied.
    ///
    /// Pinned to one connection that never idles out, since every SQLite
    /// memory connection is its own database.
    pub async fn in_memory() -> Result<Self, LedgerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| LedgerError::Read(format!("cannot open in-memory ledger: {e}")))?;
        let ledger = Self { pool };
        ledger.initialize().await?;
        Ok(ledger)
    }

    /// Initialize the database schema
    pub async fn initialize(&self) -> Result<(), LedgerError> {
        crate::migrations::run_sqlite(&self.pool)
            .await
            .map_err(|e| LedgerError::Read(format!("ledger migration failed: {e}")))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of anchored entries
    pub async fn count(&self) -> Result<u64, LedgerError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(read_error)?;
        Ok(row.0 as u64)
    }
}

fn read_error(e: sqlx::Error) -> LedgerError {
    LedgerError::Read(e.to_string())
}

/// Raw row from the ledger table
#[derive(Debug, FromRow)]
struct LedgerEntryRow {
    record_id: String,
    creator_identity: String,
    timestamp_seconds: i64,
    digest: String,
    storage_link: String,
}

impl TryFrom<LedgerEntryRow> for LedgerEntry {
    type Error = LedgerError;

    fn try_from(row: LedgerEntryRow) -> Result<Self, Self::Error> {
        let digest: Digest = row
            .digest
            .parse()
            .map_err(|e| LedgerError::Read(format!("Invalid digest: {e}")))?;
        let timestamp_seconds = u64::try_from(row.timestamp_seconds)
            .map_err(|_| LedgerError::Read("Invalid timestamp_seconds".to_string()))?;

        Ok(LedgerEntry {
            record_id: RecordId::new(row.record_id),
            creator_identity: Identity::new(row.creator_identity),
            timestamp_seconds,
            digest,
            storage_link: StorageLink::new(row.storage_link),
        })
    }
}

#[async_trait]
impl LedgerBackend for SqliteLedger {
    async fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let timestamp = i64::try_from(entry.timestamp_seconds)
            .map_err(|_| LedgerWriteError::Rejected("timestamp out of range".to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                record_id, creator_identity, timestamp_seconds,
                digest, storage_link, anchored_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.record_id.as_str())
        .bind(entry.creator_identity.as_str())
        .bind(timestamp)
        .bind(entry.digest.to_hex())
        .bind(entry.storage_link.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                debug!(rowid = done.last_insert_rowid(), "Ledger row inserted");
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(LedgerWriteError::Duplicate(entry.record_id.clone()).into())
            }
            Err(sqlx::Error::Database(db)) => {
                Err(LedgerWriteError::Rejected(db.message().to_string()).into())
            }
            Err(e) => Err(LedgerWriteError::Transport(e.to_string()).into()),
        }
    }

    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<LedgerEntry>, LedgerError> {
        let rows = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            SELECT record_id, creator_identity, timestamp_seconds, digest, storage_link
            FROM ledger_entries
            ORDER BY seq ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit.min(i64::MAX as u64) as i64)
        .bind(offset.min(i64::MAX as u64) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error)?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn find(&self, record_id: &RecordId) -> Result<Option<LedgerEntry>, LedgerError> {
        let row = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            SELECT record_id, creator_identity, timestamp_seconds, digest, storage_link
            FROM ledger_entries
            WHERE record_id = ?
            "#,
        )
        .bind(record_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(read_error)?;

        row.map(LedgerEntry::try_from).transpose()
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
