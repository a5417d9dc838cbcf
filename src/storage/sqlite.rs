//! SQLite-backed implementation of the Storage Facade.
//!
//! This is the one concrete backend. It stores the three tables of the data
//! model (`transactions`, `transaction_chunks`, `chunks`) and implements
//! every conflict check as a single conditional `INSERT`/`UPDATE` whose
//! `WHERE` clause encodes the precondition, per the concurrency model: two
//! racing writers cannot both "see OK, then write" because the database
//! resolves the race at statement-affected-row-count time, not in
//! application code.
//!
//! Schema and query shapes are grounded directly in the original
//! `queries_generic.py` prebuilt queries, translated into positional-bind
//! SQLite statements.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{MentatError, Result};
use crate::storage::facade::MentatSyncStorage;
use crate::storage::graph::{ChunkId, Transaction, TrnId, ROOT};

const MAX_ATTEMPTS: u32 = 3;

/// A persistent storage backend for MentatSync, backed by SQLite via `sqlx`.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open or create a SQLite database at the given path, running
    /// migrations to bring the schema up to date.
    pub async fn open<P: AsRef<Path>>(path: P, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        Self::from_options(options, max_connections).await
    }

    /// Open an in-memory database. Useful for tests; the database is lost
    /// when the pool is dropped.
    pub async fn in_memory() -> Result<Self> {
        // A single shared connection is required for `:memory:` so that all
        // callers see the same database, matching the original backend's
        // treatment of in-memory SQLite.
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);
        Self::from_options(options, 1).await
    }

    async fn from_options(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(MentatError::backend)?;
        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                userid TEXT NOT NULL,
                trnid TEXT NOT NULL,
                parent TEXT NOT NULL,
                committed INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                prev_head TEXT NOT NULL,
                next_head TEXT NOT NULL,
                PRIMARY KEY (userid, trnid)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS trn_usr_seq ON transactions(userid, seq)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS trn_usr_nhead ON transactions(userid, next_head)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transaction_chunks (
                userid TEXT NOT NULL,
                trnid TEXT NOT NULL,
                idx INTEGER NOT NULL,
                chunk TEXT NOT NULL,
                PRIMARY KEY (userid, trnid, idx)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                userid TEXT NOT NULL,
                chunk TEXT NOT NULL,
                payload BLOB NOT NULL,
                PRIMARY KEY (userid, chunk)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Close the underlying connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Classify a `sqlx` error as safely retryable.
///
/// Only connection-level and lock-contention failures are retryable, and
/// only when they occur before a transaction's first statement has run.
/// Multi-statement operations (`reset`, `create_transaction`) retry just
/// that first statement, starting over with a fresh `begin()`; once it has
/// succeeded the transaction may hold an applied write, so every statement
/// after it propagates its error as-is instead of retrying the whole
/// operation, matching the connection-reuse gate in the original backend's
/// `DBConnection.execute`.
fn is_retryable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db_err) => {
            // SQLite reports lock contention as "database is locked" / "busy".
            let msg = db_err.message();
            msg.contains("locked") || msg.contains("busy")
        }
        _ => false,
    }
}

/// Retry a single-statement operation on a connection-level failure.
///
/// Safe for `set_head` and `create_chunk`, whose closures issue exactly one
/// statement before committing: retrying from scratch on failure cannot
/// double-apply a write. Multi-statement operations retry only their first
/// statement and run the rest without this helper; see `is_retryable`.
async fn with_retry<F, Fut, T>(op_name: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_ATTEMPTS && is_retryable(&err) => {
                warn!("{} failed with retryable error, attempt {}: {}", op_name, attempt, err);
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[async_trait]
impl MentatSyncStorage for SqliteStorage {
    async fn reset(&self, userid: &str) -> Result<()> {
        debug!(userid, "reset");

        // Only the transaction's first statement is safe to retry: a
        // connection-level failure there means nothing has been written yet.
        // A failure on any later statement must propagate as-is, since the
        // transaction may already hold an applied write.
        let mut attempt = 0;
        let mut tx = loop {
            attempt += 1;
            let mut candidate = self.pool.begin().await?;
            match sqlx::query("DELETE FROM transactions WHERE userid = ?")
                .bind(userid)
                .execute(&mut *candidate)
                .await
            {
                Ok(_) => break candidate,
                Err(err) if attempt < MAX_ATTEMPTS && is_retryable(&err) => {
                    warn!("reset failed with retryable error, attempt {}: {}", attempt, err);
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        };

        sqlx::query("DELETE FROM transaction_chunks WHERE userid = ?")
            .bind(userid)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_head(&self, userid: &str) -> Result<TrnId> {
        debug!(userid, "get_head");
        let row = sqlx::query(
            "SELECT trnid FROM transactions
             WHERE userid = ? AND committed = 1
             ORDER BY seq DESC LIMIT 1",
        )
        .bind(userid)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let trnid: String = row.get("trnid");
                parse_uuid(&trnid)
            }
            None => Ok(ROOT),
        }
    }

    async fn set_head(&self, userid: &str, trnid: TrnId) -> Result<()> {
        debug!(userid, %trnid, "set_head");
        let trnid_str = trnid.to_string();
        let root_str = ROOT.to_string();

        let affected = with_retry("set_head", || {
            let trnid_str = trnid_str.clone();
            let root_str = root_str.clone();
            async move {
                let mut tx = self.pool.begin().await?;
                let result = sqlx::query(
                    r#"
                    UPDATE transactions
                    SET committed = 1
                    WHERE userid = ?
                    AND next_head = ?
                    AND prev_head = COALESCE(
                        (SELECT trnid FROM transactions
                         WHERE userid = ? AND committed = 1
                         ORDER BY seq DESC LIMIT 1),
                        ?
                    )
                    "#,
                )
                .bind(userid)
                .bind(&trnid_str)
                .bind(userid)
                .bind(&root_str)
                .execute(&mut *tx)
                .await?;
                let affected = result.rows_affected();
                tx.commit().await?;
                Ok(affected)
            }
        })
        .await?;

        if affected == 0 {
            return Err(MentatError::Conflict(format!(
                "transaction {trnid} is not a committable pending leaf for the current head"
            )));
        }
        Ok(())
    }

    async fn get_transactions(
        &self,
        userid: &str,
        from: TrnId,
        limit: u32,
    ) -> Result<Vec<TrnId>> {
        debug!(userid, %from, limit, "get_transactions");
        let mut tx = self.pool.begin().await?;

        let rows = if from == ROOT {
            sqlx::query(
                "SELECT trnid FROM transactions
                 WHERE userid = ? AND committed = 1
                 ORDER BY seq ASC LIMIT ?",
            )
            .bind(userid)
            .bind(limit)
            .fetch_all(&mut *tx)
            .await?
        } else {
            let from_str = from.to_string();
            let seq_row = sqlx::query(
                "SELECT seq FROM transactions WHERE userid = ? AND trnid = ? AND committed = 1",
            )
            .bind(userid)
            .bind(&from_str)
            .fetch_optional(&mut *tx)
            .await?;

            let from_seq: i64 = match seq_row {
                Some(row) => row.get("seq"),
                None => {
                    return Err(MentatError::Programming(format!(
                        "get_transactions called with a `from` that is not a committed \
                         transaction for this user: {from}"
                    )));
                }
            };

            sqlx::query(
                "SELECT trnid FROM transactions
                 WHERE userid = ? AND committed = 1 AND seq > ?
                 ORDER BY seq ASC LIMIT ?",
            )
            .bind(userid)
            .bind(from_seq)
            .bind(limit)
            .fetch_all(&mut *tx)
            .await?
        };

        tx.commit().await?;

        rows.into_iter()
            .map(|row| {
                let trnid: String = row.get("trnid");
                parse_uuid(&trnid)
            })
            .collect()
    }

    async fn create_transaction(
        &self,
        userid: &str,
        trnid: TrnId,
        parent: TrnId,
        chunks: &[ChunkId],
    ) -> Result<()> {
        debug!(userid, %trnid, %parent, chunk_count = chunks.len(), "create_transaction");
        let trnid_str = trnid.to_string();
        let parent_str = parent.to_string();
        let root_str = ROOT.to_string();

        // As in `reset`, only the first statement (the insert below) is
        // retried; once it has run, the transaction may hold an applied
        // write and a retry from scratch could double-apply it.
        let mut attempt = 0;
        let (mut tx, inserted) = loop {
            attempt += 1;
            let mut candidate = self.pool.begin().await?;

            let result = if parent == ROOT {
                // Only valid when this user currently has no committed
                // history and no other pending chain already hanging off
                // ROOT, otherwise this would be a second chain extending
                // "the empty history" while one already exists, violating
                // I7.
                sqlx::query(
                    r#"
                    INSERT INTO transactions
                        (userid, trnid, parent, committed, seq, prev_head, next_head)
                    SELECT ?, ?, ?, 0, 1, ?, ?
                    WHERE NOT EXISTS (
                        SELECT 1 FROM transactions
                        WHERE userid = ? AND (committed = 1 OR prev_head = ?)
                    )
                    "#,
                )
                .bind(userid)
                .bind(&trnid_str)
                .bind(&root_str)
                .bind(&root_str)
                .bind(&trnid_str)
                .bind(userid)
                .bind(&root_str)
                .execute(&mut *candidate)
                .await
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO transactions
                        (userid, trnid, parent, committed, seq, next_head, prev_head)
                    SELECT ?, ?, tprev.trnid, 0, tprev.seq + 1, ?,
                        CASE WHEN tprev.committed = 1 THEN ? ELSE tprev.prev_head END
                    FROM transactions AS tprev
                    WHERE tprev.userid = ? AND tprev.trnid = ? AND tprev.next_head = ?
                    "#,
                )
                .bind(userid)
                .bind(&trnid_str)
                .bind(&trnid_str)
                .bind(&parent_str)
                .bind(userid)
                .bind(&parent_str)
                .bind(&parent_str)
                .execute(&mut *candidate)
                .await
            };

            match result {
                Ok(res) => break (candidate, res.rows_affected()),
                Err(err) if attempt < MAX_ATTEMPTS && is_retryable(&err) => {
                    warn!(
                        "create_transaction failed with retryable error, attempt {}: {}",
                        attempt, err
                    );
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        };

        if inserted == 0 {
            tx.rollback().await?;
            return Err(MentatError::Conflict(format!(
                "parent {parent} does not exist or already has a pending descendant"
            )));
        }

        if parent != ROOT {
            let bumped = sqlx::query(
                "UPDATE transactions SET next_head = ? WHERE userid = ? AND next_head = ?",
            )
            .bind(&trnid_str)
            .bind(userid)
            .bind(&parent_str)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if bumped == 0 {
                error!(
                    userid, %trnid, %parent,
                    "ancestor bump affected no rows after a successful parent insert"
                );
                tx.rollback().await?;
                return Err(MentatError::Programming(format!(
                    "ancestor bump affected no rows for parent {parent}"
                )));
            }
        }

        for (idx, chunk) in chunks.iter().enumerate() {
            let added = sqlx::query(
                r#"
                INSERT INTO transaction_chunks (userid, trnid, idx, chunk)
                SELECT ?, ?, ?, c.chunk FROM chunks AS c
                WHERE c.userid = ? AND c.chunk = ?
                "#,
            )
            .bind(userid)
            .bind(&trnid_str)
            .bind(idx as i64)
            .bind(userid)
            .bind(chunk)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if added == 0 {
                tx.rollback().await?;
                return Err(MentatError::ChunkNotFound(chunk.clone()));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_transaction(&self, userid: &str, trnid: TrnId) -> Result<Transaction> {
        debug!(userid, %trnid, "get_transaction");
        let trnid_str = trnid.to_string();

        let row = sqlx::query(
            "SELECT parent, seq FROM transactions WHERE userid = ? AND trnid = ?",
        )
        .bind(userid)
        .bind(&trnid_str)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| MentatError::TransactionNotFound(trnid.to_string()))?;
        let parent_str: String = row.get("parent");
        let parent = parse_uuid(&parent_str)?;
        let seq: i64 = row.get("seq");

        let chunk_rows = sqlx::query(
            "SELECT chunk FROM transaction_chunks WHERE userid = ? AND trnid = ? ORDER BY idx ASC",
        )
        .bind(userid)
        .bind(&trnid_str)
        .fetch_all(&self.pool)
        .await?;

        let chunks = chunk_rows.into_iter().map(|row| row.get("chunk")).collect();

        Ok(Transaction { id: trnid, parent, seq, chunks })
    }

    async fn create_chunk(&self, userid: &str, chunkid: &str, payload: &[u8]) -> Result<()> {
        debug!(userid, chunkid, payload_len = payload.len(), "create_chunk");
        with_retry("create_chunk", || async {
            sqlx::query("INSERT OR IGNORE INTO chunks (userid, chunk, payload) VALUES (?, ?, ?)")
                .bind(userid)
                .bind(chunkid)
                .bind(payload)
                .execute(&self.pool)
                .await
                .map(|_| ())
        })
        .await
    }

    async fn get_chunk(&self, userid: &str, chunkid: &str) -> Result<Vec<u8>> {
        debug!(userid, chunkid, "get_chunk");
        let row = sqlx::query("SELECT payload FROM chunks WHERE userid = ? AND chunk = ?")
            .bind(userid)
            .bind(chunkid)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.get("payload"))
            .ok_or_else(|| MentatError::ChunkNotFound(chunkid.to_string()))
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| MentatError::backend(format!("stored invalid uuid {s}: {e}")))
}
