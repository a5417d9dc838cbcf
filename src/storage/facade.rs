//! Storage Facade: the narrow capability set exposed to callers.
//!
//! A single implementation backs this trait today ([`crate::storage::sqlite::SqliteStorage`]);
//! the trait exists so the core can be exercised against an in-memory or
//! alternative backend in tests without depending on a concrete engine. No
//! shared base class is needed beyond this contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::storage::graph::{ChunkId, Transaction, TrnId};

/// Capability set for a per-user transaction graph and chunk store.
///
/// Every method runs inside exactly one storage-engine transaction; on
/// success the invariants of the transaction graph hold atomically, on
/// failure no visible state changes.
#[async_trait]
pub trait MentatSyncStorage: Send + Sync {
    /// Discard all chunks and transactions stored for `userid`.
    ///
    /// After this call, `get_head` returns [`crate::storage::graph::ROOT`].
    async fn reset(&self, userid: &str) -> Result<()>;

    /// Return the committed transaction with the largest `seq`, or ROOT if
    /// none exists. Never fails.
    async fn get_head(&self, userid: &str) -> Result<TrnId>;

    /// Promote the pending chain ending at `trnid` to committed.
    ///
    /// Fails with `Conflict` if `trnid` doesn't exist, isn't a pending leaf,
    /// or its recorded `prev_head` no longer matches the current head.
    async fn set_head(&self, userid: &str, trnid: TrnId) -> Result<()>;

    /// Return up to `limit` committed transaction ids in ascending `seq`
    /// order, strictly after `from` (or from the start if `from` is ROOT).
    ///
    /// `from`, if not ROOT, must name a committed transaction; querying from
    /// a pending transaction is a programming error.
    async fn get_transactions(
        &self,
        userid: &str,
        from: TrnId,
        limit: u32,
    ) -> Result<Vec<TrnId>>;

    /// Insert a new pending transaction extending `parent`.
    ///
    /// Fails with `Conflict` if `trnid` already exists, or if `parent` is
    /// not ROOT and is not a pending leaf for this user. Fails with
    /// `ChunkNotFound` if any referenced chunk does not exist.
    async fn create_transaction(
        &self,
        userid: &str,
        trnid: TrnId,
        parent: TrnId,
        chunks: &[ChunkId],
    ) -> Result<()>;

    /// Return a transaction's metadata and ordered chunk list, pending or
    /// committed indifferently.
    async fn get_transaction(&self, userid: &str, trnid: TrnId) -> Result<Transaction>;

    /// Persist a chunk payload. Idempotent: re-creating an existing
    /// `(userid, chunkid)` key leaves the original payload untouched.
    async fn create_chunk(&self, userid: &str, chunkid: &str, payload: &[u8]) -> Result<()>;

    /// Fetch a chunk payload, failing with `ChunkNotFound` if absent.
    async fn get_chunk(&self, userid: &str, chunkid: &str) -> Result<Vec<u8>>;
}
