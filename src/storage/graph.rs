//! Transaction Graph: the per-user tree of pending and committed transactions.
//!
//! This module holds the data model shared by every storage backend: the
//! `Transaction` row shape, the `ROOT` sentinel, and the small set of value
//! types returned by the Storage Facade. The actual invariant enforcement
//! (conflict detection, `next_head`/`prev_head` maintenance) lives in the
//! conditional SQL statements of [`crate::storage::sqlite`]: per the
//! concurrency model, those checks must be fused into single statements so
//! that two racing writers can't both observe "OK" before either writes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel identifier representing "empty history" (the conceptual parent
/// of the first transaction in a user's chain).
pub const ROOT: Uuid = Uuid::nil();

/// A chunk identifier: opaque, 1-64 chars, scoped per user.
pub type ChunkId = String;

/// A transaction identifier (canonically a UUID; [`ROOT`] is reserved).
pub type TrnId = Uuid;

/// A transaction's metadata and ordered chunk membership, as returned by
/// `get_transaction`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// This transaction's own id.
    pub id: TrnId,
    /// The transaction this one extends, or [`ROOT`].
    pub parent: TrnId,
    /// Position in the committed history this transaction occupies (or
    /// would occupy, if still pending).
    pub seq: i64,
    /// Ordered chunk ids, preserving caller-specified order.
    pub chunks: Vec<ChunkId>,
}
