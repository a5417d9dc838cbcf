//! Chunk Store: content-addressed payload storage, scoped per user.
//!
//! Chunks are immutable once created (`create_chunk` is insert-if-absent,
//! never update-in-place). The actual persistence lives in
//! [`crate::storage::sqlite`]; this module only carries the identifier type
//! shared with [`crate::storage::graph`] and the validation the HTTP
//! collaborator applies to it.

pub use crate::storage::graph::ChunkId;

/// Maximum length, in bytes, of a chunk identifier accepted by the HTTP
/// collaborator. The core itself places no limit on key length; this bound
/// exists to keep `chunks` table keys bounded.
pub const MAX_CHUNK_ID_LEN: usize = 64;

/// Whether `id` is an acceptable chunk identifier: 1 to
/// [`MAX_CHUNK_ID_LEN`] lowercase alphanumerics or hyphens, matching the
/// original backend's route pattern.
pub fn is_valid_chunk_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_CHUNK_ID_LEN
        && id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
