//! MentatSync: a per-user, server-side store for an append-only,
//! linearly-committed chain of transactions referencing immutable
//! content-addressed chunks.
//!
//! The storage core ([`storage`]) has no knowledge of HTTP; [`server`] is a
//! thin collaborator translating the wire protocol onto it.

pub mod app_state;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod storage;
pub mod utils;
