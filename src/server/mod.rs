//! Network layer: the HTTP collaborator and its listener setup.

pub mod http_api;
pub mod server;

pub use server::run_server_with_duration;
