// Integration test suite entry point. All integration tests are compiled as
// a single binary, mirroring the layout used for the rest of the test
// suite.

#[path = "../common/mod.rs"]
mod common;

mod chunk_store;
mod transaction_graph;
