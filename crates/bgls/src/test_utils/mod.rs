//
// test_utils/mod.rs
//
// Shared helpers for unit tests, integration tests and benchmarks
//

pub mod fixture_workspace;
pub mod memory_reader;

pub use fixture_workspace::{create_fixture_workspace, generate_script, FixtureConfig};
pub use memory_reader::MemoryReader;
