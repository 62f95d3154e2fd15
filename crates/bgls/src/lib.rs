//
// lib.rs
//
// Library root. The binary in main.rs, the benches and the integration tests
// all link against this crate.
//

pub mod backend;
pub mod build_tool;
pub mod cli;
pub mod config;
pub mod cross_file;
pub mod definition;
pub mod handlers;
pub mod hover;
pub mod outline;
pub mod scanner;
pub mod semantic_tokens;
pub mod span;
pub mod state;

// test_utils is available in test builds and when the `test-support` feature is enabled.
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

#[cfg(test)]
mod property_tests;
