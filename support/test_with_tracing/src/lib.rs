// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Crate for defining tests that have tracing output.
//!
//! Use `use test_with_tracing::test;` in a test module so that `#[test]`
//! installs a subscriber writing to the test harness's captured output.

#[cfg(test)]
extern crate self as test_with_tracing;

pub use test_with_tracing_macro::test;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives for test output.
pub const FILTER_ENV: &str = "RUST_LOG";

#[doc(hidden)]
/// Initializes `tracing` for tests.
///
/// Only the first call in a test binary has an effect.
pub fn init() {
    static ONCE: std::sync::Once = std::sync::Once::new();

    ONCE.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::DEBUG.into())
            .with_env_var(FILTER_ENV)
            .from_env_lossy();

        tracing_subscriber::fmt()
            .compact()
            .with_ansi(false) // avoid polluting logs with escape sequences
            .log_internal_errors(true)
            .with_test_writer()
            .with_env_filter(filter)
            .init();
    });
}
