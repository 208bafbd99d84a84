//! sfbus testkit - doubles for exercising the client without a live org
//!
//! - [`MemoryBayeuxClient`] / [`MemoryClientFactory`]: a Bayeux client that
//!   runs extensions and hooks in memory
//! - [`ScriptedTransport`]: an [`sfbus_core::HttpTransport`] fed from a queue
//! - [`mocks`]: wiremock token endpoints
//! - [`init_test_logging`]: `tracing` output for test runs

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod bayeux;
mod http;
pub mod mocks;

pub use bayeux::*;
pub use http::*;

use tracing_subscriber::EnvFilter;

/// Install a test-friendly `tracing` subscriber. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sfbus=debug")),
        )
        .with_test_writer()
        .try_init();
}
