//! Observability for aerograph
//!
//! The engine emits `tracing` spans and events; this module installs a
//! formatting subscriber for binaries and test harnesses that want them.
//!
//! # Usage
//!
//! ```ignore
//! aerograph::observability::init("aerograph=debug");
//! ```

use tracing_subscriber::{fmt, EnvFilter};

/// Install a global fmt subscriber filtered by `directive`.
///
/// Falls back to `info` when the directive does not parse. Returns false
/// when a global subscriber was already installed.
pub fn init(directive: &str) -> bool {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_test_writer()
        .try_init()
        .is_ok()
}
