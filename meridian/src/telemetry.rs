// Copyright (c) 2023-2025 The Meridian Foundation

//! Tracing subscriber setup for the node.
//!
//! Log levels come from `RUST_LOG` when set; otherwise `info`, or
//! `debug` when the config asks for verbose output.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Call once at process start. A second call is ignored so tests that
/// share a process can each request logging.
pub fn init_logging(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
