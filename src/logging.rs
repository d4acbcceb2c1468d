// ABOUTME: Structured logging setup built on tracing-subscriber with env-filter control
// ABOUTME: Initializes the global subscriber once for the server binary and tools
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logging initialization
//!
//! Log levels are controlled through `RUST_LOG` (standard `EnvFilter` syntax),
//! defaulting to `info` for this crate and `warn` for dependencies.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber
///
/// Safe to call once per process; later calls are ignored so tests that
/// share a process do not panic.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,tidechat=info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
