//! Tracing/logging initialization
//!
//! The library only emits `tracing` events; binaries and tests decide where
//! they go by calling [`init`] once at startup.

use tracing_subscriber::EnvFilter;

/// Human-readable logs filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with(false);
}

/// Like [`init`], optionally emitting one JSON object per event.
pub fn init_with(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
