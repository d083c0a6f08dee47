//! Tracing subscriber setup
//!
//! The library only emits `tracing` events; applications decide where they
//! go. These helpers install the usual subscriber: an `EnvFilter` read from
//! `RUST_LOG` (falling back to `default_filter`) and JSON output.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into())
}

/// Install the global JSON subscriber.
///
/// Panics if a global subscriber is already set; use [`try_init_tracing`]
/// where that can happen (tests).
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(filter(default_filter))
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Install the global JSON subscriber unless one is already set.
///
/// Returns `true` when this call installed it.
pub fn try_init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(filter(default_filter))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .is_ok()
}
