//! Tracing initialization.
//!
//! The engine logs through `tracing` everywhere; this helper installs a
//! formatted subscriber driven by `RUST_LOG` (after a best-effort `.env`
//! load). Applications embedding the engine in a larger service will usually
//! install their own subscriber instead.

use tracing_subscriber::EnvFilter;

/// Installs the default fmt subscriber; harmless when one is already set.
pub fn init_tracing() {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
