//! Logging setup shared by the Ember binaries.
//!
//! Call [`init`] once at process start. Log output honours `RUST_LOG`; the
//! `ember` crates default to the given level when no directive is set.

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber at the default INFO level.
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific minimum level.
pub fn init_with_level(level: Level) {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("ember={}", level).parse().expect("valid directive"));

    // try_init so tests that initialize logging twice do not panic.
    let result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();

    if result.is_ok() {
        info!("logging initialized at level: {}", level);
    }
}
