//! Diagnostic tracing for the harness binary.
//!
//! Tracing is for debugging the harness itself: it is filtered by `RUST_LOG`,
//! written to stderr and never persisted. What the agent produced (plans,
//! responses, reflections) is product output instead. The binary prints it
//! from `looping::LoopEvent`s and `io::transcript` stores it on disk.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Call once, before any other work.
///
/// `RUST_LOG` overrides the default `warn` level, e.g.
/// `RUST_LOG=harness=debug harness run --max-iterations 1`.
pub fn init() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
