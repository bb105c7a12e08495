//! Stable exit codes for harness CLI commands.

/// Command succeeded, or `harness run` ended with the agent reporting completion.
pub const OK: i32 = 0;
/// Command failed: invalid config, unreadable inputs, or a fatal loop error.
pub const INVALID: i32 = 1;
/// `harness run` used every iteration without the agent reporting completion.
pub const EXHAUSTED: i32 = 2;
