//! Plan → act → reflect agent loop harness.
//!
//! A language model repeatedly plans a change to a target project, emits the
//! files that implement it, and judges the result against acceptance criteria
//! until it reports completion or the iteration budget runs out. The crate
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (template rendering, response
//!   parsing, reflection validation). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, context loading, the
//!   allow-listed writer, model clients, transcripts).
//!
//! [`looping`] coordinates the two to implement `harness run`.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
