//! Fatal loop errors.
//!
//! These travel inside `anyhow::Error` through the orchestration layer; callers
//! that need to branch on the failure kind use `downcast_ref::<LoopError>()`.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::Phase;

#[derive(Debug, Error)]
pub enum LoopError {
    /// The language model call failed. Never retried.
    #[error("{phase} phase: language model call failed")]
    Transport {
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },

    /// The act response contained no `FILE:` block.
    #[error("no files found in act response (expected `FILE: <path>` blocks)")]
    NoFileEdits,

    /// A file edit resolved outside every allow-listed path. Nothing was written for it.
    #[error("refusing to write outside allowed paths: {}", .path.display())]
    OutOfBounds { path: PathBuf },

    #[error("reflection output was not valid JSON (the reflect prompt requires strict JSON output)")]
    MalformedReflection {
        #[source]
        source: serde_json::Error,
    },

    #[error("reflection output must be a JSON object")]
    ReflectionNotObject,

    #[error("reflection output missing keys: {}", .missing.join(", "))]
    MissingReflectionKeys { missing: Vec<String> },
}
