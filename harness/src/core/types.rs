//! Shared deterministic types for the harness core.
//!
//! These types define stable contracts between the pure parsing logic and the
//! loop controller. They carry no I/O and serialize deterministically.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One phase of a loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Plan,
    Act,
    Reflect,
}

impl Phase {
    /// Template name used to load the prompt for this phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Plan => "plan",
            Phase::Act => "act",
            Phase::Reflect => "reflect",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `(path, content)` unit extracted from an act response.
///
/// `path` is relative to the target project root and is not validated here;
/// the scoped writer decides whether it may be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEdit {
    pub path: String,
    pub content: String,
}

impl FileEdit {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}
