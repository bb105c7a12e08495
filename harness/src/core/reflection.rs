//! Strict parsing of the reflect phase verdict.
//!
//! Every structural problem is fatal except a non-boolean `done`, which is
//! reported as [`DoneFlag::NotBoolean`] and treated as "not done" by the loop.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::LoopError;

/// Top-level keys every reflection must carry.
pub const REQUIRED_KEYS: [&str; 5] = ["scores", "acceptance_met", "issues", "confidence", "done"];

/// Parsed reflection verdict. Field values are unconstrained JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reflection {
    pub scores: Value,
    pub acceptance_met: Value,
    pub issues: Value,
    pub confidence: Value,
    pub done: Value,
    /// Any additional keys the model returned, kept for the summary.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Interpretation of the `done` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneFlag {
    Done,
    NotDone,
    /// `done` was present but not a JSON boolean.
    NotBoolean,
}

impl DoneFlag {
    /// Whether the loop should stop. `NotBoolean` never stops the loop.
    pub fn is_done(self) -> bool {
        self == DoneFlag::Done
    }
}

impl Reflection {
    /// Parse reflection text as a single JSON object with all required keys.
    pub fn parse(text: &str) -> Result<Self, LoopError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|source| LoopError::MalformedReflection { source })?;
        let Value::Object(mut map) = value else {
            return Err(LoopError::ReflectionNotObject);
        };

        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| !map.contains_key(**key))
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(LoopError::MissingReflectionKeys { missing });
        }

        let mut take = |key: &str| map.remove(key).unwrap_or(Value::Null);
        Ok(Self {
            scores: take("scores"),
            acceptance_met: take("acceptance_met"),
            issues: take("issues"),
            confidence: take("confidence"),
            done: take("done"),
            extra: map,
        })
    }

    pub fn done_flag(&self) -> DoneFlag {
        match self.done {
            Value::Bool(true) => DoneFlag::Done,
            Value::Bool(false) => DoneFlag::NotDone,
            _ => DoneFlag::NotBoolean,
        }
    }

    /// Pretty JSON rendering used for the per-iteration summary.
    pub fn summary(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}
