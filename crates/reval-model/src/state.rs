//! # Per-Path Validation State

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle status of one path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Never validated, or evicted since.
    #[default]
    Pristine,
    /// A run is computing this path.
    Validating,
    /// Last committed outcome was valid (or had no applicable rule).
    Success,
    /// Last committed outcome was invalid.
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pristine => "PRISTINE",
            Self::Validating => "VALIDATING",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Validation record of one path.
///
/// Written only by orchestrator commits. A commit stamped with a `val_lock`
/// lower than the stored one is dropped, so `val_lock` never regresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// Current status.
    pub status: Status,
    /// Ordinal of the run that last wrote this state (0 = never).
    pub val_lock: u64,
    /// Ordinal assigned when the path last turned invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_lock: Option<u64>,
    /// The value must be present.
    pub required: bool,
    /// The value must not be edited.
    pub read_only: bool,
    /// The value must not be displayed.
    pub write_only: bool,
    /// Error or warning text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Keyword-surfaced annotations.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl State {
    /// Paths declared under the `dependencies` annotation, as stored.
    pub fn dependencies(&self) -> Vec<String> {
        match self.meta.get("dependencies") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Cached per-path record: validation state plus reference-local flags.
#[derive(Debug, Clone, Default)]
pub(crate) struct Entry {
    pub state: State,
    pub dirty: bool,
    pub touched: bool,
    pub validated: bool,
}
