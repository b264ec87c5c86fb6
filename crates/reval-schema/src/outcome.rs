//! # Outcomes and Result Merging
//!
//! Every keyword rule produces an [`Outcome`] for the path it ran against.
//! [`merge_results`] folds the ordered outcomes of all keyword rules for one
//! path into a single outcome.
//!
//! ## Folding rules
//!
//! - `required`, `read_only`, `write_only` are OR-accumulated.
//! - `depends_on` lists are concatenated.
//! - Validity starts undefined. The first `Some(true)` sets it and adopts
//!   its message. Any `Some(false)` forces it to `false`; the message of the
//!   *first* invalid outcome wins. A later `Some(true)` seen while validity
//!   is already `true` and no message is recorded may still contribute its
//!   message (trailing warning-only keywords).
//! - `meta` maps are shallow-merged, later outcome wins.
//! - No outcomes at all leaves validity undefined: "no applicable rule" is
//!   distinct from both pass and fail.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output of a rule for one path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    /// `Some(true)` pass, `Some(false)` fail, `None` not applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    /// Error text when invalid, warning text when valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Keyword that supplied `message` (or the verdict), for message lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// The value must be present.
    #[serde(default)]
    pub required: bool,
    /// The value must not be edited by the caller.
    #[serde(default)]
    pub read_only: bool,
    /// The value must not be displayed to the caller.
    #[serde(default)]
    pub write_only: bool,
    /// Paths (relative to this one) whose change must re-validate this path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Keyword-specific annotations (`maxLength`, `enum`, `title`, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl Outcome {
    /// No applicable rule: validity undefined, nothing to report.
    pub fn none() -> Self {
        Self::default()
    }

    /// A passing outcome.
    pub fn pass() -> Self {
        Self {
            valid: Some(true),
            ..Self::default()
        }
    }

    /// A passing outcome carrying a warning.
    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            valid: Some(true),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// A failing outcome.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: Some(false),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// A passing or failing outcome depending on `ok`.
    pub fn check(ok: bool, message: impl FnOnce() -> String) -> Self {
        if ok {
            Self::pass()
        } else {
            Self::fail(message())
        }
    }

    /// Attach a metadata annotation.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Whether this outcome is definitely invalid.
    pub fn is_invalid(&self) -> bool {
        self.valid == Some(false)
    }

    /// Validity with "not applicable" counted as passing.
    pub fn passes(&self) -> bool {
        !self.is_invalid()
    }
}

/// Fold the ordered outcomes of every keyword rule for one path.
pub fn merge_results(results: impl IntoIterator<Item = Outcome>) -> Outcome {
    let mut merged = Outcome::none();

    for result in results {
        merged.required |= result.required;
        merged.read_only |= result.read_only;
        merged.write_only |= result.write_only;
        merged.depends_on.extend(result.depends_on);

        match (merged.valid, result.valid) {
            (None, Some(true)) => {
                merged.valid = Some(true);
                merged.message = result.message;
                merged.keyword = result.keyword;
            }
            (Some(true), Some(true)) if merged.message.is_none() && result.message.is_some() => {
                merged.message = result.message;
                merged.keyword = result.keyword;
            }
            (None | Some(true), Some(false)) => {
                merged.valid = Some(false);
                merged.message = result.message;
                merged.keyword = result.keyword;
            }
            _ => {}
        }

        for (key, value) in result.meta {
            merged.meta.insert(key, value);
        }
    }

    merged
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn outcome() -> impl Strategy<Value = Outcome> {
        (
            prop_oneof![Just(None), Just(Some(true)), Just(Some(false))],
            prop::option::of("[a-z]{1,6}"),
        )
            .prop_map(|(valid, message)| Outcome {
                valid,
                message,
                ..Outcome::none()
            })
    }

    proptest! {
        /// Merged validity is false iff any input is false, true iff some input
        /// is true and none false, undefined otherwise.
        #[test]
        fn validity_is_pessimistic(results in prop::collection::vec(outcome(), 0..8)) {
            let any_false = results.iter().any(|r| r.valid == Some(false));
            let any_true = results.iter().any(|r| r.valid == Some(true));
            let merged = merge_results(results.clone());
            let expected = if any_false { Some(false) } else if any_true { Some(true) } else { None };
            prop_assert_eq!(merged.valid, expected);
            if any_false {
                let first = results.iter().find(|r| r.valid == Some(false)).unwrap();
                prop_assert_eq!(&merged.message, &first.message);
            }
        }
    }
}
