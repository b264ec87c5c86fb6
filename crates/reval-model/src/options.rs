//! # Validation Options and Model Configuration
//!
//! [`ValidateOptions`] shape a single run. [`ModelConfig`] is the
//! deserializable, model-wide configuration: caller-level message maps and
//! the option defaults every run starts from.

use std::collections::HashMap;

use reval_schema::{EvalOptions, Messages};
use serde::{Deserialize, Serialize};

/// Options for one validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidateOptions {
    /// Path, relative to the reference, that narrows the run target.
    pub scope: Option<String>,
    /// Commit (and mark validated) only references that were explicitly set.
    pub only_dirty_refs: bool,
    /// Let `type` convert values into the declared type.
    pub coerce_types: bool,
    /// Let `additionalProperties: false` delete unknown keys.
    pub remove_additional: bool,
    /// Mark validating-scope references as validated.
    pub mark_as_validated: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            scope: None,
            only_dirty_refs: false,
            coerce_types: false,
            remove_additional: false,
            mark_as_validated: true,
        }
    }
}

impl ValidateOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Narrow the run to `scope`, relative to the reference.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn only_dirty_refs(mut self, on: bool) -> Self {
        self.only_dirty_refs = on;
        self
    }

    pub fn coerce_types(mut self, on: bool) -> Self {
        self.coerce_types = on;
        self
    }

    pub fn remove_additional(mut self, on: bool) -> Self {
        self.remove_additional = on;
        self
    }

    pub fn mark_as_validated(mut self, on: bool) -> Self {
        self.mark_as_validated = on;
        self
    }

    /// Switch on every flag `config` switches on.
    pub fn with_config(self, config: &ModelConfig) -> Self {
        Self {
            only_dirty_refs: self.only_dirty_refs || config.only_dirty_refs,
            coerce_types: self.coerce_types || config.coerce_types,
            remove_additional: self.remove_additional || config.remove_additional,
            ..self
        }
    }

    pub(crate) fn eval_options(&self, messages: Messages) -> EvalOptions {
        EvalOptions {
            coerce_types: self.coerce_types,
            remove_additional: self.remove_additional,
            messages,
        }
    }
}

/// Model-wide configuration, loadable from YAML or JSON.
///
/// The boolean flags apply to every run of the model; a run's own
/// [`ValidateOptions`] can add flags but not clear these.
///
/// ```yaml
/// errors:
///   maximum: "too large"
/// warnings: {}
/// coerceTypes: true
/// onlyDirtyRefs: false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelConfig {
    /// Error text per keyword, below schema-level overrides.
    pub errors: HashMap<String, String>,
    /// Warning text per keyword, below schema-level overrides.
    pub warnings: HashMap<String, String>,
    /// Default for [`ValidateOptions::coerce_types`].
    pub coerce_types: bool,
    /// Default for [`ValidateOptions::remove_additional`].
    pub remove_additional: bool,
    /// Default for [`ValidateOptions::only_dirty_refs`].
    pub only_dirty_refs: bool,
}

impl ModelConfig {
    /// Caller-level message maps.
    pub fn messages(&self) -> Messages {
        Messages {
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
        }
    }

    /// Options every run starts from.
    pub fn validate_options(&self) -> ValidateOptions {
        ValidateOptions {
            coerce_types: self.coerce_types,
            remove_additional: self.remove_additional,
            only_dirty_refs: self.only_dirty_refs,
            ..ValidateOptions::default()
        }
    }
}
