//! # Error Types
//!
//! Two classes:
//!
//! - [`CompileError`] is raised while turning a schema into a [`Rule`](crate::Rule).
//!   It is fatal: no partially compiled rule tree is ever returned.
//! - [`RuleError`] is raised while *executing* a rule and only when a rule
//!   cannot produce an outcome at all (an external resolver rejected, a
//!   write hit a scalar). An invalid value is never a `RuleError`; it is an
//!   ordinary [`Outcome`](crate::Outcome) with `valid: Some(false)`.

use reval_core::PathError;
use thiserror::Error;

/// Error while compiling a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A schema key names no registered keyword and no reserved annotation.
    #[error("unknown keyword '{keyword}' at '{location}'")]
    UnknownKeyword {
        /// The unrecognized key.
        keyword: String,
        /// JSON pointer of the schema node holding the key.
        location: String,
    },

    /// A keyword payload has the wrong shape.
    #[error("invalid payload for '{keyword}' at '{location}': expected {expected}")]
    InvalidPayload {
        /// Keyword (or annotation) whose payload was rejected.
        keyword: String,
        /// JSON pointer of the payload.
        location: String,
        /// Description of the accepted shape.
        expected: String,
    },

    /// A schema node is neither an object nor a boolean.
    #[error("invalid schema at '{location}': expected an object or boolean, found {found}")]
    InvalidSchema {
        /// JSON pointer of the offending node.
        location: String,
        /// JSON type name found instead.
        found: &'static str,
    },

    /// A `filter` annotation names no registered filter.
    #[error("unknown filter '{filter}' at '{location}'")]
    UnknownFilter {
        /// The unrecognized filter name.
        filter: String,
        /// JSON pointer of the `filter` payload.
        location: String,
    },

    /// A `pattern` payload is not a valid regular expression.
    #[error("invalid pattern at '{location}': {reason}")]
    InvalidPattern {
        /// JSON pointer of the `pattern` payload.
        location: String,
        /// Regex compiler diagnostic.
        reason: String,
    },
}

/// Error while executing a rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// A keyword could not produce an outcome (e.g. an external resolver failed).
    #[error("keyword '{keyword}' failed at '{path}': {reason}")]
    Failed {
        /// Keyword whose rule failed.
        keyword: String,
        /// Canonical path of the reference being evaluated.
        path: String,
        /// Failure reason.
        reason: String,
    },

    /// A rule-driven write into the data tree failed.
    #[error("storage error: {0}")]
    Storage(#[from] PathError),
}
