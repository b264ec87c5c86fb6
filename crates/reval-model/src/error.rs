//! # Error Types
//!
//! [`ModelError`] is the single error surfaced by the reference graph. An
//! invalid value is never an error: it is a committed
//! [`Status::Error`](crate::Status::Error) state.

use reval_core::PathError;
use reval_schema::{CompileError, RuleError};
use thiserror::Error;

/// Error raised by [`Model`](crate::Model) and [`Ref`](crate::Ref) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The schema could not be compiled; no model was built.
    #[error("schema compilation failed: {0}")]
    Compile(#[from] CompileError),

    /// A rule could not produce an outcome (e.g. an external resolver
    /// rejected). Nothing was committed for the failed branch.
    #[error("validation aborted: {0}")]
    Rule(#[from] RuleError),

    /// A direct value write addressed an impossible location.
    #[error("storage write failed: {0}")]
    Path(#[from] PathError),
}
