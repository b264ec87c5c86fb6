//! # reval-model: Reference Graph and Validation Orchestrator
//!
//! Binds a compiled schema to a mutable data tree and keeps per-path
//! validation state for it.
//!
//! - [`Model`] owns the data, the initial snapshot, the compiled root rule
//!   and the per-path state cache.
//! - [`Ref`] is a cheap `(model, path)` handle: read and write the value,
//!   read the state and derived flags, find the first error, validate.
//! - The orchestrator (`orchestrator` module) runs scoped validation and
//!   commits state under run ordinals, so overlapping asynchronous runs
//!   resolve deterministically.
//! - [`ModelEvent`]s are published on a broadcast bus for observers.
//!
//! ## Example
//!
//! ```no_run
//! # async fn demo() -> Result<(), reval_model::ModelError> {
//! use reval_model::{Model, ValidateOptions};
//! use serde_json::json;
//!
//! let model = Model::new(&json!({"type": "number", "default": 123}), None)?;
//! assert!(model.validate(ValidateOptions::default()).await?);
//! assert_eq!(model.value(), Some(json!(123)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Policy
//!
//! - State is written only by orchestrator commits.
//! - Locks are never held across `.await`.
//! - An invalid value is committed state, never an error.

pub mod error;
pub mod events;
pub mod model;
mod orchestrator;
pub mod options;
pub mod reference;
pub mod state;

pub use error::ModelError;
pub use events::ModelEvent;
pub use model::Model;
pub use options::{ModelConfig, ValidateOptions};
pub use reference::Ref;
pub use state::{State, Status};
