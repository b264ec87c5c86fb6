//! # References
//!
//! A [`Ref`] is a `(model, path)` pair. It owns no data: value reads and
//! writes go to the model's storage, state reads go to the model's per-path
//! cache. Any number of handles may exist for one path; they all observe
//! the same record.

use std::fmt;

use reval_core::{Route, Segment};
use serde_json::{Map, Value};

use crate::error::ModelError;
use crate::model::Model;
use crate::options::ValidateOptions;
use crate::orchestrator;
use crate::state::{State, Status};

/// Handle onto the value and validation state at one path.
#[derive(Clone)]
pub struct Ref {
    model: Model,
    route: Route,
    path: String,
}

impl Ref {
    pub(crate) fn new(model: Model, route: Route) -> Self {
        let path = route.to_path();
        Self { model, route, path }
    }

    /// Canonical path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path as segments.
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Model this reference belongs to.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Reference one segment below.
    pub fn child(&self, segment: impl Into<Segment>) -> Ref {
        Ref::new(self.model.clone(), self.route.child(segment))
    }

    /// Reference at `relative`, resolved against this path.
    pub fn resolve(&self, relative: &str) -> Ref {
        Ref::new(self.model.clone(), Route::resolve(&self.route, relative))
    }

    /// Parent reference, `None` at the root.
    pub fn parent(&self) -> Option<Ref> {
        self.route
            .parent()
            .map(|route| Ref::new(self.model.clone(), route))
    }

    // -- Value ----------------------------------------------------------------

    /// Current value, `None` when undefined.
    pub fn value(&self) -> Option<Value> {
        self.model.get(&self.route)
    }

    /// Value at construction time.
    pub fn initial_value(&self) -> Option<Value> {
        self.model.initial_at(&self.route)
    }

    /// Write a value as the caller. A real change marks this reference dirty.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Path`] when the route crosses a scalar.
    pub fn set_value(&self, value: Option<Value>) -> Result<(), ModelError> {
        if self.model.write(&self.route, value)? {
            self.model.update(&self.path, |entry| entry.dirty = true);
        }
        Ok(())
    }

    /// Restore the initial value and clear the reference-local flags.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Path`] when the route crosses a scalar.
    pub fn reset(&self) -> Result<(), ModelError> {
        self.model.write(&self.route, self.initial_value())?;
        self.model.update(&self.path, |entry| {
            entry.dirty = false;
            entry.touched = false;
            entry.validated = false;
        });
        Ok(())
    }

    // -- State ----------------------------------------------------------------

    /// Copy of the current validation state.
    pub fn state(&self) -> State {
        self.model.entry(&self.path).state
    }

    pub fn status(&self) -> Status {
        self.state().status
    }

    pub fn message(&self) -> Option<String> {
        self.state().message
    }

    pub fn meta(&self) -> Map<String, Value> {
        self.state().meta
    }

    pub fn required(&self) -> bool {
        self.state().required
    }

    pub fn read_only(&self) -> bool {
        self.state().read_only
    }

    pub fn write_only(&self) -> bool {
        self.state().write_only
    }

    pub fn valid(&self) -> bool {
        self.status() == Status::Success
    }

    pub fn invalid(&self) -> bool {
        self.status() == Status::Error
    }

    pub fn validating(&self) -> bool {
        self.status() == Status::Validating
    }

    pub fn pristine(&self) -> bool {
        self.status() == Status::Pristine
    }

    /// Explicitly set since construction or the last reset.
    pub fn dirty(&self) -> bool {
        self.model.entry(&self.path).dirty
    }

    /// Value differs from the construction-time snapshot.
    pub fn changed(&self) -> bool {
        self.value() != self.initial_value()
    }

    pub fn touched(&self) -> bool {
        self.model.entry(&self.path).touched
    }

    pub fn untouched(&self) -> bool {
        !self.touched()
    }

    pub fn validated(&self) -> bool {
        self.model.entry(&self.path).validated
    }

    pub fn touch(&self) {
        self.model.update(&self.path, |entry| entry.touched = true);
    }

    /// Run `f`, marking this reference touched.
    pub fn with_touch<R>(&self, f: impl FnOnce(&Ref) -> R) -> R {
        self.touch();
        f(self)
    }

    /// The ERROR reference at or under this path with the smallest `errLock`.
    pub fn first_error(&self) -> Option<Ref> {
        self.errors().into_iter().next()
    }

    /// Every ERROR reference at or under this path, earliest `errLock` first.
    pub fn errors(&self) -> Vec<Ref> {
        let mut failed: Vec<(u64, String)> = self
            .model
            .entries_under(&self.path)
            .into_iter()
            .filter(|(_, entry)| entry.state.status == Status::Error)
            .map(|(path, entry)| (entry.state.err_lock.unwrap_or(u64::MAX), path))
            .collect();
        failed.sort();
        failed
            .into_iter()
            .map(|(_, path)| self.model.reference(&path))
            .collect()
    }

    // -- Validation -----------------------------------------------------------

    /// Mark the target touched and validated, then validate.
    ///
    /// The target is this reference, or `options.scope` resolved against it.
    /// Returns the validity of the target: as committed when this run (or a
    /// newer one) committed it, otherwise as computed by this run. A target
    /// no rule reaches counts as valid only once a run committed `SUCCESS`
    /// there.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Rule`] when a rule fails to produce an outcome.
    pub async fn validate(&self, options: ValidateOptions) -> Result<bool, ModelError> {
        let target = match &options.scope {
            Some(scope) => self.resolve(scope),
            None => self.clone(),
        };
        self.model.update(&target.path, |entry| {
            entry.touched = true;
            entry.validated = true;
        });
        orchestrator::validate_ref(self, options).await
    }

    /// Validate without marking anything validated.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Rule`] when a rule fails to produce an outcome.
    pub async fn prepare(&self, options: ValidateOptions) -> Result<bool, ModelError> {
        orchestrator::validate_ref(self, options.mark_as_validated(false)).await
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Ref {}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}
