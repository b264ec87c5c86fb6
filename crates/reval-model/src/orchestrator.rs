//! # Validation Orchestrator
//!
//! [`validate_ref`] runs the root rule against the model's storage and
//! commits per-path state, restricted to a scope around the target path.
//!
//! ## Run ordinals
//!
//! Every run draws a fresh `valLock` from the model. Each state write of
//! the run is stamped with it, and a write is dropped when the stored
//! `valLock` is already greater. Overlapping runs are never cancelled;
//! their late writes simply lose.
//!
//! ## Scope classification
//!
//! The walk always starts at the root rule. Each reference it reaches is
//! classified before its rule runs:
//!
//! | Class          | Condition                                          | Rules run        | Commit |
//! |----------------|----------------------------------------------------|------------------|--------|
//! | validating     | root run, at/under the target, or a scope itself   | all              | yes, marked validated |
//! | preparing      | strictly under a non-target scope                  | all              | yes    |
//! | parent-of-scope| above a scope, or declares dependents below        | compound only    | no     |
//! | unrelated      | anything else                                      | none             | no     |
//!
//! Scopes start as the target plus the target's recorded `dependencies`.
//! A reference whose own `dependsOn` resolves to the target (or to one of
//! its ancestors) joins the scopes when the walk reaches it.
//!
//! With `only_dirty_refs`, references never explicitly set are evaluated
//! (their validity still reaches the parent) but not committed or marked.
//!
//! ## Eviction
//!
//! After the walk, a root run keeps only the records it visited. A scoped
//! run drops every record at or under a scope that it did not visit, so
//! references left behind by a conditional branch that is no longer taken
//! do not keep stale state. Records written by a newer run always survive,
//! and a run that finishes after a newer run evicted its scope writes
//! nothing there.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use reval_core::Route;
use reval_schema::{merge_results, Cursor, Host, Mode, Outcome, Rule, RuleError, RuleFuture};
use serde_json::Value;

use crate::error::ModelError;
use crate::events::ModelEvent;
use crate::model::Model;
use crate::options::ValidateOptions;
use crate::reference::Ref;
use crate::state::{State, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Validating,
    Preparing,
    Parent,
    Unrelated,
}

struct Run {
    model: Model,
    val_lock: u64,
    target: Route,
    from_root: bool,
    options: ValidateOptions,
    scopes: Mutex<Vec<Route>>,
    visited: Mutex<HashSet<String>>,
    computed: Mutex<Option<bool>>,
}

/// Validate `reference` (or `options.scope` below it).
///
/// Flags switched on in the model's [`ModelConfig`](crate::ModelConfig) are
/// switched on for the run as well.
///
/// Returns the validity of the target: as committed when this run or a
/// newer one committed it, otherwise as computed by this run. A target the
/// walk never reaches (an untaken branch, a path no schema covers) is valid
/// only if its stored state is `SUCCESS`.
///
/// # Errors
///
/// A [`RuleError`] from any rule aborts the run. The failing reference's
/// `VALIDATING` write is rolled back if this run still owns it; no eviction
/// happens.
pub(crate) async fn validate_ref(
    reference: &Ref,
    options: ValidateOptions,
) -> Result<bool, ModelError> {
    let model = reference.model().clone();
    let options = options.with_config(model.config());
    let target = match &options.scope {
        Some(scope) => Route::resolve(reference.route(), scope),
        None => reference.route().clone(),
    };
    let target_path = target.to_path();
    let val_lock = model.next_run();

    let mut scopes = vec![target.clone()];
    for dependency in model.entry(&target_path).state.dependencies() {
        let route = Route::resolve(&target, &dependency);
        if !scopes.contains(&route) {
            scopes.push(route);
        }
    }
    let scope_paths: Vec<String> = scopes.iter().map(Route::to_path).collect();
    tracing::debug!(run = val_lock, target = %target_path, scopes = ?scope_paths, "validation run started");
    model.publish(ModelEvent::BeforeValidation {
        run: val_lock,
        path: target_path.clone(),
        scopes: scope_paths,
    });

    let eval = Arc::new(options.eval_options(model.config().messages()));
    let run = Arc::new(Run {
        model: model.clone(),
        val_lock,
        from_root: target.is_root(),
        target,
        options,
        scopes: Mutex::new(scopes),
        visited: Mutex::new(HashSet::new()),
        computed: Mutex::new(None),
    });
    let host: Arc<dyn Host> = Arc::new(RunHost(run.clone()));
    let cursor = Cursor::new(host.clone(), Route::root(), eval);
    host.visit(cursor, model.rule().clone(), Outcome::none()).await?;

    run.evict();

    let state = model.entry(&target_path).state;
    let committed = state.val_lock >= val_lock && state.status != Status::Validating;
    let computed = *run.computed.lock();
    let valid = match computed {
        _ if committed => state.status != Status::Error,
        Some(valid) => valid,
        None => state.status == Status::Success,
    };
    tracing::debug!(run = val_lock, target = %target_path, valid, "validation run finished");
    model.publish(ModelEvent::AfterValidation {
        run: val_lock,
        path: target_path,
        valid,
    });
    Ok(valid)
}

impl Run {
    async fn visit(&self, cursor: Cursor, rule: Rule, hint: Outcome) -> Result<Outcome, RuleError> {
        self.discover(cursor.route(), &rule);
        match self.classify(cursor.route(), &rule) {
            Scope::Unrelated => Ok(Outcome::none()),
            Scope::Parent => {
                tracing::trace!(run = self.val_lock, path = %cursor.route(), "walking through parent of scope");
                rule.evaluate(cursor.with_mode(Mode::Structural)).await?;
                Ok(Outcome::none())
            }
            scope => self.evaluate(cursor, rule, hint, scope).await,
        }
    }

    /// Add `route` to the scopes if its `dependsOn` points at the target.
    fn discover(&self, route: &Route, rule: &Rule) {
        if self.from_root {
            return;
        }
        let depends = rule
            .depends_on()
            .iter()
            .any(|dep| self.target.starts_with(&Route::resolve(route, dep)));
        if !depends {
            return;
        }
        let mut scopes = self.scopes.lock();
        if !scopes.contains(route) {
            tracing::debug!(run = self.val_lock, path = %route, "dependent joined validation scope");
            scopes.push(route.clone());
        }
    }

    fn classify(&self, route: &Route, rule: &Rule) -> Scope {
        if self.from_root || route.starts_with(&self.target) {
            return Scope::Validating;
        }
        let scopes = self.scopes.lock();
        if scopes.contains(route) {
            Scope::Validating
        } else if scopes.iter().any(|scope| route.starts_with(scope)) {
            Scope::Preparing
        } else if scopes.iter().any(|scope| scope.starts_with(route)) || rule.declares_dependents() {
            Scope::Parent
        } else {
            Scope::Unrelated
        }
    }

    async fn evaluate(
        &self,
        cursor: Cursor,
        rule: Rule,
        hint: Outcome,
        scope: Scope,
    ) -> Result<Outcome, RuleError> {
        let path = cursor.path();
        let is_target = cursor.route() == &self.target;
        let current = self.model.update_for(&path, self.val_lock, |entry| entry.clone());
        self.visited.lock().insert(path.clone());

        // A newer run already evicted this part of the tree: evaluate for the
        // parent's sake but leave the records alone.
        let superseded = current.is_none();
        let entry = current.unwrap_or_default();
        let commit = !superseded && (!self.options.only_dirty_refs || entry.dirty);
        if commit && scope == Scope::Validating && self.options.mark_as_validated {
            self.model.update_for(&path, self.val_lock, |entry| entry.validated = true);
        }
        tracing::trace!(run = self.val_lock, path = %path, ?scope, commit, superseded, "visiting reference");

        let previous = entry.state;
        if commit {
            self.model.commit(
                &path,
                State {
                    status: Status::Validating,
                    val_lock: self.val_lock,
                    ..previous.clone()
                },
            );
        }

        let outcome = match rule.evaluate(cursor).await {
            Ok(outcome) => merge_results([hint, outcome]),
            Err(err) => {
                tracing::warn!(run = self.val_lock, path = %path, error = %err, "rule failed, rolling back");
                if commit {
                    self.model.roll_back(&path, self.val_lock, previous);
                }
                return Err(err);
            }
        };

        if commit {
            self.model.commit(&path, self.settle(&outcome));
        }
        if is_target {
            *self.computed.lock() = Some(outcome.passes());
        }
        Ok(outcome)
    }

    fn settle(&self, outcome: &Outcome) -> State {
        let invalid = outcome.is_invalid();
        State {
            status: if invalid { Status::Error } else { Status::Success },
            val_lock: self.val_lock,
            err_lock: invalid.then(|| self.model.next_error()),
            required: outcome.required,
            read_only: outcome.read_only,
            write_only: outcome.write_only,
            message: outcome.message.clone(),
            meta: outcome.meta.clone(),
        }
    }

    fn evict(&self) {
        let visited = self.visited.lock().clone();
        let scopes: Vec<String> = if self.from_root {
            vec![Route::root().to_path()]
        } else {
            self.scopes.lock().iter().map(Route::to_path).collect()
        };
        self.model.evict(self.val_lock, &scopes, |path| visited.contains(path));
    }
}

struct RunHost(Arc<Run>);

impl Host for RunHost {
    fn get(&self, route: &Route) -> Option<Value> {
        self.0.model.get(route)
    }

    fn set(&self, route: &Route, value: Option<Value>) -> Result<(), RuleError> {
        self.0.model.write(route, value)?;
        Ok(())
    }

    fn visit(&self, cursor: Cursor, rule: Rule, hint: Outcome) -> RuleFuture {
        let run = self.0.clone();
        async move { run.visit(cursor, rule, hint).await }.boxed()
    }
}
