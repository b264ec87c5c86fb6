//! # Reference Graph Owner
//!
//! A [`Model`] is built once per schema and data pair. It owns the current
//! data tree, a snapshot of the initial tree, the compiled root rule, the
//! path-keyed cache of per-path records, and the two ordinals (run and
//! error) that order state commits and first-error reporting.
//!
//! Eviction follows the same ordinal discipline as commits: a run never
//! drops a record a newer run wrote, and once a run has evicted a scope, an
//! older run can no longer create records inside it.
//!
//! Locks are `parking_lot` and are never held across an `.await`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use reval_core::path::is_at_or_under;
use reval_core::{PathError, Route, Storage};
use reval_schema::{Compiler, Rule};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::ModelError;
use crate::events::{EventBus, ModelEvent};
use crate::options::{ModelConfig, ValidateOptions};
use crate::reference::Ref;
use crate::state::{Entry, State};

const EVENT_CAPACITY: usize = 1024;

#[derive(Default)]
struct Records {
    entries: BTreeMap<String, Entry>,
    /// Scope path to the newest run that evicted under it.
    evicted: BTreeMap<String, u64>,
}

impl Records {
    /// Whether a run newer than `val_lock` evicted a scope covering `path`.
    fn superseded(&self, path: &str, val_lock: u64) -> bool {
        self.evicted
            .iter()
            .any(|(scope, &lock)| lock > val_lock && is_at_or_under(path, scope))
    }
}

pub(crate) struct ModelInner {
    storage: Mutex<Storage>,
    initial: Storage,
    rule: Rule,
    records: Mutex<Records>,
    runs: AtomicU64,
    errors: AtomicU64,
    events: EventBus,
    config: ModelConfig,
}

/// Owner of one data tree and its validation state. Cheap to clone.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    /// Compile `schema` with the built-in keywords and wrap `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Compile`] when the schema does not compile.
    pub fn new(schema: &Value, data: Option<Value>) -> Result<Self, ModelError> {
        Self::compile(&Compiler::with_builtins(), schema, data, ModelConfig::default())
    }

    /// Compile `schema` with `compiler` and wrap `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Compile`] when the schema does not compile.
    pub fn compile(
        compiler: &Compiler,
        schema: &Value,
        data: Option<Value>,
        config: ModelConfig,
    ) -> Result<Self, ModelError> {
        let rule = compiler.compile(schema)?;
        Ok(Self::from_rule(rule, data, config))
    }

    /// Wrap `data` under an already compiled root rule.
    pub fn from_rule(rule: Rule, data: Option<Value>, config: ModelConfig) -> Self {
        Self {
            inner: Arc::new(ModelInner {
                initial: Storage::new(data.clone()),
                storage: Mutex::new(Storage::new(data)),
                rule,
                records: Mutex::new(Records::default()),
                runs: AtomicU64::new(0),
                errors: AtomicU64::new(0),
                events: EventBus::new(EVENT_CAPACITY),
                config,
            }),
        }
    }

    /// Reference at `path` (resolved against the root).
    pub fn reference(&self, path: &str) -> Ref {
        Ref::new(self.clone(), Route::parse(path))
    }

    /// Reference at the root.
    pub fn root(&self) -> Ref {
        Ref::new(self.clone(), Route::root())
    }

    /// Current data tree.
    pub fn value(&self) -> Option<Value> {
        self.inner.storage.lock().root().cloned()
    }

    /// Data tree as it was at construction.
    pub fn initial_value(&self) -> Option<&Value> {
        self.inner.initial.root()
    }

    /// Compiled root rule.
    pub fn rule(&self) -> &Rule {
        &self.inner.rule
    }

    /// Model-wide configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.inner.config
    }

    /// Receive every subsequent [`ModelEvent`].
    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.inner.events.subscribe()
    }

    /// Validate the whole tree.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Rule`] when a rule fails to produce an outcome.
    pub async fn validate(&self, options: ValidateOptions) -> Result<bool, ModelError> {
        self.root().validate(options).await
    }

    /// Paths that currently hold a cached record, in path order.
    pub fn paths(&self) -> Vec<String> {
        self.inner.records.lock().entries.keys().cloned().collect()
    }

    pub(crate) fn next_run(&self) -> u64 {
        self.inner.runs.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn next_error(&self) -> u64 {
        self.inner.errors.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn publish(&self, event: ModelEvent) {
        self.inner.events.publish(event);
    }

    pub(crate) fn get(&self, route: &Route) -> Option<Value> {
        self.inner.storage.lock().get(route).cloned()
    }

    pub(crate) fn initial_at(&self, route: &Route) -> Option<Value> {
        self.inner.initial.get(route).cloned()
    }

    /// Write a value; returns whether anything changed.
    pub(crate) fn write(&self, route: &Route, value: Option<Value>) -> Result<bool, PathError> {
        {
            let mut storage = self.inner.storage.lock();
            if storage.get(route) == value.as_ref() {
                return Ok(false);
            }
            storage.set(route, value.clone())?;
        }
        self.publish(ModelEvent::ValueChanged {
            path: route.to_path(),
            value,
        });
        Ok(true)
    }

    /// Copy of the record at `path`, or a fresh pristine one.
    pub(crate) fn entry(&self, path: &str) -> Entry {
        self.inner
            .records
            .lock()
            .entries
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Mutate the record at `path`, creating it if needed.
    pub(crate) fn update<R>(&self, path: &str, f: impl FnOnce(&mut Entry) -> R) -> R {
        let mut records = self.inner.records.lock();
        f(records.entries.entry(path.to_string()).or_default())
    }

    /// Mutate the record at `path` on behalf of run `val_lock`.
    ///
    /// Returns `None`, touching nothing, when a newer run has evicted a
    /// scope covering `path`.
    pub(crate) fn update_for<R>(
        &self,
        path: &str,
        val_lock: u64,
        f: impl FnOnce(&mut Entry) -> R,
    ) -> Option<R> {
        let mut records = self.inner.records.lock();
        if records.superseded(path, val_lock) {
            return None;
        }
        Some(f(records.entries.entry(path.to_string()).or_default()))
    }

    /// Commit `state` at `path` unless a newer run already wrote there, or
    /// already evicted a scope covering it.
    pub(crate) fn commit(&self, path: &str, state: State) -> bool {
        let committed = self
            .update_for(path, state.val_lock, |entry| {
                if entry.state.val_lock > state.val_lock {
                    return false;
                }
                entry.state = state.clone();
                true
            })
            .unwrap_or(false);
        if committed {
            self.publish(ModelEvent::StateChanged {
                path: path.to_string(),
                state,
            });
        } else {
            tracing::trace!(path, val_lock = state.val_lock, "dropped stale commit");
        }
        committed
    }

    /// Restore `previous` at `path` if the run stamped `val_lock` still owns it.
    pub(crate) fn roll_back(&self, path: &str, val_lock: u64, previous: State) {
        if let Some(entry) = self.inner.records.lock().entries.get_mut(path) {
            if entry.state.val_lock == val_lock {
                entry.state = previous;
            }
        }
    }

    /// Records at or under `path`, in path order.
    pub(crate) fn entries_under(&self, path: &str) -> Vec<(String, Entry)> {
        self.inner
            .records
            .lock()
            .entries
            .iter()
            .filter(|(p, _)| is_at_or_under(p, path))
            .map(|(p, e)| (p.clone(), e.clone()))
            .collect()
    }

    /// Evict on behalf of run `val_lock`: drop every record under `scopes`
    /// that `keep` rejects, unless a newer run wrote it.
    pub(crate) fn evict(
        &self,
        val_lock: u64,
        scopes: &[String],
        mut keep: impl FnMut(&str) -> bool,
    ) {
        let mut records = self.inner.records.lock();
        let before = records.entries.len();
        records.entries.retain(|path, entry| {
            entry.state.val_lock > val_lock
                || keep(path)
                || !scopes.iter().any(|scope| is_at_or_under(path, scope))
        });
        for scope in scopes {
            let lock = records.evicted.entry(scope.clone()).or_default();
            *lock = (*lock).max(val_lock);
        }
        tracing::trace!(val_lock, evicted = before - records.entries.len(), "evicted records");
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("rule", &self.inner.rule.location())
            .field("cached", &self.inner.records.lock().entries.len())
            .finish_non_exhaustive()
    }
}
