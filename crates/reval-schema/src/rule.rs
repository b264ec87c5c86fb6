//! # Compiled Rules
//!
//! A [`Rule`] is the compiled form of one schema node: an ordered list of
//! keyword [`Check`]s (the implicit annotation check first), plus the
//! node-local message overrides.
//!
//! Every check returns a [`RuleFuture`], whether or not the keyword needs to
//! suspend. Synchronous keywords resolve immediately; there is one
//! execution path for both.
//!
//! Rules never touch storage directly. They read and write through a
//! [`Cursor`], which pairs a route with a [`Host`]. The host decides what a
//! write means (real storage, or a scratch copy during probing) and what
//! visiting a child path means (scope classification and state commit in
//! the orchestrator, plain evaluation elsewhere).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reval_core::{Route, Segment};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuleError;
use crate::outcome::{merge_results, Outcome};
use crate::probe::ScratchHost;

/// Uniform result-or-future returned by every rule.
pub type RuleFuture = BoxFuture<'static, Result<Outcome, RuleError>>;

/// Body of a keyword check.
pub type CheckFn = dyn Fn(Cursor) -> RuleFuture + Send + Sync;

/// How much of a rule runs for the current reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every keyword check runs.
    Full,
    /// Only compound checks run, to reach descendants; outputs are discarded.
    Structural,
}

/// Caller-level message overrides, keyed by keyword name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    /// Error text per keyword.
    pub errors: HashMap<String, String>,
    /// Warning text per keyword.
    pub warnings: HashMap<String, String>,
}

/// Options visible to every check during one evaluation.
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// Let `type` convert values into the declared type.
    pub coerce_types: bool,
    /// Let `additionalProperties: false` delete unknown keys instead of failing.
    pub remove_additional: bool,
    /// Caller-level message overrides.
    pub messages: Messages,
}

/// Executor-side services a rule runs against.
pub trait Host: Send + Sync {
    /// Value at `route`, `None` when undefined.
    fn get(&self, route: &Route) -> Option<Value>;

    /// Write (or with `None`, remove) the value at `route`.
    fn set(&self, route: &Route, value: Option<Value>) -> Result<(), RuleError>;

    /// Evaluate `rule` for the child reference at `cursor`.
    ///
    /// `hint` carries flags the parent contributes to the child's outcome
    /// (e.g. `required` from the parent's `required` list).
    fn visit(&self, cursor: Cursor, rule: Rule, hint: Outcome) -> RuleFuture;
}

/// A route paired with the host that serves it.
#[derive(Clone)]
pub struct Cursor {
    host: Arc<dyn Host>,
    route: Route,
    mode: Mode,
    options: Arc<EvalOptions>,
}

impl Cursor {
    /// Create a full-mode cursor.
    pub fn new(host: Arc<dyn Host>, route: Route, options: Arc<EvalOptions>) -> Self {
        Self {
            host,
            route,
            mode: Mode::Full,
            options,
        }
    }

    /// Route of the current reference.
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Canonical path of the current reference.
    pub fn path(&self) -> String {
        self.route.to_path()
    }

    /// Current execution mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Evaluation options.
    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    /// The host serving this cursor.
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Same cursor in another mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Same route and options served by another host, in full mode.
    pub fn with_host(&self, host: Arc<dyn Host>) -> Self {
        Self {
            host,
            route: self.route.clone(),
            mode: Mode::Full,
            options: self.options.clone(),
        }
    }

    /// Cursor for a child segment, in full mode. The host picks the child's mode.
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        Self {
            host: self.host.clone(),
            route: self.route.child(segment),
            mode: Mode::Full,
            options: self.options.clone(),
        }
    }

    /// Value of the current reference.
    pub fn value(&self) -> Option<Value> {
        self.host.get(&self.route)
    }

    /// Value at a path relative to the current reference.
    pub fn value_at(&self, relative: &str) -> Option<Value> {
        self.host.get(&Route::resolve(&self.route, relative))
    }

    /// Overwrite the value of the current reference.
    pub fn set_value(&self, value: Option<Value>) -> Result<(), RuleError> {
        self.host.set(&self.route, value)
    }

    /// Overwrite the value at a path relative to the current reference.
    pub fn set_value_at(&self, relative: &str, value: Option<Value>) -> Result<(), RuleError> {
        self.host.set(&Route::resolve(&self.route, relative), value)
    }

    /// Visit a child reference with `rule`.
    pub fn visit(&self, segment: impl Into<Segment>, rule: &Rule) -> RuleFuture {
        self.visit_with(segment, rule, Outcome::none())
    }

    /// Visit a child reference with `rule` and a parent-supplied hint.
    pub fn visit_with(&self, segment: impl Into<Segment>, rule: &Rule, hint: Outcome) -> RuleFuture {
        self.host.visit(self.child(segment), rule.clone(), hint)
    }

    /// Evaluate `rule` against a scratch copy of this subtree.
    ///
    /// Nothing the rule does is visible outside the returned outcome: writes
    /// land in the scratch copy and child visits commit nothing.
    pub fn probe(&self, rule: &Rule) -> RuleFuture {
        let scratch = ScratchHost::over(self.host.clone(), self.route.clone(), self.value());
        rule.evaluate(self.with_host(Arc::new(scratch)))
    }

    /// Build a [`RuleError::Failed`] for the current path.
    pub fn failure(&self, keyword: &str, reason: impl Into<String>) -> RuleError {
        RuleError::Failed {
            keyword: keyword.to_string(),
            path: self.path(),
            reason: reason.into(),
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("route", &self.route)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// One compiled keyword of a schema node.
#[derive(Clone)]
pub struct Check {
    keyword: String,
    compound: bool,
    run: Arc<CheckFn>,
}

impl Check {
    /// A check that inspects only its own reference.
    pub fn leaf<F>(run: F) -> Self
    where
        F: Fn(Cursor) -> RuleFuture + Send + Sync + 'static,
    {
        Self {
            keyword: String::new(),
            compound: false,
            run: Arc::new(run),
        }
    }

    /// A check that visits or evaluates child rules. Compound checks keep
    /// running in [`Mode::Structural`].
    pub fn compound<F>(run: F) -> Self
    where
        F: Fn(Cursor) -> RuleFuture + Send + Sync + 'static,
    {
        Self {
            compound: true,
            ..Self::leaf(run)
        }
    }

    /// A synchronous leaf check, resolved immediately.
    pub fn sync<F>(run: F) -> Self
    where
        F: Fn(&Cursor) -> Result<Outcome, RuleError> + Send + Sync + 'static,
    {
        Self::leaf(move |cursor| futures_util::future::ready(run(&cursor)).boxed())
    }

    /// A synchronous check on the current value. Undefined values are not
    /// applicable and skip `run`.
    pub fn on_value<F>(run: F) -> Self
    where
        F: Fn(&Value, &Cursor) -> Outcome + Send + Sync + 'static,
    {
        Self::sync(move |cursor| {
            Ok(match cursor.value() {
                Some(value) => run(&value, cursor),
                None => Outcome::none(),
            })
        })
    }

    pub(crate) fn tagged(mut self, keyword: &str) -> Self {
        self.keyword = keyword.to_string();
        self
    }

    /// Keyword that produced this check.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Whether this check holds child rules.
    pub fn is_compound(&self) -> bool {
        self.compound
    }

    /// Run the check.
    pub fn run(&self, cursor: Cursor) -> RuleFuture {
        (self.run)(cursor)
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("keyword", &self.keyword)
            .field("compound", &self.compound)
            .finish_non_exhaustive()
    }
}

/// Node-local message overrides.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeMessages {
    pub error: Option<String>,
    pub warning: Option<String>,
    pub errors: HashMap<String, String>,
    pub warnings: HashMap<String, String>,
}

#[derive(Debug)]
pub(crate) struct RuleNode {
    pub location: String,
    pub checks: Vec<Check>,
    pub messages: NodeMessages,
    pub depends_on: Vec<String>,
    pub declares_dependents: bool,
}

/// Compiled schema node.
#[derive(Clone, Debug)]
pub struct Rule(Arc<RuleNode>);

impl Rule {
    pub(crate) fn new(node: RuleNode) -> Self {
        Self(Arc::new(node))
    }

    /// JSON pointer of the schema node this rule was compiled from.
    pub fn location(&self) -> &str {
        &self.0.location
    }

    /// Keywords of this node, in execution order.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.0.checks.iter().map(|c| c.keyword())
    }

    /// Raw `dependsOn` paths declared by this node.
    pub fn depends_on(&self) -> &[String] {
        &self.0.depends_on
    }

    /// Whether this node or any node below it declares `dependsOn`.
    pub fn declares_dependents(&self) -> bool {
        self.0.declares_dependents
    }

    /// Run every applicable check in declaration order, awaiting each before
    /// the next, then fold the outputs and resolve the message text.
    pub fn evaluate(&self, cursor: Cursor) -> RuleFuture {
        let node = self.0.clone();
        async move {
            let mut results = Vec::with_capacity(node.checks.len());
            for check in &node.checks {
                if cursor.mode() == Mode::Structural && !check.is_compound() {
                    continue;
                }
                let mut outcome = check.run(cursor.clone()).await?;
                if outcome.keyword.is_none() && !check.keyword().is_empty() {
                    outcome.keyword = Some(check.keyword().to_string());
                }
                results.push(outcome);
            }
            let mut merged = merge_results(results);
            resolve_message(&node.messages, &cursor.options().messages, &mut merged);
            Ok(merged)
        }
        .boxed()
    }
}

/// Apply message precedence: inline > schema map > caller map > keyword default.
fn resolve_message(node: &NodeMessages, caller: &Messages, outcome: &mut Outcome) {
    let keyword = outcome.keyword.as_deref();
    let lookup = |map: &HashMap<String, String>| keyword.and_then(|k| map.get(k)).cloned();

    let text = match outcome.valid {
        Some(false) => node
            .error
            .clone()
            .or_else(|| lookup(&node.errors))
            .or_else(|| lookup(&caller.errors)),
        Some(true) if outcome.message.is_some() => node
            .warning
            .clone()
            .or_else(|| lookup(&node.warnings))
            .or_else(|| lookup(&caller.warnings)),
        _ => None,
    };
    if text.is_some() {
        outcome.message = text;
    }
}
