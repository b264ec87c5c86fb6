//! # Scratch Evaluation
//!
//! [`ScratchHost`] serves a private copy of one subtree. Conditional
//! keywords (`anyOf`, `oneOf`, `not`, `if`) use it to test a branch without
//! mutating the real tree or committing any state; [`evaluate_detached`]
//! uses it to run a rule against a standalone value.

use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use reval_core::{Route, Storage};
use serde_json::Value;

use crate::error::RuleError;
use crate::outcome::{merge_results, Outcome};
use crate::rule::{Cursor, EvalOptions, Host, Mode, Rule, RuleFuture};

/// Host over a scratch copy of the subtree rooted at `base`.
///
/// Reads outside the subtree fall through to the outer host (if any);
/// writes outside it are dropped. Child visits evaluate in full mode and
/// commit nothing.
pub struct ScratchHost {
    outer: Option<Arc<dyn Host>>,
    base: Route,
    scratch: Mutex<Storage>,
}

impl ScratchHost {
    /// Scratch copy of `value`, mounted at `base`, reading through to `outer`.
    pub fn over(outer: Arc<dyn Host>, base: Route, value: Option<Value>) -> Self {
        Self {
            outer: Some(outer),
            base,
            scratch: Mutex::new(Storage::new(value)),
        }
    }

    /// Standalone scratch storage mounted at the root.
    pub fn detached(value: Option<Value>) -> Self {
        Self {
            outer: None,
            base: Route::root(),
            scratch: Mutex::new(Storage::new(value)),
        }
    }

    /// Current content of the scratch copy.
    pub fn snapshot(&self) -> Option<Value> {
        self.scratch.lock().root().cloned()
    }
}

impl Host for ScratchHost {
    fn get(&self, route: &Route) -> Option<Value> {
        match route.strip_prefix(&self.base) {
            Some(rel) => self.scratch.lock().get(&rel).cloned(),
            None => self.outer.as_ref().and_then(|outer| outer.get(route)),
        }
    }

    fn set(&self, route: &Route, value: Option<Value>) -> Result<(), RuleError> {
        if let Some(rel) = route.strip_prefix(&self.base) {
            self.scratch.lock().set(&rel, value)?;
        }
        Ok(())
    }

    fn visit(&self, cursor: Cursor, rule: Rule, hint: Outcome) -> RuleFuture {
        async move {
            let outcome = rule.evaluate(cursor.with_mode(Mode::Full)).await?;
            Ok(merge_results([hint, outcome]))
        }
        .boxed()
    }
}

/// Evaluate `rule` against a standalone value.
///
/// Returns the root outcome and the value as left by the rule's mutations
/// (defaults, filters, coercion). No per-path state is kept.
pub async fn evaluate_detached(
    rule: &Rule,
    value: Option<Value>,
    options: EvalOptions,
) -> Result<(Outcome, Option<Value>), RuleError> {
    let host = Arc::new(ScratchHost::detached(value));
    let cursor = Cursor::new(host.clone(), Route::root(), Arc::new(options));
    let outcome = rule.evaluate(cursor).await?;
    Ok((outcome, host.snapshot()))
}
