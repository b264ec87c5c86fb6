//! `allOf`, `anyOf`, `oneOf`, `not` and `if`/`then`/`else`.
//!
//! `allOf` runs every branch against the real reference. The conditional
//! keywords first probe branches on a scratch copy (see
//! [`Cursor::probe`](crate::Cursor::probe)) and then run only the selected
//! branch for real, so references under a branch that was not taken are
//! never visited.

use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;

use crate::compiler::{Keyword, Site};
use crate::error::CompileError;
use crate::keywords::schema_list;
use crate::outcome::{merge_results, Outcome};
use crate::rule::Check;

/// `allOf`: every branch applies, folded like sibling keywords.
pub struct AllOf;

impl Keyword for AllOf {
    fn name(&self) -> &str {
        "allOf"
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let branches = Arc::new(schema_list(site, payload)?);
        Ok(Check::compound(move |cursor| {
            let branches = branches.clone();
            async move {
                let mut results = Vec::with_capacity(branches.len());
                for branch in branches.iter() {
                    results.push(branch.evaluate(cursor.clone()).await?);
                }
                Ok(merge_results(results))
            }
            .boxed()
        }))
    }
}

/// `anyOf`: the first branch that passes is applied.
pub struct AnyOf;

impl Keyword for AnyOf {
    fn name(&self) -> &str {
        "anyOf"
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let branches = Arc::new(schema_list(site, payload)?);
        Ok(Check::compound(move |cursor| {
            let branches = branches.clone();
            async move {
                for branch in branches.iter() {
                    if cursor.probe(branch).await?.passes() {
                        return branch.evaluate(cursor).await;
                    }
                }
                Ok(Outcome::fail("must match at least one allowed schema"))
            }
            .boxed()
        }))
    }
}

/// `oneOf`: exactly one branch may pass; that branch is applied.
pub struct OneOf;

impl Keyword for OneOf {
    fn name(&self) -> &str {
        "oneOf"
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let branches = Arc::new(schema_list(site, payload)?);
        Ok(Check::compound(move |cursor| {
            let branches = branches.clone();
            async move {
                let mut matched = Vec::new();
                for (i, branch) in branches.iter().enumerate() {
                    if cursor.probe(branch).await?.passes() {
                        matched.push(i);
                    }
                }
                match matched.as_slice() {
                    [only] => branches[*only].evaluate(cursor).await,
                    [] => Ok(Outcome::fail("must match exactly one schema, matched none")),
                    many => Ok(Outcome::fail(format!(
                        "must match exactly one schema, matched {}",
                        many.len()
                    ))),
                }
            }
            .boxed()
        }))
    }
}

/// `not`: the branch must fail. Only ever probed.
pub struct Not;

impl Keyword for Not {
    fn name(&self) -> &str {
        "not"
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let excluded = site.compile(payload, "")?;
        Ok(Check::leaf(move |cursor| {
            let excluded = excluded.clone();
            async move {
                let probed = cursor.probe(&excluded).await?;
                Ok(Outcome::check(!probed.passes(), || {
                    "must not match the excluded schema".to_string()
                }))
            }
            .boxed()
        }))
    }
}

/// `if`: probe the condition, then apply `then` or `else`.
pub struct If;

impl Keyword for If {
    fn name(&self) -> &str {
        "if"
    }

    fn reserves(&self) -> &[&'static str] {
        &["then", "else"]
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let condition = site.compile(payload, "")?;
        let then = site.compile_sibling("then")?;
        let otherwise = site.compile_sibling("else")?;
        Ok(Check::compound(move |cursor| {
            let condition = condition.clone();
            let branch = (then.clone(), otherwise.clone());
            async move {
                let taken = if cursor.probe(&condition).await?.passes() {
                    branch.0
                } else {
                    branch.1
                };
                match taken {
                    Some(rule) => rule.evaluate(cursor).await,
                    None => Ok(Outcome::none()),
                }
            }
            .boxed()
        }))
    }
}
