//! `minItems`, `maxItems`, `uniqueItems` and `items`.

use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;

use crate::compiler::{Keyword, Site};
use crate::error::CompileError;
use crate::keywords::count;
use crate::outcome::Outcome;
use crate::rule::{Check, Rule};

/// A bound on array length.
#[derive(Clone, Copy)]
pub struct ItemCount {
    name: &'static str,
    at_least: bool,
}

/// `minItems`.
pub const MIN_ITEMS: ItemCount = ItemCount {
    name: "minItems",
    at_least: true,
};

/// `maxItems`.
pub const MAX_ITEMS: ItemCount = ItemCount {
    name: "maxItems",
    at_least: false,
};

impl Keyword for ItemCount {
    fn name(&self) -> &str {
        self.name
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let limit = count(site, payload)?;
        let ItemCount { name, at_least } = *self;
        Ok(Check::on_value(move |value, _| {
            let outcome = match value.as_array() {
                Some(items) if at_least => Outcome::check(items.len() >= limit, || {
                    format!("must contain at least {limit} items")
                }),
                Some(items) => Outcome::check(items.len() <= limit, || {
                    format!("must contain at most {limit} items")
                }),
                None => Outcome::fail("must be an array"),
            };
            outcome.with_meta(name, limit)
        }))
    }
}

/// `uniqueItems`: no two elements may be equal.
pub struct UniqueItems;

impl Keyword for UniqueItems {
    fn name(&self) -> &str {
        "uniqueItems"
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let enabled = payload.as_bool().ok_or_else(|| site.invalid("a boolean"))?;
        Ok(Check::on_value(move |value, _| {
            let Some(items) = value.as_array().filter(|_| enabled) else {
                return Outcome::none();
            };
            let duplicate = items
                .iter()
                .enumerate()
                .any(|(i, a)| items[i + 1..].iter().any(|b| a == b));
            Outcome::check(!duplicate, || "must not contain duplicate items".to_string())
        }))
    }
}

enum Shape {
    Each(Rule),
    Tuple(Vec<Rule>),
}

/// `items`: one schema for every element, or one schema per position.
///
/// Each element is visited as its own reference.
pub struct Items;

impl Keyword for Items {
    fn name(&self) -> &str {
        "items"
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let shape = match payload {
            Value::Array(schemas) => Shape::Tuple(
                schemas
                    .iter()
                    .enumerate()
                    .map(|(i, s)| site.compile(s, &i.to_string()))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(_) | Value::Bool(_) => Shape::Each(site.compile(payload, "")?),
            _ => return Err(site.invalid("a schema or an array of schemas")),
        };
        let shape = Arc::new(shape);

        Ok(Check::compound(move |cursor| {
            let shape = shape.clone();
            async move {
                let Some(Value::Array(items)) = cursor.value() else {
                    return Ok(Outcome::none());
                };
                let mut ok = true;
                for i in 0..items.len() {
                    let rule = match shape.as_ref() {
                        Shape::Each(rule) => rule,
                        Shape::Tuple(rules) => match rules.get(i) {
                            Some(rule) => rule,
                            None => break,
                        },
                    };
                    ok &= cursor.visit(i, rule).await?.passes();
                }
                Ok(Outcome::check(ok, || "contains invalid items".to_string()))
            }
            .boxed()
        }))
    }
}
