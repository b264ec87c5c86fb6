//! Numeric bounds: `minimum`, `maximum`, `exclusiveMinimum`,
//! `exclusiveMaximum`, `multipleOf`.
//!
//! A defined value that is not a number fails every bound.

use serde_json::Value;

use crate::compiler::{Keyword, Site};
use crate::error::CompileError;
use crate::outcome::Outcome;
use crate::rule::Check;

/// A numeric comparison against a fixed limit.
#[derive(Clone, Copy)]
pub struct Bound {
    name: &'static str,
    phrase: &'static str,
    holds: fn(f64, f64) -> bool,
}

/// Every numeric bound keyword.
pub const BOUNDS: [Bound; 5] = [
    Bound {
        name: "minimum",
        phrase: ">=",
        holds: at_least,
    },
    Bound {
        name: "maximum",
        phrase: "<=",
        holds: at_most,
    },
    Bound {
        name: "exclusiveMinimum",
        phrase: ">",
        holds: above,
    },
    Bound {
        name: "exclusiveMaximum",
        phrase: "<",
        holds: below,
    },
    Bound {
        name: "multipleOf",
        phrase: "a multiple of",
        holds: multiple_of,
    },
];

fn at_least(n: f64, limit: f64) -> bool {
    n >= limit
}

fn at_most(n: f64, limit: f64) -> bool {
    n <= limit
}

fn above(n: f64, limit: f64) -> bool {
    n > limit
}

fn below(n: f64, limit: f64) -> bool {
    n < limit
}

fn multiple_of(n: f64, limit: f64) -> bool {
    let ratio = n / limit;
    (ratio - ratio.round()).abs() < 1e-9
}

impl Keyword for Bound {
    fn name(&self) -> &str {
        self.name
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let limit = payload.as_f64().ok_or_else(|| site.invalid("a number"))?;
        if self.name == "multipleOf" && limit <= 0.0 {
            return Err(site.invalid("a positive number"));
        }
        let bound = *self;
        let shown = payload.clone();
        Ok(Check::on_value(move |value, _| {
            let outcome = match value.as_f64() {
                Some(n) => Outcome::check((bound.holds)(n, limit), || {
                    format!("must be {} {shown}", bound.phrase)
                }),
                None => Outcome::fail("must be a number"),
            };
            outcome.with_meta(bound.name, shown.clone())
        }))
    }
}
