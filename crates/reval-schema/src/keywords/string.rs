//! `minLength`, `maxLength` and `pattern`.
//!
//! Lengths count Unicode scalar values. A defined value that is not a
//! string fails.

use regex::Regex;
use serde_json::Value;

use crate::compiler::{Keyword, Site};
use crate::error::CompileError;
use crate::keywords::count;
use crate::outcome::Outcome;
use crate::rule::Check;

/// A bound on string length.
#[derive(Clone, Copy)]
pub struct Length {
    name: &'static str,
    at_least: bool,
}

/// `minLength`.
pub const MIN_LENGTH: Length = Length {
    name: "minLength",
    at_least: true,
};

/// `maxLength`.
pub const MAX_LENGTH: Length = Length {
    name: "maxLength",
    at_least: false,
};

impl Keyword for Length {
    fn name(&self) -> &str {
        self.name
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let limit = count(site, payload)?;
        let Length { name, at_least } = *self;
        Ok(Check::on_value(move |value, _| {
            let outcome = match value.as_str() {
                Some(s) => {
                    let len = s.chars().count();
                    if at_least {
                        Outcome::check(len >= limit, || {
                            format!("must be at least {limit} characters long")
                        })
                    } else {
                        Outcome::check(len <= limit, || {
                            format!("must be at most {limit} characters long")
                        })
                    }
                }
                None => Outcome::fail("must be a string"),
            };
            outcome.with_meta(name, limit)
        }))
    }
}

/// `pattern`: the string must match the regular expression (unanchored).
pub struct Pattern;

impl Keyword for Pattern {
    fn name(&self) -> &str {
        "pattern"
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let source = payload.as_str().ok_or_else(|| site.invalid("a regular expression string"))?;
        let regex = Regex::new(source).map_err(|e| CompileError::InvalidPattern {
            location: site.location().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Check::on_value(move |value, _| {
            let outcome = match value.as_str() {
                Some(s) => Outcome::check(regex.is_match(s), || {
                    format!("must match pattern {}", regex.as_str())
                }),
                None => Outcome::fail("must be a string"),
            };
            outcome.with_meta("pattern", regex.as_str())
        }))
    }
}
