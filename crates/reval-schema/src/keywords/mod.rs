//! # Built-in Keywords
//!
//! The default catalogue registered by [`Registry::with_builtins`]. Each
//! keyword is a small [`Keyword`](crate::Keyword) implementation; custom
//! keywords plug in the same way through [`Registry::register`].

use serde_json::Value;

use crate::compiler::{Registry, Site};
use crate::error::CompileError;
use crate::rule::Rule;

pub mod array;
pub mod combinators;
pub mod numeric;
pub mod object;
pub mod string;
pub mod types;

/// Register every built-in keyword.
pub fn register_all(registry: &mut Registry) {
    registry.register(types::Type);
    registry.register(types::Enum);
    registry.register(types::Const);

    for bound in numeric::BOUNDS {
        registry.register(bound);
    }

    registry.register(string::MIN_LENGTH);
    registry.register(string::MAX_LENGTH);
    registry.register(string::Pattern);

    registry.register(array::MIN_ITEMS);
    registry.register(array::MAX_ITEMS);
    registry.register(array::UniqueItems);
    registry.register(array::Items);

    registry.register(object::Properties);
    registry.register(object::Required);
    registry.register(object::AdditionalProperties);

    registry.register(combinators::AllOf);
    registry.register(combinators::AnyOf);
    registry.register(combinators::OneOf);
    registry.register(combinators::Not);
    registry.register(combinators::If);
}

/// Parse a non-negative integer payload.
pub(crate) fn count(site: &Site<'_>, payload: &Value) -> Result<usize, CompileError> {
    payload
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| site.invalid("a non-negative integer"))
}

/// Compile a non-empty array of schemas.
pub(crate) fn schema_list(site: &Site<'_>, payload: &Value) -> Result<Vec<Rule>, CompileError> {
    match payload {
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .enumerate()
            .map(|(i, schema)| site.compile(schema, &i.to_string()))
            .collect(),
        _ => Err(site.invalid("a non-empty array of schemas")),
    }
}
