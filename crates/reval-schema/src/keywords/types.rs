//! `type`, `enum` and `const`.

use serde_json::{Number, Value};

use crate::compiler::{Keyword, Site};
use crate::error::CompileError;
use crate::outcome::Outcome;
use crate::rule::Check;

const TYPE_NAMES: &[&str] = &[
    "null", "boolean", "object", "array", "number", "integer", "string",
];

/// `type`: the value's JSON type must be one of the listed names.
///
/// With `coerce_types` a mismatching value is converted into the first
/// listed type that accepts it, and the converted value is written back.
pub struct Type;

impl Keyword for Type {
    fn name(&self) -> &str {
        "type"
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let names: Vec<String> = match payload {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| site.invalid("a type name or an array of type names"))?,
            _ => return Err(site.invalid("a type name or an array of type names")),
        };
        if names.is_empty() || names.iter().any(|n| !TYPE_NAMES.contains(&n.as_str())) {
            return Err(site.invalid(&format!("type names among {}", TYPE_NAMES.join(", "))));
        }

        Ok(Check::sync(move |cursor| {
            let Some(value) = cursor.value() else {
                return Ok(Outcome::none());
            };
            if names.iter().any(|n| is_type(n, &value)) {
                return Ok(Outcome::pass());
            }
            if cursor.options().coerce_types {
                if let Some(coerced) = names.iter().find_map(|n| coerce(n, &value)) {
                    cursor.set_value(Some(coerced))?;
                    return Ok(Outcome::pass());
                }
            }
            Ok(Outcome::fail(format!("must be of type {}", names.join(" or "))))
        }))
    }
}

fn is_type(name: &str, value: &Value) -> bool {
    match name {
        "null" => value.is_null(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

fn coerce(name: &str, value: &Value) -> Option<Value> {
    match (name, value) {
        ("integer", Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        ("integer", Value::Bool(b)) => Some(Value::from(i64::from(*b))),
        ("number", Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .map(Value::from)
                .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number))
        }
        ("number", Value::Bool(b)) => Some(Value::from(i64::from(*b))),
        ("boolean", Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 0.0 => Some(Value::Bool(false)),
            Some(f) if f == 1.0 => Some(Value::Bool(true)),
            _ => None,
        },
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
        ("null", Value::String(s)) if s.is_empty() => Some(Value::Null),
        ("array", other) if !other.is_array() => Some(Value::Array(vec![other.clone()])),
        _ => None,
    }
}

/// `enum`: the value must equal one of the listed values.
pub struct Enum;

impl Keyword for Enum {
    fn name(&self) -> &str {
        "enum"
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let Value::Array(allowed) = payload else {
            return Err(site.invalid("an array of values"));
        };
        let allowed = allowed.clone();
        Ok(Check::on_value(move |value, _| {
            Outcome::check(allowed.contains(value), || {
                let listed: Vec<String> = allowed.iter().map(Value::to_string).collect();
                format!("must be one of {}", listed.join(", "))
            })
            .with_meta("enum", allowed.clone())
        }))
    }
}

/// `const`: the value must equal the payload.
pub struct Const;

impl Keyword for Const {
    fn name(&self) -> &str {
        "const"
    }

    fn compile(&self, _site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let expected = payload.clone();
        Ok(Check::on_value(move |value, _| {
            Outcome::check(*value == expected, || format!("must equal {expected}"))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_accepts_whole_floats() {
        assert!(is_type("integer", &json!(3)));
        assert!(is_type("integer", &json!(3.0)));
        assert!(!is_type("integer", &json!(3.5)));
    }

    #[test]
    fn coercion_table() {
        assert_eq!(coerce("integer", &json!(" 42 ")), Some(json!(42)));
        assert_eq!(coerce("number", &json!("1.5")), Some(json!(1.5)));
        assert_eq!(coerce("number", &json!("abc")), None);
        assert_eq!(coerce("boolean", &json!("TRUE")), Some(json!(true)));
        assert_eq!(coerce("boolean", &json!(2)), None);
        assert_eq!(coerce("string", &json!(7)), Some(json!("7")));
        assert_eq!(coerce("array", &json!("x")), Some(json!(["x"])));
        assert_eq!(coerce("object", &json!("x")), None);
    }
}
