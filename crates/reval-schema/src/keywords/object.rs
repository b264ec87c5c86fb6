//! `properties`, `required` and `additionalProperties`.

use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;

use crate::compiler::{escape, Keyword, Site};
use crate::error::CompileError;
use crate::outcome::Outcome;
use crate::rule::{Check, Rule};

struct Property {
    key: String,
    rule: Rule,
    required: bool,
}

/// `properties`: one schema per named child, visited in declaration order.
///
/// Children are visited even while the object itself is undefined, so that
/// their defaults can materialize it. Children named in the sibling
/// `required` array are flagged `required`.
pub struct Properties;

impl Keyword for Properties {
    fn name(&self) -> &str {
        "properties"
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let Value::Object(schemas) = payload else {
            return Err(site.invalid("an object of schemas"));
        };
        let required = required_names(site.parent().get("required"));
        let properties: Vec<Property> = schemas
            .iter()
            .map(|(key, schema)| {
                Ok(Property {
                    key: key.clone(),
                    rule: site.compile(schema, &escape(key))?,
                    required: required.contains(key),
                })
            })
            .collect::<Result<_, CompileError>>()?;
        let properties = Arc::new(properties);

        Ok(Check::compound(move |cursor| {
            let properties = properties.clone();
            async move {
                if !matches!(cursor.value(), None | Some(Value::Object(_))) {
                    return Ok(Outcome::none());
                }
                let mut ok = true;
                for property in properties.iter() {
                    let hint = Outcome {
                        required: property.required,
                        ..Outcome::none()
                    };
                    let child = cursor
                        .visit_with(property.key.as_str(), &property.rule, hint)
                        .await?;
                    ok &= child.passes();
                }
                Ok(Outcome::check(ok, || "contains invalid properties".to_string()))
            }
            .boxed()
        }))
    }
}

fn required_names(payload: Option<&Value>) -> Vec<String> {
    match payload {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// `required`, in two forms.
///
/// - An array of names: each named property must be present on the object.
/// - `true`: this value must be present. Undefined, `null` and blank strings
///   fail; surrounding whitespace is trimmed from a stored string.
pub struct Required;

impl Keyword for Required {
    fn name(&self) -> &str {
        "required"
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        match payload {
            Value::Bool(false) => Ok(Check::sync(|_| Ok(Outcome::none()))),
            Value::Bool(true) => Ok(Check::sync(|cursor| {
                let outcome = match cursor.value() {
                    None | Some(Value::Null) => Outcome::fail("is required"),
                    Some(Value::String(s)) => {
                        let trimmed = s.trim();
                        if trimmed.is_empty() {
                            Outcome::fail("is required")
                        } else {
                            if trimmed.len() != s.len() {
                                cursor.set_value(Some(Value::String(trimmed.to_string())))?;
                            }
                            Outcome::pass()
                        }
                    }
                    Some(_) => Outcome::pass(),
                };
                Ok(Outcome {
                    required: true,
                    ..outcome
                })
            })),
            Value::Array(items) if items.iter().all(Value::is_string) => {
                let names = required_names(Some(payload));
                Ok(Check::sync(move |cursor| {
                    let missing = match cursor.value() {
                        Some(Value::Object(map)) => {
                            names.iter().find(|name| !map.contains_key(name.as_str()))
                        }
                        _ => return Ok(Outcome::none()),
                    };
                    Ok(match missing {
                        Some(name) => Outcome::fail(format!("missing required property '{name}'")),
                        None => Outcome::pass(),
                    })
                }))
            }
            _ => Err(site.invalid("a boolean or an array of property names")),
        }
    }
}

/// `additionalProperties`: constrains keys not listed in sibling `properties`.
///
/// - `true`: no constraint.
/// - `false`: unknown keys fail, or are deleted when `remove_additional` is on.
/// - a schema: every unknown key is visited with it.
pub struct AdditionalProperties;

impl Keyword for AdditionalProperties {
    fn name(&self) -> &str {
        "additionalProperties"
    }

    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError> {
        let known: Arc<Vec<String>> = Arc::new(match site.parent().get("properties") {
            Some(Value::Object(props)) => props.keys().cloned().collect(),
            _ => Vec::new(),
        });

        match payload {
            Value::Bool(true) => Ok(Check::sync(|_| Ok(Outcome::none()))),
            Value::Bool(false) => Ok(Check::sync(move |cursor| {
                let Some(value) = cursor.value() else {
                    return Ok(Outcome::none());
                };
                let unexpected = extra_keys(&known, &value);
                if unexpected.is_empty() {
                    return Ok(Outcome::pass());
                }
                if cursor.options().remove_additional {
                    for key in &unexpected {
                        cursor.child(key.as_str()).set_value(None)?;
                    }
                    return Ok(Outcome::pass());
                }
                Ok(Outcome::fail(format!("unexpected property '{}'", unexpected[0])))
            })),
            Value::Object(_) => {
                let rule = site.compile(payload, "")?;
                Ok(Check::compound(move |cursor| {
                    let rule = rule.clone();
                    let known = known.clone();
                    async move {
                        let Some(value) = cursor.value() else {
                            return Ok(Outcome::none());
                        };
                        let mut ok = true;
                        for key in extra_keys(&known, &value) {
                            ok &= cursor.visit(key, &rule).await?.passes();
                        }
                        Ok(Outcome::check(ok, || "contains invalid properties".to_string()))
                    }
                    .boxed()
                }))
            }
            _ => Err(site.invalid("a boolean or a schema")),
        }
    }
}

fn extra_keys(known: &[String], value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map.keys().filter(|k| !known.contains(k)).cloned().collect(),
        _ => Vec::new(),
    }
}
