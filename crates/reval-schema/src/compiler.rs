//! # Rule Compiler
//!
//! Turns a schema (a `serde_json::Value`) into a [`Rule`] tree.
//!
//! For each schema node the compiler emits:
//!
//! 1. An implicit **annotation check** that applies `default` (only when the
//!    stored value is undefined) and `filter` (whenever the value is
//!    defined), and reports `title`, `description`, `readOnly`, `writeOnly`,
//!    `dependencies` and `dependsOn` as a constant outcome.
//! 2. One [`Check`] per remaining key, compiled by the [`Keyword`]
//!    registered under that name. Keyword compilers recurse through
//!    [`Site::compile`] for nested schemas.
//!
//! Any malformed payload or unregistered key aborts the whole compilation.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use reval_core::storage::type_name;

use crate::error::CompileError;
use crate::outcome::Outcome;
use crate::rule::{Check, NodeMessages, Rule, RuleNode};

/// Keys handled by the compiler itself rather than by a keyword.
pub const ANNOTATION_KEYS: &[&str] = &[
    "title",
    "description",
    "default",
    "filter",
    "readOnly",
    "writeOnly",
    "error",
    "errors",
    "warning",
    "warnings",
    "dependencies",
    "dependsOn",
];

/// A named constraint type.
pub trait Keyword: Send + Sync {
    /// Schema key this keyword is registered under.
    fn name(&self) -> &str;

    /// Sibling keys this keyword owns (e.g. `if` owns `then` and `else`).
    fn reserves(&self) -> &[&'static str] {
        &[]
    }

    /// Compile `payload` into a check.
    fn compile(&self, site: &Site<'_>, payload: &Value) -> Result<Check, CompileError>;
}

/// A value transform usable from the `filter` annotation.
pub type Filter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Name-keyed tables of keywords and filters.
#[derive(Clone, Default)]
pub struct Registry {
    keywords: HashMap<String, Arc<dyn Keyword>>,
    filters: HashMap<String, Filter>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in keywords and filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::keywords::register_all(&mut registry);
        registry.register_filter("trim", |v| match v {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        });
        registry.register_filter("lowercase", |v| match v {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        });
        registry.register_filter("uppercase", |v| match v {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        });
        registry
    }

    /// Register a keyword, replacing any earlier one of the same name.
    pub fn register(&mut self, keyword: impl Keyword + 'static) {
        self.keywords
            .insert(keyword.name().to_string(), Arc::new(keyword));
    }

    /// Register a filter, replacing any earlier one of the same name.
    pub fn register_filter<F>(&mut self, name: &str, filter: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.filters.insert(name.to_string(), Arc::new(filter));
    }

    /// Whether a keyword is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.keywords.contains_key(name)
    }

    /// Registered keyword names, sorted.
    pub fn keyword_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.keywords.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn keyword(&self, name: &str) -> Option<&Arc<dyn Keyword>> {
        self.keywords.get(name)
    }

    fn filter(&self, name: &str) -> Option<&Filter> {
        self.filters.get(name)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("keywords", &self.keyword_names())
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Compiles schemas against a [`Registry`].
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Arc<Registry>,
}

impl Compiler {
    /// Compiler over `registry`.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Compiler over the built-in registry.
    pub fn with_builtins() -> Self {
        Self::new(Registry::with_builtins())
    }

    /// The registry in use.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Compile a root schema.
    ///
    /// # Errors
    ///
    /// Returns the first [`CompileError`] met anywhere in the tree.
    pub fn compile(&self, schema: &Value) -> Result<Rule, CompileError> {
        let rule = self.compile_at(schema, "#")?;
        tracing::debug!(keywords = ?rule.keywords().collect::<Vec<_>>(), "compiled root schema");
        Ok(rule)
    }

    fn compile_at(&self, schema: &Value, location: &str) -> Result<Rule, CompileError> {
        let empty = Map::new();
        let map = match schema {
            Value::Object(map) => map,
            Value::Bool(true) => &empty,
            Value::Bool(false) => return Ok(never(location)),
            other => {
                return Err(CompileError::InvalidSchema {
                    location: location.to_string(),
                    found: type_name(other),
                })
            }
        };

        let annotations = Annotations::parse(self, map, location)?;

        let mut reserved: HashSet<&str> = ANNOTATION_KEYS.iter().copied().collect();
        for key in map.keys() {
            if let Some(keyword) = self.registry.keyword(key) {
                reserved.extend(keyword.reserves().iter().copied());
            }
        }

        let children_depend = Cell::new(false);
        let mut checks = vec![annotations.check()];
        for (key, payload) in map {
            if reserved.contains(key.as_str()) {
                continue;
            }
            let keyword = self.registry.keyword(key).ok_or_else(|| {
                CompileError::UnknownKeyword {
                    keyword: key.clone(),
                    location: location.to_string(),
                }
            })?;
            let site = Site {
                compiler: self,
                parent: map,
                location: format!("{location}/{}", escape(key)),
                keyword: key,
                children_depend: &children_depend,
            };
            checks.push(keyword.compile(&site, payload)?.tagged(key));
        }

        let declares_dependents = !annotations.depends_on.is_empty() || children_depend.get();
        Ok(Rule::new(RuleNode {
            location: location.to_string(),
            checks,
            messages: annotations.messages,
            depends_on: annotations.depends_on,
            declares_dependents,
        }))
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Compilation context handed to a [`Keyword`].
pub struct Site<'a> {
    compiler: &'a Compiler,
    parent: &'a Map<String, Value>,
    location: String,
    keyword: &'a str,
    children_depend: &'a Cell<bool>,
}

impl Site<'_> {
    /// The schema node holding the keyword.
    pub fn parent(&self) -> &Map<String, Value> {
        self.parent
    }

    /// JSON pointer of the keyword payload.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Compile a nested schema found at `relative` below the payload.
    pub fn compile(&self, schema: &Value, relative: &str) -> Result<Rule, CompileError> {
        let location = if relative.is_empty() {
            self.location.clone()
        } else {
            format!("{}/{relative}", self.location)
        };
        self.compile_located(schema, location)
    }

    /// Compile a sibling schema (a key reserved by this keyword).
    pub fn compile_sibling(&self, key: &str) -> Result<Option<Rule>, CompileError> {
        let Some(schema) = self.parent.get(key) else {
            return Ok(None);
        };
        let location = match self.location.rsplit_once('/') {
            Some((node, _)) => format!("{node}/{}", escape(key)),
            None => escape(key),
        };
        self.compile_located(schema, location).map(Some)
    }

    fn compile_located(&self, schema: &Value, location: String) -> Result<Rule, CompileError> {
        let rule = self.compiler.compile_at(schema, &location)?;
        if rule.declares_dependents() {
            self.children_depend.set(true);
        }
        Ok(rule)
    }

    /// A payload-shape error for this keyword.
    pub fn invalid(&self, expected: &str) -> CompileError {
        CompileError::InvalidPayload {
            keyword: self.keyword.to_string(),
            location: self.location.clone(),
            expected: expected.to_string(),
        }
    }
}

/// Parsed annotation keys of one schema node.
struct Annotations {
    default: Option<Value>,
    filters: Vec<Filter>,
    constant: Outcome,
    depends_on: Vec<String>,
    messages: NodeMessages,
}

impl Annotations {
    fn parse(
        compiler: &Compiler,
        map: &Map<String, Value>,
        location: &str,
    ) -> Result<Self, CompileError> {
        let invalid = |key: &str, expected: &str| CompileError::InvalidPayload {
            keyword: key.to_string(),
            location: format!("{location}/{key}"),
            expected: expected.to_string(),
        };
        let string = |key: &str| -> Result<Option<String>, CompileError> {
            match map.get(key) {
                None => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(invalid(key, "a string")),
            }
        };
        let flag = |key: &str| -> Result<bool, CompileError> {
            match map.get(key) {
                None => Ok(false),
                Some(Value::Bool(b)) => Ok(*b),
                Some(_) => Err(invalid(key, "a boolean")),
            }
        };
        let strings = |key: &str| -> Result<Vec<String>, CompileError> {
            match map.get(key) {
                None => Ok(Vec::new()),
                Some(Value::String(s)) => Ok(vec![s.clone()]),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| invalid(key, "a string or an array of strings")),
                Some(_) => Err(invalid(key, "a string or an array of strings")),
            }
        };
        let text_map = |key: &str| -> Result<HashMap<String, String>, CompileError> {
            match map.get(key) {
                None => Ok(HashMap::new()),
                Some(Value::Object(entries)) => entries
                    .iter()
                    .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect::<Option<HashMap<_, _>>>()
                    .ok_or_else(|| invalid(key, "an object of strings")),
                Some(_) => Err(invalid(key, "an object of strings")),
            }
        };

        let mut filters = Vec::new();
        for name in strings("filter")? {
            let filter = compiler.registry.filter(&name).ok_or_else(|| {
                CompileError::UnknownFilter {
                    filter: name.clone(),
                    location: format!("{location}/filter"),
                }
            })?;
            filters.push(filter.clone());
        }

        let depends_on = strings("dependsOn")?;
        let dependencies = strings("dependencies")?;

        let mut constant = Outcome {
            read_only: flag("readOnly")?,
            write_only: flag("writeOnly")?,
            depends_on: depends_on.clone(),
            ..Outcome::none()
        };
        if let Some(title) = string("title")? {
            constant = constant.with_meta("title", title);
        }
        if let Some(description) = string("description")? {
            constant = constant.with_meta("description", description);
        }
        if !dependencies.is_empty() {
            constant = constant.with_meta("dependencies", dependencies);
        }

        Ok(Self {
            default: map.get("default").cloned(),
            filters,
            constant,
            depends_on,
            messages: NodeMessages {
                error: string("error")?,
                warning: string("warning")?,
                errors: text_map("errors")?,
                warnings: text_map("warnings")?,
            },
        })
    }

    fn check(&self) -> Check {
        let default = self.default.clone();
        let filters = self.filters.clone();
        let constant = self.constant.clone();
        Check::sync(move |cursor| {
            let stored = cursor.value();
            let mut value = stored.clone().or_else(|| default.clone());
            if let Some(current) = value.take() {
                value = Some(filters.iter().fold(current, |v, filter| filter(v)));
            }
            if value != stored {
                cursor.set_value(value)?;
            }
            Ok(constant.clone())
        })
        .tagged("annotations")
    }
}

fn never(location: &str) -> Rule {
    let check = Check::sync(|_| Ok(Outcome::fail("no value is allowed here"))).tagged("false");
    Rule::new(RuleNode {
        location: location.to_string(),
        checks: vec![check],
        messages: NodeMessages::default(),
        depends_on: Vec::new(),
        declares_dependents: false,
    })
}

/// Escape a key for use as a JSON pointer token.
pub(crate) fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
