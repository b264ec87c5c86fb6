//! # Nested Storage
//!
//! [`Storage`] owns a mutable `serde_json::Value` tree and reads or writes
//! it by [`Route`]. "Undefined" is modelled as `Option::None`: a missing
//! key, an out-of-range index, or an uninitialized root.

use serde_json::{Map, Value};

use crate::error::PathError;
use crate::path::{Route, Segment};

/// Most `null` slots a single write may append to an array.
pub const MAX_PADDING: usize = 1 << 16;

/// Owner of a mutable data tree addressed by route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Storage {
    root: Option<Value>,
}

impl Storage {
    /// Create storage holding `root` (`None` for an undefined root).
    pub fn new(root: Option<Value>) -> Self {
        Self { root }
    }

    /// The whole tree.
    pub fn root(&self) -> Option<&Value> {
        self.root.as_ref()
    }

    /// Consume the storage, returning the tree.
    pub fn into_inner(self) -> Option<Value> {
        self.root
    }

    /// Value at `route`, or `None` when undefined.
    pub fn get(&self, route: &Route) -> Option<&Value> {
        let mut current = self.root.as_ref()?;
        for segment in route {
            current = match (segment, current) {
                (Segment::Key(k), Value::Object(map)) => map.get(k)?,
                (Segment::Index(i), Value::Array(items)) => items.get(*i)?,
                (Segment::Index(i), Value::Object(map)) => map.get(&i.to_string())?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write `value` at `route`, creating intermediate containers.
    ///
    /// Writing `None` removes an object key, or nulls an array slot. Removing
    /// beneath an undefined parent is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] when the route passes through a scalar,
    /// addresses an array with a key, or indexes more than [`MAX_PADDING`]
    /// slots past the end of an array.
    pub fn set(&mut self, route: &Route, value: Option<Value>) -> Result<(), PathError> {
        let segments = route.segments();
        let Some((last, parents)) = segments.split_last() else {
            self.root = value;
            return Ok(());
        };

        if value.is_none() && self.get(&Route::from(parents.to_vec())).is_none() {
            return Ok(());
        }

        if matches!(self.root, None | Some(Value::Null)) {
            self.root = Some(container_for(&segments[0]));
        }
        let Some(mut current) = self.root.as_mut() else {
            return Ok(());
        };
        for (depth, segment) in parents.iter().enumerate() {
            let next = &segments[depth + 1];
            current = descend(current, segment, next, route, &segments[..depth])?;
        }

        match (last, current) {
            (Segment::Key(k), Value::Object(map)) => {
                match value {
                    Some(v) => {
                        map.insert(k.clone(), v);
                    }
                    None => {
                        map.shift_remove(k);
                    }
                }
                Ok(())
            }
            (Segment::Index(i), Value::Object(map)) => {
                let key = i.to_string();
                match value {
                    Some(v) => {
                        map.insert(key, v);
                    }
                    None => {
                        map.shift_remove(&key);
                    }
                }
                Ok(())
            }
            (Segment::Index(i), Value::Array(items)) => {
                match value {
                    Some(v) => *slot(items, *i, route)? = v,
                    None => {
                        if let Some(slot) = items.get_mut(*i) {
                            *slot = Value::Null;
                        }
                    }
                }
                Ok(())
            }
            (Segment::Key(k), Value::Array(_)) => Err(PathError::KeyIntoArray {
                path: route.to_path(),
                key: k.clone(),
            }),
            (_, other) => Err(PathError::NotAContainer {
                path: route.to_path(),
                parent: Route::from(parents.to_vec()).to_path(),
                found: type_name(other),
            }),
        }
    }
}

/// JSON type name of a value, as used in messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn container_for(next: &Segment) -> Value {
    match next {
        Segment::Index(_) => Value::Array(Vec::new()),
        Segment::Key(_) => Value::Object(Map::new()),
    }
}

/// Slot `index` of `items`, padding with `null` up to it.
fn slot<'a>(
    items: &'a mut Vec<Value>,
    index: usize,
    route: &Route,
) -> Result<&'a mut Value, PathError> {
    let len = items.len();
    if index >= len {
        let padded = index
            .checked_add(1)
            .filter(|end| end - len <= MAX_PADDING)
            .ok_or_else(|| PathError::IndexOutOfRange {
                path: route.to_path(),
                index,
                len,
            })?;
        items.resize(padded, Value::Null);
    }
    Ok(&mut items[index])
}

fn descend<'a>(
    current: &'a mut Value,
    segment: &Segment,
    next: &Segment,
    route: &Route,
    above: &[Segment],
) -> Result<&'a mut Value, PathError> {
    let slot = match (segment, current) {
        (Segment::Key(k), Value::Object(map)) => map.entry(k.clone()).or_insert(Value::Null),
        (Segment::Index(i), Value::Object(map)) => {
            map.entry(i.to_string()).or_insert(Value::Null)
        }
        (Segment::Index(i), Value::Array(items)) => slot(items, *i, route)?,
        (Segment::Key(k), Value::Array(_)) => {
            return Err(PathError::KeyIntoArray {
                path: route.to_path(),
                key: k.clone(),
            })
        }
        (_, other) => {
            return Err(PathError::NotAContainer {
                path: route.to_path(),
                parent: Route::from(above.to_vec()).to_path(),
                found: type_name(other),
            })
        }
    };
    if slot.is_null() {
        *slot = container_for(next);
    }
    Ok(slot)
}
