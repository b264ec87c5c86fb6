//! # Path Resolution
//!
//! Converts between canonical string paths and [`Route`]s, and resolves
//! relative paths against a host path.
//!
//! ## Syntax
//!
//! Paths are POSIX-like: `/car/wheels/2`. The canonical root is `/`.
//! Empty segments and `.` are dropped, `..` pops one segment (never above
//! the root). A segment made only of ASCII digits, without a leading zero,
//! indexes a sequence; anything else is a mapping key.
//!
//! Keys that themselves contain `/` are not addressable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical path of the root of the data tree.
pub const ROOT: &str = "/";

/// One step of a [`Route`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    /// Index into a sequence.
    Index(usize),
    /// Key into a mapping.
    Key(String),
}

impl Segment {
    /// Parse a single raw segment. Canonical decimal integers become indices.
    pub fn parse(raw: &str) -> Self {
        let canonical_int = !raw.is_empty()
            && raw.bytes().all(|b| b.is_ascii_digit())
            && (raw == "0" || !raw.starts_with('0'));
        if canonical_int {
            if let Ok(i) = raw.parse::<usize>() {
                return Self::Index(i);
            }
        }
        Self::Key(raw.to_string())
    }

    /// The key, if this segment addresses a mapping.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(k) => Some(k),
            Self::Index(_) => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Key(k) => f.write_str(k),
        }
    }
}

impl From<&str> for Segment {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for Segment {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<usize> for Segment {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

/// Ordered sequence of segments addressing a value. The empty route is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(Vec<Segment>);

impl Route {
    /// The root route.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse and normalize a path. Relative paths are taken from the root.
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();
        push_normalized(&mut segments, path);
        Self(segments)
    }

    /// Resolve `path` against `host`. Absolute paths ignore the host.
    pub fn resolve(host: &Route, path: &str) -> Self {
        let mut segments = if path.starts_with('/') {
            Vec::new()
        } else {
            host.0.clone()
        };
        push_normalized(&mut segments, path);
        Self(segments)
    }

    /// Canonical string form.
    pub fn to_path(&self) -> String {
        if self.0.is_empty() {
            return ROOT.to_string();
        }
        let mut out = String::new();
        for segment in &self.0 {
            out.push('/');
            out.push_str(&segment.to_string());
        }
        out
    }

    /// Segments of this route.
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root route.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, if any.
    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Route extended by one segment.
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Route of the parent, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Whether `self` equals `ancestor` or lies beneath it.
    pub fn starts_with(&self, ancestor: &Route) -> bool {
        self.0.starts_with(&ancestor.0)
    }

    /// Segments of `self` below `ancestor`, if `self` is at or under it.
    pub fn strip_prefix(&self, ancestor: &Route) -> Option<Route> {
        self.0
            .strip_prefix(ancestor.0.as_slice())
            .map(|rest| Route(rest.to_vec()))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

impl From<Vec<Segment>> for Route {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl<'a> IntoIterator for &'a Route {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn push_normalized(segments: &mut Vec<Segment>, path: &str) {
    for raw in path.split('/') {
        match raw {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(Segment::parse(other)),
        }
    }
}

/// Normalize a path string into canonical form.
pub fn normalize(path: &str) -> String {
    Route::parse(path).to_path()
}

/// Resolve `path` relative to the canonical `host` path.
pub fn resolve(host: &str, path: &str) -> String {
    Route::resolve(&Route::parse(host), path).to_path()
}

/// Whether canonical `path` lies strictly beneath canonical `ancestor`.
pub fn is_under(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT {
        return path != ROOT;
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Whether canonical `path` equals or lies beneath canonical `ancestor`.
pub fn is_at_or_under(path: &str, ancestor: &str) -> bool {
    path == ancestor || is_under(path, ancestor)
}

/// Canonical parent of a canonical path, or `None` at the root.
pub fn parent(path: &str) -> Option<String> {
    Route::parse(path).parent().map(|r| r.to_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_and_indices() {
        let route = Route::parse("/car/wheels/2");
        assert_eq!(
            route.segments(),
            &[
                Segment::Key("car".into()),
                Segment::Key("wheels".into()),
                Segment::Index(2)
            ]
        );
        assert_eq!(route.to_path(), "/car/wheels/2");
    }

    #[test]
    fn leading_zero_stays_a_key() {
        assert_eq!(Segment::parse("007"), Segment::Key("007".into()));
        assert_eq!(Segment::parse("0"), Segment::Index(0));
    }

    #[test]
    fn root_forms_normalize_to_slash() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("//./"), "/");
        assert_eq!(normalize("/a/.."), "/");
        assert_eq!(normalize("/.."), "/");
    }

    #[test]
    fn resolves_relative_to_host() {
        assert_eq!(resolve("/a/b", "c"), "/a/b/c");
        assert_eq!(resolve("/a/b", "../c"), "/a/c");
        assert_eq!(resolve("/a/b", "../../../c"), "/c");
        assert_eq!(resolve("/a/b", "/x/y"), "/x/y");
        assert_eq!(resolve("/a/b", "./"), "/a/b");
    }

    #[test]
    fn under_is_segment_aware() {
        assert!(is_under("/a/b", "/a"));
        assert!(!is_under("/ab", "/a"));
        assert!(!is_under("/a", "/a"));
        assert!(is_at_or_under("/a", "/a"));
        assert!(is_under("/a", "/"));
        assert!(!is_under("/", "/"));
    }

    #[test]
    fn parent_of_root_is_none() {
        assert_eq!(parent("/"), None);
        assert_eq!(parent("/a").as_deref(), Some("/"));
        assert_eq!(parent("/a/3").as_deref(), Some("/a"));
    }

    #[test]
    fn strip_prefix_yields_relative_route() {
        let route = Route::parse("/a/b/c");
        let rel = route.strip_prefix(&Route::parse("/a")).unwrap();
        assert_eq!(rel.to_path(), "/b/c");
        assert!(route.strip_prefix(&Route::parse("/x")).is_none());
    }

    #[test]
    fn route_serializes_as_segment_array() {
        let route = Route::parse("/car/1");
        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(json, serde_json::json!(["car", 1]));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn raw_path() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                Just("..".to_string()),
                Just(".".to_string()),
                Just(String::new()),
                "[a-z]{1,4}",
                "[0-9]{1,3}",
            ],
            0..8,
        )
        .prop_map(|parts| parts.join("/"))
    }

    proptest! {
        /// Normalization is idempotent.
        #[test]
        fn normalize_is_idempotent(raw in raw_path()) {
            let once = normalize(&raw);
            prop_assert_eq!(normalize(&once), once);
        }

        /// Resolution always yields a canonical absolute path.
        #[test]
        fn resolve_is_canonical(host in raw_path(), rel in raw_path()) {
            let resolved = resolve(&normalize(&host), &rel);
            prop_assert!(resolved.starts_with('/'));
            prop_assert_eq!(normalize(&resolved), resolved);
        }
    }
}
