//! Materialized paths.
//!
//! A path is the chain of ancestor ids from the root down to a node, stored as
//! a dot-joined string (`"1.4.9"`). All ancestry tests compare whole segments,
//! so `"1.12"` is never mistaken for an ancestor of `"1.120"`.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Segment delimiter in the stored representation.
pub const SEPARATOR: char = '.';

/// Errors produced when parsing a stored path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),
    #[error("path '{path}' contains invalid character '{ch}'")]
    InvalidCharacter { path: String, ch: char },
}

/// Replace every character outside `[A-Za-z0-9_]` with an underscore.
///
/// Hierarchical path column types restrict labels to this character set, so
/// ids are normalised before they become segments.
pub fn sanitize_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Ordered list of ancestor segments ending with the node itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterializedPath {
    segments: Vec<String>,
}

impl MaterializedPath {
    /// Path of a root node.
    pub fn root(id: impl fmt::Display) -> Self {
        Self {
            segments: vec![sanitize_segment(&id.to_string())],
        }
    }

    /// Path of a direct child of `self`.
    pub fn child(&self, id: impl fmt::Display) -> Self {
        let mut segments = self.segments.clone();
        segments.push(sanitize_segment(&id.to_string()));
        Self { segments }
    }

    /// Path of the node `id` placed under an optional parent path.
    pub fn under(parent: Option<&MaterializedPath>, id: impl fmt::Display) -> Self {
        match parent {
            Some(parent) => parent.child(id),
            None => Self::root(id),
        }
    }

    /// Parse a stored dot-joined path.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        let mut segments = Vec::new();
        for segment in raw.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(PathError::EmptySegment(raw.to_string()));
            }
            if let Some(ch) = segment.chars().find(|c| !is_segment_char(*c)) {
                return Err(PathError::InvalidCharacter {
                    path: raw.to_string(),
                    ch,
                });
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; a path has at least one segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Depth of the node this path addresses (root = 0).
    pub fn depth(&self) -> i64 {
        self.segments.len() as i64 - 1
    }

    /// The node's own segment.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Path of the parent node, `None` for a root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// All strict ancestor paths, root first.
    pub fn ancestors(&self) -> Vec<Self> {
        (1..self.segments.len())
            .map(|n| Self {
                segments: self.segments[..n].to_vec(),
            })
            .collect()
    }

    /// True if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &MaterializedPath) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// True if `self` is a strict descendant of `other`.
    pub fn is_descendant_of(&self, other: &MaterializedPath) -> bool {
        other.is_ancestor_of(self)
    }

    /// True if `other` is `self` or lies anywhere below it.
    pub fn contains(&self, other: &MaterializedPath) -> bool {
        self == other || self.is_ancestor_of(other)
    }

    /// Replace the `old_prefix` part of this path with `new_prefix`.
    ///
    /// Returns `None` when `old_prefix` does not contain this path.
    pub fn rebase(&self, old_prefix: &MaterializedPath, new_prefix: &MaterializedPath) -> Option<Self> {
        if !old_prefix.contains(self) {
            return None;
        }
        let mut segments = new_prefix.segments.clone();
        segments.extend_from_slice(&self.segments[old_prefix.segments.len()..]);
        Some(Self { segments })
    }

    /// String prefix shared by every stored descendant (`"1.4."`).
    ///
    /// Includes the trailing separator so a plain prefix match on the stored
    /// column stays segment-aligned.
    pub fn descendant_prefix(&self) -> String {
        let mut prefix = self.to_string();
        prefix.push(SEPARATOR);
        prefix
    }
}

/// Numeric segments compare by value; anything else compares as text.
fn compare_segments(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

/// Segment-wise ordering: ancestors sort before their descendants and every
/// subtree is contiguous, so sorting by path yields a pre-order traversal.
impl Ord for MaterializedPath {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.segments.iter().zip(other.segments.iter()) {
            match compare_segments(a, b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }
}

impl PartialOrd for MaterializedPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MaterializedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for MaterializedPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MaterializedPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MaterializedPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl ToSql for MaterializedPath {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for MaterializedPath {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        Self::parse(raw).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> MaterializedPath {
        MaterializedPath::parse(raw).unwrap()
    }

    #[test]
    fn test_root_and_child() {
        let root = MaterializedPath::root(1);
        assert_eq!(root.to_string(), "1");
        assert_eq!(root.depth(), 0);

        let child = root.child(7).child(42);
        assert_eq!(child.to_string(), "1.7.42");
        assert_eq!(child.depth(), 2);
        assert_eq!(child.leaf(), "42");
        assert_eq!(child.parent(), Some(p("1.7")));
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("0190-ab.cd"), "0190_ab_cd");
        assert_eq!(sanitize_segment("plain_id9"), "plain_id9");
        assert_eq!(MaterializedPath::root("a-b").child("c d").to_string(), "a_b.c_d");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(MaterializedPath::parse(""), Err(PathError::Empty));
        assert!(matches!(
            MaterializedPath::parse("1..2"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            MaterializedPath::parse("1.a-b"),
            Err(PathError::InvalidCharacter { ch: '-', .. })
        ));
    }

    #[test]
    fn test_ancestry_is_segment_aware() {
        let a = p("1.12");
        let sibling = p("1.120");
        let child = p("1.12.5");

        assert!(!a.is_ancestor_of(&sibling));
        assert!(a.is_ancestor_of(&child));
        assert!(child.is_descendant_of(&a));
        assert!(!a.is_ancestor_of(&a));
        assert!(a.contains(&a));
        assert!(!sibling.contains(&child));
    }

    #[test]
    fn test_ancestors_root_first() {
        let ancestors = p("3.8.21.4").ancestors();
        let rendered: Vec<String> = ancestors.iter().map(|a| a.to_string()).collect();
        assert_eq!(rendered, vec!["3", "3.8", "3.8.21"]);
        assert!(p("3").ancestors().is_empty());
    }

    #[test]
    fn test_rebase() {
        let node = p("1.2.3.4");
        let rebased = node.rebase(&p("1.2"), &p("9.2")).unwrap();
        assert_eq!(rebased.to_string(), "9.2.3.4");

        // Moving to root shortens the path.
        let rebased = node.rebase(&p("1.2"), &p("2")).unwrap();
        assert_eq!(rebased.to_string(), "2.3.4");
        assert_eq!(rebased.depth(), 2);

        assert!(p("1.20.3").rebase(&p("1.2"), &p("5.2")).is_none());
    }

    #[test]
    fn test_descendant_prefix() {
        assert_eq!(p("1.4").descendant_prefix(), "1.4.");
    }

    #[test]
    fn test_ordering_is_preorder() {
        let mut paths = vec![p("1.10"), p("1.2.7"), p("1"), p("1.2"), p("1.10.3"), p("1.9")];
        paths.sort();
        let rendered: Vec<String> = paths.iter().map(|a| a.to_string()).collect();
        assert_eq!(rendered, vec!["1", "1.2", "1.2.7", "1.9", "1.10", "1.10.3"]);
    }

    #[test]
    fn test_serde_as_string() {
        let path = p("4.5");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"4.5\"");
        let back: MaterializedPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<MaterializedPath>("\"4..5\"").is_err());
    }
}
