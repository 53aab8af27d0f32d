//! Dotted paths into nested documents.
//!
//! A [`Path`] addresses a value such as `services.web.environment`. Paths
//! double as patterns: a `*` segment matches any mapping key and a `[]`
//! segment matches any sequence item.

use std::fmt;

const SEPARATOR: char = '.';

/// Pattern segment matching any key at that level.
pub const MATCH_ALL: &str = "*";

/// Pattern segment matching items of a sequence.
pub const MATCH_LIST: &str = "[]";

/// A dotted path of keys into a nested mapping structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(String);

impl Path {
    /// Build a path by joining segments with `.`.
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = Self::default();
        for item in items {
            path = path.next(item.as_ref());
        }
        path
    }

    /// Return a new path with `part` appended.
    #[must_use]
    pub fn next(&self, part: &str) -> Self {
        if self.0.is_empty() {
            Self(part.to_string())
        } else {
            Self(format!("{}{SEPARATOR}{part}", self.0))
        }
    }

    /// The segments of this path.
    pub fn parts(&self) -> Vec<&str> {
        self.0.split(SEPARATOR).collect()
    }

    /// The last segment, if any.
    pub fn last(&self) -> Option<&str> {
        if self.0.is_empty() { None } else { self.0.rsplit(SEPARATOR).next() }
    }

    /// Whether this path matches `pattern` segment by segment.
    pub fn matches(&self, pattern: &Path) -> bool {
        let pattern_parts = pattern.parts();
        let parts = self.parts();

        if pattern_parts.len() != parts.len() {
            return false;
        }
        parts
            .iter()
            .zip(pattern_parts)
            .all(|(part, pattern_part)| pattern_part == MATCH_ALL || pattern_part == *part)
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Path {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Path {
    fn from(value: String) -> Self {
        Self(value)
    }
}
