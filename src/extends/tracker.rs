//! Resolution chain tracking for cycle detection.

use std::fmt;

use crate::core::ExtendsError;

/// One `(file, service)` step of a resolution chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainEntry {
    /// Identity of the file the service lives in
    pub file: String,
    /// Service name
    pub service: String,
}

impl ChainEntry {
    /// Create an entry.
    pub fn new(file: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            service: service.into(),
        }
    }
}

impl fmt::Display for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.service)
    }
}

/// The `(file, service)` pairs visited by one top-level resolution.
///
/// Adding never mutates the tracker it is called on, so two branches that
/// start from the same tracker cannot see each other's entries.
#[derive(Debug, Clone, Default)]
pub struct ChainTracker {
    chain: Vec<ChainEntry>,
}

impl ChainTracker {
    /// An empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a tracker with `(file, service)` appended.
    ///
    /// Fails with [`ExtendsError::Cycle`] carrying the chain up to and
    /// including the repeated entry when the pair was already visited.
    pub fn add(&self, file: &str, service: &str) -> Result<Self, ExtendsError> {
        let entry = ChainEntry::new(file, service);
        let mut chain = self.chain.clone();

        if self.chain.contains(&entry) {
            chain.push(entry);
            return Err(ExtendsError::Cycle {
                chain,
            });
        }

        chain.push(entry);
        Ok(Self {
            chain,
        })
    }

    /// Number of visited entries.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Whether nothing was visited yet.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// The visited entries in order.
    pub fn entries(&self) -> &[ChainEntry] {
        &self.chain
    }
}
