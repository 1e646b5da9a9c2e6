//! Ordered column sets discovered from stream headers.

use std::collections::HashMap;

/// The ordered, distinct column names of one decoding session.
///
/// Discovered from the header row of the first snapshot and shared (via
/// `Arc`) with every row the decoder emits. Later snapshots must carry the
/// same names, in any order.
#[derive(Debug, Clone)]
pub struct ColumnSet {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl ColumnSet {
    /// Builds a column set, rejecting duplicate names.
    ///
    /// Returns the offending name on a duplicate; the caller turns that
    /// into a malformed-header error with stream context attached.
    pub fn new(names: Vec<String>) -> std::result::Result<Self, String> {
        let mut index = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            if index.insert(name.clone(), idx).is_some() {
                return Err(name.clone());
            }
        }
        Ok(ColumnSet { names, index })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Order-independent equality. Both sets hold distinct names, so equal
    /// length plus full containment implies a permutation.
    pub fn matches_unordered(&self, other: &ColumnSet) -> bool {
        self.len() == other.len() && other.names.iter().all(|name| self.contains(name))
    }
}
