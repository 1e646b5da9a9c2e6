//! Keyed rows: decoded field values projected through a column set.

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::columns::ColumnSet;

/// One decoded row, addressable by column name.
///
/// The column set is shared with every other row of the same stream, so a
/// row is one `Arc` plus its field values. Field order always follows the
/// column declaration order of the owning set.
#[derive(Debug, Clone)]
pub struct KeyedRow {
    columns: Arc<ColumnSet>,
    values: Vec<String>,
}

impl KeyedRow {
    pub(crate) fn new(columns: Arc<ColumnSet>, values: Vec<String>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        KeyedRow { columns, values }
    }

    /// Builds a standalone row from name/value pairs, preserving pair order.
    ///
    /// This is how partial rows (modification entries) are expressed: the
    /// pairs carry the key fields plus the fields to override. Returns the
    /// offending name if a column is repeated.
    pub fn from_pairs<I, S>(pairs: I) -> std::result::Result<Self, String>
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<String>) = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .unzip();
        let columns = ColumnSet::new(names)?;
        Ok(KeyedRow {
            columns: Arc::new(columns),
            values,
        })
    }

    pub fn columns(&self) -> &Arc<ColumnSet> {
        &self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .index_of(name)
            .and_then(|idx| self.values.get(idx))
            .map(|value| value.as_str())
    }

    /// Iterates `(column, value)` in column declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .names()
            .iter()
            .map(|name| name.as_str())
            .zip(self.values.iter().map(|value| value.as_str()))
    }

    /// Re-orders the row's values to match `columns`. Returns `None` if any
    /// target column is missing from this row.
    pub fn reproject(&self, columns: &Arc<ColumnSet>) -> Option<KeyedRow> {
        let values = columns
            .names()
            .iter()
            .map(|name| self.get(name).map(|value| value.to_string()))
            .collect::<Option<Vec<_>>>()?;
        Some(KeyedRow::new(columns.clone(), values))
    }

    pub(crate) fn set(&mut self, idx: usize, value: String) {
        self.values[idx] = value;
    }
}

impl PartialEq for KeyedRow {
    fn eq(&self, other: &Self) -> bool {
        self.columns.names() == other.columns.names() && self.values == other.values
    }
}

impl Serialize for KeyedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.fields() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
