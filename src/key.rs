//! Primary-key derivation.
//!
//! A key spec is validated once against the stream's column set, then
//! applied per row. Whatever the variant, the derived key must be
//! non-empty: an empty key would silently merge unrelated records.

use std::fmt;

use itertools::Itertools;

use crate::{
    columns::ColumnSet,
    error::{Error, Result},
    rows::KeyedRow,
};

pub type KeyFn = Box<dyn Fn(&KeyedRow) -> anyhow::Result<String> + Send + Sync>;

/// How a primary key is computed from a keyed row.
pub enum KeySpec {
    /// The value of one column.
    Column(String),
    /// The values of several columns joined with an explicit separator.
    /// The separator is mandatory: implicit empty-string concatenation can
    /// collide distinct key tuples ("ab"+"c" vs "a"+"bc").
    Compound {
        columns: Vec<String>,
        separator: String,
    },
    /// A caller-supplied function. Errors are wrapped into
    /// [`Error::KeyDerivation`].
    Function(KeyFn),
}

impl KeySpec {
    pub fn column(name: impl Into<String>) -> Self {
        KeySpec::Column(name.into())
    }

    pub fn compound<I, S>(columns: I, separator: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeySpec::Compound {
            columns: columns.into_iter().map(Into::into).collect(),
            separator: separator.into(),
        }
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&KeyedRow) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        KeySpec::Function(Box::new(f))
    }

    /// Fail-fast check that every named key column exists in the header.
    pub fn validate(&self, columns: &ColumnSet) -> Result<()> {
        match self {
            KeySpec::Column(name) => {
                if columns.contains(name) {
                    Ok(())
                } else {
                    Err(Error::key_derivation(format!(
                        "key column '{name}' is not in the header"
                    )))
                }
            }
            KeySpec::Compound { columns: parts, .. } => {
                if parts.is_empty() {
                    return Err(Error::key_derivation(
                        "compound key requires at least one column",
                    ));
                }
                for part in parts {
                    if !columns.contains(part) {
                        return Err(Error::key_derivation(format!(
                            "key column '{part}' is not in the header"
                        )));
                    }
                }
                Ok(())
            }
            KeySpec::Function(_) => Ok(()),
        }
    }

    /// Columns this spec consumes; empty for [`KeySpec::Function`], whose
    /// inputs are opaque.
    pub fn key_columns(&self) -> Vec<&str> {
        match self {
            KeySpec::Column(name) => vec![name.as_str()],
            KeySpec::Compound { columns, .. } => {
                columns.iter().map(|name| name.as_str()).collect()
            }
            KeySpec::Function(_) => Vec::new(),
        }
    }

    pub fn derive(&self, row: &KeyedRow) -> Result<String> {
        let key = match self {
            KeySpec::Column(name) => self.column_value(row, name)?.to_string(),
            KeySpec::Compound { columns, separator } => {
                if columns.is_empty() {
                    return Err(Error::key_derivation(
                        "compound key requires at least one column",
                    ));
                }
                columns
                    .iter()
                    .map(|name| self.column_value(row, name))
                    .collect::<Result<Vec<_>>>()?
                    .iter()
                    .join(separator)
            }
            KeySpec::Function(f) => f(row).map_err(|err| {
                Error::key_derivation(format!("key function failed: {err:#}"))
            })?,
        };
        if key.is_empty() {
            return Err(Error::key_derivation(
                "derived key is empty; a non-empty key is required",
            ));
        }
        Ok(key)
    }

    fn column_value<'a>(&self, row: &'a KeyedRow, name: &str) -> Result<&'a str> {
        row.get(name).ok_or_else(|| {
            Error::key_derivation(format!("key column '{name}' is missing from the row"))
        })
    }
}

impl fmt::Debug for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySpec::Column(name) => f.debug_tuple("Column").field(name).finish(),
            KeySpec::Compound { columns, separator } => f
                .debug_struct("Compound")
                .field("columns", columns)
                .field("separator", separator)
                .finish(),
            KeySpec::Function(_) => f.write_str("Function(..)"),
        }
    }
}
