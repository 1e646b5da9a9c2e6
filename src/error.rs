use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes surfaced by compile, modify, and row decoding.
///
/// Every variant aborts the operation that raised it; no partial merged
/// state or diff is handed back alongside an error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Snapshot '{url}' columns {found:?} do not match established columns {expected:?}")]
    SchemaMismatch {
        url: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("Failed to derive primary key: {reason}")]
    KeyDerivation { reason: String },
    #[error("At least one snapshot source is required")]
    EmptyInput,
    #[error("Column '{column}' is not present in the stream header")]
    UnknownColumn { column: String },
    #[error("Reading chunk from '{url}'")]
    Source {
        url: String,
        #[source]
        source: io::Error,
    },
    #[error("Writing rewritten stream")]
    Output(#[from] csv::Error),
}

impl Error {
    pub(crate) fn key_derivation(reason: impl Into<String>) -> Self {
        Error::KeyDerivation {
            reason: reason.into(),
        }
    }
}

/// Errors raised while reconstructing rows from byte chunks.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Header row is malformed: {reason}")]
    MalformedHeader { reason: String },
    #[error("Stream ended with an incomplete row ({held} byte(s) held back)")]
    TruncatedStream { held: usize },
    #[error("Row {row} has {found} field(s), expected {expected}")]
    FieldCount {
        row: u64,
        found: usize,
        expected: usize,
    },
    #[error("Row {row} is not valid {encoding}")]
    Encoding { row: u64, encoding: &'static str },
    #[error("Row {row} could not be parsed")]
    Malformed {
        row: u64,
        #[source]
        source: csv::Error,
    },
}
