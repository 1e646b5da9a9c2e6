//! Streaming reconciliation of delimited snapshot exports.
//!
//! Three operations over delimited (CSV/TSV) byte streams:
//!
//! - [`decode_rows`]: reconstruct complete, keyed rows from byte chunks of
//!   arbitrary size, discovering the column names, delimiter, and
//!   line-break style from the header.
//! - [`compile`]: fold an ordered sequence of snapshot exports into the
//!   merged current state plus a [`SnapshotDiff`] recording how every
//!   uniquely-keyed record was created, changed field by field, or
//!   deleted across the sequence.
//! - [`modify`]: apply per-key field overrides to a single stream,
//!   rewriting it and reporting what was changed.
//!
//! Rows are keyed by a caller-supplied [`KeySpec`]: a column name, a
//! compound column list with an explicit separator, or a function. Byte
//! streams arrive through the [`ChunkSource`] trait; fetching, retries,
//! and decompression stay with the caller.

pub mod columns;
pub mod compile;
pub mod decode;
pub mod diff;
pub mod error;
pub mod io_utils;
pub mod key;
pub mod mutate;
pub mod rows;
pub mod source;

pub use columns::ColumnSet;
pub use compile::{CompileOutcome, compile};
pub use decode::{
    DecodeMeta, DecodeOptions, LineBreak, RejectedRow, RowDecoder, RowStream, decode_rows,
};
pub use diff::{ChangeKind, ChangeRecord, SnapshotDiff};
pub use error::{DecodeError, Error, Result};
pub use key::{KeyFn, KeySpec};
pub use mutate::{ModificationReport, modify};
pub use rows::KeyedRow;
pub use source::{ChunkSource, MemorySource, ReadSource};
