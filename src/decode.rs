//! Streaming row reconstruction from byte chunks.
//!
//! [`RowDecoder`] accepts byte chunks of arbitrary, unpredictable length —
//! chunk boundaries may fall inside a row, inside a quoted field, or even
//! inside a multi-byte character — and yields rows only once a line
//! terminator outside quotes confirms them complete. Everything after the
//! last confirmed terminator stays in a carry buffer for the next chunk.
//!
//! The first complete line is the header: it fixes the column names, the
//! delimiter, the line-break style, and the expected field count for the
//! rest of the stream.

use std::{collections::VecDeque, sync::Arc};

use encoding_rs::{Encoding, UTF_8};
use log::{debug, warn};
use serde::Serialize;

use crate::{
    columns::ColumnSet,
    error::{DecodeError, Error, Result},
    io_utils,
    rows::KeyedRow,
    source::ChunkSource,
};

/// Delimiters considered when sniffing the header: comma, tab, semicolon,
/// pipe. Comma wins ties.
pub const DELIMITER_CANDIDATES: &[u8] = &[b',', b'\t', b';', b'|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineBreak {
    Lf,
    CrLf,
}

impl LineBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineBreak::Lf => "\n",
            LineBreak::CrLf => "\r\n",
        }
    }
}

/// Stream metadata, emitted once after the header line completes.
#[derive(Debug, Clone)]
pub struct DecodeMeta {
    pub columns: Arc<ColumnSet>,
    pub delimiter: u8,
    pub line_break: LineBreak,
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// In strict mode a confirmed-complete row with the wrong field count
    /// aborts decoding; otherwise it is reported, logged, and skipped.
    pub strict: bool,
    pub encoding: &'static Encoding,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            strict: false,
            encoding: UTF_8,
        }
    }
}

impl DecodeOptions {
    pub fn strict() -> Self {
        DecodeOptions {
            strict: true,
            ..DecodeOptions::default()
        }
    }
}

/// A complete row skipped in lenient mode because its field count did not
/// match the header's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub row: u64,
    pub found: usize,
    pub expected: usize,
}

/// Stateful chunk-to-row transform. Feed chunks with [`feed`](Self::feed),
/// then call [`finish`](Self::finish) exactly once at end of stream.
pub struct RowDecoder {
    options: DecodeOptions,
    pending: Vec<u8>,
    meta: Option<DecodeMeta>,
    row_count: u64,
    rejected: Vec<RejectedRow>,
}

impl RowDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        RowDecoder {
            options,
            pending: Vec::new(),
            meta: None,
            row_count: 0,
            rejected: Vec::new(),
        }
    }

    /// Metadata discovered from the header, once a full header line has
    /// been fed.
    pub fn meta(&self) -> Option<&DecodeMeta> {
        self.meta.as_ref()
    }

    /// Rows skipped so far in lenient mode.
    pub fn rejected(&self) -> &[RejectedRow] {
        &self.rejected
    }

    /// Consumes one chunk and returns every row it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<KeyedRow>> {
        self.pending.extend_from_slice(chunk);
        let mut rows = Vec::new();
        if self.meta.is_none() && !self.parse_header()? {
            return Ok(rows);
        }
        let Some(meta) = self.meta.clone() else {
            return Ok(rows);
        };
        let mut start = 0;
        while let Some((end, term_len)) = find_row_boundary(&self.pending[start..]) {
            let line = self.pending[start..start + end].to_vec();
            start += end + term_len;
            if line.is_empty() {
                continue;
            }
            match self.parse_row(&line, &meta) {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => {}
                Err(err) => {
                    self.pending.drain(..start);
                    return Err(err);
                }
            }
        }
        self.pending.drain(..start);
        Ok(rows)
    }

    /// Signals end of stream. Any bytes still held back describe a row that
    /// never completed, which is a truncated file.
    pub fn finish(&mut self) -> Result<()> {
        if self.meta.is_none() {
            return Err(DecodeError::MalformedHeader {
                reason: "stream ended before a complete header row".to_string(),
            }
            .into());
        }
        if !self.pending.is_empty() {
            return Err(DecodeError::TruncatedStream {
                held: self.pending.len(),
            }
            .into());
        }
        Ok(())
    }

    fn parse_header(&mut self) -> Result<bool> {
        let Some((end, term_len)) = find_row_boundary(&self.pending) else {
            return Ok(false);
        };
        let header = self.pending[..end].to_vec();
        let line_break = if term_len == 2 {
            LineBreak::CrLf
        } else {
            LineBreak::Lf
        };
        self.pending.drain(..end + term_len);
        if header.is_empty() {
            return Err(DecodeError::MalformedHeader {
                reason: "header row is empty".to_string(),
            }
            .into());
        }
        let delimiter = sniff_delimiter(&header);
        let mut reader = io_utils::build_row_reader(&header, delimiter);
        let mut record = csv::ByteRecord::new();
        let got = reader
            .read_byte_record(&mut record)
            .map_err(|err| DecodeError::MalformedHeader {
                reason: err.to_string(),
            })?;
        if !got || record.is_empty() {
            return Err(DecodeError::MalformedHeader {
                reason: "header row has no fields".to_string(),
            }
            .into());
        }
        let names =
            io_utils::decode_record(&record, self.options.encoding).ok_or_else(|| {
                DecodeError::MalformedHeader {
                    reason: format!("header is not valid {}", self.options.encoding.name()),
                }
            })?;
        let columns = ColumnSet::new(names).map_err(|dup| DecodeError::MalformedHeader {
            reason: format!("duplicate column '{dup}'"),
        })?;
        debug!(
            "Header: {} column(s), delimiter '{}', {:?} line breaks",
            columns.len(),
            io_utils::printable_delimiter(delimiter),
            line_break
        );
        self.meta = Some(DecodeMeta {
            columns: Arc::new(columns),
            delimiter,
            line_break,
        });
        Ok(true)
    }

    fn parse_row(&mut self, line: &[u8], meta: &DecodeMeta) -> Result<Option<KeyedRow>> {
        self.row_count += 1;
        let row = self.row_count;
        let mut reader = io_utils::build_row_reader(line, meta.delimiter);
        let mut record = csv::ByteRecord::new();
        let got = reader
            .read_byte_record(&mut record)
            .map_err(|source| DecodeError::Malformed { row, source })?;
        if !got {
            return Ok(None);
        }
        let (found, expected) = (record.len(), meta.columns.len());
        if found != expected {
            if self.options.strict {
                return Err(DecodeError::FieldCount {
                    row,
                    found,
                    expected,
                }
                .into());
            }
            warn!("Skipping row {row}: {found} field(s), expected {expected}");
            self.rejected.push(RejectedRow {
                row,
                found,
                expected,
            });
            return Ok(None);
        }
        let values = io_utils::decode_record(&record, self.options.encoding).ok_or(
            DecodeError::Encoding {
                row,
                encoding: self.options.encoding.name(),
            },
        )?;
        Ok(Some(KeyedRow::new(meta.columns.clone(), values)))
    }
}

/// Locates the first line terminator outside double quotes. Returns the
/// content length and the terminator length (`\r\n` counts as 2). A `\r`
/// not followed by `\n` is ordinary content, so a `\r\n` split across two
/// chunks stays in the carry buffer until the `\n` arrives.
fn find_row_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let mut in_quotes = false;
    for (idx, &byte) in buf.iter().enumerate() {
        match byte {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => {
                return if idx > 0 && buf[idx - 1] == b'\r' {
                    Some((idx - 1, 2))
                } else {
                    Some((idx, 1))
                };
            }
            _ => {}
        }
    }
    None
}

/// Picks the delimiter with the highest frequency outside quotes in the
/// header line; comma on a tie or when nothing matches (single column).
fn sniff_delimiter(header: &[u8]) -> u8 {
    let mut counts = [0usize; DELIMITER_CANDIDATES.len()];
    let mut in_quotes = false;
    for &byte in header {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            if let Some(pos) = DELIMITER_CANDIDATES.iter().position(|&c| c == byte) {
                counts[pos] += 1;
            }
        }
    }
    let mut best = (b',', 0usize);
    for (&candidate, &count) in DELIMITER_CANDIDATES.iter().zip(&counts) {
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

/// Pull-based row stream: drives a [`ChunkSource`] through a [`RowDecoder`].
///
/// Restartable only by re-supplying a fresh source; not seekable. The
/// stream fuses after the first error.
pub struct RowStream {
    source: Box<dyn ChunkSource>,
    decoder: RowDecoder,
    queue: VecDeque<KeyedRow>,
    done: bool,
    failed: bool,
}

impl RowStream {
    pub fn new(source: Box<dyn ChunkSource>, options: DecodeOptions) -> Self {
        RowStream {
            source,
            decoder: RowDecoder::new(options),
            queue: VecDeque::new(),
            done: false,
            failed: false,
        }
    }

    pub fn label(&self) -> &str {
        self.source.label()
    }

    pub fn meta(&self) -> Option<&DecodeMeta> {
        self.decoder.meta()
    }

    pub fn rejected(&self) -> &[RejectedRow] {
        self.decoder.rejected()
    }

    /// Pulls chunks until the header has been decoded. Needed up front by
    /// consumers that must validate the column set even for snapshots with
    /// no data rows.
    pub fn ensure_meta(&mut self) -> Result<DecodeMeta> {
        loop {
            if let Some(meta) = self.decoder.meta() {
                return Ok(meta.clone());
            }
            if self.done || !self.pull()? {
                self.done = true;
                self.decoder.finish()?;
                return Err(DecodeError::MalformedHeader {
                    reason: "stream ended before a complete header row".to_string(),
                }
                .into());
            }
        }
    }

    /// Feeds one chunk into the queue; `Ok(false)` at end of stream.
    fn pull(&mut self) -> Result<bool> {
        match self.source.next_chunk() {
            Ok(Some(chunk)) => {
                let rows = self.decoder.feed(&chunk)?;
                self.queue.extend(rows);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(source) => Err(Error::Source {
                url: self.source.label().to_string(),
                source,
            }),
        }
    }
}

impl Iterator for RowStream {
    type Item = Result<KeyedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(row) = self.queue.pop_front() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            match self.pull() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    if let Err(err) = self.decoder.finish() {
                        self.failed = true;
                        return Some(Err(err));
                    }
                    return None;
                }
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// The row-reconstruction primitive: lazy keyed rows from a chunk source,
/// lenient by default.
pub fn decode_rows(source: Box<dyn ChunkSource>) -> RowStream {
    RowStream::new(source, DecodeOptions::default())
}
