//! I/O utilities for encoding resolution, field decoding, and CSV
//! reader/writer construction.
//!
//! All text handling flows through this module:
//!
//! - **Encoding**: field bytes decode via `encoding_rs`, defaulting to
//!   UTF-8; `resolve_encoding` accepts WHATWG labels.
//! - **Reader construction**: `build_row_reader` configures a `csv::Reader`
//!   for one assembled, already-complete line.
//! - **Writer construction**: rewritten streams use `QuoteStyle::Always`
//!   for round-trip safety and preserve the detected line-break style.

use std::io::Write;

use anyhow::{Result, anyhow};
use csv::{QuoteStyle, Terminator};
use encoding_rs::{Encoding, UTF_8};

use crate::decode::LineBreak;

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Decodes raw field bytes, returning `None` when the bytes are not valid
/// in the given encoding.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors { None } else { Some(text.into_owned()) }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Option<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Reader over one complete line: no header handling, flexible field
/// counts (the decoder checks counts itself to report them precisely).
pub fn build_row_reader(line: &[u8], delimiter: u8) -> csv::Reader<&[u8]> {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(line)
}

pub fn build_csv_writer<W: Write>(out: W, delimiter: u8, line_break: LineBreak) -> csv::Writer<W> {
    let terminator = match line_break {
        LineBreak::CrLf => Terminator::CRLF,
        LineBreak::Lf => Terminator::Any(b'\n'),
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .terminator(terminator)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    builder.from_writer(out)
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
