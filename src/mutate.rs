//! Targeted per-key rewriting of a single row stream.
//!
//! Unlike compilation, modification is deliberately forgiving: a
//! modification whose key never appears in the stream is a silent miss,
//! reflected only in the report's counts. Everything else (bad rows,
//! unknown columns, underivable keys) fails fast.

use std::{
    collections::{BTreeMap, HashMap},
    io::Write,
};

use log::{debug, info};
use serde::Serialize;

use crate::{
    decode::{DecodeOptions, RowStream},
    error::{Error, Result},
    io_utils,
    key::KeySpec,
    rows::KeyedRow,
    source::ChunkSource,
};

/// Accounting for one modify call.
///
/// `success` holds only when every supplied modification matched exactly
/// the number of rows it was expected to (one stream row per entry).
#[derive(Debug, Clone, Serialize)]
pub struct ModificationReport {
    pub rows_processed: usize,
    pub rows_expected: usize,
    pub rows_modified: usize,
    /// Per key, the field overrides that were actually applied.
    pub applied: BTreeMap<String, BTreeMap<String, String>>,
    pub success: bool,
}

/// Rewrites `source` into `out`, merging each modification's fields over
/// every row sharing its primary key (modification fields win).
///
/// Each modification is a partial row carrying its key fields plus the
/// overrides. The output preserves the detected delimiter and line-break
/// style; every field is quoted for round-trip safety.
pub fn modify<W: Write>(
    source: Box<dyn ChunkSource>,
    key: &KeySpec,
    modifications: &[KeyedRow],
    out: W,
) -> Result<ModificationReport> {
    let mut stream = RowStream::new(source, DecodeOptions::strict());
    let meta = stream.ensure_meta()?;
    key.validate(&meta.columns)?;

    let mut overrides: HashMap<String, usize> = HashMap::with_capacity(modifications.len());
    for (idx, modification) in modifications.iter().enumerate() {
        for name in modification.columns().names() {
            if !meta.columns.contains(name) {
                return Err(Error::UnknownColumn {
                    column: name.clone(),
                });
            }
        }
        let k = key.derive(modification)?;
        if overrides.insert(k, idx).is_some() {
            debug!("Modification {idx} replaces an earlier entry with the same key");
        }
    }
    info!(
        "Modifying '{}': {} modification(s) across {} column(s)",
        stream.label(),
        modifications.len(),
        meta.columns.len()
    );

    let mut writer = io_utils::build_csv_writer(out, meta.delimiter, meta.line_break);
    writer.write_record(meta.columns.names())?;

    let mut rows_processed = 0usize;
    let mut rows_modified = 0usize;
    let mut applied: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    for row in &mut stream {
        let mut row = row?;
        rows_processed += 1;
        let k = key.derive(&row)?;
        if let Some(&idx) = overrides.get(&k) {
            let modification = &modifications[idx];
            let mut fields = BTreeMap::new();
            for (name, value) in modification.fields() {
                if let Some(col_idx) = meta.columns.index_of(name) {
                    row.set(col_idx, value.to_string());
                    fields.insert(name.to_string(), value.to_string());
                }
            }
            applied.insert(k, fields);
            rows_modified += 1;
        }
        writer.write_record(row.values())?;
    }
    writer.flush().map_err(csv::Error::from)?;

    let rows_expected = modifications.len();
    let report = ModificationReport {
        rows_processed,
        rows_expected,
        rows_modified,
        applied,
        success: rows_expected == rows_modified,
    };
    if !report.success {
        debug!(
            "Expected {} modification(s) but applied {}",
            report.rows_expected, report.rows_modified
        );
    }
    Ok(report)
}
