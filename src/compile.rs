//! Snapshot compilation: folds ordered exports of one logical dataset into
//! a merged current state plus a field-level change log.
//!
//! Snapshots are processed strictly in caller order, single-pass. The
//! first snapshot seeds the merged table; every later one is reconciled
//! against the fully-updated state its predecessors left behind, so
//! reordering snapshots changes the result and is not supported.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use log::{debug, info};
use serde::Serialize;

use crate::{
    columns::ColumnSet,
    decode::{DecodeOptions, RowStream},
    diff::{ChangeRecord, SnapshotDiff},
    error::{Error, Result},
    key::KeySpec,
    rows::KeyedRow,
    source::ChunkSource,
};

/// The merged rows and the change log of one compile call.
#[derive(Debug, Serialize)]
pub struct CompileOutcome {
    pub data: Vec<KeyedRow>,
    pub diff: SnapshotDiff,
}

/// Reconciles `sources` (ordered oldest to newest) into a merged table,
/// recording every insertion, deletion, and per-field change between
/// consecutive snapshots.
///
/// All sources must share one column set (order-independent). Decoding is
/// strict: a malformed row anywhere aborts the whole compile, and no
/// partial state is returned.
pub fn compile(sources: Vec<Box<dyn ChunkSource>>, key: &KeySpec) -> Result<CompileOutcome> {
    if sources.is_empty() {
        return Err(Error::EmptyInput);
    }
    info!("Compiling {} snapshot(s)", sources.len());
    let key_columns: HashSet<String> = key
        .key_columns()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let mut table = MergedTable::default();
    let mut diff = SnapshotDiff::default();
    let mut canonical: Option<Arc<ColumnSet>> = None;

    for (snapshot, source) in sources.into_iter().enumerate() {
        let label = source.label().to_string();
        let mut stream = RowStream::new(source, DecodeOptions::strict());
        let meta = stream.ensure_meta()?;
        let columns = if let Some(canon) = &canonical {
            if !canon.matches_unordered(&meta.columns) {
                return Err(Error::SchemaMismatch {
                    url: label,
                    expected: canon.names().to_vec(),
                    found: meta.columns.names().to_vec(),
                });
            }
            canon.clone()
        } else {
            key.validate(&meta.columns)?;
            canonical = Some(meta.columns.clone());
            meta.columns.clone()
        };

        if snapshot == 0 {
            let mut seeded = 0usize;
            for row in &mut stream {
                let row = row?;
                let k = key.derive(&row)?;
                table.upsert(k, row);
                seeded += 1;
            }
            debug!("Snapshot '{label}': seeded {seeded} row(s)");
            continue;
        }

        // Every key not seen again in this snapshot is deleted by it.
        let mut pending_delete: HashSet<String> = table.keys().cloned().collect();
        // New rows merge only at snapshot end, so a row is never compared
        // against state written by the snapshot still being scanned.
        let mut fresh = MergedTable::default();
        let mut changed = 0usize;

        for row in &mut stream {
            let row = row?;
            let k = key.derive(&row)?;
            match table.get_mut(&k) {
                Some(current) => {
                    pending_delete.remove(&k);
                    for (idx, name) in columns.names().iter().enumerate() {
                        let Some(candidate) = row.get(name) else {
                            continue;
                        };
                        if current.values()[idx] != candidate {
                            diff.record(
                                &k,
                                name,
                                ChangeRecord::variation(
                                    current.values()[idx].clone(),
                                    candidate,
                                    label.as_str(),
                                ),
                            );
                            current.set(idx, candidate.to_string());
                            changed += 1;
                        }
                    }
                }
                None => {
                    if let Some(projected) = row.reproject(&columns) {
                        fresh.upsert(k, projected);
                    }
                }
            }
        }

        let deleted = pending_delete.len();
        for k in &pending_delete {
            if let Some(prev) = table.remove(k) {
                for (name, value) in prev.fields() {
                    if key_columns.contains(name) {
                        continue;
                    }
                    diff.record(k, name, ChangeRecord::deleted(value, label.as_str()));
                }
            }
        }

        let added = fresh.len();
        for (k, row) in fresh.into_entries() {
            for (name, value) in row.fields() {
                if key_columns.contains(name) {
                    continue;
                }
                diff.record(&k, name, ChangeRecord::created(value, label.as_str()));
            }
            table.upsert(k, row);
        }
        debug!("Snapshot '{label}': {changed} change(s), {added} new, {deleted} deleted");
    }

    Ok(CompileOutcome {
        data: table.into_rows(),
        diff,
    })
}

/// Insertion-ordered key/row map. Removal tombstones the slot so surviving
/// rows keep their relative order, which keeps compile output stable
/// across runs.
#[derive(Debug, Default)]
struct MergedTable {
    slots: Vec<Option<(String, KeyedRow)>>,
    index: HashMap<String, usize>,
}

impl MergedTable {
    /// Inserts or overwrites; an overwrite keeps the key's original
    /// position (last write wins).
    fn upsert(&mut self, key: String, row: KeyedRow) {
        match self.index.get(&key) {
            Some(&idx) => self.slots[idx] = Some((key, row)),
            None => {
                self.index.insert(key.clone(), self.slots.len());
                self.slots.push(Some((key, row)));
            }
        }
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut KeyedRow> {
        let idx = *self.index.get(key)?;
        self.slots[idx].as_mut().map(|(_, row)| row)
    }

    fn remove(&mut self, key: &str) -> Option<KeyedRow> {
        let idx = self.index.remove(key)?;
        self.slots[idx].take().map(|(_, row)| row)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn keys(&self) -> impl Iterator<Item = &String> {
        self.slots.iter().flatten().map(|(key, _)| key)
    }

    fn into_entries(self) -> Vec<(String, KeyedRow)> {
        self.slots.into_iter().flatten().collect()
    }

    fn into_rows(self) -> Vec<KeyedRow> {
        self.slots.into_iter().flatten().map(|(_, row)| row).collect()
    }
}
