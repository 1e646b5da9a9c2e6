//! The field-level change log accumulated across snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Variation,
    Delete,
}

/// One observed change to one column of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    /// The value after the change; `None` for a delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// The value before the change; `None` for a new record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    /// Label of the snapshot that introduced the change.
    pub snapshot: String,
}

impl ChangeRecord {
    pub fn created(value: impl Into<String>, snapshot: impl Into<String>) -> Self {
        ChangeRecord {
            kind: ChangeKind::New,
            value: Some(value.into()),
            previous: None,
            snapshot: snapshot.into(),
        }
    }

    pub fn variation(
        previous: impl Into<String>,
        value: impl Into<String>,
        snapshot: impl Into<String>,
    ) -> Self {
        ChangeRecord {
            kind: ChangeKind::Variation,
            value: Some(value.into()),
            previous: Some(previous.into()),
            snapshot: snapshot.into(),
        }
    }

    pub fn deleted(previous: impl Into<String>, snapshot: impl Into<String>) -> Self {
        ChangeRecord {
            kind: ChangeKind::Delete,
            value: None,
            previous: Some(previous.into()),
            snapshot: snapshot.into(),
        }
    }
}

/// Change records grouped by primary key, then column.
///
/// Backed by `BTreeMap` so iteration and serialization order are
/// deterministic across runs. Records under one column append in snapshot
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotDiff {
    entries: BTreeMap<String, BTreeMap<String, Vec<ChangeRecord>>>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys with at least one recorded change.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn record(&mut self, key: &str, column: &str, record: ChangeRecord) {
        self.entries
            .entry(key.to_string())
            .or_default()
            .entry(column.to_string())
            .or_default()
            .push(record);
    }

    pub fn for_key(&self, key: &str) -> Option<&BTreeMap<String, Vec<ChangeRecord>>> {
        self.entries.get(key)
    }

    pub fn changes(&self, key: &str, column: &str) -> Option<&[ChangeRecord]> {
        self.entries
            .get(key)?
            .get(column)
            .map(|records| records.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|key| key.as_str())
    }

    /// Renders the change log as pretty-printed JSON, keys in sorted order.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
