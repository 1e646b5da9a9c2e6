mod common;

use csv_reconcile::{
    ChangeKind, ChunkSource, Error, KeySpec, MemorySource, compile, error::DecodeError,
};
use serde_json::json;

use common::init_logging;

fn snapshot(label: &str, text: &str) -> Box<dyn ChunkSource> {
    Box::new(MemorySource::from_bytes(label, text))
}

#[test]
fn single_snapshot_returns_rows_and_an_empty_diff() {
    init_logging();
    let outcome = compile(
        vec![snapshot("a.csv", "pk,val\n1,a\n2,b\n")],
        &KeySpec::column("pk"),
    )
    .expect("compile");

    assert!(outcome.diff.is_empty());
    assert_eq!(
        serde_json::to_value(&outcome.data).unwrap(),
        json!([{"pk": "1", "val": "a"}, {"pk": "2", "val": "b"}])
    );
}

#[test]
fn recompiling_identical_snapshots_is_idempotent() {
    let key = KeySpec::column("pk");
    let text = "pk,val\n1,a\n2,b\n";
    let once = compile(vec![snapshot("a.csv", text)], &key).expect("single");
    let thrice = compile(
        vec![
            snapshot("a.csv", text),
            snapshot("a.csv", text),
            snapshot("a.csv", text),
        ],
        &key,
    )
    .expect("triple");

    assert!(thrice.diff.is_empty());
    assert_eq!(thrice.data, once.data);
}

#[test]
fn tracks_delete_variation_and_new_across_two_snapshots() {
    let outcome = compile(
        vec![
            snapshot("a.csv", "pk,val\n1,a\n2,b\n"),
            snapshot("b.csv", "pk,val\n2,bb\n3,c\n"),
        ],
        &KeySpec::column("pk"),
    )
    .expect("compile");

    assert_eq!(
        serde_json::to_value(&outcome.data).unwrap(),
        json!([{"pk": "2", "val": "bb"}, {"pk": "3", "val": "c"}])
    );
    assert_eq!(
        serde_json::to_value(&outcome.diff).unwrap(),
        json!({
            "1": {"val": [{"kind": "delete", "previous": "a", "snapshot": "b.csv"}]},
            "2": {"val": [{"kind": "variation", "value": "bb", "previous": "b", "snapshot": "b.csv"}]},
            "3": {"val": [{"kind": "new", "value": "c", "snapshot": "b.csv"}]},
        })
    );
}

#[test]
fn unchanged_keys_produce_no_diff_entries() {
    let outcome = compile(
        vec![
            snapshot("a.csv", "pk,val\n1,a\n2,b\n3,c\n"),
            snapshot("b.csv", "pk,val\n2,b\n3,c\n4,d\n"),
        ],
        &KeySpec::column("pk"),
    )
    .expect("compile");

    assert_eq!(outcome.diff.keys().collect::<Vec<_>>(), ["1", "4"]);
    assert_eq!(
        outcome.diff.changes("1", "val").unwrap()[0].kind,
        ChangeKind::Delete
    );
    assert_eq!(
        outcome.diff.changes("4", "val").unwrap()[0].kind,
        ChangeKind::New
    );
}

#[test]
fn variations_are_recorded_per_column_only_where_values_differ() {
    let outcome = compile(
        vec![
            snapshot("a.csv", "pk,duration,label\n2,10,fixed\n"),
            snapshot("b.csv", "pk,duration,label\n2,25,fixed\n"),
        ],
        &KeySpec::column("pk"),
    )
    .expect("compile");

    let changes = outcome.diff.for_key("2").expect("diff for key 2");
    assert_eq!(changes.keys().collect::<Vec<_>>(), ["duration"]);
    let records = outcome.diff.changes("2", "duration").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].previous.as_deref(), Some("10"));
    assert_eq!(records[0].value.as_deref(), Some("25"));
    assert_eq!(records[0].snapshot, "b.csv");
}

#[test]
fn later_snapshots_may_permute_columns() {
    let outcome = compile(
        vec![
            snapshot("a.csv", "pk,val\n1,a\n"),
            snapshot("b.csv", "val,pk\naa,1\n"),
        ],
        &KeySpec::column("pk"),
    )
    .expect("compile");

    assert_eq!(
        serde_json::to_value(&outcome.data).unwrap(),
        json!([{"pk": "1", "val": "aa"}])
    );
    let records = outcome.diff.changes("1", "val").unwrap();
    assert_eq!(records[0].previous.as_deref(), Some("a"));
}

#[test]
fn changes_accumulate_across_many_snapshots_in_order() {
    let outcome = compile(
        vec![
            snapshot("a.csv", "pk,val\n1,a\n"),
            snapshot("b.csv", "pk,val\n1,b\n"),
            snapshot("c.csv", "pk,val\n1,c\n"),
        ],
        &KeySpec::column("pk"),
    )
    .expect("compile");

    let records = outcome.diff.changes("1", "val").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].snapshot, "b.csv");
    assert_eq!(records[1].snapshot, "c.csv");
    assert_eq!(records[1].value.as_deref(), Some("c"));
}

#[test]
fn compound_keys_join_with_the_explicit_separator() {
    let outcome = compile(
        vec![
            snapshot("a.csv", "region,id,qty\neu,7,1\nus,7,5\n"),
            snapshot("b.csv", "region,id,qty\neu,7,2\nus,7,5\n"),
        ],
        &KeySpec::compound(["region", "id"], "|"),
    )
    .expect("compile");

    let records = outcome.diff.changes("eu|7", "qty").unwrap();
    assert_eq!(records[0].value.as_deref(), Some("2"));
    assert!(outcome.diff.for_key("us|7").is_none());
}

#[test]
fn function_keys_wrap_failures_and_empty_results() {
    let sources = || vec![snapshot("a.csv", "pk,val\n1,a\n")];

    let err = compile(sources(), &KeySpec::function(|_| Ok(String::new()))).unwrap_err();
    assert!(matches!(err, Error::KeyDerivation { .. }));

    let err = compile(
        sources(),
        &KeySpec::function(|_| anyhow::bail!("no key for you")),
    )
    .unwrap_err();
    assert!(err.to_string().contains("no key for you"));
}

#[test]
fn empty_key_values_fail_the_compile() {
    let err = compile(
        vec![snapshot("a.csv", "pk,val\n,a\n")],
        &KeySpec::column("pk"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::KeyDerivation { .. }));
}

#[test]
fn mismatched_column_sets_abort_the_compile() {
    let err = compile(
        vec![
            snapshot("a.csv", "pk,val\n1,a\n"),
            snapshot("b.csv", "pk,other\n1,a\n"),
        ],
        &KeySpec::column("pk"),
    )
    .unwrap_err();
    match err {
        Error::SchemaMismatch { url, expected, found } => {
            assert_eq!(url, "b.csv");
            assert_eq!(expected, ["pk", "val"]);
            assert_eq!(found, ["pk", "other"]);
        }
        other => panic!("expected schema mismatch, got {other:?}"),
    }
}

#[test]
fn zero_snapshots_are_rejected_before_any_read() {
    let err = compile(Vec::new(), &KeySpec::column("pk")).unwrap_err();
    assert!(matches!(err, Error::EmptyInput));
}

#[test]
fn ragged_rows_abort_the_compile() {
    let err = compile(
        vec![snapshot("a.csv", "pk,val\n1,a,extra\n")],
        &KeySpec::column("pk"),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Decode(DecodeError::FieldCount { row: 1, found: 3, expected: 2 })
    ));
}

#[test]
fn truncated_snapshot_aborts_the_compile() {
    let err = compile(
        vec![
            snapshot("a.csv", "pk,val\n1,a\n"),
            snapshot("b.csv", "pk,val\n1,b"),
        ],
        &KeySpec::column("pk"),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Decode(DecodeError::TruncatedStream { .. })
    ));
}

#[test]
fn duplicate_keys_in_the_first_snapshot_take_the_last_write() {
    let outcome = compile(
        vec![snapshot("a.csv", "pk,val\n1,a\n1,z\n")],
        &KeySpec::column("pk"),
    )
    .expect("compile");

    assert_eq!(
        serde_json::to_value(&outcome.data).unwrap(),
        json!([{"pk": "1", "val": "z"}])
    );
}
