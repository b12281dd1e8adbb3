use super::rewrite::{header_select, inject_header, strip_terminators, validate_columns};
use super::*;
use crate::marshal::{loads, MarshalVersion};

fn header(names: &[&str]) -> Vec<MarshalValue> { names.iter().map(|n| MarshalValue::text(*n)).collect() }

#[test]
fn zero_rows_give_empty_columns() {
    let mut acc = ColumnarAccumulator::initialize(NullSentinel::default());
    acc.step(header(&["a", "b"])).unwrap();
    let res = acc.finalize().unwrap();
    assert_eq!(res.names, vec!["a", "b"]);
    assert!(res.columns.iter().all(|c| c.is_empty()));
    assert_eq!(res.row_count(), 0);
}

#[test]
fn rows_are_split_into_columns_in_order() {
    let mut acc = ColumnarAccumulator::initialize(NullSentinel::default());
    acc.step(header(&["id", "name"])).unwrap();
    for i in 0..5i64 {
        acc.step(vec![MarshalValue::Int(i), MarshalValue::text(format!("n{i}"))]).unwrap();
    }
    assert_eq!(acc.row_count(), 5);
    let res = acc.finalize().unwrap();
    assert_eq!(res.columns[0], (0..5).map(MarshalValue::Int).collect::<Vec<_>>());
    assert_eq!(res.columns[1][3], MarshalValue::text("n3"));
}

#[test]
fn wide_row_after_narrow_header_is_integrity_violation() {
    let mut acc = ColumnarAccumulator::initialize(NullSentinel::default());
    acc.step(header(&["a", "b"])).unwrap();
    let err = acc.step(vec![MarshalValue::Int(1), MarshalValue::Int(2), MarshalValue::Int(3)]).unwrap_err();
    assert_eq!(err.code_str(), "row_width_mismatch");
    assert!(matches!(err, AppError::Integrity { .. }));
    // Nothing from the bad row leaked into the columns.
    let res = acc.finalize().unwrap();
    assert!(res.columns.iter().all(|c| c.is_empty()));
}

#[test]
fn narrow_row_is_also_rejected() {
    let mut acc = ColumnarAccumulator::initialize(NullSentinel::default());
    acc.step(header(&["a", "b"])).unwrap();
    assert!(matches!(acc.step(vec![MarshalValue::Int(1)]).unwrap_err(), AppError::Integrity { .. }));
}

#[test]
fn sentinel_applies_to_data_cells_only() {
    let mut acc = ColumnarAccumulator::initialize(NullSentinel::ZeroLeadingBlobAsEmpty);
    acc.step(header(&["v"])).unwrap();
    acc.step(vec![MarshalValue::Bytes(vec![0, 1])]).unwrap();
    acc.step(vec![MarshalValue::Bytes(vec![9])]).unwrap();
    let res = acc.finalize().unwrap();
    assert_eq!(res.columns[0], vec![MarshalValue::text(""), MarshalValue::Bytes(vec![9])]);

    let mut raw = ColumnarAccumulator::initialize(NullSentinel::Passthrough);
    raw.step(header(&["v"])).unwrap();
    raw.step(vec![MarshalValue::Bytes(vec![0, 1])]).unwrap();
    assert_eq!(raw.finalize().unwrap().columns[0], vec![MarshalValue::Bytes(vec![0, 1])]);
}

#[test]
fn state_machine_guards() {
    let mut acc = ColumnarAccumulator::initialize(NullSentinel::default());
    assert!(matches!(acc.state(), AccumulatorState::AwaitingHeader));
    assert_eq!(acc.finalize().unwrap_err().code_str(), "missing_header");
    assert!(matches!(acc.state(), AccumulatorState::Finalized));
    assert_eq!(acc.step(header(&["a"])).unwrap_err().code_str(), "already_finalized");

    let mut acc = ColumnarAccumulator::initialize(NullSentinel::default());
    assert_eq!(acc.step(vec![MarshalValue::Int(1)]).unwrap_err().code_str(), "bad_header_cell");
    let mut acc = ColumnarAccumulator::initialize(NullSentinel::default());
    assert_eq!(acc.apply(RowInvocation::Data(vec![])).unwrap_err().code_str(), "missing_header");
    acc.apply(RowInvocation::Header(vec!["a".into()])).unwrap();
    assert_eq!(acc.apply(RowInvocation::Header(vec!["a".into()])).unwrap_err().code_str(), "duplicate_header");
    acc.finalize().unwrap();
    assert_eq!(acc.finalize().unwrap_err().code_str(), "already_finalized");
}

#[test]
fn finalize_marshal_decodes_to_mapping() {
    let mut acc = ColumnarAccumulator::initialize(NullSentinel::default());
    acc.step(header(&["a", "b"])).unwrap();
    acc.step(vec![MarshalValue::Int(1), MarshalValue::text("x")]).unwrap();
    let buf = acc.finalize_marshal(MarshalOptions::default()).unwrap();
    let v = loads(&buf, MarshalVersion::V2).unwrap();
    assert_eq!(v.get("a"), Some(&MarshalValue::List(vec![MarshalValue::Int(1)])));
    assert_eq!(v.get("b"), Some(&MarshalValue::List(vec![MarshalValue::text("x")])));
}

#[test]
fn rewrite_shape() {
    let names = vec!["a".to_string(), "it's".to_string()];
    assert_eq!(header_select(&names), "SELECT 'a' AS \"a\", 'it''s' AS \"it's\"");
    let sql = inject_header(&names, "SELECT a, b AS \"it's\" FROM t;  \n", "sqlmarshal_columns").unwrap();
    assert_eq!(
        sql,
        "SELECT sqlmarshal_columns(\"a\", \"it's\") AS buf FROM (SELECT 'a' AS \"a\", 'it''s' AS \"it's\" UNION ALL SELECT * FROM (\nSELECT a, b AS \"it's\" FROM t\n))"
    );
}

#[test]
fn rewrite_rejects_unusable_column_sets() {
    assert_eq!(validate_columns(&[]).unwrap_err().code_str(), "no_columns");
    let dup = vec!["a".to_string(), "a".to_string()];
    assert_eq!(inject_header(&dup, "SELECT 1 AS a, 2 AS a", "agg").unwrap_err().code_str(), "duplicate_column");
    let folded = vec!["a".to_string(), "A".to_string()];
    assert_eq!(validate_columns(&folded).unwrap_err().code_str(), "duplicate_column");
    let one = vec!["a".to_string()];
    assert!(matches!(inject_header(&one, "SELECT 1 AS a", "bad name").unwrap_err(), AppError::Config { .. }));
    assert_eq!(inject_header(&one, " ;; ", "agg").unwrap_err().code_str(), "empty_query");
    assert_eq!(strip_terminators("SELECT 1;\n"), "SELECT 1");
}
