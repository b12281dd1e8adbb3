//! `all_marshal`: run a query and return its whole result as one marshalled
//! `{column: [values...]}` buffer.
//!
//! Handles with a registered aggregate go through header injection and a single
//! engine round-trip. Handles without one walk the rows and feed the same
//! accumulator in-process, so both paths share one reducer and one encoder.

use tracing::debug;

use crate::columnar::rewrite::{inject_header, validate_columns};
use crate::columnar::{ColumnarAccumulator, RowInvocation};
use crate::error::{AppError, AppResult};
use crate::marshal::MarshalValue;
use crate::mindb::{normalize_params, MinDb, SqlParam};
use crate::observe::{MarshalObserver, NoopObserver};

pub const MARSHAL_EXEC: &str = "marshal_exec";

pub fn all_marshal(db: &dyn MinDb, sql: &str, params: &[SqlParam]) -> AppResult<Vec<u8>> {
    all_marshal_observed(db, sql, params, &NoopObserver)
}

pub fn all_marshal_observed(db: &dyn MinDb, sql: &str, params: &[SqlParam], observer: &dyn MarshalObserver) -> AppResult<Vec<u8>> {
    let out = marshal_query(db, sql, params, observer);
    if let Err(e) = &out {
        observer.failed(sql, e);
    }
    out
}

fn marshal_query(db: &dyn MinDb, sql: &str, params: &[SqlParam], observer: &dyn MarshalObserver) -> AppResult<Vec<u8>> {
    let params = normalize_params(params, db.coerces_booleans());
    let names = db.column_names(sql, &params)?;
    validate_columns(&names)?;
    let buf = match db.marshal_aggregate() {
        Some(aggregate) => {
            let rewritten = inject_header(&names, sql, aggregate)?;
            observer.query_rewritten(sql, &rewritten);
            let rows = db.all(&rewritten, &params).map_err(exec_error)?;
            single_blob(rows)?
        }
        None => {
            let mut acc = ColumnarAccumulator::initialize(db.null_sentinel());
            acc.apply(RowInvocation::Header(names.clone()))?;
            for row in db.all(sql, &params).map_err(exec_error)? {
                acc.apply(RowInvocation::Data(row))?;
            }
            acc.finalize_marshal(db.marshal_options())?
        }
    };
    debug!(target: "sqlmarshal::exec", "all_marshal: columns={} bytes={} aggregate={:?}", names.len(), buf.len(), db.marshal_aggregate());
    observer.marshalled(names.len(), buf.len());
    Ok(buf)
}

/// Integrity and encoding failures raised inside the aggregate keep their type;
/// everything else the engine reports is an execution failure.
fn exec_error(err: AppError) -> AppError {
    if err.is_fatal_marshal() {
        err
    } else {
        AppError::execution(MARSHAL_EXEC, err.message())
    }
}

fn single_blob(rows: Vec<Vec<MarshalValue>>) -> AppResult<Vec<u8>> {
    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (Some(row), None) => {
            let mut cells = row.into_iter();
            match (cells.next(), cells.next()) {
                (Some(MarshalValue::Bytes(b)), None) => Ok(b),
                (Some(other), None) => Err(AppError::internal("bad_aggregate_result", format!("aggregate returned {} instead of a buffer", other.type_name()))),
                _ => Err(AppError::internal("bad_aggregate_result", "aggregate result must have exactly one column")),
            }
        }
        _ => Err(AppError::internal("bad_aggregate_result", "aggregate query must return exactly one row")),
    }
}
