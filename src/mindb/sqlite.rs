//! SQLite-backed `MinDb` over `rusqlite`.
//!
//! The connection sits behind a mutex; every trait call takes the lock for exactly one
//! engine round-trip. When registered, the columnar aggregate runs inside that same
//! round-trip, so the marshal query is never interleaved with other callers' statements.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::functions::{Aggregate, Context, FunctionFlags};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use tracing::debug;

use crate::columnar::rewrite::validate_function_name;
use crate::columnar::{ColumnarAccumulator, NullSentinel};
use crate::error::{AppError, AppResult};
use crate::marshal::{MarshalOptions, MarshalValue};
use crate::mindb::{MinDb, OpenMode, Row, SqlParam};

pub const MEMORY_PATH: &str = ":memory:";

/// How a `SqliteDb` handle marshals results.
#[derive(Debug, Clone)]
pub struct SqliteSettings {
    /// Aggregate to register for header-injection marshalling; `None` walks rows directly.
    pub aggregate: Option<String>,
    pub options: MarshalOptions,
    pub sentinel: NullSentinel,
}

pub struct SqliteDb {
    conn: Mutex<Connection>,
    label: String,
    settings: SqliteSettings,
    // Typed error raised inside the aggregate during the current round-trip.
    failure: Arc<Mutex<Option<AppError>>>,
}

impl SqliteDb {
    pub fn open(path: &Path, mode: OpenMode, settings: SqliteSettings) -> AppResult<Self> {
        let label = path.display().to_string();
        let flags = open_flags(mode);
        let opened = if label == MEMORY_PATH {
            Connection::open_in_memory_with_flags(flags)
        } else {
            if mode == OpenMode::CreateExcl && path.exists() {
                return Err(AppError::io("db_exists", format!("database '{label}' already exists")));
            }
            Connection::open_with_flags(path, flags)
        };
        let conn = opened.map_err(|e| AppError::io("db_open_failed", format!("cannot open '{label}' ({mode:?}): {e}")))?;
        debug!(target: "sqlmarshal::mindb", "open: path='{}' mode={:?} aggregate={:?}", label, mode, settings.aggregate);
        Self::from_connection(conn, label, settings)
    }

    pub fn open_in_memory(settings: SqliteSettings) -> AppResult<Self> {
        Self::open(Path::new(MEMORY_PATH), OpenMode::OpenCreate, settings)
    }

    pub fn from_connection(conn: Connection, label: impl Into<String>, settings: SqliteSettings) -> AppResult<Self> {
        let failure = Arc::new(Mutex::new(None));
        if let Some(name) = &settings.aggregate {
            validate_function_name(name)?;
            let aggr = ColumnarAggregate { options: settings.options, sentinel: settings.sentinel, failure: failure.clone() };
            conn.create_aggregate_function(name.as_str(), -1, FunctionFlags::SQLITE_UTF8, aggr)
                .map_err(|e| AppError::internal("aggregate_registration", format!("cannot register aggregate '{name}': {e}")))?;
        }
        Ok(Self { conn: Mutex::new(conn), label: label.into(), settings, failure })
    }

    pub fn label(&self) -> &str { &self.label }

    fn read_row(&self, row: &rusqlite::Row<'_>, width: usize) -> AppResult<Row> {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(cell_value(row.get_ref(i).map_err(|e| self.engine_error(e))?));
        }
        Ok(cells)
    }

    /// Map an engine failure, preferring a typed error the aggregate left behind.
    fn engine_error(&self, err: rusqlite::Error) -> AppError {
        match self.failure.lock().take() {
            Some(typed) => typed,
            None => AppError::execution("exec_failed", err.to_string()),
        }
    }
}

impl MinDb for SqliteDb {
    fn exec(&self, sql: &str) -> AppResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(sql).map_err(|e| AppError::execution("exec_failed", e.to_string()))
    }

    fn run(&self, sql: &str, params: &[SqlParam]) -> AppResult<usize> {
        let conn = self.conn.lock();
        self.failure.lock().take();
        let mut stmt = conn.prepare(sql).map_err(prepare_error)?;
        stmt.execute(params_from_iter(params.iter().map(bind_value))).map_err(|e| self.engine_error(e))
    }

    fn get(&self, sql: &str, params: &[SqlParam]) -> AppResult<Option<Row>> {
        let conn = self.conn.lock();
        self.failure.lock().take();
        let mut stmt = conn.prepare(sql).map_err(prepare_error)?;
        let width = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(params.iter().map(bind_value))).map_err(|e| self.engine_error(e))?;
        let first = match rows.next().map_err(|e| self.engine_error(e))? {
            Some(row) => Some(self.read_row(row, width)?),
            None => None,
        };
        Ok(first)
    }

    fn all(&self, sql: &str, params: &[SqlParam]) -> AppResult<Vec<Row>> {
        let conn = self.conn.lock();
        self.failure.lock().take();
        let mut stmt = conn.prepare(sql).map_err(prepare_error)?;
        let width = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(params.iter().map(bind_value))).map_err(|e| self.engine_error(e))?;
        let mut out: Vec<Row> = Vec::new();
        while let Some(row) = rows.next().map_err(|e| self.engine_error(e))? {
            out.push(self.read_row(row, width)?);
        }
        Ok(out)
    }

    fn column_names(&self, sql: &str, params: &[SqlParam]) -> AppResult<Vec<String>> {
        let conn = self.conn.lock();
        let stmt = conn.prepare(sql).map_err(prepare_error)?;
        if stmt.parameter_count() != params.len() {
            return Err(AppError::preparation(
                "param_count",
                format!("query expects {} parameters, got {}", stmt.parameter_count(), params.len()),
            ));
        }
        Ok(stmt.column_names().into_iter().map(|s| s.to_string()).collect())
    }

    fn marshal_aggregate(&self) -> Option<&str> { self.settings.aggregate.as_deref() }

    fn marshal_options(&self) -> MarshalOptions { self.settings.options }

    fn null_sentinel(&self) -> NullSentinel { self.settings.sentinel }

    fn close(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        let label = this.label;
        this.conn.into_inner().close().map_err(|(_, e)| AppError::io("db_close_failed", format!("cannot close '{label}': {e}")))
    }
}

/// The reducer as SQLite sees it: one accumulator per aggregate invocation.
struct ColumnarAggregate {
    options: MarshalOptions,
    sentinel: NullSentinel,
    failure: Arc<Mutex<Option<AppError>>>,
}

impl ColumnarAggregate {
    /// Record `err` unless an earlier callback of this round-trip already failed.
    /// SQLite still runs xFinal after a failed xStep; the first error is the one reported.
    fn fail(&self, err: AppError) -> rusqlite::Error {
        let mut slot = self.failure.lock();
        if slot.is_none() {
            *slot = Some(err.clone());
        }
        rusqlite::Error::UserFunctionError(Box::new(err))
    }
}

impl Aggregate<ColumnarAccumulator, Vec<u8>> for ColumnarAggregate {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<ColumnarAccumulator> {
        Ok(ColumnarAccumulator::initialize(self.sentinel))
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut ColumnarAccumulator) -> rusqlite::Result<()> {
        let row: Row = (0..ctx.len()).map(|i| cell_value(ctx.get_raw(i))).collect();
        acc.step(row).map_err(|e| self.fail(e))
    }

    fn finalize(&self, _ctx: &mut Context<'_>, acc: Option<ColumnarAccumulator>) -> rusqlite::Result<Vec<u8>> {
        let mut acc = acc.ok_or_else(|| self.fail(AppError::integrity("missing_header", "aggregate finalized without a header row")))?;
        acc.finalize_marshal(self.options).map_err(|e| self.fail(e))
    }
}

fn open_flags(mode: OpenMode) -> OpenFlags {
    let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    match mode {
        OpenMode::OpenCreate | OpenMode::CreateExcl => base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        OpenMode::OpenExisting => base | OpenFlags::SQLITE_OPEN_READ_WRITE,
        OpenMode::OpenReadOnly => base | OpenFlags::SQLITE_OPEN_READ_ONLY,
    }
}

fn prepare_error(err: rusqlite::Error) -> AppError {
    AppError::preparation("prepare_failed", err.to_string())
}

pub(crate) fn bind_value(p: &SqlParam) -> Value {
    match p {
        SqlParam::Null => Value::Null,
        SqlParam::Bool(b) => Value::Integer(*b as i64),
        SqlParam::Int(i) => Value::Integer(*i),
        SqlParam::Float(f) => Value::Real(*f),
        SqlParam::Text(s) => Value::Text(s.clone()),
        SqlParam::Blob(b) => Value::Blob(b.clone()),
    }
}

/// Engine cell to marshal value. Text that is not valid UTF-8 is kept as bytes.
pub(crate) fn cell_value(v: ValueRef<'_>) -> MarshalValue {
    match v {
        ValueRef::Null => MarshalValue::Null,
        ValueRef::Integer(i) => MarshalValue::Int(i),
        ValueRef::Real(f) => MarshalValue::Float(f),
        ValueRef::Text(t) => match std::str::from_utf8(t) {
            Ok(s) => MarshalValue::Text(s.to_string()),
            Err(_) => MarshalValue::Bytes(t.to_vec()),
        },
        ValueRef::Blob(b) => MarshalValue::Bytes(b.to_vec()),
    }
}
