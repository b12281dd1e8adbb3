//! Minimal database capability
//! ---------------------------
//! The narrow surface the marshalling path needs from a relational engine: statement
//! execution, prepare-time column discovery and row fetch. Concrete engines live behind
//! `Variant` factories (see `variant`); callers hold a `Box<dyn MinDb>`.

pub mod sqlite;
pub mod variant;

use serde::{Deserialize, Serialize};

use crate::columnar::NullSentinel;
use crate::error::AppResult;
use crate::marshal::{MarshalOptions, MarshalValue};

pub use sqlite::SqliteDb;
pub use variant::{open_variant, variant_for, Variant, VariantKind};

/// One fetched row, cells in projection order.
pub type Row = Vec<MarshalValue>;

/// Bind parameter. Scalars only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for SqlParam { fn from(v: i64) -> Self { SqlParam::Int(v) } }
impl From<f64> for SqlParam { fn from(v: f64) -> Self { SqlParam::Float(v) } }
impl From<bool> for SqlParam { fn from(v: bool) -> Self { SqlParam::Bool(v) } }
impl From<&str> for SqlParam { fn from(v: &str) -> Self { SqlParam::Text(v.to_string()) } }
impl From<String> for SqlParam { fn from(v: String) -> Self { SqlParam::Text(v) } }
impl From<Vec<u8>> for SqlParam { fn from(v: Vec<u8>) -> Self { SqlParam::Blob(v) } }

/// Rewrite booleans as 0/1 for engines that cannot bind them natively.
pub fn normalize_params(params: &[SqlParam], coerces_booleans: bool) -> Vec<SqlParam> {
    params
        .iter()
        .map(|p| match p {
            SqlParam::Bool(b) if !coerces_booleans => SqlParam::Int(if *b { 1 } else { 0 }),
            other => other.clone(),
        })
        .collect()
}

/// Access mode used when opening a database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Open read-write, creating the file if it does not exist.
    #[default]
    OpenCreate,
    /// Open read-write; the file must exist.
    OpenExisting,
    OpenReadOnly,
    /// Create a new file; fail if it already exists.
    CreateExcl,
}

impl OpenMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "open_create" => Some(OpenMode::OpenCreate),
            "existing" | "open_existing" => Some(OpenMode::OpenExisting),
            "readonly" | "read_only" | "open_readonly" => Some(OpenMode::OpenReadOnly),
            "create_excl" | "excl" => Some(OpenMode::CreateExcl),
            _ => None,
        }
    }
}

pub trait MinDb: Send + Sync {
    /// Run one or more statements that produce no rows.
    fn exec(&self, sql: &str) -> AppResult<()>;

    /// Run a single statement; returns the number of changed rows.
    fn run(&self, sql: &str, params: &[SqlParam]) -> AppResult<usize>;

    /// First row of the result, if any.
    fn get(&self, sql: &str, params: &[SqlParam]) -> AppResult<Option<Row>>;

    fn all(&self, sql: &str, params: &[SqlParam]) -> AppResult<Vec<Row>>;

    /// Column names of `sql`, discovered by preparing it. Nothing is executed.
    fn column_names(&self, sql: &str, params: &[SqlParam]) -> AppResult<Vec<String>>;

    /// Name of the registered columnar aggregate, or `None` if this handle marshals
    /// by walking rows itself.
    fn marshal_aggregate(&self) -> Option<&str>;

    fn marshal_options(&self) -> MarshalOptions;

    fn null_sentinel(&self) -> NullSentinel;

    /// Whether booleans can be bound without prior 0/1 normalization.
    fn coerces_booleans(&self) -> bool { false }

    fn close(self: Box<Self>) -> AppResult<()>;
}
