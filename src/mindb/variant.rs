//! Variant factories: interchangeable ways of opening a `MinDb` with marshalling wired in.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::columnar::NullSentinel;
use crate::config::MarshalConfig;
use crate::error::{AppError, AppResult};
use crate::marshal::MarshalOptions;
use crate::mindb::sqlite::{SqliteDb, SqliteSettings};
use crate::mindb::{MinDb, OpenMode};

pub trait Variant: Send + Sync {
    fn name(&self) -> &'static str;
    fn open(&self, path: &Path, mode: OpenMode) -> AppResult<Box<dyn MinDb>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    /// Header injection through a registered aggregate.
    #[default]
    Aggregate,
    /// Rows walked in-process through the same accumulator.
    Direct,
}

impl VariantKind {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggregate" | "agg" => Ok(VariantKind::Aggregate),
            "direct" | "native" => Ok(VariantKind::Direct),
            other => Err(AppError::config("bad_variant", format!("unknown variant '{other}'; expected aggregate or direct"))),
        }
    }

    /// Sentinel policy a variant uses unless configuration overrides it.
    pub fn default_sentinel(self) -> NullSentinel {
        match self {
            VariantKind::Aggregate => NullSentinel::ZeroLeadingBlobAsEmpty,
            VariantKind::Direct => NullSentinel::Passthrough,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteAggregateVariant {
    pub aggregate: String,
    pub options: MarshalOptions,
    pub sentinel: NullSentinel,
}

impl Variant for SqliteAggregateVariant {
    fn name(&self) -> &'static str { "sqlite_aggregate" }

    fn open(&self, path: &Path, mode: OpenMode) -> AppResult<Box<dyn MinDb>> {
        let settings = SqliteSettings { aggregate: Some(self.aggregate.clone()), options: self.options, sentinel: self.sentinel };
        Ok(Box::new(SqliteDb::open(path, mode, settings)?))
    }
}

#[derive(Debug, Clone)]
pub struct SqliteDirectVariant {
    pub options: MarshalOptions,
    pub sentinel: NullSentinel,
}

impl Variant for SqliteDirectVariant {
    fn name(&self) -> &'static str { "sqlite_direct" }

    fn open(&self, path: &Path, mode: OpenMode) -> AppResult<Box<dyn MinDb>> {
        let settings = SqliteSettings { aggregate: None, options: self.options, sentinel: self.sentinel };
        Ok(Box::new(SqliteDb::open(path, mode, settings)?))
    }
}

pub fn variant_for(kind: VariantKind, config: &MarshalConfig) -> Box<dyn Variant> {
    let options = config.marshal_options();
    let sentinel = config.sentinel_for(kind);
    match kind {
        VariantKind::Aggregate => Box::new(SqliteAggregateVariant { aggregate: config.aggregate.clone(), options, sentinel }),
        VariantKind::Direct => Box::new(SqliteDirectVariant { options, sentinel }),
    }
}

/// Open the database named by `config` with its configured variant.
pub fn open_variant(config: &MarshalConfig) -> AppResult<Box<dyn MinDb>> {
    let variant = variant_for(config.variant, config);
    debug!(target: "sqlmarshal::mindb", "open_variant: variant={} db='{}' mode={:?}", variant.name(), config.db_path, config.mode);
    variant.open(Path::new(&config.db_path), config.mode)
}
