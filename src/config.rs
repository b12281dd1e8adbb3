//! Marshalling configuration
//! -------------------------
//! Defaults, an optional JSON file, then `SQLMARSHAL_*` environment overrides on top.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::columnar::rewrite::{validate_function_name, DEFAULT_AGGREGATE};
use crate::columnar::NullSentinel;
use crate::error::{AppError, AppResult};
use crate::marshal::{MarshalOptions, MarshalVersion};
use crate::mindb::sqlite::MEMORY_PATH;
use crate::mindb::{OpenMode, VariantKind};

pub const ENV_DB: &str = "SQLMARSHAL_DB";
pub const ENV_VARIANT: &str = "SQLMARSHAL_VARIANT";
pub const ENV_MODE: &str = "SQLMARSHAL_MODE";
pub const ENV_VERSION: &str = "SQLMARSHAL_VERSION";
pub const ENV_AGGREGATE: &str = "SQLMARSHAL_AGGREGATE";
pub const ENV_NULL_SENTINEL: &str = "SQLMARSHAL_NULL_SENTINEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarshalConfig {
    pub db_path: String,
    pub variant: VariantKind,
    pub mode: OpenMode,
    pub version: MarshalVersion,
    pub aggregate: String,
    /// Force the zero-led-blob rule on or off; `None` keeps the variant's default.
    pub null_sentinel: Option<bool>,
    pub keys_are_buffers: bool,
    pub string_to_buffer: bool,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        let opts = MarshalOptions::default();
        Self {
            db_path: MEMORY_PATH.to_string(),
            variant: VariantKind::default(),
            mode: OpenMode::default(),
            version: opts.version,
            aggregate: DEFAULT_AGGREGATE.to_string(),
            null_sentinel: None,
            keys_are_buffers: opts.keys_are_buffers,
            string_to_buffer: opts.string_to_buffer,
        }
    }
}

impl MarshalConfig {
    /// Defaults with the process environment applied.
    pub fn from_env() -> AppResult<Self> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::io("config_read", format!("cannot read config '{}': {e}", path.display())))?;
        let cfg: Self = serde_json::from_str(&text)
            .map_err(|e| AppError::config("config_parse", format!("invalid config '{}': {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) -> AppResult<()> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_DB) {
            self.db_path = v;
        }
        if let Some(v) = lookup(ENV_VARIANT) {
            self.variant = VariantKind::parse(&v)?;
        }
        if let Some(v) = lookup(ENV_MODE) {
            self.mode = OpenMode::parse(&v).ok_or_else(|| bad_value(ENV_MODE, &v))?;
        }
        if let Some(v) = lookup(ENV_VERSION) {
            let n = v.trim().parse::<u8>().map_err(|_| bad_value(ENV_VERSION, &v))?;
            self.version = MarshalVersion::from_number(n)?;
        }
        if let Some(v) = lookup(ENV_AGGREGATE) {
            self.aggregate = v.trim().to_string();
        }
        if let Some(v) = lookup(ENV_NULL_SENTINEL) {
            self.null_sentinel = Some(parse_bool(&v).ok_or_else(|| bad_value(ENV_NULL_SENTINEL, &v))?);
        }
        self.validate()
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.db_path.trim().is_empty() {
            return Err(AppError::config("bad_db_path", "database path is empty"));
        }
        validate_function_name(&self.aggregate)
    }

    pub fn marshal_options(&self) -> MarshalOptions {
        MarshalOptions { version: self.version, keys_are_buffers: self.keys_are_buffers, string_to_buffer: self.string_to_buffer }
    }

    pub fn sentinel_for(&self, kind: VariantKind) -> NullSentinel {
        match self.null_sentinel {
            Some(true) => NullSentinel::ZeroLeadingBlobAsEmpty,
            Some(false) => NullSentinel::Passthrough,
            None => kind.default_sentinel(),
        }
    }
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn bad_value(var: &str, value: &str) -> AppError {
    AppError::config("bad_env_value", format!("{var}: invalid value '{value}'"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
