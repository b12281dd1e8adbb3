//! Unified error model for the marshalling path.
//! Every failure in a query execution is raised as one of these variants; no partial
//! buffer is ever returned alongside an error.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// The original query failed to prepare, or its column set cannot be marshalled.
    Preparation { code: String, message: String },
    /// A statement failed while running. `marshal_exec` marks the rewritten marshal query.
    Execution { code: String, message: String },
    /// The accumulator saw a row inconsistent with its header.
    Integrity { code: String, message: String },
    /// A value falls outside what the marshal format can carry.
    Encoding { code: String, message: String },
    /// Marshalled input could not be decoded.
    Corrupt { code: String, message: String },
    /// Marshalled input uses a protocol version or type this decoder does not handle.
    Unsupported { code: String, message: String },
    Config { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Preparation { code, .. }
            | AppError::Execution { code, .. }
            | AppError::Integrity { code, .. }
            | AppError::Encoding { code, .. }
            | AppError::Corrupt { code, .. }
            | AppError::Unsupported { code, .. }
            | AppError::Config { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Preparation { message, .. }
            | AppError::Execution { message, .. }
            | AppError::Integrity { message, .. }
            | AppError::Encoding { message, .. }
            | AppError::Corrupt { message, .. }
            | AppError::Unsupported { message, .. }
            | AppError::Config { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn preparation<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Preparation { code: code.into(), message: msg.into() } }
    pub fn execution<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Execution { code: code.into(), message: msg.into() } }
    pub fn integrity<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Integrity { code: code.into(), message: msg.into() } }
    pub fn encoding<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Encoding { code: code.into(), message: msg.into() } }
    pub fn corrupt<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Corrupt { code: code.into(), message: msg.into() } }
    pub fn unsupported<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Unsupported { code: code.into(), message: msg.into() } }
    pub fn config<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn io<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Errors that must reach the caller unchanged even when raised from inside the engine.
    pub fn is_fatal_marshal(&self) -> bool {
        matches!(self, AppError::Integrity { .. } | AppError::Encoding { .. })
    }

    /// Stable process exit code used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Internal { .. } => 1,
            AppError::Config { .. } => 2,
            AppError::Preparation { .. } => 3,
            AppError::Execution { .. } => 4,
            AppError::Integrity { .. } => 5,
            AppError::Encoding { .. } => 6,
            AppError::Corrupt { .. } => 7,
            AppError::Unsupported { .. } => 8,
            AppError::Io { .. } => 9,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Already-typed errors wrapped in anyhow keep their variant
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(err) => AppError::Internal { code: "internal_error".into(), message: err.to_string() },
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io { code: "io_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_mapping_is_stable() {
        assert_eq!(AppError::internal("internal", "x").exit_code(), 1);
        assert_eq!(AppError::config("bad_variant", "x").exit_code(), 2);
        assert_eq!(AppError::preparation("prepare_failed", "x").exit_code(), 3);
        assert_eq!(AppError::execution("marshal_exec", "x").exit_code(), 4);
        assert_eq!(AppError::integrity("row_width_mismatch", "x").exit_code(), 5);
        assert_eq!(AppError::encoding("length_overflow", "x").exit_code(), 6);
        assert_eq!(AppError::corrupt("truncated", "x").exit_code(), 7);
        assert_eq!(AppError::unsupported("marshal_version", "x").exit_code(), 8);
        assert_eq!(AppError::io("io_error", "x").exit_code(), 9);
    }

    #[test]
    fn display_and_serde_tagging() {
        let e = AppError::integrity("row_width_mismatch", "header has 2 columns, row has 3");
        assert_eq!(e.to_string(), "row_width_mismatch: header has 2 columns, row has 3");
        let js = serde_json::to_value(&e).unwrap();
        assert_eq!(js["type"], "integrity");
        assert_eq!(js["code"], "row_width_mismatch");
        assert!(e.is_fatal_marshal());
        assert!(!AppError::execution("marshal_exec", "x").is_fatal_marshal());
    }

    #[test]
    fn anyhow_keeps_typed_variant() {
        let wrapped = anyhow::Error::new(AppError::encoding("nesting_too_deep", "deep"));
        let back: AppError = wrapped.into();
        assert!(matches!(back, AppError::Encoding { .. }));
        let plain: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(plain.code_str(), "internal_error");
    }
}
