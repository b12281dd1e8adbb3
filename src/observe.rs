//! Hooks into a marshalling run. The library itself never prints; callers that want
//! diagnostics pass a `TracingObserver` or their own implementation.

use tracing::{debug, warn};

use crate::error::AppError;

pub trait MarshalObserver: Send + Sync {
    fn query_rewritten(&self, _original: &str, _rewritten: &str) {}
    fn marshalled(&self, _columns: usize, _bytes: usize) {}
    fn failed(&self, _sql: &str, _err: &AppError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl MarshalObserver for NoopObserver {}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl MarshalObserver for TracingObserver {
    fn query_rewritten(&self, original: &str, rewritten: &str) {
        debug!(target: "sqlmarshal::exec", "rewrite: original='{}' rewritten='{}'", original, rewritten);
    }

    fn marshalled(&self, columns: usize, bytes: usize) {
        debug!(target: "sqlmarshal::exec", "marshalled: columns={} bytes={}", columns, bytes);
    }

    fn failed(&self, sql: &str, err: &AppError) {
        warn!(target: "sqlmarshal::exec", "marshal failed: sql='{}' err={}", sql, err);
    }
}
