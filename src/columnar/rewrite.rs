//! Header-injection rewrite.
//!
//! Turns `<query>` with columns `c0..cn` into
//! `SELECT agg("c0", ...) AS buf FROM (SELECT 'c0' AS "c0", ... UNION ALL SELECT * FROM (<query>))`
//! so the aggregate's first row carries the column names as plain values.

use std::collections::HashSet;

use crate::error::{AppError, AppResult};
use crate::ident::{quote_ident, quote_literal, quoted_list};

pub const RESULT_COLUMN: &str = "buf";
pub const DEFAULT_AGGREGATE: &str = "sqlmarshal_columns";

/// Check that a prepared column set can be carried as a mapping.
pub fn validate_columns(names: &[String]) -> AppResult<()> {
    if names.is_empty() {
        return Err(AppError::preparation("no_columns", "query returns no columns; only row-returning statements can be marshalled"));
    }
    // SQLite resolves identifiers case-insensitively, so `a` and `A` name the same column
    // once they are referenced from the outer aggregate call.
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    for n in names {
        if !seen.insert(n.to_ascii_lowercase()) {
            return Err(AppError::preparation("duplicate_column", format!("column name '{n}' appears more than once (ignoring case); alias it to a unique name")));
        }
    }
    Ok(())
}

/// Aggregate names are embedded bare, so they must be plain identifiers.
pub fn validate_function_name(name: &str) -> AppResult<()> {
    let mut chars = name.chars();
    let ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok { Ok(()) } else { Err(AppError::config("bad_aggregate_name", format!("aggregate name '{name}' must match [A-Za-z_][A-Za-z0-9_]*"))) }
}

/// Strip trailing whitespace and `;` terminators so the query nests as a subquery.
pub fn strip_terminators(sql: &str) -> &str {
    sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// The synthetic first row: each name as a literal, aliased to itself.
pub fn header_select(names: &[String]) -> String {
    let cols = names
        .iter()
        .map(|n| format!("{} AS {}", quote_literal(n), quote_ident(n)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {cols}")
}

/// Full rewritten query. The original is placed on its own lines so a trailing
/// line comment cannot swallow the closing parenthesis.
pub fn inject_header(names: &[String], sql: &str, aggregate: &str) -> AppResult<String> {
    validate_function_name(aggregate)?;
    validate_columns(names)?;
    let body = strip_terminators(sql);
    if body.trim().is_empty() {
        return Err(AppError::preparation("empty_query", "query text is empty"));
    }
    Ok(format!(
        "SELECT {}({}) AS {} FROM ({} UNION ALL SELECT * FROM (\n{}\n))",
        aggregate,
        quoted_list(names),
        RESULT_COLUMN,
        header_select(names),
        body
    ))
}
