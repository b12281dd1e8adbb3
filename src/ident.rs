//! Identifier and literal quoting
//! ------------------------------
//! Single source of truth for how column names are embedded into rewritten SQL.
//! The header projection and the aggregate call must quote names identically, so
//! both go through `quote_ident`.

/// Quote an identifier: wrap in double-quotes, doubling embedded double-quotes.
pub fn quote_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 2);
    out.push('"');
    for ch in ident.chars() { if ch == '"' { out.push('"'); out.push('"'); } else { out.push(ch); } }
    out.push('"');
    out
}

/// Quote a string literal: wrap in single-quotes, doubling embedded single-quotes.
pub fn quote_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() { if ch == '\'' { out.push('\''); out.push('\''); } else { out.push(ch); } }
    out.push('\'');
    out
}

/// Join already-known column names into a quoted, comma separated list.
pub fn quoted_list(names: &[String]) -> String {
    names.iter().map(|n| quote_ident(n)).collect::<Vec<_>>().join(", ")
}
