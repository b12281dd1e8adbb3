//!
//! sqlmarshal command-line tool
//! ----------------------------
//! Runs one query against a SQLite database and writes the marshalled
//! `{column: [values...]}` buffer to stdout. Supports configuration via CLI flags,
//! a JSON config file and environment variables.

use anyhow::Result;
use std::env;
use std::io::Write;
use std::path::Path;

use sqlmarshal::channel::write_data;
use sqlmarshal::config::parse_bool;
use sqlmarshal::marshal::loads;
use sqlmarshal::observe::TracingObserver;
use sqlmarshal::{all_marshal_observed, open_variant, AppError, AppResult, MarshalConfig, OpenMode, SqlParam, VariantKind};

// Flags that consume the following token.
const VALUE_FLAGS: &[&str] = &["--db", "--variant", "--mode", "--param", "--config"];

fn parse_string_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn parse_params_arg(args: &[String]) -> AppResult<Vec<SqlParam>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--param" {
            let raw = args.get(i + 1).ok_or_else(|| AppError::config("missing_param", "--param needs a value"))?;
            out.push(parse_param(raw)?);
            i += 1;
        }
        i += 1;
    }
    Ok(out)
}

/// `int:5`, `float:1.5`, `bool:true`, `text:abc`, `null`; untyped values bind as text.
fn parse_param(raw: &str) -> AppResult<SqlParam> {
    let bad = || AppError::config("bad_param", format!("cannot parse parameter '{raw}'"));
    if raw == "null" {
        return Ok(SqlParam::Null);
    }
    match raw.split_once(':') {
        Some(("int", v)) => v.parse::<i64>().map(SqlParam::Int).map_err(|_| bad()),
        Some(("float", v)) => v.parse::<f64>().map(SqlParam::Float).map_err(|_| bad()),
        Some(("bool", v)) => parse_bool(v).map(SqlParam::Bool).ok_or_else(bad),
        Some(("text", v)) => Ok(SqlParam::Text(v.to_string())),
        _ => Ok(SqlParam::Text(raw.to_string())),
    }
}

fn positional_query(args: &[String]) -> Option<String> {
    let mut i = 1;
    while i < args.len() {
        let a = &args[i];
        if VALUE_FLAGS.contains(&a.as_str()) {
            i += 2;
            continue;
        }
        if !a.starts_with("--") {
            return Some(a.clone());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn load_config(args: &[String]) -> AppResult<MarshalConfig> {
    let mut cfg = match parse_string_arg(args, "--config") {
        Some(path) => MarshalConfig::from_json_file(Path::new(&path))?,
        None => MarshalConfig::default(),
    };
    cfg.apply_env()?;

    // CLI arguments override environment
    if let Some(db) = parse_string_arg(args, "--db") {
        cfg.db_path = db;
    }
    if let Some(v) = parse_string_arg(args, "--variant") {
        cfg.variant = VariantKind::parse(&v)?;
    }
    if let Some(m) = parse_string_arg(args, "--mode") {
        cfg.mode = OpenMode::parse(&m).ok_or_else(|| AppError::config("bad_mode", format!("unknown open mode '{m}'")))?;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run(args: &[String]) -> AppResult<()> {
    let cfg = load_config(args)?;
    let query = positional_query(args).ok_or_else(|| AppError::config("missing_query", "no query given; see --help"))?;
    let params = parse_params_arg(args)?;

    tracing::info!("sqlmarshal: db='{}' variant={:?} mode={:?} params={}", cfg.db_path, cfg.variant, cfg.mode, params.len());
    let db = open_variant(&cfg)?;
    let result = all_marshal_observed(db.as_ref(), &query, &params, &TracingObserver);
    db.close()?;
    let buf = result?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if has_flag(args, "--decode") {
        let value = loads(&buf, cfg.version)?;
        let text = serde_json::to_string_pretty(&value.to_json())
            .map_err(|e| AppError::internal("json_render", e.to_string()))?;
        writeln!(out, "{text}")?;
    } else if has_flag(args, "--frame") {
        write_data(&mut out, &buf)?;
    } else {
        out.write_all(&buf)?;
        out.flush()?;
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing subscriber; RUST_LOG overrides the default level
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("sqlmarshal\n\nUSAGE:\n  sqlmarshal_cli [OPTIONS] <QUERY>\n\nOPTIONS:\n  --db PATH          Database file or :memory: (env: SQLMARSHAL_DB, default :memory:)\n  --variant NAME     aggregate | direct (env: SQLMARSHAL_VARIANT, default aggregate)\n  --mode MODE        create | existing | readonly | create_excl (env: SQLMARSHAL_MODE)\n  --config PATH      JSON config file; environment and flags are layered on top\n  --param VALUE      Bind parameter, repeatable: int:N float:X bool:B text:S null\n  --decode           Print the decoded result as JSON instead of raw bytes\n  --frame            Wrap the buffer in a sandbox DATA message\n");
        return Ok(());
    }

    if let Err(e) = run(&args) {
        eprintln!("sqlmarshal: {e}");
        std::process::exit(e.exit_code());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &[&str]) -> Vec<String> { s.iter().map(|a| a.to_string()).collect() }

    #[test]
    fn typed_params() {
        assert_eq!(parse_param("int:42").unwrap(), SqlParam::Int(42));
        assert_eq!(parse_param("float:1.5").unwrap(), SqlParam::Float(1.5));
        assert_eq!(parse_param("bool:yes").unwrap(), SqlParam::Bool(true));
        assert_eq!(parse_param("text:a:b").unwrap(), SqlParam::Text("a:b".into()));
        assert_eq!(parse_param("null").unwrap(), SqlParam::Null);
        assert_eq!(parse_param("plain").unwrap(), SqlParam::Text("plain".into()));
        assert!(parse_param("int:x").is_err());
    }

    #[test]
    fn query_is_first_non_flag_token() {
        let args = argv(&["sqlmarshal_cli", "--db", "a.db", "--param", "int:1", "--decode", "SELECT ?"]);
        assert_eq!(positional_query(&args).as_deref(), Some("SELECT ?"));
        assert_eq!(parse_params_arg(&args).unwrap(), vec![SqlParam::Int(1)]);
        assert_eq!(parse_string_arg(&args, "--db").as_deref(), Some("a.db"));
        assert!(positional_query(&argv(&["sqlmarshal_cli", "--decode"])).is_none());
    }
}
