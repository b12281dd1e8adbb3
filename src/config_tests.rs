use std::collections::HashMap;
use std::io::Write;

use super::*;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |name| map.get(name).cloned()
}

#[test]
fn defaults_match_sandbox_expectations() {
    let cfg = MarshalConfig::default();
    assert_eq!(cfg.db_path, ":memory:");
    assert_eq!(cfg.variant, VariantKind::Aggregate);
    assert_eq!(cfg.mode, OpenMode::OpenCreate);
    assert_eq!(cfg.aggregate, "sqlmarshal_columns");
    assert_eq!(cfg.marshal_options(), MarshalOptions::default());
    assert_eq!(cfg.sentinel_for(VariantKind::Aggregate), NullSentinel::ZeroLeadingBlobAsEmpty);
    assert_eq!(cfg.sentinel_for(VariantKind::Direct), NullSentinel::Passthrough);
}

#[test]
fn env_overrides_every_field() {
    let mut cfg = MarshalConfig::default();
    cfg.apply_env_with(env_of(&[
        (ENV_DB, "/tmp/x.db"),
        (ENV_VARIANT, "direct"),
        (ENV_MODE, "readonly"),
        (ENV_VERSION, "1"),
        (ENV_AGGREGATE, "pack_cols"),
        (ENV_NULL_SENTINEL, "on"),
    ]))
    .unwrap();
    assert_eq!(cfg.db_path, "/tmp/x.db");
    assert_eq!(cfg.variant, VariantKind::Direct);
    assert_eq!(cfg.mode, OpenMode::OpenReadOnly);
    assert_eq!(cfg.version, MarshalVersion::V1);
    assert_eq!(cfg.aggregate, "pack_cols");
    assert_eq!(cfg.sentinel_for(VariantKind::Direct), NullSentinel::ZeroLeadingBlobAsEmpty);
}

#[test]
fn bad_env_values_are_config_errors() {
    let cases: &[(&str, &str)] = &[
        (ENV_VARIANT, "mystery"),
        (ENV_MODE, "sideways"),
        (ENV_VERSION, "two"),
        (ENV_NULL_SENTINEL, "maybe"),
        (ENV_AGGREGATE, "drop table"),
    ];
    for (var, val) in cases {
        let mut cfg = MarshalConfig::default();
        let err = cfg.apply_env_with(env_of(&[(*var, *val)])).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }), "{var}={val} gave {err:?}");
    }
    let mut cfg = MarshalConfig::default();
    let err = cfg.apply_env_with(env_of(&[(ENV_VERSION, "4")])).unwrap_err();
    assert!(matches!(err, AppError::Unsupported { .. }));
}

#[test]
fn json_file_with_partial_fields() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    write!(f, "{{\"variant\":\"direct\",\"version\":\"V1\",\"null_sentinel\":true}}").unwrap();
    let cfg = MarshalConfig::from_json_file(f.path()).unwrap();
    assert_eq!(cfg.variant, VariantKind::Direct);
    assert_eq!(cfg.version, MarshalVersion::V1);
    assert_eq!(cfg.null_sentinel, Some(true));
    assert_eq!(cfg.db_path, ":memory:");

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    write!(bad, "{{\"variant\":").unwrap();
    assert_eq!(MarshalConfig::from_json_file(bad.path()).unwrap_err().code_str(), "config_parse");
}
