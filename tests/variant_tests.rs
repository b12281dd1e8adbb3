use sqlmarshal::marshal::{loads, MarshalValue};
use sqlmarshal::mindb::{variant_for, OpenMode, VariantKind};
use sqlmarshal::{all_marshal, open_variant, AppError, MarshalConfig};

fn open_error(cfg: &MarshalConfig) -> AppError {
    match open_variant(cfg) {
        Err(e) => e,
        Ok(_) => panic!("expected '{}' ({:?}) to fail to open", cfg.db_path, cfg.mode),
    }
}

fn config_for(path: &std::path::Path, variant: VariantKind, mode: OpenMode) -> MarshalConfig {
    MarshalConfig { db_path: path.display().to_string(), variant, mode, ..MarshalConfig::default() }
}

#[test]
fn variants_name_themselves() {
    let cfg = MarshalConfig::default();
    assert_eq!(variant_for(VariantKind::Aggregate, &cfg).name(), "sqlite_aggregate");
    assert_eq!(variant_for(VariantKind::Direct, &cfg).name(), "sqlite_direct");
    assert_eq!(VariantKind::parse("Direct").unwrap(), VariantKind::Direct);
    assert!(matches!(VariantKind::parse("other").unwrap_err(), AppError::Config { .. }));
}

#[test]
fn memory_variant_marshals() {
    let db = open_variant(&MarshalConfig::default()).unwrap();
    assert_eq!(db.marshal_aggregate(), Some("sqlmarshal_columns"));
    let v = loads(&all_marshal(db.as_ref(), "SELECT 'x' AS b", &[]).unwrap(), MarshalConfig::default().version).unwrap();
    assert_eq!(v.get("b"), Some(&MarshalValue::List(vec![MarshalValue::text("x")])));
    db.close().unwrap();
}

#[test]
fn custom_aggregate_name_is_registered() {
    let cfg = MarshalConfig { aggregate: "pack_cols".into(), ..MarshalConfig::default() };
    let db = open_variant(&cfg).unwrap();
    assert_eq!(db.marshal_aggregate(), Some("pack_cols"));
    assert!(all_marshal(db.as_ref(), "SELECT 1 AS a", &[]).is_ok());
}

#[test]
fn create_excl_refuses_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.db");
    let cfg = config_for(&path, VariantKind::Aggregate, OpenMode::CreateExcl);
    let db = open_variant(&cfg).unwrap();
    db.exec("CREATE TABLE t(v INTEGER); INSERT INTO t VALUES (1);").unwrap();
    db.close().unwrap();
    assert!(path.exists());

    let err = open_error(&cfg);
    assert!(matches!(err, AppError::Io { .. }));
    assert_eq!(err.code_str(), "db_exists");
}

#[test]
fn open_existing_requires_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_for(&dir.path().join("missing.db"), VariantKind::Direct, OpenMode::OpenExisting);
    let err = open_error(&cfg);
    assert_eq!(err.code_str(), "db_open_failed");
}

#[test]
fn read_only_handle_marshals_but_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ro.db");
    let rw = open_variant(&config_for(&path, VariantKind::Direct, OpenMode::OpenCreate)).unwrap();
    rw.exec("CREATE TABLE t(v INTEGER); INSERT INTO t VALUES (5), (6);").unwrap();
    rw.close().unwrap();

    for kind in [VariantKind::Aggregate, VariantKind::Direct] {
        let ro = open_variant(&config_for(&path, kind, OpenMode::OpenReadOnly)).unwrap();
        let err = ro.exec("INSERT INTO t VALUES (7)").unwrap_err();
        assert!(matches!(err, AppError::Execution { .. }), "{err:?}");
        let v = loads(&all_marshal(ro.as_ref(), "SELECT v FROM t ORDER BY v", &[]).unwrap(), Default::default()).unwrap();
        assert_eq!(v.get("v"), Some(&MarshalValue::List(vec![MarshalValue::Int(5), MarshalValue::Int(6)])));
    }
}
