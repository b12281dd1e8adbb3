use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};

use sqlmarshal::columnar::{ColumnarAccumulator, NullSentinel};
use sqlmarshal::marshal::{MarshalOptions, MarshalValue};
use sqlmarshal::mindb::sqlite::{SqliteDb, SqliteSettings};
use sqlmarshal::mindb::MinDb;
use sqlmarshal::{all_marshal, MarshalConfig, VariantKind};

fn gen_rows(n: usize, seed: u64) -> Vec<Vec<MarshalValue>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            vec![
                MarshalValue::Int(i as i64),
                MarshalValue::Float(rng.gen::<f64>()),
                MarshalValue::text(format!("name_{}", rng.gen::<u32>())),
                if rng.gen_bool(0.1) { MarshalValue::Null } else { MarshalValue::Int(rng.gen::<i64>()) },
            ]
        })
        .collect()
}

fn header() -> Vec<MarshalValue> {
    ["id", "score", "name", "big"].iter().map(|n| MarshalValue::text(*n)).collect()
}

fn bench_accumulate(c: &mut Criterion) {
    let ns = [1_000usize, 100_000usize];
    let mut group = c.benchmark_group("columnar_encode");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(20);

    for &n in &ns {
        let rows = gen_rows(n, 0xBEEF_CAFE);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("step_finalize", n.to_string()), &n, |b, _| {
            b.iter(|| {
                let mut acc = ColumnarAccumulator::initialize(NullSentinel::ZeroLeadingBlobAsEmpty);
                acc.step(header()).unwrap();
                for r in &rows { acc.step(r.clone()).unwrap(); }
                criterion::black_box(acc.finalize_marshal(MarshalOptions::default()).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_sqlite(c: &mut Criterion) {
    let n = 50_000usize;
    let mut group = c.benchmark_group("sqlite_all_marshal");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(10);
    group.throughput(Throughput::Elements(n as u64));

    let cfg = MarshalConfig::default();
    for kind in [VariantKind::Aggregate, VariantKind::Direct] {
        let settings = SqliteSettings {
            aggregate: if kind == VariantKind::Aggregate { Some(cfg.aggregate.clone()) } else { None },
            options: cfg.marshal_options(),
            sentinel: cfg.sentinel_for(kind),
        };
        let db = SqliteDb::open_in_memory(settings).unwrap();
        db.exec(&format!(
            "CREATE TABLE t(id INTEGER, score REAL, name TEXT);
             WITH RECURSIVE s(i) AS (SELECT 0 UNION ALL SELECT i + 1 FROM s WHERE i < {})
             INSERT INTO t SELECT i, i * 0.5, 'n' || i FROM s;",
            n - 1
        ))
        .unwrap();
        group.bench_function(BenchmarkId::new("select_all", format!("{kind:?}")), |b| {
            b.iter(|| criterion::black_box(all_marshal(&db, "SELECT id, score, name FROM t", &[]).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_accumulate, bench_sqlite);
criterion_main!(benches);
