use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fmfeature::codec::{decode_features, encode_features};
use fmfeature::{parse_row, FeatureArena, FeatureMode};

fn build_rows(mode: FeatureMode) -> Vec<Vec<Option<String>>> {
    (0..1024i32)
        .map(|row| {
            (0..32i32)
                .map(|col| {
                    if col % 11 == 10 {
                        return None;
                    }
                    let id = row * 31 + col;
                    Some(match mode {
                        FeatureMode::Indexed => format!("{id}:{}", f64::from(col) * 0.25),
                        FeatureMode::Named => format!("f{col}:v{id}:{}", f64::from(col) * 0.25),
                    })
                })
                .collect()
        })
        .collect()
}

fn bench_parse_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_rows");
    for mode in [FeatureMode::Indexed, FeatureMode::Named] {
        let rows = build_rows(mode);
        group.throughput(Throughput::Elements(rows.len() as u64));
        group.bench_function(BenchmarkId::new("fresh", mode), |b| {
            b.iter(|| {
                for row in &rows {
                    let features = parse_row(Some(row), mode).expect("parse");
                    black_box(features);
                }
            });
        });
        group.bench_function(BenchmarkId::new("arena", mode), |b| {
            let mut arena = FeatureArena::new();
            b.iter(|| {
                for row in &rows {
                    let features = arena.parse_row(Some(row), mode).expect("parse");
                    black_box(features);
                }
            });
        });
    }
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    for mode in [FeatureMode::Indexed, FeatureMode::Named] {
        let features = build_rows(mode)
            .iter()
            .flat_map(|row| parse_row(Some(row), mode).expect("parse").unwrap_or_default())
            .collect::<Vec<_>>();
        let bytes = encode_features(&features).expect("encode");
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_function(BenchmarkId::new("encode", mode), |b| {
            b.iter(|| black_box(encode_features(&features).expect("encode")));
        });
        group.bench_function(BenchmarkId::new("decode", mode), |b| {
            b.iter(|| black_box(decode_features(&bytes, mode).expect("decode")));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse_rows, bench_codec);
criterion_main!(benches);
