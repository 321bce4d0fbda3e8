//! Microbenchmarks for the port specification parser and target resolver.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use portsweep::ports::parse_port_spec;
use portsweep::targets::{resolve_targets, ResolverOptions};

fn bench_port_spec_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_port_spec");

    group.bench_function("small_list", |b| {
        b.iter(|| parse_port_spec(black_box("22,80,443,8080")).unwrap());
    });

    group.bench_function("full_range", |b| {
        b.iter(|| parse_port_spec(black_box("1-65535")).unwrap());
    });

    group.bench_function("many_disjoint_ranges", |b| {
        let spec: String = (0..1000).map(|i| format!("{},", i * 60 + 1)).collect();
        b.iter(|| parse_port_spec(black_box(&spec)).unwrap());
    });

    group.finish();
}

fn bench_target_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_targets");

    for prefix in [24u32, 20, 16] {
        let cidr = format!("10.0.0.0/{prefix}");
        let host_count = 1u64 << (32 - prefix);
        group.bench_with_input(BenchmarkId::new("cidr_expansion", prefix), &cidr, |b, cidr| {
            b.iter(|| {
                resolve_targets(
                    black_box(std::slice::from_ref(cidr)),
                    ResolverOptions { cidr_host_limit: host_count },
                )
                .unwrap()
            });
        });
    }

    group.bench_function("mixed_tokens_with_duplicates", |b| {
        let tokens: Vec<String> = (0..200)
            .flat_map(|i| vec![format!("host{i}.example.com"), format!("host{i}.example.com")])
            .collect();
        b.iter(|| resolve_targets(black_box(&tokens), ResolverOptions::default()).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_port_spec_parsing, bench_target_resolution);
criterion_main!(benches);
