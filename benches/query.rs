use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use fnv::FnvBuildHasher;
use funnelsketch::{BuildFlowHasher, FlowHasher, FunnelConfig, FunnelSketch, XxFlowHasher};
use rand::{thread_rng, Rng};
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;

fn bench_query<H: FlowHasher>(c: &mut Criterion, name: &str, hasher: impl Fn() -> H) {
    c.bench_function(name, |b| {
        let cases = 1_000_000;
        b.iter_batched(
            || {
                let mut rng = thread_rng();
                let keys: Vec<u64> = black_box(
                    (0..cases)
                        .map(|i| {
                            if i % 2 == 0 {
                                rng.gen::<u64>() % 1024
                            } else {
                                rng.gen::<u64>() % 262144
                            }
                        })
                        .collect(),
                );
                let config = FunnelConfig::new(3, 2, 1 << 16, 4096, 1024, 8, 4);
                let mut s = FunnelSketch::with_hasher(config, hasher()).unwrap();
                keys.iter().for_each(|k| {
                    s.insert(&k.to_le_bytes(), 1);
                });
                (s, keys)
            },
            |(s, keys)| {
                keys.iter().for_each(|k| {
                    let _ = s.query(&k.to_le_bytes());
                });
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_query_xx_hasher(c: &mut Criterion) {
    bench_query(c, "Test FunnelSketch query xxh32 hasher", XxFlowHasher::new);
}

fn bench_query_fx_hasher(c: &mut Criterion) {
    bench_query(c, "Test FunnelSketch query FX hasher", || {
        BuildFlowHasher::new(BuildHasherDefault::<FxHasher>::default())
    });
}

fn bench_query_fnv_hasher(c: &mut Criterion) {
    bench_query(c, "Test FunnelSketch query FNV hasher", || {
        BuildFlowHasher::new(FnvBuildHasher::default())
    });
}

criterion_group!(
    query,
    bench_query_xx_hasher,
    bench_query_fx_hasher,
    bench_query_fnv_hasher
);

criterion_main!(query);
