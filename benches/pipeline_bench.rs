#![allow(clippy::unwrap_used, clippy::uninlined_format_args)]

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use packet_mux::core::middleware::MiddlewareOptions;
use packet_mux::core::pipeline::Pipeline;
use packet_mux::{Dispatcher, PrefixDispatcher};

const PACKET_SIZE: usize = 64 * 1024;

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let opts = MiddlewareOptions {
        packet_size: PACKET_SIZE,
        compression_level: 1,
    };
    let chains: [&[&str]; 4] = [&[], &["lz4"], &["zstd"], &["zstd", "lz4"]];
    let sizes = [64usize, 512, 4096, PACKET_SIZE];

    for chain in chains {
        let pipeline = Pipeline::from_names(chain, &opts).unwrap();
        let label = if chain.is_empty() {
            "none".to_string()
        } else {
            chain.join("+")
        };

        for &size in &sizes {
            let data: Vec<u8> = (0..size).map(|i| (i % 64) as u8).collect();
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_function(format!("encode_{}_{}b", label, size), |b| {
                b.iter_batched(
                    || data.clone(),
                    |d| {
                        let _ = pipeline.encode(d).unwrap();
                    },
                    BatchSize::SmallInput,
                )
            });
            group.bench_function(format!("decode_{}_{}b", label, size), |b| {
                let encoded = pipeline.encode(data.clone()).unwrap();
                b.iter_batched(
                    || encoded.clone(),
                    |e| {
                        let out = pipeline.decode(e).unwrap();
                        assert_eq!(out.len(), size);
                    },
                    BatchSize::SmallInput,
                )
            });
        }
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let dispatcher = PrefixDispatcher::default();
    let payload = b"telemetry|{\"cpu\":0.42,\"mem\":0.17}".to_vec();
    c.bench_function("prefix_dispatch", |b| {
        b.iter(|| dispatcher.identify(&payload).unwrap())
    });
}

criterion_group!(benches, bench_pipeline, bench_dispatch);
criterion_main!(benches);
