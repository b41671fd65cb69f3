//! Benchmark for the dispatch hot path.
//!
//! Measures synchronous rendering against a full suspend/settle/finalize
//! round trip for nested pending computations.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;
use tokio::runtime::Runtime;
use yakusoku::{Dispatcher, Host, PendingComputation, Request};

fn nested(depth: usize) -> PendingComputation {
    let mut pending = PendingComputation::ready(json!({"ok": true}));
    for _ in 0..depth {
        pending = PendingComputation::ready(pending);
    }
    pending
}

fn bench_dispatch(c: &mut Criterion) {
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Skipping benchmark: failed to start runtime: {}", e);
            return;
        }
    };
    let host = Host::with_runtime(runtime.handle().clone(), Some(Host::DEFAULT_TIMEOUT));
    let dispatcher = Dispatcher::builder().build(runtime.handle().clone());

    let mut group = c.benchmark_group("dispatch");

    group.bench_function("sync_value", |b| {
        b.iter(|| {
            let served = host.serve(Request::get("/"), |exchange| {
                let _ = dispatcher.dispatch(exchange, Ok(json!({"ok": true}).into()));
            });
            black_box(served.exchange().write_count())
        });
    });

    for depth in [0usize, 1, 5, 25] {
        group.bench_with_input(BenchmarkId::new("async_nested", depth), &depth, |b, &depth| {
            b.iter(|| {
                let served = host.serve(Request::get("/"), |exchange| {
                    let _ = dispatcher.dispatch(exchange, Ok(nested(depth).into()));
                });
                black_box(runtime.block_on(served.finished()).write_count())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
