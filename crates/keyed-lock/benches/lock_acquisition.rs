//! Benchmarks for lock acquisition latency

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use keyed_lock::{LockCallOptions, LockError, LockManager, LockStore, MemoryLockStore};
use std::time::Duration;

fn bench_memory_lock_acquisition(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let manager = LockManager::new(MemoryLockStore::new());

    let mut group = c.benchmark_group("memory_lock");
    group.bench_function("try_acquire", |b| {
        b.to_async(&runtime).iter(|| async {
            let acquired = manager
                .try_acquire("bench-lock", Duration::from_secs(60), "true")
                .await
                .unwrap();
            black_box(acquired);
            manager.store().delete("bench-lock").await.unwrap();
        });
    });

    group.bench_function("with_lock_no_wait", |b| {
        let options = LockCallOptions::new().no_wait();
        b.to_async(&runtime).iter(|| async {
            let result = manager
                .with_lock_options("bench-lock", &options, || async { Ok::<_, LockError>(1) })
                .await;
            black_box(result.unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_memory_lock_acquisition);
criterion_main!(benches);
