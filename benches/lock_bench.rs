//! Microbenchmarks for lock acquisition paths.
//!
//! Benchmarks cover:
//! - Uncontended single-container lock/unlock
//! - Non-blocking try-lock
//! - Multi-lock acquisition over pairs and quads
//! - The all-or-nothing try path of the multi-lock guard

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use multilock::{MultiLock, Mutex};

fn bench_mutex(c: &mut Criterion) {
    let mutex = Mutex::new(0u64);

    c.bench_function("mutex_lock_uncontended", |b| {
        b.iter(|| {
            let mut guard = mutex.lock();
            *guard += 1;
            black_box(&mut guard);
        });
    });

    c.bench_function("mutex_try_lock_uncontended", |b| {
        b.iter(|| {
            let guard = mutex.try_lock().expect("uncontended");
            black_box(*guard);
        });
    });
}

fn bench_multi_lock(c: &mut Criterion) {
    let a = Mutex::new(0u64);
    let b = Mutex::new(String::new());
    let c2 = Mutex::new(0u32);
    let d = Mutex::new(0u8);

    c.bench_function("multi_lock_pair", |bench| {
        bench.iter(|| {
            let mut guard = MultiLock::new((&a, &b));
            let (x, s) = guard.data_mut().expect("guard owns both locks");
            *x += 1;
            black_box(s);
        });
    });

    c.bench_function("multi_lock_quad", |bench| {
        bench.iter(|| {
            let guard = MultiLock::new((&a, &b, &c2, &d));
            black_box(guard.owns());
        });
    });

    c.bench_function("multi_lock_try_pair", |bench| {
        bench.iter(|| {
            let guard = MultiLock::try_new((&a, &b));
            black_box(guard.owns());
        });
    });
}

criterion_group!(benches, bench_mutex, bench_multi_lock);
criterion_main!(benches);
