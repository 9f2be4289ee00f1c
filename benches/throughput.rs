//! Throughput Benchmark for ttlmap
//!
//! This benchmark measures the expiring cache under various workloads.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use ttlmap::commands::{ByteCache, CommandHandler};
use ttlmap::{CacheConfig, ExpiringCache, TimeUnit};

/// Builds a cache whose sweeper runs on `rt`.
fn new_cache(rt: &Runtime) -> Arc<ByteCache> {
    let _guard = rt.enter();
    let config = CacheConfig::with_default_ttl(1, TimeUnit::Hours);
    Arc::new(ExpiringCache::new(config).unwrap())
}

/// Benchmark PUT operations
fn bench_put(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = new_cache(&rt);

    let mut group = c.benchmark_group("put");
    group.throughput(Throughput::Elements(1));

    group.bench_function("put_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            cache.put(key, Bytes::from("small_value")).unwrap();
            i += 1;
        });
    });

    group.bench_function("put_large", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(64 * 1024)); // 64KB value
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            cache.put(key, value.clone()).unwrap();
            i += 1;
        });
    });

    group.bench_function("overwrite", |b| {
        let key = Bytes::from("hot");
        b.iter(|| {
            black_box(cache.put(key.clone(), Bytes::from("value")).unwrap());
        });
    });

    group.finish();
    cache.shutdown().unwrap();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = new_cache(&rt);

    // Pre-populate with data
    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        cache.put(key, value).unwrap();
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(cache.get(key.as_bytes()).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(cache.get(key.as_bytes()).unwrap());
            i += 1;
        });
    });

    group.finish();
    cache.shutdown().unwrap();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = new_cache(&rt);

    // Pre-populate
    for i in 0..10_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        cache.put(key, value).unwrap();
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                // 20% writes
                let key = Bytes::from(format!("new:{}", i));
                cache.put(key, Bytes::from("value")).unwrap();
            } else {
                // 80% reads
                let key = format!("key:{}", i % 10_000);
                black_box(cache.get(key.as_bytes()).unwrap());
            }
            i += 1;
        });
    });

    group.finish();
    cache.shutdown().unwrap();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let cache = new_cache(&rt);
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let cache = Arc::clone(&cache);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            cache.put(key.clone(), Bytes::from("value")).unwrap();
                            cache.get(&key).unwrap();
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(cache.len().unwrap());
            cache.shutdown().unwrap();
        });
    });

    group.finish();
}

/// Benchmark expiry operations
fn bench_expiry(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = new_cache(&rt);

    let notified = Arc::new(AtomicU64::new(0));
    {
        let notified = Arc::clone(&notified);
        cache
            .add_listener(move |_: &Bytes| {
                notified.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
    }

    let mut group = c.benchmark_group("expiry");
    group.throughput(Throughput::Elements(1));

    group.bench_function("put_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            cache
                .put_with_ttl(key, Bytes::from("value"), Duration::from_secs(3600))
                .unwrap();
            i += 1;
        });
    });

    group.bench_function("touch_existing", |b| {
        // Pre-create keys
        for i in 0..10_000 {
            let key = Bytes::from(format!("touch:{}", i));
            cache.put(key, Bytes::from("value")).unwrap();
        }

        let mut i = 0u64;
        b.iter(|| {
            let key = format!("touch:{}", i % 10_000);
            black_box(cache.touch(key.as_bytes()).unwrap());
            i += 1;
        });
    });

    // A zero ttl expires on the first read, which also notifies the listener
    group.bench_function("expire_on_read", |b| {
        let key = Bytes::from("ephemeral");
        b.iter(|| {
            cache
                .put_with_ttl(key.clone(), Bytes::from("value"), Duration::ZERO)
                .unwrap();
            black_box(cache.get(&key).unwrap());
        });
    });

    group.finish();
    black_box(notified.load(Ordering::Relaxed));
    cache.shutdown().unwrap();
}

/// Benchmark KEYS pattern matching
fn bench_keys(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = new_cache(&rt);

    // Pre-populate with various key patterns
    for i in 0..1_000 {
        for prefix in ["user", "session", "cache"] {
            let key = Bytes::from(format!("{}:{}", prefix, i));
            cache.put(key, Bytes::from("data")).unwrap();
        }
    }

    let handler = CommandHandler::new(Arc::clone(&cache));
    let mut group = c.benchmark_group("keys");

    group.bench_function("keys_pattern", |b| {
        b.iter(|| {
            black_box(handler.execute("KEYS user:*"));
        });
    });

    group.bench_function("keys_all", |b| {
        b.iter(|| {
            black_box(handler.execute("KEYS *"));
        });
    });

    group.finish();
    cache.shutdown().unwrap();
}

criterion_group!(
    benches,
    bench_put,
    bench_get,
    bench_mixed,
    bench_concurrent,
    bench_expiry,
    bench_keys,
);

criterion_main!(benches);
