use criterion::{black_box, criterion_group, criterion_main, Criterion};
use winchan::transport::memory;
use winchan::{Channel, EndpointId, InitValue, Role, SyncContext};

fn bench_set_value(c: &mut Criterion) {
    let (host, window) = memory::pair();
    let host_ctx = SyncContext::new(Role::Responder, host);
    let window_ctx = SyncContext::new(Role::Requester, window);

    let a: Channel<i64> = host_ctx
        .channel("bench.counter", InitValue::Value(0), EndpointId(1))
        .unwrap();
    let _b: Channel<i64> = window_ctx
        .channel("bench.counter", InitValue::Value(0), EndpointId(1))
        .unwrap();

    let mut n = 0i64;
    c.bench_function("set_value emit+apply", |bencher| {
        bencher.iter(|| {
            n += 1;
            a.set_value(black_box(&n)).unwrap();
        })
    });
}

fn bench_append_delta(c: &mut Criterion) {
    let (host, window) = memory::pair();
    let host_ctx = SyncContext::new(Role::Responder, host);
    let window_ctx = SyncContext::new(Role::Requester, window);

    let a: Channel<Vec<i64>> = host_ctx
        .channel("bench.log", InitValue::Value(Vec::new()), EndpointId(1))
        .unwrap();
    let _b: Channel<Vec<i64>> = window_ctx
        .channel("bench.log", InitValue::Value(Vec::new()), EndpointId(1))
        .unwrap();

    let mut n = 0i64;
    c.bench_function("append emit+apply", |bencher| {
        bencher.iter(|| {
            n += 1;
            a.append(black_box([n])).unwrap();
        })
    });
}

criterion_group!(benches, bench_set_value, bench_append_delta);
criterion_main!(benches);
