use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fusebox::{CounterKind, RollingNumber, SystemClock};

fn increment_hot_path(c: &mut Criterion) {
    let clock = Arc::new(SystemClock::default());
    let rolling = RollingNumber::new(clock, 10_000, 10).unwrap();

    c.bench_function("rolling_number_increment", |b| {
        b.iter(|| rolling.increment(black_box(CounterKind::Success)));
    });
}

fn rolling_sum_read_path(c: &mut Criterion) {
    let clock = Arc::new(SystemClock::default());
    let rolling = RollingNumber::new(clock, 10_000, 10).unwrap();
    for _ in 0..1000 {
        rolling.increment(CounterKind::Success);
    }

    c.bench_function("rolling_number_rolling_sum", |b| {
        b.iter(|| black_box(rolling.rolling_sum(CounterKind::Success)));
    });
}

criterion_group!(benches, increment_hot_path, rolling_sum_read_path);
criterion_main!(benches);
