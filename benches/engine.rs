//! Benchmarks for the signal engine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cdlfuse::prelude::*;

/// Simple test bar structure
#[derive(Debug, Clone, Copy)]
struct TestBar {
  o: f64,
  h: f64,
  l: f64,
  c: f64,
}

impl Ohlc for TestBar {
  fn open(&self) -> f64 {
    self.o
  }

  fn high(&self) -> f64 {
    self.h
  }

  fn low(&self) -> f64 {
    self.l
  }

  fn close(&self) -> f64 {
    self.c
  }
}

/// Generate realistic random bars
fn generate_bars(n: usize) -> Vec<TestBar> {
  let mut bars = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 0.99; // Deterministic "random", zero drift
    let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;

    let o = price;
    let c = price + change;
    let h = o.max(c) + volatility * 0.5;
    let l = o.min(c) - volatility * 0.5;

    bars.push(TestBar { o, h, l, c });
    price = c;
  }

  bars
}

fn bench_moving_average(c: &mut Criterion) {
  let closes: Vec<f64> = generate_bars(1000).iter().map(|b| b.c).collect();
  let ema = MovingAverage::new(20).unwrap();

  c.bench_function("ema_20_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(ema.compute(black_box(&closes)));
    })
  });
}

fn bench_patterns(c: &mut Criterion) {
  let bars = generate_bars(1000);
  let recognizer = PatternRecognizer::default();

  c.bench_function("pattern_scores_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(recognizer.scores(black_box(&bars)));
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let sequential = EngineBuilder::new().build().unwrap();
  let parallel = EngineBuilder::new().parallel_columns(true).build().unwrap();

  let mut group = c.benchmark_group("scaling");

  for size in [100, 1000, 10000].iter() {
    let bars = generate_bars(*size);

    group.bench_with_input(BenchmarkId::new("compute", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(sequential.compute(black_box(&bars)));
      })
    });

    group.bench_with_input(BenchmarkId::new("compute_parallel_columns", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(parallel.compute(black_box(&bars)));
      })
    });
  }

  group.finish();
}

fn bench_run_parallel(c: &mut Criterion) {
  let bars1 = generate_bars(1000);
  let bars2 = generate_bars(1000);
  let bars3 = generate_bars(1000);
  let bars4 = generate_bars(1000);

  let engine = SignalEngine::with_defaults();

  let instruments: Vec<(&str, &[TestBar])> =
    vec![("SYM1", &bars1), ("SYM2", &bars2), ("SYM3", &bars3), ("SYM4", &bars4)];

  c.bench_function("run_parallel_4_instruments", |b| {
    b.iter(|| {
      let _ = black_box(run_parallel(black_box(&engine), black_box(instruments.clone())));
    })
  });
}

criterion_group!(benches, bench_moving_average, bench_patterns, bench_scaling, bench_run_parallel);
criterion_main!(benches);
