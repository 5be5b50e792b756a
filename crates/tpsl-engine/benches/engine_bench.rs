use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tpsl_core::{CandleStore, Direction, SimulationConfig, SweepAxis};
use tpsl_engine::{GridSearch, StrategySimulator};

fn make_candles(n: usize) -> CandleStore {
    let mut store = CandleStore::with_capacity(n);
    let base_ts: i64 = 1735689600;
    for i in 0..n {
        let ts = base_ts + (i as i64) * 60;
        // Slow trend plus a swing wide enough to trip most TP/SL levels
        let trend = (i as f64) * 0.001;
        let swing = ((i as f64) * 0.05).sin() * 1.5;
        let price = 100.0 + trend + swing;
        store.push(ts, price, price + 0.2, price - 0.2, price + 0.05, 1000.0 + (i as f64));
    }
    store
}

fn config() -> SimulationConfig {
    SimulationConfig {
        initial_capital: 1_000_000.0,
        fee_rate: 0.0005,
        ..Default::default()
    }
}

fn bench_single_run(c: &mut Criterion) {
    let candles = make_candles(10_000);
    let sim = StrategySimulator::new(config());

    c.bench_function("single_run_10k", |b| {
        b.iter(|| {
            let result = sim.run(black_box(&candles), Direction::Long, 0.01, 0.01);
            black_box(result);
        });
    });
}

fn bench_grid_search(c: &mut Criterion) {
    let candles = make_candles(10_000);
    let grid = GridSearch::new(config()).unwrap();
    let tp = SweepAxis::Linear { min: 0.25, max: 2.5, points: 10 }.fractions().unwrap();
    let sl = SweepAxis::Linear { min: 0.25, max: 2.5, points: 10 }.fractions().unwrap();

    c.bench_function("grid_10x10_10k", |b| {
        b.iter(|| {
            let report = grid.search(black_box(&candles), &tp, &sl).unwrap();
            black_box(report);
        });
    });
}

fn bench_load_csv(c: &mut Criterion) {
    let candles = make_candles(100_000);
    let mut csv = String::from("timestamp;open;high;low;close;volume\n");
    for i in 0..candles.len() {
        let k = candles.candle(i);
        csv.push_str(&format!(
            "{};{};{};{};{};{}\n",
            k.timestamp, k.open, k.high, k.low, k.close, k.volume
        ));
    }

    c.bench_function("parse_csv_100k", |b| {
        b.iter(|| {
            let store = CandleStore::parse_csv_bytes(black_box(csv.as_bytes())).unwrap();
            black_box(store);
        });
    });
}

criterion_group!(benches, bench_single_run, bench_grid_search, bench_load_csv);
criterion_main!(benches);
