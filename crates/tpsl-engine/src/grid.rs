use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use thiserror::Error;

use tpsl_core::{CandleStore, ConfigError, Direction, GridCell, SimulationConfig};

use crate::report::{CellResult, GridReport, ReportMatrix, ReportRow};
use crate::simulator::StrategySimulator;

/// Sweep every (SL, TP) cell over Long and Short, in parallel.
///
/// Cells are independent: each leg of each cell runs on its own ledger against
/// the shared, read-only candle store. Results are gathered in canonical order
/// (SL outer, TP inner, then Long, Short, Hedge) whatever the thread count.
pub struct GridSearch {
    simulator: StrategySimulator,
    threads: Option<usize>,
}

impl GridSearch {
    pub fn new(config: SimulationConfig) -> Result<Self, GridError> {
        config.validate()?;
        Ok(Self {
            simulator: StrategySimulator::new(config),
            threads: None,
        })
    }

    /// Run on a dedicated pool of `threads` workers instead of the global one.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads.filter(|&n| n > 0);
        self
    }

    pub fn simulator(&self) -> &StrategySimulator {
        &self.simulator
    }

    /// Full cross product of `tp_list` × `sl_list` (fractions).
    pub fn search(
        &self,
        candles: &CandleStore,
        tp_list: &[f64],
        sl_list: &[f64],
    ) -> Result<GridReport, GridError> {
        self.search_with_cancel(candles, tp_list, sl_list, &AtomicBool::new(false))
    }

    /// Like [`search`](Self::search), but gives up once `cancel` is set.
    /// Cells already in flight finish; no partial report is returned.
    pub fn search_with_cancel(
        &self,
        candles: &CandleStore,
        tp_list: &[f64],
        sl_list: &[f64],
        cancel: &AtomicBool,
    ) -> Result<GridReport, GridError> {
        let cells: Vec<GridCell> = sl_list
            .iter()
            .flat_map(|&sl| tp_list.iter().map(move |&tp| GridCell { tp, sl }))
            .collect();

        let results = self.evaluate(candles, &cells, cancel)?;
        let matrix = ReportMatrix::from_cells(sl_list.len(), tp_list.len(), &results);

        Ok(GridReport {
            tp_list: tp_list.to_vec(),
            sl_list: sl_list.to_vec(),
            matrix,
            rows: flatten_rows(&results),
        })
    }

    /// Run an explicit list of cells (e.g. paired TP/SL) and return their rows.
    pub fn run_cells(
        &self,
        candles: &CandleStore,
        cells: &[GridCell],
    ) -> Result<Vec<ReportRow>, GridError> {
        let results = self.evaluate(candles, cells, &AtomicBool::new(false))?;
        Ok(flatten_rows(&results))
    }

    /// Both legs of a single cell plus their hedge composite.
    pub fn run_cell(&self, candles: &CandleStore, cell: GridCell) -> CellResult {
        let long = self.simulator.run(candles, Direction::Long, cell.tp, cell.sl);
        let short = self.simulator.run(candles, Direction::Short, cell.tp, cell.sl);
        CellResult::new(cell, long, short)
    }

    fn evaluate(
        &self,
        candles: &CandleStore,
        cells: &[GridCell],
        cancel: &AtomicBool,
    ) -> Result<Vec<CellResult>, GridError> {
        let start = Instant::now();
        tracing::info!(
            cells = cells.len(),
            candles = candles.len(),
            threads = self.threads.unwrap_or_else(rayon::current_num_threads),
            "grid search started"
        );

        let work = || -> Option<Vec<CellResult>> {
            cells
                .par_iter()
                .map(|&cell| {
                    if cancel.load(Ordering::Relaxed) {
                        return None;
                    }
                    Some(self.run_cell(candles, cell))
                })
                .collect()
        };

        let results = match self.threads {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| GridError::ThreadPool(e.to_string()))?
                .install(work),
            None => work(),
        };

        let Some(results) = results else {
            tracing::warn!(elapsed_ms = start.elapsed().as_millis() as u64, "grid search cancelled");
            return Err(GridError::Cancelled);
        };

        tracing::info!(
            cells = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "grid search finished"
        );
        Ok(results)
    }
}

fn flatten_rows(results: &[CellResult]) -> Vec<ReportRow> {
    results.iter().flat_map(|c| c.rows()).collect()
}

#[derive(Debug, Error)]
pub enum GridError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("grid search cancelled")]
    Cancelled,
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Variant, EXHAUSTED_ROI};
    use tpsl_core::ExitPolicy;

    fn make_candles(n: usize) -> CandleStore {
        let mut store = CandleStore::with_capacity(n);
        let base_ts: i64 = 1735689600;
        for i in 0..n {
            let ts = base_ts + (i as i64) * 60;
            let price = 100.0 + (i as f64 * 0.3).sin() * 2.0;
            let next = 100.0 + ((i + 1) as f64 * 0.3).sin() * 2.0;
            store.push(ts, price, price.max(next) + 0.1, price.min(next) - 0.1, next, 1000.0);
        }
        store
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            window_size: 10,
            stride: 2,
            capital_per_trade: 100.0,
            fee_rate: 0.001,
            exit_policy: ExitPolicy::Close,
            initial_capital: 10_000.0,
            verbose: false,
        }
    }

    const TP: [f64; 3] = [0.005, 0.01, 0.02];
    const SL: [f64; 2] = [0.005, 0.015];

    #[test]
    fn test_grid_fully_populated() {
        let candles = make_candles(300);
        let report = GridSearch::new(config()).unwrap().search(&candles, &TP, &SL).unwrap();

        assert_eq!(report.rows.len(), TP.len() * SL.len() * 3);
        for variant in Variant::ALL {
            let m = report.matrix.get(variant);
            assert_eq!(m.len(), SL.len());
            assert!(m.iter().all(|row| row.len() == TP.len()));
            assert!(m.iter().flatten().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_rows_in_canonical_order() {
        let candles = make_candles(200);
        let report = GridSearch::new(config()).unwrap().search(&candles, &TP, &SL).unwrap();

        for (k, chunk) in report.rows.chunks(3).enumerate() {
            let (sl, tp) = (SL[k / TP.len()], TP[k % TP.len()]);
            let variants: Vec<Variant> = chunk.iter().map(|r| r.direction).collect();
            assert_eq!(variants, Variant::ALL);
            assert!(chunk.iter().all(|r| r.tp == tp && r.sl == sl));

            let (i, j) = (k / TP.len(), k % TP.len());
            assert_eq!(report.matrix.long[i][j], chunk[0].roi_pct);
            assert_eq!(report.matrix.short[i][j], chunk[1].roi_pct);
            assert_eq!(report.matrix.hedge[i][j], chunk[2].roi_pct);
        }
    }

    #[test]
    fn test_thread_count_does_not_change_results() {
        let candles = make_candles(400);
        let global = GridSearch::new(config()).unwrap().search(&candles, &TP, &SL).unwrap();
        let single = GridSearch::new(config())
            .unwrap()
            .with_threads(Some(1))
            .search(&candles, &TP, &SL)
            .unwrap();
        let four = GridSearch::new(config())
            .unwrap()
            .with_threads(Some(4))
            .search(&candles, &TP, &SL)
            .unwrap();
        assert_eq!(global, single);
        assert_eq!(global, four);
    }

    #[test]
    fn test_legs_match_standalone_runs() {
        let candles = make_candles(250);
        let grid = GridSearch::new(config()).unwrap();
        let report = grid.search(&candles, &TP, &SL).unwrap();

        let sim = StrategySimulator::new(config());
        let long = sim.run(&candles, Direction::Long, TP[2], SL[1]);
        let short = sim.run(&candles, Direction::Short, TP[2], SL[1]);
        assert_eq!(report.matrix.long[1][2], long.roi_pct());
        assert_eq!(report.matrix.short[1][2], short.roi_pct());
        let net = long.trades.net() + short.trades.net();
        assert!((report.matrix.hedge[1][2] - net / 10_000.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_returns_error() {
        let candles = make_candles(200);
        let cancel = AtomicBool::new(true);
        let res = GridSearch::new(config())
            .unwrap()
            .search_with_cancel(&candles, &TP, &SL, &cancel);
        assert!(matches!(res, Err(GridError::Cancelled)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let res = GridSearch::new(SimulationConfig { window_size: 0, ..config() });
        assert!(matches!(res, Err(GridError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn test_run_cells_paired() {
        let candles = make_candles(200);
        let cells = tpsl_core::paired_cells(&[0.01, 0.02], &[0.01, 0.005]).unwrap();
        let rows = GridSearch::new(config()).unwrap().run_cells(&candles, &cells).unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!((rows[3].tp, rows[3].sl), (0.02, 0.005));
    }

    #[test]
    fn test_exhausted_leg_marks_hedge_cell() {
        let candles = make_candles(400);
        let tight = SimulationConfig {
            initial_capital: 101.0,
            fee_rate: 0.01,
            ..config()
        };
        let report = GridSearch::new(tight).unwrap().search(&candles, &[0.05], &[0.001]).unwrap();
        let [long, short, hedge] = [&report.rows[0], &report.rows[1], &report.rows[2]];
        assert!(long.capital_exhausted || short.capital_exhausted);
        assert!(hedge.capital_exhausted);
        assert_eq!(report.matrix.hedge[0][0], EXHAUSTED_ROI);
        assert_ne!(report.matrix.long[0][0], EXHAUSTED_ROI);
    }
}
