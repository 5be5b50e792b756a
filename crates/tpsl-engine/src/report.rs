use std::fmt;

use serde::Serialize;

use tpsl_core::{Direction, GridCell};

use crate::ledger::{percent_of, RunResult};

/// Written to Hedge cells when either leg ran out of capital mid-run.
pub const EXHAUSTED_ROI: f64 = -9999.0;

/// Which variant a report row or matrix describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Long,
    Short,
    Hedge,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Long, Variant::Short, Variant::Hedge];
}

impl From<Direction> for Variant {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Long => Variant::Long,
            Direction::Short => Variant::Short,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Long => f.write_str("LONG"),
            Variant::Short => f.write_str("SHORT"),
            Variant::Hedge => f.write_str("HEDGE"),
        }
    }
}

/// Long and short legs of one cell folded onto a single capital base.
///
/// The ROI basis is one `initial_capital`, not two, even though each leg ran
/// on its own ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HedgeResult {
    pub revenue: f64,
    pub loss: f64,
    pub fees: f64,
    pub wins: usize,
    pub losses: usize,
    pub unresolved: usize,
    pub timed_exits: usize,
    pub initial_capital: f64,
    pub capital_exhausted: bool,
}

impl HedgeResult {
    pub fn combine(long: &RunResult, short: &RunResult) -> Self {
        let (l, s) = (&long.trades, &short.trades);
        Self {
            revenue: l.revenue + s.revenue,
            loss: l.loss + s.loss,
            fees: l.fees + s.fees,
            wins: l.wins + s.wins,
            losses: l.losses + s.losses,
            unresolved: l.unresolved + s.unresolved,
            timed_exits: l.timed_exits + s.timed_exits,
            initial_capital: long.initial_capital,
            capital_exhausted: long.capital_exhausted || short.capital_exhausted,
        }
    }

    pub fn net(&self) -> f64 {
        self.revenue - self.loss - self.fees
    }

    pub fn final_capital(&self) -> f64 {
        self.initial_capital + self.net()
    }

    /// Computed ROI, ignoring exhaustion.
    pub fn raw_roi_pct(&self) -> f64 {
        self.net() / self.initial_capital * 100.0
    }

    /// ROI as written to the matrix: [`EXHAUSTED_ROI`] when either leg ran dry.
    pub fn roi_pct(&self) -> f64 {
        if self.capital_exhausted {
            EXHAUSTED_ROI
        } else {
            self.raw_roi_pct()
        }
    }

    pub fn trades(&self) -> usize {
        self.wins + self.losses + self.unresolved
    }
}

/// Everything computed for one (TP, SL) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellResult {
    pub tp: f64,
    pub sl: f64,
    pub long: RunResult,
    pub short: RunResult,
    pub hedge: HedgeResult,
}

impl CellResult {
    pub fn new(cell: GridCell, long: RunResult, short: RunResult) -> Self {
        let hedge = HedgeResult::combine(&long, &short);
        Self {
            tp: cell.tp,
            sl: cell.sl,
            long,
            short,
            hedge,
        }
    }

    pub fn roi_pct(&self, variant: Variant) -> f64 {
        match variant {
            Variant::Long => self.long.roi_pct(),
            Variant::Short => self.short.roi_pct(),
            Variant::Hedge => self.hedge.roi_pct(),
        }
    }

    /// Long, Short, Hedge rows in that order.
    pub fn rows(&self) -> [ReportRow; 3] {
        [
            ReportRow::from_run(self.tp, self.sl, Variant::Long, &self.long),
            ReportRow::from_run(self.tp, self.sl, Variant::Short, &self.short),
            ReportRow::from_hedge(self.tp, self.sl, &self.hedge),
        ]
    }
}

/// One line of the tabular report. `tp` and `sl` are fractions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub tp: f64,
    pub sl: f64,
    pub direction: Variant,
    pub success_rate: f64,
    pub revenue: f64,
    pub final_capital: f64,
    pub loss: f64,
    pub fees: f64,
    pub roi_pct: f64,
    pub wins: usize,
    pub losses: usize,
    pub unresolved: usize,
    pub unresolved_pct: f64,
    pub timed_exits: usize,
    pub capital_exhausted: bool,
}

impl ReportRow {
    pub fn from_run(tp: f64, sl: f64, variant: Variant, run: &RunResult) -> Self {
        let t = &run.trades;
        Self {
            tp,
            sl,
            direction: variant,
            success_rate: t.success_rate,
            revenue: t.revenue,
            final_capital: run.final_capital,
            loss: t.loss,
            fees: t.fees,
            roi_pct: run.roi_pct(),
            wins: t.wins,
            losses: t.losses,
            unresolved: t.unresolved,
            unresolved_pct: t.unresolved_pct(),
            timed_exits: t.timed_exits,
            capital_exhausted: run.capital_exhausted,
        }
    }

    pub fn from_hedge(tp: f64, sl: f64, hedge: &HedgeResult) -> Self {
        Self {
            tp,
            sl,
            direction: Variant::Hedge,
            success_rate: percent_of(hedge.wins, hedge.trades()),
            revenue: hedge.revenue,
            final_capital: hedge.final_capital(),
            loss: hedge.loss,
            fees: hedge.fees,
            roi_pct: hedge.roi_pct(),
            wins: hedge.wins,
            losses: hedge.losses,
            unresolved: hedge.unresolved,
            unresolved_pct: percent_of(hedge.unresolved, hedge.trades()),
            timed_exits: hedge.timed_exits,
            capital_exhausted: hedge.capital_exhausted,
        }
    }
}

/// ROI grids indexed `[sl_index][tp_index]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMatrix {
    pub long: Vec<Vec<f64>>,
    pub short: Vec<Vec<f64>>,
    pub hedge: Vec<Vec<f64>>,
}

impl ReportMatrix {
    /// Lay out cells produced in row-major (SL outer, TP inner) order.
    pub fn from_cells(n_sl: usize, n_tp: usize, cells: &[CellResult]) -> Self {
        debug_assert_eq!(cells.len(), n_sl * n_tp);
        let grid = |variant: Variant| -> Vec<Vec<f64>> {
            (0..n_sl)
                .map(|row| {
                    cells[row * n_tp..(row + 1) * n_tp]
                        .iter()
                        .map(|c| c.roi_pct(variant))
                        .collect()
                })
                .collect()
        };
        Self {
            long: grid(Variant::Long),
            short: grid(Variant::Short),
            hedge: grid(Variant::Hedge),
        }
    }

    pub fn get(&self, variant: Variant) -> &[Vec<f64>] {
        match variant {
            Variant::Long => &self.long,
            Variant::Short => &self.short,
            Variant::Hedge => &self.hedge,
        }
    }
}

/// Output of a full TP×SL sweep. `tp_list` and `sl_list` are fractions and
/// label the matrix columns and rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridReport {
    pub tp_list: Vec<f64>,
    pub sl_list: Vec<f64>,
    pub matrix: ReportMatrix,
    pub rows: Vec<ReportRow>,
}

/// Highest-ROI row of a variant, skipping rows whose run ran out of capital.
pub fn best_row(rows: &[ReportRow], variant: Variant) -> Option<&ReportRow> {
    rows.iter()
        .filter(|r| r.direction == variant && !r.capital_exhausted)
        .max_by(|a, b| a.roi_pct.total_cmp(&b.roi_pct))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TradeResult;

    fn run(revenue: f64, loss: f64, fees: f64, exhausted: bool) -> RunResult {
        RunResult {
            trades: TradeResult {
                revenue,
                loss,
                fees,
                wins: 2,
                losses: 1,
                unresolved: 1,
                timed_exits: 0,
                success_rate: 50.0,
            },
            initial_capital: 1000.0,
            final_capital: 1000.0 + revenue - loss - fees,
            capital_exhausted: exhausted,
        }
    }

    #[test]
    fn test_hedge_uses_single_capital_basis() {
        let long = run(30.0, 10.0, 2.0, false);
        let short = run(5.0, 20.0, 2.0, false);
        let hedge = HedgeResult::combine(&long, &short);
        let expected = (30.0 + 5.0 - 10.0 - 20.0 - 2.0 - 2.0) / 1000.0 * 100.0;
        assert!((hedge.roi_pct() - expected).abs() < 1e-12);
        assert!((hedge.final_capital() - 1001.0).abs() < 1e-9);
    }

    #[test]
    fn test_hedge_sentinel_when_either_leg_exhausted() {
        let ok = run(30.0, 10.0, 2.0, false);
        let dry = run(0.0, 900.0, 10.0, true);
        for (l, s) in [(&ok, &dry), (&dry, &ok)] {
            let cell = CellResult::new(GridCell { tp: 0.01, sl: 0.02 }, l.clone(), s.clone());
            assert_eq!(cell.roi_pct(Variant::Hedge), EXHAUSTED_ROI);
            // The legs keep their own partial ROI.
            assert!((cell.roi_pct(Variant::Long) - l.roi_pct()).abs() < 1e-12);
            assert!(cell.rows()[2].capital_exhausted);
        }
    }

    #[test]
    fn test_hedge_row_aggregates_counts() {
        let cell = CellResult::new(
            GridCell { tp: 0.01, sl: 0.02 },
            run(1.0, 0.0, 0.0, false),
            run(0.0, 1.0, 0.0, false),
        );
        let [long, short, hedge] = cell.rows();
        assert_eq!(long.direction, Variant::Long);
        assert_eq!(short.direction, Variant::Short);
        assert_eq!(hedge.wins, 4);
        assert_eq!(hedge.unresolved, 2);
        assert!((hedge.success_rate - 50.0).abs() < 1e-9);
        assert!((hedge.unresolved_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_best_row_skips_exhausted() {
        let good = CellResult::new(GridCell { tp: 0.01, sl: 0.01 }, run(5.0, 0.0, 0.0, false), run(1.0, 0.0, 0.0, false));
        let dry = CellResult::new(GridCell { tp: 0.02, sl: 0.01 }, run(50.0, 0.0, 0.0, true), run(0.0, 0.0, 0.0, false));
        let rows: Vec<ReportRow> = [good, dry].iter().flat_map(|c| c.rows()).collect();
        assert_eq!(best_row(&rows, Variant::Long).map(|r| r.tp), Some(0.01));
        assert_eq!(best_row(&rows, Variant::Short).map(|r| r.tp), Some(0.01));
        assert!(best_row(&rows[3..], Variant::Hedge).is_none());
    }

    #[test]
    fn test_matrix_layout_row_major_by_sl() {
        let cells: Vec<CellResult> = (0..6)
            .map(|k| {
                let long = run(k as f64, 0.0, 0.0, false);
                CellResult::new(GridCell { tp: 0.0, sl: 0.0 }, long.clone(), long)
            })
            .collect();
        let m = ReportMatrix::from_cells(2, 3, &cells);
        assert_eq!(m.long.len(), 2);
        assert_eq!(m.long[0].len(), 3);
        assert!((m.long[1][2] - 0.5).abs() < 1e-12);
        assert!((m.get(Variant::Hedge)[1][0] - 0.6).abs() < 1e-12);
    }
}
