pub mod grid;
pub mod ledger;
pub mod report;
pub mod simulator;

pub use grid::{GridError, GridSearch};
pub use ledger::{CapitalLedger, RunResult, TradeResult, CAPITAL_EPSILON};
pub use report::{
    best_row, CellResult, GridReport, HedgeResult, ReportMatrix, ReportRow, Variant, EXHAUSTED_ROI,
};
pub use simulator::StrategySimulator;
