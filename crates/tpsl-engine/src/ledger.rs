use serde::Serialize;

use tpsl_core::{SimulationConfig, TradeOutcome};

/// Slack on the entry gate so rounding noise never admits an unfundable trade.
pub const CAPITAL_EPSILON: f64 = 1e-9;

/// Running totals of one strategy run.
///
/// `wins` and `losses` include timed exits; `timed_exits` counts how many of
/// them were force-closed at the end of their window. `unresolved` counts
/// trades left open under [`tpsl_core::ExitPolicy::Leave`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeResult {
    pub revenue: f64,
    pub loss: f64,
    pub fees: f64,
    pub wins: usize,
    pub losses: usize,
    pub unresolved: usize,
    pub timed_exits: usize,
    pub success_rate: f64,
}

impl TradeResult {
    /// Trades attempted, whatever their outcome.
    #[inline]
    pub fn trades(&self) -> usize {
        self.wins + self.losses + self.unresolved
    }

    /// `revenue - loss - fees`.
    #[inline]
    pub fn net(&self) -> f64 {
        self.revenue - self.loss - self.fees
    }

    /// Share of attempted trades left unresolved, in percent.
    pub fn unresolved_pct(&self) -> f64 {
        percent_of(self.unresolved, self.trades())
    }

    fn finalize(&mut self) {
        self.success_rate = percent_of(self.wins, self.trades());
    }
}

pub(crate) fn percent_of(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Finished run: totals plus the capital it ended with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub trades: TradeResult,
    pub initial_capital: f64,
    pub final_capital: f64,
    /// The entry gate closed before the series ran out.
    pub capital_exhausted: bool,
}

impl RunResult {
    /// `(final - initial) / initial * 100`.
    pub fn roi_pct(&self) -> f64 {
        (self.final_capital - self.initial_capital) / self.initial_capital * 100.0
    }
}

/// Capital owned by a single simulator run.
///
/// Every trade risks the same `capital_per_trade`; wins add
/// `amount - fee`, losses subtract `amount + fee`, where
/// `fee = capital_per_trade * fee_rate`. Unresolved trades touch nothing but
/// their counter.
#[derive(Debug, Clone)]
pub struct CapitalLedger {
    capital: f64,
    initial_capital: f64,
    capital_per_trade: f64,
    fee_rate: f64,
    result: TradeResult,
}

impl CapitalLedger {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            capital: config.initial_capital,
            initial_capital: config.initial_capital,
            capital_per_trade: config.capital_per_trade,
            fee_rate: config.fee_rate,
            result: TradeResult::default(),
        }
    }

    #[inline]
    pub fn capital(&self) -> f64 {
        self.capital
    }

    #[inline]
    pub fn can_open(&self) -> bool {
        self.capital > self.capital_per_trade + CAPITAL_EPSILON
    }

    pub fn apply_take_profit(&mut self, tp: f64) {
        self.win(self.capital_per_trade * tp);
    }

    pub fn apply_stop_loss(&mut self, sl: f64) {
        self.lose(self.capital_per_trade * sl);
    }

    /// Book a force-closed trade. A zero PnL counts as a (zero) loss.
    pub fn apply_timed(&mut self, pnl_pct: f64) {
        let amount = self.capital_per_trade * pnl_pct.abs();
        if pnl_pct > 0.0 {
            self.win(amount);
        } else {
            self.lose(amount);
        }
        self.result.timed_exits += 1;
    }

    pub fn record_unresolved(&mut self) {
        self.result.unresolved += 1;
    }

    /// Book any outcome of a position opened with fractions `tp`/`sl`.
    pub fn apply(&mut self, outcome: TradeOutcome, tp: f64, sl: f64) {
        match outcome {
            TradeOutcome::TakeProfit => self.apply_take_profit(tp),
            TradeOutcome::StopLoss => self.apply_stop_loss(sl),
            TradeOutcome::TimedExit { pnl_pct } => self.apply_timed(pnl_pct),
            TradeOutcome::Unresolved => self.record_unresolved(),
        }
    }

    pub fn finish(mut self, capital_exhausted: bool) -> RunResult {
        self.result.finalize();
        RunResult {
            trades: self.result,
            initial_capital: self.initial_capital,
            final_capital: self.capital,
            capital_exhausted,
        }
    }

    #[inline]
    fn fee(&self) -> f64 {
        self.capital_per_trade * self.fee_rate
    }

    fn win(&mut self, amount: f64) {
        let fee = self.fee();
        self.result.revenue += amount;
        self.result.fees += fee;
        self.result.wins += 1;
        self.capital += amount - fee;
    }

    fn lose(&mut self, amount: f64) {
        let fee = self.fee();
        self.result.loss += amount;
        self.result.fees += fee;
        self.result.losses += 1;
        self.capital -= amount + fee;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(initial: f64, per_trade: f64, fee_rate: f64) -> SimulationConfig {
        SimulationConfig {
            initial_capital: initial,
            capital_per_trade: per_trade,
            fee_rate,
            ..Default::default()
        }
    }

    #[test]
    fn test_win_and_loss_with_fees() {
        let mut ledger = CapitalLedger::new(&config(1000.0, 100.0, 0.01));
        ledger.apply_take_profit(0.05);
        assert!((ledger.capital() - 1004.0).abs() < 1e-9);
        ledger.apply_stop_loss(0.02);
        assert!((ledger.capital() - 1001.0).abs() < 1e-9);

        let run = ledger.finish(false);
        assert_eq!((run.trades.wins, run.trades.losses), (1, 1));
        assert!((run.trades.fees - 2.0).abs() < 1e-9);
        assert!((run.trades.success_rate - 50.0).abs() < 1e-9);
        assert!((run.roi_pct() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_timed_exit_splits_on_sign() {
        let mut ledger = CapitalLedger::new(&config(1000.0, 100.0, 0.0));
        ledger.apply_timed(0.015);
        ledger.apply_timed(-0.005);
        ledger.apply_timed(0.0);
        let run = ledger.finish(false);
        assert_eq!((run.trades.wins, run.trades.losses), (1, 2));
        assert_eq!(run.trades.timed_exits, 3);
        assert!((run.trades.revenue - 1.5).abs() < 1e-9);
        assert!((run.trades.loss - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_unresolved_charges_nothing() {
        let mut ledger = CapitalLedger::new(&config(1000.0, 100.0, 0.5));
        ledger.apply(TradeOutcome::Unresolved, 0.05, 0.05);
        let run = ledger.finish(false);
        assert_eq!(run.trades.unresolved, 1);
        assert_eq!(run.trades.fees, 0.0);
        assert_eq!(run.final_capital, 1000.0);
        assert_eq!(run.trades.success_rate, 0.0);
        assert!((run.trades.unresolved_pct() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_gate_is_strict() {
        let ledger = CapitalLedger::new(&config(100.0, 100.0, 0.0));
        assert!(!ledger.can_open());
        let ledger = CapitalLedger::new(&config(100.01, 100.0, 0.0));
        assert!(ledger.can_open());
    }

    #[test]
    fn test_ledger_closure() {
        let mut ledger = CapitalLedger::new(&config(1000.0, 100.0, 0.002));
        for (i, outcome) in [
            TradeOutcome::TakeProfit,
            TradeOutcome::StopLoss,
            TradeOutcome::TimedExit { pnl_pct: 0.003 },
            TradeOutcome::Unresolved,
            TradeOutcome::TimedExit { pnl_pct: -0.004 },
        ]
        .into_iter()
        .cycle()
        .take(50)
        .enumerate()
        {
            ledger.apply(outcome, 0.01 + i as f64 * 1e-4, 0.02);
        }
        let run = ledger.finish(false);
        let delta = run.final_capital - run.initial_capital;
        assert!((run.trades.net() - delta).abs() < 1e-9);
        assert_eq!(run.trades.trades(), 50);
    }

    #[test]
    fn test_empty_run_has_zero_rates() {
        let run = CapitalLedger::new(&config(1000.0, 100.0, 0.0)).finish(false);
        assert_eq!(run.trades.trades(), 0);
        assert_eq!(run.trades.success_rate, 0.0);
        assert_eq!(run.trades.unresolved_pct(), 0.0);
        assert_eq!(run.roi_pct(), 0.0);
    }
}
