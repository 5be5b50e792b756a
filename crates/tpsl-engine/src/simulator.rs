use tpsl_core::{CandleStore, Direction, SimulationConfig, TradeOutcome};
use tpsl_strategy::{evaluate, resolve_timeout, Position};

use crate::ledger::{CapitalLedger, RunResult};

/// Replays one (direction, TP, SL) combination over the whole candle series.
///
/// Entries are taken every `stride` bars starting at bar 0, as long as a full
/// window of bars follows the entry. Each run starts from a fresh ledger, so
/// one simulator can be shared by any number of threads.
#[derive(Debug, Clone)]
pub struct StrategySimulator {
    config: SimulationConfig,
}

impl StrategySimulator {
    /// The config is expected to have passed [`SimulationConfig::validate`].
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Entries a run takes over `len` candles when capital never runs out.
    pub fn entry_count(&self, len: usize) -> usize {
        len.saturating_sub(self.config.window_size)
            .div_ceil(self.config.stride.max(1))
    }

    /// Run one pass. `tp` and `sl` are fractions.
    pub fn run(&self, candles: &CandleStore, direction: Direction, tp: f64, sl: f64) -> RunResult {
        let window = self.config.window_size;
        let stride = self.config.stride.max(1);
        let mut ledger = CapitalLedger::new(&self.config);
        let mut exhausted = false;

        // An entry needs `window` bars after it.
        let last_entry = candles.len().saturating_sub(window);
        let mut i = 0;
        while i < last_entry {
            if !ledger.can_open() {
                exhausted = true;
                tracing::debug!(
                    %direction, tp, sl, index = i, capital = ledger.capital(),
                    "capital exhausted"
                );
                break;
            }

            let position = Position::at(candles, i, direction, tp, sl);
            let outcome = match evaluate(candles, i, window, &position) {
                TradeOutcome::Unresolved => {
                    resolve_timeout(self.config.exit_policy, candles, i, window, &position)
                }
                hit => hit,
            };
            ledger.apply(outcome, tp, sl);

            if self.config.verbose {
                tracing::debug!(
                    %direction,
                    index = i,
                    open = position.open_price,
                    tp_level = position.tp_level,
                    sl_level = position.sl_level,
                    ?outcome,
                    capital = ledger.capital(),
                    "trade"
                );
            }

            i = match i.checked_add(stride) {
                Some(next) => next,
                None => break,
            };
        }

        ledger.finish(exhausted)
    }
}
