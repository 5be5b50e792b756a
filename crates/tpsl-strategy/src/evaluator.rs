use tpsl_core::{CandleStore, TradeOutcome};

use crate::position::Position;

/// Scan bars `start + 1 ..= start + window` for the first level the price reaches.
///
/// Within one bar the take-profit is checked before the stop-loss, so a bar
/// that spans both levels resolves as [`TradeOutcome::TakeProfit`]. The scan
/// is clipped to the end of the series. Returns [`TradeOutcome::Unresolved`]
/// when neither level is touched.
pub fn evaluate(
    candles: &CandleStore,
    start: usize,
    window: usize,
    position: &Position,
) -> TradeOutcome {
    let end = start.saturating_add(window).min(candles.len().saturating_sub(1));
    for j in (start + 1)..=end {
        let (high, low) = (candles.high[j], candles.low[j]);
        if position.take_profit_hit(high, low) {
            return TradeOutcome::TakeProfit;
        }
        if position.stop_loss_hit(high, low) {
            return TradeOutcome::StopLoss;
        }
    }
    TradeOutcome::Unresolved
}
