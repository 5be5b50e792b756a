use tpsl_core::{CandleStore, ExitPolicy, TradeOutcome};

use crate::position::Position;

/// Decide the fate of a position that reached neither level within its window.
///
/// [`ExitPolicy::Close`] exits at the close of the window's last bar (clipped
/// to the series end) and reports the signed PnL. [`ExitPolicy::Leave`] keeps
/// the trade open and reports it as unresolved.
pub fn resolve_timeout(
    policy: ExitPolicy,
    candles: &CandleStore,
    start: usize,
    window: usize,
    position: &Position,
) -> TradeOutcome {
    match policy {
        ExitPolicy::Leave => TradeOutcome::Unresolved,
        ExitPolicy::Close => {
            let last = start.saturating_add(window).min(candles.len().saturating_sub(1));
            TradeOutcome::TimedExit {
                pnl_pct: position.pnl_pct(candles.close[last]),
            }
        }
    }
}
