use serde::Serialize;

use tpsl_core::{CandleStore, Direction};

/// A hypothetical trade opened at a candle's open price.
///
/// `tp` and `sl` are fractions: a long with `tp = 0.05` targets `open * 1.05`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub open_price: f64,
    pub tp_level: f64,
    pub sl_level: f64,
    pub direction: Direction,
}

impl Position {
    pub fn new(open_price: f64, direction: Direction, tp: f64, sl: f64) -> Self {
        let (tp_level, sl_level) = match direction {
            Direction::Long => (open_price * (1.0 + tp), open_price * (1.0 - sl)),
            Direction::Short => (open_price * (1.0 - tp), open_price * (1.0 + sl)),
        };
        Self {
            open_price,
            tp_level,
            sl_level,
            direction,
        }
    }

    /// Open at `candles.open[index]`.
    #[inline]
    pub fn at(candles: &CandleStore, index: usize, direction: Direction, tp: f64, sl: f64) -> Self {
        Self::new(candles.open[index], direction, tp, sl)
    }

    /// Whether a bar with this range reaches the take-profit level.
    #[inline]
    pub fn take_profit_hit(&self, high: f64, low: f64) -> bool {
        match self.direction {
            Direction::Long => high >= self.tp_level,
            Direction::Short => low <= self.tp_level,
        }
    }

    /// Whether a bar with this range reaches the stop-loss level.
    #[inline]
    pub fn stop_loss_hit(&self, high: f64, low: f64) -> bool {
        match self.direction {
            Direction::Long => low <= self.sl_level,
            Direction::Short => high >= self.sl_level,
        }
    }

    /// Signed PnL fraction of closing at `exit_price`; positive is favourable.
    pub fn pnl_pct(&self, exit_price: f64) -> f64 {
        if self.open_price == 0.0 {
            return 0.0;
        }
        self.direction.sign() * (exit_price - self.open_price) / self.open_price
    }
}
