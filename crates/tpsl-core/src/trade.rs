use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Trade direction of a single simulated leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// `+1.0` for long, `-1.0` for short. Multiplying a raw price move by this
    /// gives the move in the position's favour.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("LONG"),
            Direction::Short => f.write_str("SHORT"),
        }
    }
}

/// How a trade ended.
///
/// `TimedExit` carries the signed PnL fraction realised at the window's last
/// close; positive values are wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeOutcome {
    TakeProfit,
    StopLoss,
    TimedExit { pnl_pct: f64 },
    Unresolved,
}

/// What happens to a position still open when its window runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitPolicy {
    /// Force-close at the close of the window's last bar.
    #[default]
    Close,
    /// Leave it open: counted, but excluded from capital and fees.
    Leave,
}

impl fmt::Display for ExitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitPolicy::Close => f.write_str("close"),
            ExitPolicy::Leave => f.write_str("leave"),
        }
    }
}

impl FromStr for ExitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "close" => Ok(ExitPolicy::Close),
            "leave" => Ok(ExitPolicy::Leave),
            other => Err(format!(
                "invalid exit policy '{}': use 'close' or 'leave'",
                other
            )),
        }
    }
}
