pub mod candle;
pub mod config;
pub mod sweep;
pub mod trade;

pub use candle::{Candle, CandleStore, CsvError};
pub use config::{ConfigError, RunConfig, SimulationConfig, SweepConfig};
pub use sweep::{paired_cells, GridCell, SweepAxis, SweepError};
pub use trade::{Direction, ExitPolicy, TradeOutcome};
