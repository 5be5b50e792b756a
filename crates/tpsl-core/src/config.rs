use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::sweep::SweepAxis;
use crate::trade::ExitPolicy;

/// Top-level run config, parsed from one or more TOML files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl RunConfig {
    /// Parse config from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load and merge multiple TOML files (later files override earlier).
    pub fn from_toml_files(paths: &[&Path]) -> Result<Self, ConfigError> {
        let Some((first, rest)) = paths.split_first() else {
            return Err(ConfigError::Parse("no config files provided".into()));
        };

        let mut base: toml::Value =
            toml::from_str(&read(first)?).map_err(|e| ConfigError::Parse(e.to_string()))?;

        for path in rest {
            let overlay: toml::Value =
                toml::from_str(&read(path)?).map_err(|e| ConfigError::Parse(e.to_string()))?;
            merge_toml(&mut base, overlay);
        }

        base.try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))
}

fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    if let (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) =
        (base, overlay)
    {
        for (key, value) in overlay_table {
            if let Some(base_value) = base_table.get_mut(&key) {
                if base_value.is_table() && value.is_table() {
                    merge_toml(base_value, value);
                    continue;
                }
            }
            base_table.insert(key, value);
        }
    }
}

/// Parameters of one simulation pass. Immutable for the duration of a sweep.
///
/// `fee_rate` is a fraction of `capital_per_trade` charged per closed trade.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_window")]
    pub window_size: usize,
    #[serde(default = "default_stride")]
    pub stride: usize,
    #[serde(default = "default_capital_per_trade")]
    pub capital_per_trade: f64,
    #[serde(default)]
    pub fee_rate: f64,
    #[serde(default)]
    pub exit_policy: ExitPolicy,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    /// Emit a debug event per simulated trade.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            window_size: default_window(),
            stride: default_stride(),
            capital_per_trade: default_capital_per_trade(),
            fee_rate: 0.0,
            exit_policy: ExitPolicy::Close,
            initial_capital: default_initial_capital(),
            verbose: false,
        }
    }
}

impl SimulationConfig {
    /// Reject configs the simulator cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be at least 1".into()));
        }
        if self.stride == 0 {
            return Err(ConfigError::Invalid("stride must be at least 1".into()));
        }
        if !(self.capital_per_trade.is_finite() && self.capital_per_trade > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "capital_per_trade must be positive, got {}",
                self.capital_per_trade
            )));
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if !(self.fee_rate.is_finite() && self.fee_rate >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "fee_rate must be a non-negative fraction, got {}",
                self.fee_rate
            )));
        }
        Ok(())
    }
}

/// Sweep axes in percent, plus engine knobs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub tp: SweepAxis,
    #[serde(default)]
    pub sl: SweepAxis,
    /// Pair `tp[k]` with `sl[k]` instead of the full cross product.
    #[serde(default)]
    pub paired: bool,
    /// Worker threads; `None` uses the global rayon pool.
    #[serde(default)]
    pub threads: Option<usize>,
}

fn default_window() -> usize { 60 }
fn default_stride() -> usize { 1 }
fn default_capital_per_trade() -> f64 { 100.0 }
fn default_initial_capital() -> f64 { 1000.0 }

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}
