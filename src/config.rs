//! Runner and engine configuration

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Top-level settings for the runner binary.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Instrument the engine trades, e.g. "BTC_USDT".
    pub instrument: String,
    #[serde(default)]
    pub trading_mode: TradingMode,
    /// Directory for observability state files.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub paper: PaperConfig,
}

impl Settings {
    /// Layer an optional `renko.toml` under `RENKO_`-prefixed environment
    /// variables (e.g. `RENKO_ENGINE__ATR_PERIOD=14`).
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("renko").required(false))
            .add_source(config::Environment::with_prefix("RENKO").separator("__"))
            .build()?
            .try_deserialize::<Settings>()?;
        settings.engine.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    #[default]
    Paper,
    Live,
}

/// Signal engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EngineConfig {
    /// ATR smoothing period (bars), >= 2.
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// Brick size = ATR * multiplier, > 0.
    #[serde(default = "default_brick_multiplier")]
    pub brick_multiplier: Decimal,
    /// Exchange price precision; brick sizes are floored to a multiple.
    #[serde(default = "default_min_tick_size")]
    pub min_tick_size: Decimal,
    /// Brick size used while the ATR is still warming up.
    #[serde(default = "default_fallback_brick_size")]
    pub fallback_brick_size: Decimal,
    /// Consecutive same-direction bricks that trigger an entry.
    #[serde(default = "default_run_length")]
    pub entry_run_length: usize,
    /// Consecutive opposite bricks that trigger an exit.
    #[serde(default = "default_run_length")]
    pub exit_run_length: usize,
    /// Fractional change below which a recomputed brick size is ignored.
    #[serde(default = "default_hysteresis_tolerance")]
    pub hysteresis_tolerance: Decimal,
    /// Bricks retained for pattern evaluation.
    #[serde(default = "default_history_retention")]
    pub history_retention: usize,
    /// Bucket width for aggregating trades into bars.
    #[serde(default = "default_bar_interval_secs")]
    pub bar_interval_secs: u64,
}

impl EngineConfig {
    /// Reject invalid configuration before any event processing begins.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.atr_period < 2 {
            return Err(EngineError::InvalidConfiguration(format!(
                "atr_period must be >= 2, got {}",
                self.atr_period
            )));
        }
        if self.brick_multiplier <= Decimal::ZERO {
            return Err(EngineError::InvalidConfiguration(format!(
                "brick_multiplier must be positive, got {}",
                self.brick_multiplier
            )));
        }
        if self.min_tick_size <= Decimal::ZERO {
            return Err(EngineError::InvalidConfiguration(format!(
                "min_tick_size must be positive, got {}",
                self.min_tick_size
            )));
        }
        if self.fallback_brick_size <= Decimal::ZERO {
            return Err(EngineError::InvalidConfiguration(format!(
                "fallback_brick_size must be positive, got {}",
                self.fallback_brick_size
            )));
        }
        if self.entry_run_length < 1 || self.exit_run_length < 1 {
            return Err(EngineError::InvalidConfiguration(format!(
                "run lengths must be >= 1, got entry={} exit={}",
                self.entry_run_length, self.exit_run_length
            )));
        }
        if self.hysteresis_tolerance < Decimal::ZERO {
            return Err(EngineError::InvalidConfiguration(format!(
                "hysteresis_tolerance must be >= 0, got {}",
                self.hysteresis_tolerance
            )));
        }
        if self.history_retention < self.entry_run_length.max(self.exit_run_length) {
            return Err(EngineError::InvalidConfiguration(format!(
                "history_retention {} is smaller than the longest run length",
                self.history_retention
            )));
        }
        if self.bar_interval_secs == 0 {
            return Err(EngineError::InvalidConfiguration(
                "bar_interval_secs must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            atr_period: default_atr_period(),
            brick_multiplier: default_brick_multiplier(),
            min_tick_size: default_min_tick_size(),
            fallback_brick_size: default_fallback_brick_size(),
            entry_run_length: default_run_length(),
            exit_run_length: default_run_length(),
            hysteresis_tolerance: default_hysteresis_tolerance(),
            history_retention: default_history_retention(),
            bar_interval_secs: default_bar_interval_secs(),
        }
    }
}

/// Paper execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PaperConfig {
    #[serde(default = "default_starting_balance")]
    pub starting_balance: Decimal,
    #[serde(default = "default_taker_fee_rate")]
    pub taker_fee_rate: Decimal,
    /// Simulated fill slippage in basis points.
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    /// Notional traded per position.
    #[serde(default = "default_trade_amount")]
    pub trade_amount: Decimal,
    /// Starting price for the synthetic paper feed.
    #[serde(default = "default_start_price")]
    pub start_price: Decimal,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            taker_fee_rate: default_taker_fee_rate(),
            slippage_bps: default_slippage_bps(),
            trade_amount: default_trade_amount(),
            start_price: default_start_price(),
        }
    }
}

fn default_workspace_dir() -> String {
    "./workspace".to_string()
}
fn default_atr_period() -> usize {
    14
}
fn default_brick_multiplier() -> Decimal {
    Decimal::ONE
}
fn default_min_tick_size() -> Decimal {
    Decimal::new(1, 2) // 0.01
}
fn default_fallback_brick_size() -> Decimal {
    Decimal::ONE
}
fn default_run_length() -> usize {
    3
}
fn default_hysteresis_tolerance() -> Decimal {
    Decimal::new(5, 2) // 0.05
}
fn default_history_retention() -> usize {
    200
}
fn default_bar_interval_secs() -> u64 {
    60
}
fn default_starting_balance() -> Decimal {
    Decimal::from(10_000)
}
fn default_taker_fee_rate() -> Decimal {
    Decimal::new(5, 4) // 0.0005
}
fn default_slippage_bps() -> u32 {
    2
}
fn default_trade_amount() -> Decimal {
    Decimal::from(1_000)
}
fn default_start_price() -> Decimal {
    Decimal::from(100)
}
