use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Indicator windows, read from the `[indicators]` table of the trading file.
///
/// ```toml
/// [indicators]
/// ema_period = 20
/// rsi_period = 14
/// bollinger_period = 20
/// bollinger_std_dev = 2.0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ema_period: usize,
    pub rsi_period: usize,
    pub bollinger_period: usize,
    /// Band width in standard deviations.
    pub bollinger_std_dev: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_period: 20,
            rsi_period: 14,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ema_period < 1 {
            return Err(Error::Config("indicators.ema_period must be >= 1".into()));
        }
        if self.rsi_period < 2 {
            return Err(Error::Config("indicators.rsi_period must be >= 2".into()));
        }
        if self.bollinger_period < 2 {
            return Err(Error::Config("indicators.bollinger_period must be >= 2".into()));
        }
        if !(self.bollinger_std_dev.is_finite() && self.bollinger_std_dev > 0.0) {
            return Err(Error::Config(format!(
                "indicators.bollinger_std_dev must be positive, got {}",
                self.bollinger_std_dev
            )));
        }
        Ok(())
    }
}

/// Entry thresholds, read from the `[entry]` table of the trading file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EntryConfig {
    /// RSI must be strictly below this to enter.
    pub rsi_oversold: f64,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self { rsi_oversold: 30.0 }
    }
}

impl EntryConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.rsi_oversold) {
            return Err(Error::Config(format!(
                "entry.rsi_oversold must be within 0..=100, got {}",
                self.rsi_oversold
            )));
        }
        Ok(())
    }
}
