use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Polling cadence and candle request shape, read from the `[schedule]`
/// table of the trading file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Sleep between the end of one cycle and the start of the next.
    pub poll_interval_secs: u64,
    /// Report every N full cycles.
    pub report_every: u64,
    /// Candle interval passed to the market-data supplier, e.g. "1h".
    pub timeframe: String,
    pub candle_limit: usize,
    /// Upper bound on a single symbol's fetch.
    pub fetch_timeout_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            report_every: 10,
            timeframe: "1h".to_string(),
            candle_limit: 100,
            fetch_timeout_secs: 30,
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("schedule.poll_interval_secs must be > 0".into()));
        }
        if self.report_every == 0 {
            return Err(Error::Config("schedule.report_every must be >= 1".into()));
        }
        if self.timeframe.trim().is_empty() {
            return Err(Error::Config("schedule.timeframe must not be empty".into()));
        }
        if self.candle_limit == 0 {
            return Err(Error::Config("schedule.candle_limit must be >= 1".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(Error::Config("schedule.fetch_timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_hourly_setup() {
        let cfg = ScheduleConfig::default();
        assert_eq!(cfg.poll_interval(), Duration::from_secs(60));
        assert_eq!(cfg.report_every, 10);
        assert_eq!(cfg.timeframe, "1h");
        assert_eq!(cfg.candle_limit, 100);
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_table_keeps_defaults() {
        let cfg: ScheduleConfig = toml::from_str("report_every = 5").unwrap();
        assert_eq!(cfg.report_every, 5);
        assert_eq!(cfg.poll_interval_secs, 60);
    }

    #[test]
    fn zero_report_cadence_is_rejected() {
        let cfg = ScheduleConfig {
            report_every: 0,
            ..ScheduleConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }
}
