use crate::{Error, ExecutionMode, Result};

/// Process-level configuration loaded from environment variables at startup.
///
/// Trading parameters (symbols, thresholds, indicator windows) live in the
/// TOML file pointed to by `trading_config_path`.
#[derive(Debug, Clone)]
pub struct Config {
    // Execution
    pub execution_mode: ExecutionMode,
    pub paper_slippage_bps: f64,

    // Market data
    pub market_data_url: String,

    // Reporting. `None` means charts are only logged.
    pub discord_webhook_url: Option<String>,

    // Trading config file path
    pub trading_config_path: String,
}

impl Config {
    pub const DEFAULT_MARKET_DATA_URL: &'static str = "https://api.binance.com";

    /// Load configuration from environment variables.
    /// Loads `.env` if present. Every variable is optional; malformed values
    /// are a `Config` error.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Empty values count as unset.
        let optional_env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let execution_mode = match optional_env("EXECUTION_MODE") {
            Some(v) => v.parse()?,
            None => ExecutionMode::default(),
        };

        let paper_slippage_bps = match optional_env("PAPER_SLIPPAGE_BPS") {
            Some(v) => v.trim().parse::<f64>().map_err(|_| {
                Error::Config(format!("PAPER_SLIPPAGE_BPS must be a number, got: '{v}'"))
            })?,
            None => 10.0,
        };
        if !paper_slippage_bps.is_finite() || paper_slippage_bps < 0.0 {
            return Err(Error::Config(format!(
                "PAPER_SLIPPAGE_BPS must be a non-negative number, got: {paper_slippage_bps}"
            )));
        }

        Ok(Config {
            execution_mode,
            paper_slippage_bps,
            market_data_url: optional_env("MARKET_DATA_URL")
                .unwrap_or_else(|| Self::DEFAULT_MARKET_DATA_URL.to_string()),
            discord_webhook_url: optional_env("DISCORD_WEBHOOK_URL"),
            trading_config_path: optional_env("TRADING_CONFIG_PATH")
                .unwrap_or_else(|| "config/trading.toml".to_string()),
        })
    }
}
