use std::collections::HashSet;

use serde::Deserialize;

use common::{Error, Result};
use engine::ScheduleConfig;
use risk::{RiskConfig, SymbolLedger};
use strategy::{EntryConfig, IndicatorConfig};

/// Top-level trading file (TOML). See `config/trading.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingFile {
    #[serde(rename = "symbol")]
    pub symbols: Vec<SymbolConfig>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub entry: EntryConfig,
    #[serde(default)]
    pub risk: RiskConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolConfig {
    /// `BASE/QUOTE`, e.g. "BTC/USDC".
    pub pair: String,
    #[serde(default = "default_starting_balance")]
    pub starting_balance: f64,
}

fn default_starting_balance() -> f64 {
    100.0
}

impl TradingFile {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: TradingFile =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(Error::Config("at least one [[symbol]] is required".into()));
        }

        let mut seen = HashSet::new();
        for s in &self.symbols {
            let pair = s.pair.trim();
            if pair.is_empty() {
                return Err(Error::Config("symbol pair must not be empty".into()));
            }
            if !seen.insert(pair.to_uppercase()) {
                return Err(Error::Config(format!("duplicate symbol '{pair}'")));
            }
            if !(s.starting_balance.is_finite() && s.starting_balance >= 0.0) {
                return Err(Error::Config(format!(
                    "{pair}: starting_balance must be finite and non-negative, got {}",
                    s.starting_balance
                )));
            }
        }

        self.schedule.validate()?;
        self.indicators.validate()?;
        self.entry.validate()?;
        self.risk.validate()
    }

    /// One fresh ledger per configured symbol, in file order.
    pub fn ledgers(&self) -> Result<Vec<SymbolLedger>> {
        self.symbols
            .iter()
            .map(|s| SymbolLedger::new(s.pair.trim(), s.starting_balance, self.risk))
            .collect()
    }
}
