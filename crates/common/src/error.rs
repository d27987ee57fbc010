use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Exchange error: {0}")]
    Exchange(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transient failure fetching candles. The symbol is skipped for the cycle.
    #[error("Market data error: {0}")]
    MarketData(String),

    /// Candle input the indicators cannot work with.
    #[error("Indicator error: {0}")]
    Indicator(String),

    /// A caller handed the ledger an impossible value. Indicates a bug.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Report delivery error: {0}")]
    Report(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
