use async_trait::async_trait;

use crate::{Candle, Fill, Order, Result};

/// Supplier of OHLCV candles.
///
/// `BinanceMarketData` implements this against the public REST API.
/// Any error returned here is treated by the engine as transient: the symbol
/// is skipped for the current cycle and retried on the next one.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch up to `limit` candles of `timeframe` for `pair`, oldest first.
    async fn fetch_candles(&self, pair: &str, timeframe: &str, limit: usize)
        -> Result<Vec<Candle>>;
}

/// Abstraction over order execution.
///
/// `SimulatedClient` and `PaperClient` implement this. The ledger is sized
/// from the returned `Fill::fill_price`, so swapping in a real exchange does
/// not touch ledger logic.
#[async_trait]
pub trait OrderExecution: Send + Sync {
    /// Submit an order and return the fill confirmation.
    async fn submit_order(&self, order: &Order) -> Result<Fill>;
}

/// Best-effort delivery of a symbol's price history.
///
/// Errors are logged by the engine and never affect trading state.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn notify(&self, pair: &str, prices: &[f64]) -> Result<()>;
}
