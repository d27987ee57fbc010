pub mod chart;
pub mod discord;

pub use chart::render_price_chart;
pub use discord::DiscordWebhook;

use async_trait::async_trait;
use tracing::info;

use common::{ReportSink, Result};

/// Report sink used when no webhook is configured: logs a one-line summary.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl ReportSink for LogSink {
    async fn notify(&self, pair: &str, prices: &[f64]) -> Result<()> {
        if let Some(last) = prices.last() {
            info!(pair = %pair, points = prices.len(), last_price = last, "Price history");
        }
        Ok(())
    }
}
