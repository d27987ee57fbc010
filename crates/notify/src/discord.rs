use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info};

use common::{Error, ReportSink, Result};

use crate::chart::render_price_chart;

/// Posts a rendered price chart to a Discord webhook as a file attachment.
pub struct DiscordWebhook {
    url: String,
    http: Client,
}

impl DiscordWebhook {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

#[async_trait]
impl ReportSink for DiscordWebhook {
    async fn notify(&self, pair: &str, prices: &[f64]) -> Result<()> {
        let Some(last) = prices.last() else {
            debug!(pair = %pair, "No price history yet, skipping chart");
            return Ok(());
        };

        let png = render_price_chart(pair, prices)?;
        let file = Part::bytes(png)
            .file_name("chart.png")
            .mime_str("image/png")
            .map_err(|e| Error::Http(e.to_string()))?;
        let form = Form::new()
            .text("content", format!("{pair}: {} ticks, last close {last}", prices.len()))
            .part("file", file);

        let resp = self
            .http
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Report(format!("webhook returned HTTP {status}: {body}")));
        }

        info!(pair = %pair, points = prices.len(), "Chart delivered");
        Ok(())
    }
}
