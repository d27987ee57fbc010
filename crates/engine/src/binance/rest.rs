use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use common::{Candle, Error, MarketData, Result};

/// Public REST market-data client for Binance. No credentials required.
pub struct BinanceMarketData {
    base_url: String,
    http: Client,
}

impl BinanceMarketData {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }
}

/// `BTC/USDC` → `BTCUSDC`.
fn exchange_symbol(pair: &str) -> String {
    pair.replace('/', "").to_uppercase()
}

#[async_trait]
impl MarketData for BinanceMarketData {
    async fn fetch_candles(
        &self,
        pair: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let symbol = exchange_symbol(pair);
        let url = format!(
            "{}/api/v3/klines?symbol={symbol}&interval={timeframe}&limit={limit}",
            self.base_url
        );

        debug!(pair = %pair, %url, "Fetching klines");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::MarketData(format!("{pair}: HTTP {status}: {body}")));
        }
        parse_klines(&body)
    }
}

// ─── Binance kline JSON parsing ──────────────────────────────────────────────

/// Rows look like `[open_time_ms, "open", "high", "low", "close", "volume", close_time_ms, ...]`.
fn parse_klines(body: &str) -> Result<Vec<Candle>> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)?;
    rows.iter()
        .enumerate()
        .map(|(i, row)| parse_row(row).map_err(|e| Error::MarketData(format!("kline {i}: {e}"))))
        .collect()
}

fn parse_row(row: &[Value]) -> Result<Candle> {
    if row.len() < 6 {
        return Err(Error::MarketData(format!(
            "expected at least 6 fields, got {}",
            row.len()
        )));
    }

    let open_time_ms = row[0]
        .as_i64()
        .ok_or_else(|| Error::MarketData(format!("open time is not an integer: {}", row[0])))?;
    let timestamp: DateTime<Utc> = Utc
        .timestamp_millis_opt(open_time_ms)
        .single()
        .ok_or_else(|| Error::MarketData(format!("open time out of range: {open_time_ms}")))?;

    Ok(Candle {
        timestamp,
        open: number(&row[1])?,
        high: number(&row[2])?,
        low: number(&row[3])?,
        close: number(&row[4])?,
        volume: number(&row[5])?,
    })
}

/// Binance sends prices as strings; accept plain numbers too.
fn number(value: &Value) -> Result<f64> {
    match value {
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| Error::MarketData(format!("not a number: {s:?}"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::MarketData(format!("not a number: {n}"))),
        other => Err(Error::MarketData(format!("not a number: {other}"))),
    }
}
