mod settings;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, ExecutionMode, MarketData, OrderExecution, ReportSink};
use engine::{BinanceMarketData, Engine};
use notify::{DiscordWebhook, LogSink};
use paper::{PaperClient, SimulatedClient};
use risk::Holding;
use strategy::{IndicatorSet, MeanReversionEntry};

use settings::TradingFile;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid environment configuration")?;
    let trading = TradingFile::load(&cfg.trading_config_path)
        .with_context(|| format!("failed to load {}", cfg.trading_config_path))?;
    info!(
        mode = %cfg.execution_mode,
        symbols = trading.symbols.len(),
        interval_secs = trading.schedule.poll_interval_secs,
        "TrailBot starting"
    );

    // ── Market data ───────────────────────────────────────────────────────────
    let market: Arc<dyn MarketData> = Arc::new(BinanceMarketData::new(&cfg.market_data_url)?);

    // ── Order execution (injected based on EXECUTION_MODE) ────────────────────
    let executor: Arc<dyn OrderExecution> = match cfg.execution_mode {
        ExecutionMode::Simulated => {
            info!("Simulated mode: orders fill at the last close");
            Arc::new(SimulatedClient::new())
        }
        ExecutionMode::Paper => {
            info!(slippage_bps = cfg.paper_slippage_bps, "Paper mode: fills include slippage");
            Arc::new(PaperClient::new(cfg.paper_slippage_bps))
        }
    };

    // ── Reporting ─────────────────────────────────────────────────────────────
    let reporter: Arc<dyn ReportSink> = match &cfg.discord_webhook_url {
        Some(url) => Arc::new(DiscordWebhook::new(url.as_str())?),
        None => {
            warn!("DISCORD_WEBHOOK_URL not set, price reports go to the log");
            Arc::new(LogSink)
        }
    };

    // ── Engine ────────────────────────────────────────────────────────────────
    let (engine, handle) = Engine::new(
        trading.schedule.clone(),
        trading.ledgers()?,
        IndicatorSet::new(&trading.indicators),
        Box::new(MeanReversionEntry::new(trading.entry.clone())),
        market,
        executor,
        reporter,
    );
    let engine_task = tokio::spawn(engine.run());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutdown signal received. Finishing current cycle.");
    handle.shutdown();

    let symbols = engine_task.await.context("engine task panicked")?;
    for slot in &symbols {
        match slot.ledger.holding() {
            Holding::Flat { balance } => {
                info!(pair = %slot.pair(), balance = *balance, "Final state: flat")
            }
            Holding::Open(pos) => info!(
                pair = %slot.pair(),
                entry_price = pos.entry_price(),
                amount = pos.amount(),
                max_price = pos.max_price(),
                "Final state: open position"
            ),
        }
    }
    info!("TrailBot stopped");
    Ok(())
}
