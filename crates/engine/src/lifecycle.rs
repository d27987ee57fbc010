use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

use common::{
    Candle, EngineState, Error, MarketData, Order, OrderExecution, OrderSide, ReportSink, Result,
};
use risk::{SymbolLedger, Transition};
use strategy::{EntryStrategy, IndicatorSet, IndicatorSnapshot};

use crate::config::ScheduleConfig;

/// Everything the engine tracks for one trading pair.
#[derive(Debug, Clone)]
pub struct SymbolState {
    pub ledger: SymbolLedger,
    /// Every close observed, oldest first. Only used for reporting.
    pub price_history: Vec<f64>,
}

impl SymbolState {
    pub fn new(ledger: SymbolLedger) -> Self {
        Self {
            ledger,
            price_history: Vec::new(),
        }
    }

    pub fn pair(&self) -> &str {
        self.ledger.pair()
    }
}

/// What happened during one full pass over the symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// 1-based number of the cycle.
    pub tick: u64,
    /// Symbols whose close was recorded this cycle.
    pub processed: usize,
    /// Symbols skipped on a fetch or indicator failure.
    pub skipped: usize,
    pub entries: usize,
    pub exits: usize,
    /// Successful report deliveries.
    pub reported: usize,
}

/// Cloneable handle to observe and stop a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    shutdown_tx: Arc<watch::Sender<bool>>,
    state: Arc<RwLock<EngineState>>,
}

impl EngineHandle {
    /// Ask the engine to stop. The inter-cycle sleep is interrupted; a
    /// cycle already in progress runs to completion first.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }
}

/// The tick controller: one pass per symbol per interval.
///
/// Owns the table of symbol states. Fetches for a cycle run concurrently;
/// indicator, signal and ledger work then runs symbol by symbol in
/// configured order.
pub struct Engine {
    schedule: ScheduleConfig,
    symbols: Vec<SymbolState>,
    /// Completed cycles.
    tick: u64,
    indicators: IndicatorSet,
    strategy: Box<dyn EntryStrategy>,
    market: Arc<dyn MarketData>,
    executor: Arc<dyn OrderExecution>,
    reporter: Arc<dyn ReportSink>,
    state: Arc<RwLock<EngineState>>,
    shutdown_rx: watch::Receiver<bool>,
    #[allow(dead_code)] // kept so dropping every handle does not close the channel
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl Engine {
    pub fn new(
        schedule: ScheduleConfig,
        ledgers: Vec<SymbolLedger>,
        indicators: IndicatorSet,
        strategy: Box<dyn EntryStrategy>,
        market: Arc<dyn MarketData>,
        executor: Arc<dyn OrderExecution>,
        reporter: Arc<dyn ReportSink>,
    ) -> (Self, EngineHandle) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        let state = Arc::new(RwLock::new(EngineState::Stopped));

        let handle = EngineHandle {
            shutdown_tx: shutdown_tx.clone(),
            state: state.clone(),
        };

        let engine = Engine {
            schedule,
            symbols: ledgers.into_iter().map(SymbolState::new).collect(),
            tick: 0,
            indicators,
            strategy,
            market,
            executor,
            reporter,
            state,
            shutdown_rx,
            shutdown_tx,
        };

        (engine, handle)
    }

    pub fn symbols(&self) -> &[SymbolState] {
        &self.symbols
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Run cycles until shutdown is requested, then return the final
    /// symbol states. Call from `tokio::spawn`.
    pub async fn run(mut self) -> Vec<SymbolState> {
        let pairs: Vec<&str> = self.symbols.iter().map(SymbolState::pair).collect();
        info!(
            pairs = ?pairs,
            strategy = %self.strategy.name(),
            interval = ?self.schedule.poll_interval(),
            report_every = self.schedule.report_every,
            "Engine running"
        );
        *self.state.write().await = EngineState::Running;

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            let summary = self.run_cycle().await;
            info!(
                tick = summary.tick,
                processed = summary.processed,
                skipped = summary.skipped,
                entries = summary.entries,
                exits = summary.exits,
                "Cycle complete"
            );

            let interval = self.schedule.poll_interval();
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                // The engine holds a sender, so this only resolves on shutdown.
                _ = self.shutdown_rx.changed() => break,
            }
        }

        *self.state.write().await = EngineState::Stopped;
        info!(tick = self.tick, "Engine stopped");
        self.symbols
    }

    /// Perform exactly one full pass over every symbol.
    ///
    /// A failing symbol is logged and skipped without affecting the others.
    /// The tick counter advances once, after every symbol has been handled.
    pub async fn run_cycle(&mut self) -> CycleSummary {
        let cycle = self.tick + 1;
        let report_due = cycle % self.schedule.report_every == 0;
        let mut summary = CycleSummary {
            tick: cycle,
            ..CycleSummary::default()
        };

        let fetched = self.fetch_all().await;

        for (slot, candles) in self.symbols.iter_mut().zip(fetched) {
            let candles = match candles {
                Ok(candles) => candles,
                Err(e) => {
                    warn!(pair = %slot.pair(), error = %e, "Fetch failed, skipping symbol this cycle");
                    summary.skipped += 1;
                    continue;
                }
            };

            let snapshot = match self.indicators.compute(&candles) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!(pair = %slot.pair(), error = %e, "Indicator computation failed");
                    summary.skipped += 1;
                    continue;
                }
            };

            slot.price_history.push(snapshot.close);
            summary.processed += 1;

            match apply_transition(slot, &snapshot, self.strategy.as_ref(), self.executor.as_ref())
                .await
            {
                Ok(transition) => {
                    log_transition(slot.pair(), &transition);
                    match transition {
                        Transition::Entered { .. } => summary.entries += 1,
                        Transition::Exited { .. } => summary.exits += 1,
                        Transition::Idle | Transition::Held { .. } => {}
                    }
                }
                Err(e) => {
                    error!(pair = %slot.pair(), error = %e, "Transition rejected, symbol state unchanged");
                }
            }

            if report_due {
                match self.reporter.notify(slot.pair(), &slot.price_history).await {
                    Ok(()) => summary.reported += 1,
                    Err(e) => warn!(pair = %slot.pair(), error = %e, "Report delivery failed"),
                }
            }
        }

        self.tick = cycle;
        summary
    }

    /// Fetch candles for every symbol concurrently, each bounded by the
    /// fetch timeout. Results are in symbol order.
    async fn fetch_all(&self) -> Vec<Result<Vec<Candle>>> {
        let timeout = self.schedule.fetch_timeout();
        let timeframe = self.schedule.timeframe.as_str();
        let limit = self.schedule.candle_limit;
        let market = self.market.as_ref();

        let fetches = self.symbols.iter().map(|slot| async move {
            match tokio::time::timeout(timeout, market.fetch_candles(slot.pair(), timeframe, limit))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::MarketData(format!(
                    "{}: fetch timed out after {timeout:?}",
                    slot.pair()
                ))),
            }
        });

        join_all(fetches).await
    }
}

/// Run the signal and ledger logic for one symbol.
///
/// Orders go through the execution collaborator before the ledger is
/// touched, and the ledger is sized from the returned fill price. If
/// execution fails the ledger is left as it was; only the running peak of
/// an open position may have moved.
async fn apply_transition(
    slot: &mut SymbolState,
    snapshot: &IndicatorSnapshot,
    strategy: &dyn EntryStrategy,
    executor: &dyn OrderExecution,
) -> Result<Transition> {
    let last_price = snapshot.close;
    let ledger = &mut slot.ledger;

    if let Some(balance) = ledger.balance() {
        if !strategy.should_enter(snapshot) {
            return Ok(Transition::Idle);
        }
        if balance <= 0.0 {
            debug!(pair = %ledger.pair(), "Entry signal ignored, no balance");
            return Ok(Transition::Idle);
        }
        let order = Order::market(ledger.pair(), OrderSide::Buy, balance / last_price, last_price);
        let fill = executor.submit_order(&order).await?;
        return ledger.enter(fill.fill_price);
    }

    let Some(reason) = ledger.mark(last_price)? else {
        let max_price = ledger.position().map_or(last_price, |p| p.max_price());
        return Ok(Transition::Held { max_price });
    };

    let amount = ledger.position().map_or(0.0, |p| p.amount());
    let order = Order::market(ledger.pair(), OrderSide::Sell, amount, last_price);
    let fill = executor.submit_order(&order).await?;
    ledger.exit(fill.fill_price, reason)
}

fn log_transition(pair: &str, transition: &Transition) {
    match transition {
        Transition::Idle => debug!(pair = %pair, "Flat, no entry"),
        Transition::Held { max_price } => debug!(pair = %pair, max_price, "Holding position"),
        Transition::Entered { price, amount } => {
            info!(pair = %pair, price, amount, "Opened position")
        }
        Transition::Exited {
            reason,
            price,
            balance,
        } => info!(pair = %pair, reason = %reason, price, balance, "Closed position"),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use common::Fill;
    use risk::RiskConfig;
    use strategy::IndicatorConfig;

    /// Serves one scripted close per pair per cycle. `None` fails the fetch.
    struct ScriptedMarket {
        scripts: HashMap<String, Vec<Option<f64>>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl ScriptedMarket {
        fn new(scripts: &[(&str, Vec<Option<f64>>)]) -> Self {
            Self {
                scripts: scripts
                    .iter()
                    .map(|(pair, s)| (pair.to_string(), s.clone()))
                    .collect(),
                calls: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl MarketData for ScriptedMarket {
        async fn fetch_candles(&self, pair: &str, _tf: &str, _limit: usize) -> Result<Vec<Candle>> {
            let idx = {
                let mut calls = self.calls.lock().unwrap();
                let n = calls.entry(pair.to_string()).or_insert(0);
                *n += 1;
                *n - 1
            };
            let script = &self.scripts[pair];
            let price = script[idx.min(script.len() - 1)];
            match price {
                Some(close) => Ok(vec![Candle {
                    timestamp: Utc::now(),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1.0,
                }]),
                None => Err(Error::MarketData(format!("{pair}: connection reset"))),
            }
        }
    }

    struct SlowMarket;

    #[async_trait]
    impl MarketData for SlowMarket {
        async fn fetch_candles(&self, _pair: &str, _tf: &str, _limit: usize) -> Result<Vec<Candle>> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(Vec::new())
        }
    }

    /// Answers every fetch with no candles.
    struct EmptyMarket;

    #[async_trait]
    impl MarketData for EmptyMarket {
        async fn fetch_candles(&self, _pair: &str, _tf: &str, _limit: usize) -> Result<Vec<Candle>> {
            Ok(Vec::new())
        }
    }

    /// Enters whenever the close equals the trigger price.
    struct PriceTrigger(f64);

    impl EntryStrategy for PriceTrigger {
        fn name(&self) -> &str {
            "price-trigger"
        }

        fn should_enter(&self, snapshot: &IndicatorSnapshot) -> bool {
            snapshot.close == self.0
        }
    }

    struct AssumedFill;

    #[async_trait]
    impl OrderExecution for AssumedFill {
        async fn submit_order(&self, order: &Order) -> Result<Fill> {
            Ok(Fill {
                order_id: order.id.clone(),
                pair: order.pair.clone(),
                side: order.side,
                fill_price: order.reference_price,
                quantity: order.quantity,
                timestamp: Utc::now(),
            })
        }
    }

    /// Fills buys at the reference price and refuses every sell.
    #[derive(Default)]
    struct SellRejectingExecution {
        sells: Mutex<usize>,
    }

    #[async_trait]
    impl OrderExecution for SellRejectingExecution {
        async fn submit_order(&self, order: &Order) -> Result<Fill> {
            if order.side == OrderSide::Sell {
                *self.sells.lock().unwrap() += 1;
                return Err(Error::Exchange("sell rejected".into()));
            }
            AssumedFill.submit_order(order).await
        }
    }

    struct RejectingExecution;

    #[async_trait]
    impl OrderExecution for RejectingExecution {
        async fn submit_order(&self, _order: &Order) -> Result<Fill> {
            Err(Error::Exchange("insufficient liquidity".into()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        fail: bool,
        reports: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl ReportSink for RecordingSink {
        async fn notify(&self, pair: &str, prices: &[f64]) -> Result<()> {
            self.reports
                .lock()
                .unwrap()
                .push((pair.to_string(), prices.len()));
            if self.fail {
                return Err(Error::Report("webhook down".into()));
            }
            Ok(())
        }
    }

    fn ledgers(pairs: &[&str], balance: f64) -> Vec<SymbolLedger> {
        pairs
            .iter()
            .map(|p| SymbolLedger::new(*p, balance, RiskConfig::default()).unwrap())
            .collect()
    }

    fn make_engine(
        schedule: ScheduleConfig,
        pairs: &[&str],
        market: Arc<dyn MarketData>,
        trigger: f64,
        executor: Arc<dyn OrderExecution>,
        reporter: Arc<dyn ReportSink>,
    ) -> (Engine, EngineHandle) {
        Engine::new(
            schedule,
            ledgers(pairs, 100.0),
            IndicatorSet::new(&IndicatorConfig::default()),
            Box::new(PriceTrigger(trigger)),
            market,
            executor,
            reporter,
        )
    }

    fn state<'a>(engine: &'a Engine, pair: &str) -> &'a SymbolState {
        engine.symbols().iter().find(|s| s.pair() == pair).unwrap()
    }

    #[tokio::test]
    async fn stop_loss_round_trip_over_seven_cycles() {
        let market = Arc::new(ScriptedMarket::new(&[
            (
                "A/USDC",
                vec![
                    Some(60.0),
                    Some(60.0),
                    Some(50.0),
                    Some(52.0),
                    Some(52.0),
                    Some(52.0),
                    Some(44.0),
                ],
            ),
            ("B/USDC", vec![Some(10.0)]),
            ("C/USDC", vec![Some(20.0)]),
        ]));
        let (mut engine, _handle) = make_engine(
            ScheduleConfig::default(),
            &["A/USDC", "B/USDC", "C/USDC"],
            market,
            50.0,
            Arc::new(AssumedFill),
            Arc::new(RecordingSink::default()),
        );

        for _ in 0..2 {
            engine.run_cycle().await;
        }
        assert!(state(&engine, "A/USDC").ledger.is_flat());

        let summary = engine.run_cycle().await;
        assert_eq!(summary.tick, 3);
        assert_eq!(summary.entries, 1);
        let a = &state(&engine, "A/USDC").ledger;
        let position = a.position().expect("A should be open after cycle 3");
        assert_eq!(position.amount(), 2.0);
        assert_eq!(position.entry_price(), 50.0);
        assert_eq!(a.balance(), None);

        for _ in 0..3 {
            engine.run_cycle().await;
        }
        assert_eq!(
            state(&engine, "A/USDC").ledger.position().unwrap().max_price(),
            52.0
        );

        let summary = engine.run_cycle().await;
        assert_eq!(summary.exits, 1);
        let a = &state(&engine, "A/USDC").ledger;
        assert!(a.position().is_none());
        assert_eq!(a.balance(), Some(88.0));

        for pair in ["B/USDC", "C/USDC"] {
            assert_eq!(state(&engine, pair).ledger.balance(), Some(100.0));
        }
        assert_eq!(engine.tick(), 7);
        assert_eq!(state(&engine, "A/USDC").price_history.len(), 7);
    }

    #[tokio::test]
    async fn fetch_failure_is_isolated_to_its_symbol() {
        let market = Arc::new(ScriptedMarket::new(&[
            ("A/USDC", vec![None, Some(50.0)]),
            ("B/USDC", vec![Some(50.0)]),
        ]));
        let (mut engine, _handle) = make_engine(
            ScheduleConfig::default(),
            &["A/USDC", "B/USDC"],
            market,
            50.0,
            Arc::new(AssumedFill),
            Arc::new(RecordingSink::default()),
        );

        let summary = engine.run_cycle().await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(engine.tick(), 1);

        let a = state(&engine, "A/USDC");
        assert!(a.price_history.is_empty());
        assert_eq!(a.ledger.balance(), Some(100.0));

        let b = state(&engine, "B/USDC");
        assert_eq!(b.price_history, vec![50.0]);
        assert_eq!(b.ledger.position().unwrap().amount(), 2.0);

        // Next cycle is the retry.
        engine.run_cycle().await;
        assert!(state(&engine, "A/USDC").ledger.position().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_timeout_skips_symbol() {
        let (mut engine, _handle) = make_engine(
            ScheduleConfig::default(),
            &["A/USDC"],
            Arc::new(SlowMarket),
            50.0,
            Arc::new(AssumedFill),
            Arc::new(RecordingSink::default()),
        );

        let started = tokio::time::Instant::now();
        let summary = engine.run_cycle().await;
        let waited = started.elapsed();

        assert_eq!(summary.skipped, 1);
        assert_eq!(engine.tick(), 1);
        assert!(waited >= Duration::from_secs(30), "gave up after {waited:?}");
        assert!(waited < Duration::from_secs(120), "waited for the slow fetch");
    }

    #[tokio::test]
    async fn reports_every_nth_cycle_for_processed_symbols() {
        let market = Arc::new(ScriptedMarket::new(&[
            ("A/USDC", vec![Some(10.0)]),
            (
                "B/USDC",
                vec![Some(20.0), Some(20.0), Some(20.0), Some(20.0), Some(20.0), None],
            ),
        ]));
        let sink = Arc::new(RecordingSink::default());
        let schedule = ScheduleConfig {
            report_every: 3,
            ..ScheduleConfig::default()
        };
        let (mut engine, _handle) = make_engine(
            schedule,
            &["A/USDC", "B/USDC"],
            market,
            -1.0,
            Arc::new(AssumedFill),
            sink.clone(),
        );

        for _ in 0..7 {
            engine.run_cycle().await;
        }

        let reports = sink.reports.lock().unwrap().clone();
        assert_eq!(
            reports,
            vec![
                ("A/USDC".to_string(), 3),
                ("B/USDC".to_string(), 3),
                ("A/USDC".to_string(), 6),
            ]
        );
    }

    #[tokio::test]
    async fn report_failures_do_not_touch_trading_state() {
        let market = Arc::new(ScriptedMarket::new(&[("A/USDC", vec![Some(50.0)])]));
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let schedule = ScheduleConfig {
            report_every: 1,
            ..ScheduleConfig::default()
        };
        let (mut engine, _handle) = make_engine(
            schedule,
            &["A/USDC"],
            market,
            50.0,
            Arc::new(AssumedFill),
            sink.clone(),
        );

        let summary = engine.run_cycle().await;
        assert_eq!(summary.reported, 0);
        assert_eq!(summary.entries, 1);
        assert_eq!(sink.reports.lock().unwrap().len(), 1);
        assert!(state(&engine, "A/USDC").ledger.position().is_some());
    }

    #[tokio::test]
    async fn failed_execution_leaves_ledger_flat() {
        let market = Arc::new(ScriptedMarket::new(&[("A/USDC", vec![Some(50.0)])]));
        let (mut engine, _handle) = make_engine(
            ScheduleConfig::default(),
            &["A/USDC"],
            market,
            50.0,
            Arc::new(RejectingExecution),
            Arc::new(RecordingSink::default()),
        );

        let summary = engine.run_cycle().await;
        assert_eq!(summary.entries, 0);
        assert_eq!(summary.processed, 1);
        let a = &state(&engine, "A/USDC").ledger;
        assert!(a.is_flat());
        assert_eq!(a.balance(), Some(100.0));
    }

    #[tokio::test]
    async fn trailing_stop_reported_through_engine() {
        let market = Arc::new(ScriptedMarket::new(&[(
            "A/USDC",
            vec![Some(80.0), Some(100.0), Some(90.0), Some(89.0)],
        )]));
        let (mut engine, _handle) = make_engine(
            ScheduleConfig::default(),
            &["A/USDC"],
            market,
            80.0,
            Arc::new(AssumedFill),
            Arc::new(RecordingSink::default()),
        );

        for _ in 0..3 {
            engine.run_cycle().await;
        }
        assert!(state(&engine, "A/USDC").ledger.position().is_some());

        engine.run_cycle().await;
        let a = &state(&engine, "A/USDC").ledger;
        // 100 / 80 = 1.25 units sold at 89
        assert_eq!(a.balance(), Some(111.25));
    }

    #[tokio::test]
    async fn shutdown_interrupts_the_inter_cycle_sleep() {
        let market = Arc::new(ScriptedMarket::new(&[("A/USDC", vec![Some(10.0)])]));
        let schedule = ScheduleConfig {
            poll_interval_secs: 3600,
            ..ScheduleConfig::default()
        };
        let (engine, handle) = make_engine(
            schedule,
            &["A/USDC"],
            market,
            -1.0,
            Arc::new(AssumedFill),
            Arc::new(RecordingSink::default()),
        );

        let task = tokio::spawn(engine.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state().await, EngineState::Running);

        handle.shutdown();
        let symbols = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("engine did not stop")
            .expect("engine task panicked");

        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].price_history, vec![10.0]);
        assert_eq!(handle.state().await, EngineState::Stopped);
    }

    #[tokio::test]
    async fn indicator_failure_skips_symbol_and_its_report() {
        // A non-positive close cannot feed the indicators.
        let market = Arc::new(ScriptedMarket::new(&[
            ("A/USDC", vec![Some(-1.0)]),
            ("B/USDC", vec![Some(20.0)]),
        ]));
        let sink = Arc::new(RecordingSink::default());
        let schedule = ScheduleConfig {
            report_every: 1,
            ..ScheduleConfig::default()
        };
        let (mut engine, _handle) = make_engine(
            schedule,
            &["A/USDC", "B/USDC"],
            market,
            -1.0,
            Arc::new(AssumedFill),
            sink.clone(),
        );

        let summary = engine.run_cycle().await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.reported, 1);
        assert_eq!(
            sink.reports.lock().unwrap().clone(),
            vec![("B/USDC".to_string(), 1)]
        );

        let a = state(&engine, "A/USDC");
        assert!(a.price_history.is_empty());
        assert_eq!(a.ledger.balance(), Some(100.0));
    }

    #[tokio::test]
    async fn empty_candles_are_skipped_without_a_report() {
        let sink = Arc::new(RecordingSink::default());
        let schedule = ScheduleConfig {
            report_every: 1,
            ..ScheduleConfig::default()
        };
        let (mut engine, _handle) = make_engine(
            schedule,
            &["A/USDC"],
            Arc::new(EmptyMarket),
            50.0,
            Arc::new(AssumedFill),
            sink.clone(),
        );

        let summary = engine.run_cycle().await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.reported, 0);
        assert!(sink.reports.lock().unwrap().is_empty());
        assert_eq!(engine.tick(), 1);
    }

    #[tokio::test]
    async fn rejected_sell_keeps_position_and_new_peak() {
        let market = Arc::new(ScriptedMarket::new(&[(
            "A/USDC",
            vec![Some(50.0), Some(60.0), Some(40.0)],
        )]));
        let executor = Arc::new(SellRejectingExecution::default());
        let (mut engine, _handle) = make_engine(
            ScheduleConfig::default(),
            &["A/USDC"],
            market,
            50.0,
            executor.clone(),
            Arc::new(RecordingSink::default()),
        );

        engine.run_cycle().await;
        engine.run_cycle().await;
        let summary = engine.run_cycle().await;
        assert_eq!(summary.exits, 0);
        assert_eq!(*executor.sells.lock().unwrap(), 1);

        let a = &state(&engine, "A/USDC").ledger;
        let position = a.position().expect("position should survive the rejected sell");
        assert_eq!(position.entry_price(), 50.0);
        assert_eq!(position.amount(), 2.0);
        assert_eq!(position.max_price(), 60.0);
        assert_eq!(a.balance(), None);

        // Still below both stops, so the exit is tried again.
        engine.run_cycle().await;
        assert_eq!(*executor.sells.lock().unwrap(), 2);
        assert!(state(&engine, "A/USDC").ledger.position().is_some());
    }

    #[tokio::test]
    async fn engine_keeps_running_after_handle_is_dropped() {
        let market = Arc::new(ScriptedMarket::new(&[("A/USDC", vec![Some(10.0)])]));
        let schedule = ScheduleConfig {
            poll_interval_secs: 3600,
            ..ScheduleConfig::default()
        };
        let (engine, handle) = make_engine(
            schedule,
            &["A/USDC"],
            market,
            -1.0,
            Arc::new(AssumedFill),
            Arc::new(RecordingSink::default()),
        );

        let mut task = tokio::spawn(engine.run());
        drop(handle);

        let finished = tokio::time::timeout(Duration::from_millis(300), &mut task).await;
        assert!(finished.is_err(), "engine stopped once its handle was dropped");
        task.abort();
    }
}
