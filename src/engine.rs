//! The grid trading engine: a single-task poll loop orchestrating the
//! calculator, the per-level tracker and the two gateways.
//!
//! Lifecycle: `Idle -> Initializing -> Running -> Stopping -> Stopped`.
//! Startup validates access (fatal on permission failure), computes the
//! grid, clears pre-existing orders and places one limit order per level.
//! Each tick then either reacts to level crossings (primary mode, explicit
//! per-level tracking) or waits for the open-order list to drain and
//! recenters the whole grid (order-refill mode). A tick whose gateway
//! calls fail after retries is skipped without mutating state; repeated
//! failures are surfaced as a degraded condition but never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{Config, EngineMode};
use crate::error::{EngineError, EngineResult};
use crate::gateway::retry::{with_retry, RetryPolicy};
use crate::gateway::{MarketDataGateway, OrderGateway};
use crate::grid::calculator;
use crate::grid::tracker::{GridStateTracker, LevelOrder};
use crate::report;
use crate::types::{GridLevel, Order, OrderId, Side, TradeRecord};

/// Consecutive skipped ticks before the engine reports itself degraded.
const DEGRADED_AFTER: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Initializing,
    Running,
    Stopping,
    Stopped,
}

pub struct GridEngine {
    config: Config,
    market_data: Arc<dyn MarketDataGateway>,
    orders: Arc<dyn OrderGateway>,
    retry: RetryPolicy,
    state: EngineState,
    levels: Vec<GridLevel>,
    quantities: Vec<f64>,
    tracker: GridStateTracker,
    trade_log: Vec<TradeRecord>,
    last_straddle: Option<usize>,
    consecutive_failures: u32,
    shutdown: watch::Receiver<bool>,
}

impl GridEngine {
    pub fn new(
        config: Config,
        market_data: Arc<dyn MarketDataGateway>,
        orders: Arc<dyn OrderGateway>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.engine);
        Self {
            config,
            market_data,
            orders,
            retry,
            state: EngineState::Idle,
            levels: Vec::new(),
            quantities: Vec::new(),
            tracker: GridStateTracker::new(&[]),
            trade_log: Vec::new(),
            last_straddle: None,
            consecutive_failures: 0,
            shutdown,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn tracker(&self) -> &GridStateTracker {
        &self.tracker
    }

    pub fn trade_log(&self) -> &[TradeRecord] {
        &self.trade_log
    }

    pub fn realized_profit(&self) -> f64 {
        report::realized_profit(&self.trade_log)
    }

    /// Run the whole session: initialize, poll until the shutdown signal
    /// flips, then cancel and summarize. Startup failures propagate to the
    /// caller; tick failures do not.
    pub async fn run(&mut self) -> EngineResult<()> {
        if let Err(e) = self.initialize().await {
            error!("startup failed ({}): {}", e.category(), e);
            self.state = EngineState::Stopped;
            return Err(e);
        }

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            if let Err(e) = self.tick().await {
                // Unclassified failures are contained at the loop; one bad
                // tick never terminates polling.
                error!("tick failed ({}): {}", e.category(), e);
            }

            let interval = Duration::from_secs(self.config.grid.poll_interval_secs);
            tokio::select! {
                _ = sleep(interval) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.finalize().await;
        Ok(())
    }

    /// Startup sequence. Public so callers (and tests) can drive the
    /// engine tick by tick instead of through `run`.
    pub async fn initialize(&mut self) -> EngineResult<()> {
        self.state = EngineState::Initializing;
        let grid = &self.config.grid;
        info!(
            "🚀 starting grid session: {} [{:.4}, {:.4}] x{} levels, {:?} mode",
            grid.instrument, grid.lower_price, grid.upper_price, grid.grid_count,
            self.config.engine.mode
        );

        // Access validation is never retried: a permission failure means
        // misconfiguration, not a transient outage.
        self.market_data
            .validate_access(&self.config.grid.instrument)
            .await?;

        match self.orders.account_balance().await {
            Ok(balance) => info!("account balance: {:.2}", balance),
            Err(e) => warn!("could not fetch account balance: {}", e),
        }

        let levels = calculator::compute_levels(
            self.config.grid.lower_price,
            self.config.grid.upper_price,
            self.config.grid.grid_count,
        )?;
        let quantities = self.quantities_for(&levels)?;

        let price = self.fetch_price().await?;
        info!("current price: {:.4}", price);

        self.cancel_all_open_orders().await;
        self.install_grid(levels, quantities, price).await;

        self.state = EngineState::Running;
        info!("engine running, polling every {}s", self.config.grid.poll_interval_secs);
        Ok(())
    }

    /// One poll-loop iteration. Skipped entirely (no mutation) when the
    /// price feed stays down through all retries.
    pub async fn tick(&mut self) -> EngineResult<()> {
        if self.state != EngineState::Running {
            return Ok(());
        }

        let price = match self.fetch_price().await {
            Ok(price) => {
                self.note_success();
                price
            }
            Err(e) => {
                self.note_failure("get_current_price", &e);
                return Ok(());
            }
        };

        match self.config.engine.mode {
            EngineMode::LevelCrossing => self.tick_level_crossing(price).await,
            EngineMode::OrderRefill => self.tick_order_refill(price).await,
        }
    }

    /// Shutdown sequence: best-effort cancel-all, summary, CSV export.
    /// No further ticks execute afterwards.
    pub async fn finalize(&mut self) {
        if self.state == EngineState::Stopped {
            return;
        }
        self.state = EngineState::Stopping;
        info!("🛑 stopping: cancelling open orders");

        self.cancel_all_open_orders().await;

        report::log_summary(&self.trade_log);
        let path = report::export_path(
            &self.config.report.output_dir,
            &self.config.grid.instrument,
        );
        match report::export_csv(&self.trade_log, &path) {
            Ok(()) => info!("trade history exported to {}", path),
            Err(e) => warn!("failed to export trade history: {}", e),
        }

        self.state = EngineState::Stopped;
        info!("engine stopped");
    }

    // ---- tick strategies ----

    async fn tick_level_crossing(&mut self, price: f64) -> EngineResult<()> {
        let Some(straddle) = self.tracker.find_straddling_level(price) else {
            debug!("price {:.4} outside grid range, no action", price);
            self.last_straddle = None;
            return Ok(());
        };

        if let Some(previous) = self.last_straddle {
            if straddle > previous {
                // Upward crossings: every level the price climbed through.
                for index in previous..straddle {
                    if !self.tracker.is_held(index) {
                        self.execute_level_trade(index, Side::Buy, price).await;
                    }
                }
            } else if straddle < previous {
                for index in straddle..previous {
                    if self.tracker.is_held(index) {
                        self.execute_level_trade(index, Side::Sell, price).await;
                    }
                }
            }
        }

        self.last_straddle = Some(straddle);
        Ok(())
    }

    async fn tick_order_refill(&mut self, price: f64) -> EngineResult<()> {
        let open = match self.list_open_orders().await {
            Ok(open) => open,
            Err(e) => {
                self.note_failure("list_open_orders", &e);
                return Ok(());
            }
        };

        if !open.is_empty() {
            debug!("{} open orders resting, no action this tick", open.len());
            return Ok(());
        }

        // Fills are inferred, not pushed: an empty open-order list means
        // the whole grid has been consumed.
        info!(
            "open-order list empty at {:.4}: grid consumed, rebalancing",
            price
        );
        let instrument = self.config.grid.instrument.clone();
        for (_, order) in self.tracker.drain_open_orders() {
            self.trade_log.push(TradeRecord {
                timestamp: Utc::now(),
                instrument: instrument.clone(),
                price: order.price,
                quantity: order.quantity,
                side: order.side,
                order_id: order.id,
            });
        }

        self.rebalance(price).await
    }

    /// Recenter the range symmetrically on the trigger price and re-run
    /// the placement sequence against it.
    async fn rebalance(&mut self, trigger_price: f64) -> EngineResult<()> {
        let band = self.config.engine.rebalance_band;
        let lower = trigger_price * (1.0 - band);
        let upper = trigger_price * (1.0 + band);

        let levels = calculator::compute_levels(lower, upper, self.config.grid.grid_count)?;
        let quantities = self.quantities_for(&levels)?;

        self.cancel_all_open_orders().await;
        self.install_grid(levels, quantities, trigger_price).await;
        Ok(())
    }

    // ---- placement ----

    /// Place one limit order per level: Buy below the current price, Sell
    /// at or above it. Per-level failures are logged and skipped; the grid
    /// is considered installed regardless.
    async fn install_grid(
        &mut self,
        levels: Vec<GridLevel>,
        quantities: Vec<f64>,
        current_price: f64,
    ) {
        let mut tracker = GridStateTracker::new(&levels);
        let mut placed = 0usize;

        for (level, quantity) in levels.iter().zip(quantities.iter()) {
            let side = if level.price < current_price {
                Side::Buy
            } else {
                Side::Sell
            };

            match self.place_order(side, level.price, *quantity).await {
                Ok(id) => {
                    debug!(
                        "level {}: {} {:.6} @ {:.4} (order {})",
                        level.index, side, quantity, level.price, id
                    );
                    tracker.set_open_order(
                        level.index,
                        LevelOrder {
                            id,
                            side,
                            price: level.price,
                            quantity: *quantity,
                        },
                    );
                    placed += 1;
                }
                Err(EngineError::Rejected(reason)) => {
                    warn!("level {} {} order rejected: {}", level.index, side, reason);
                }
                Err(e) => {
                    warn!("level {} {} order failed: {}", level.index, side, e);
                }
            }
        }

        info!(
            "grid installed: {}/{} orders placed over [{:.4}, {:.4}]",
            placed,
            levels.len(),
            levels.first().map(|l| l.price).unwrap_or_default(),
            levels.last().map(|l| l.price).unwrap_or_default(),
        );

        let straddle = tracker.find_straddling_level(current_price);
        self.tracker = tracker;
        self.levels = levels;
        self.quantities = quantities;
        self.last_straddle = straddle;
    }

    /// Trade a crossed level: clear its resting order, place at the
    /// current price, flip the held flag and append to the trade log.
    async fn execute_level_trade(&mut self, index: usize, side: Side, price: f64) {
        let Some(&quantity) = self.quantities.get(index) else {
            return;
        };

        // At most one open order per level: retire any resting order
        // before the crossing order replaces it.
        if let Some(resting) = self.tracker.take_open_order(index) {
            if let Err(e) = self.cancel_order(&resting.id).await {
                warn!("failed to cancel resting order {}: {}", resting.id, e);
            }
        }

        match self.place_order(side, price, quantity).await {
            Ok(id) => {
                match side {
                    Side::Buy => {
                        self.tracker.mark_held(index);
                        info!(
                            "🟢 BUY level {}: {:.6} @ {:.4} (order {})",
                            index, quantity, price, id
                        );
                    }
                    Side::Sell => {
                        self.tracker.mark_released(index);
                        info!(
                            "🔴 SELL level {}: {:.6} @ {:.4} (order {})",
                            index, quantity, price, id
                        );
                    }
                }
                self.trade_log.push(TradeRecord {
                    timestamp: Utc::now(),
                    instrument: self.config.grid.instrument.clone(),
                    price,
                    quantity,
                    side,
                    order_id: id,
                });
            }
            Err(EngineError::Rejected(reason)) => {
                warn!("level {} {} rejected: {}", index, side, reason);
            }
            Err(e) => {
                warn!("level {} {} failed: {}", index, side, e);
            }
        }
    }

    /// Best-effort cancellation of every open order for the instrument.
    /// A listing failure skips the pass; individual cancellation failures
    /// are logged and skipped. A zero-order book is a successful no-op.
    async fn cancel_all_open_orders(&mut self) {
        let open = match self.list_open_orders().await {
            Ok(open) => open,
            Err(e) => {
                warn!("could not list open orders, skipping cancellation: {}", e);
                return;
            }
        };

        if open.is_empty() {
            debug!("no open orders to cancel");
            return;
        }

        let mut cancelled = 0usize;
        let total = open.len();
        for order in open {
            match self.cancel_order(&order.id).await {
                Ok(()) => cancelled += 1,
                Err(e) => warn!("failed to cancel order {}: {}", order.id, e),
            }
        }
        info!("cancelled {}/{} open orders", cancelled, total);
    }

    // ---- gateway calls, each under the retry policy ----

    async fn fetch_price(&self) -> EngineResult<f64> {
        let gateway = Arc::clone(&self.market_data);
        let instrument = self.config.grid.instrument.clone();
        with_retry(&self.retry, "get_current_price", || {
            let gateway = Arc::clone(&gateway);
            let instrument = instrument.clone();
            async move { gateway.current_price(&instrument).await }
        })
        .await
    }

    async fn list_open_orders(&self) -> EngineResult<Vec<Order>> {
        let gateway = Arc::clone(&self.orders);
        let instrument = self.config.grid.instrument.clone();
        with_retry(&self.retry, "list_open_orders", || {
            let gateway = Arc::clone(&gateway);
            let instrument = instrument.clone();
            async move { gateway.open_orders(&instrument).await }
        })
        .await
    }

    async fn place_order(&self, side: Side, price: f64, quantity: f64) -> EngineResult<OrderId> {
        let gateway = Arc::clone(&self.orders);
        let instrument = self.config.grid.instrument.clone();
        with_retry(&self.retry, "place_order", || {
            let gateway = Arc::clone(&gateway);
            let instrument = instrument.clone();
            async move {
                gateway
                    .place_order(&instrument, side, price, quantity)
                    .await
            }
        })
        .await
    }

    async fn cancel_order(&self, order_id: &OrderId) -> EngineResult<()> {
        let gateway = Arc::clone(&self.orders);
        let order_id = order_id.clone();
        with_retry(&self.retry, "cancel_order", || {
            let gateway = Arc::clone(&gateway);
            let order_id = order_id.clone();
            async move { gateway.cancel_order(&order_id).await }
        })
        .await
    }

    // ---- funding and health bookkeeping ----

    fn quantities_for(&self, levels: &[GridLevel]) -> EngineResult<Vec<f64>> {
        if let Some(quantity) = self.config.grid.quantity_per_grid {
            Ok(vec![quantity; levels.len()])
        } else {
            let total = self
                .config
                .grid
                .total_investment
                .unwrap_or(self.config.engine.fallback_investment);
            Ok(calculator::compute_quantities(total, levels)?)
        }
    }

    fn note_success(&mut self) {
        if self.consecutive_failures >= DEGRADED_AFTER {
            info!("gateway calls recovered, engine no longer degraded");
        }
        self.consecutive_failures = 0;
    }

    fn note_failure(&mut self, operation: &str, error: &EngineError) {
        self.consecutive_failures += 1;
        warn!(
            "{} failed after retries, skipping tick ({}): {}",
            operation,
            error.category(),
            error
        );
        if self.consecutive_failures == DEGRADED_AFTER {
            warn!(
                "engine degraded: {} consecutive ticks skipped",
                self.consecutive_failures
            );
        }
    }
}
