//! Bot runner - main orchestration loop
//!
//! One consumer drains the ordered market queue and drives the engine
//! synchronously per event, so brick emission, signal evaluation, and
//! acknowledgments stay in a strict total order.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::bar::{Bar, BarAggregator};
use crate::config::{Settings, TradingMode};
use crate::engine::{EngineStep, RenkoEngine};
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::executor::OrderExecutor;
use crate::feed::MarketEvent;
use crate::intent::{AckOutcome, OrderAck};
use crate::state::{NowState, StateManager};

/// Main runner tying the feed, engine, executor, and sinks together.
pub struct BotRunner<E: OrderExecutor> {
    settings: Settings,
    engine: RenkoEngine,
    executor: E,
    aggregator: BarAggregator,
    market_rx: mpsc::UnboundedReceiver<MarketEvent>,
    event_tx: mpsc::UnboundedSender<EngineEvent>,
    state: StateManager,
}

impl<E: OrderExecutor> BotRunner<E> {
    pub fn new(
        settings: Settings,
        engine: RenkoEngine,
        executor: E,
        market_rx: mpsc::UnboundedReceiver<MarketEvent>,
        event_tx: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        let state = StateManager::new(&settings.workspace_dir);
        let aggregator = BarAggregator::new(settings.engine.bar_interval_secs);
        Self {
            settings,
            engine,
            executor,
            aggregator,
            market_rx,
            event_tx,
            state,
        }
    }

    /// Warm the engine from historical bars before going live.
    pub fn warm_up(&mut self, bars: &[Bar]) {
        self.engine.warm_up(bars);
    }

    pub fn engine_mut(&mut self) -> &mut RenkoEngine {
        &mut self.engine
    }

    /// Run the decision loop until the feed closes or shutdown is
    /// requested.
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.state.init().await?;

        match self.settings.trading_mode {
            TradingMode::Paper => info!("running in PAPER mode"),
            TradingMode::Live => warn!("running in LIVE mode - real orders will be placed"),
        }

        let mut snapshot_interval = interval(Duration::from_secs(30));

        loop {
            tokio::select! {
                event = self.market_rx.recv() => {
                    match event {
                        Some(MarketEvent::Trade { price, size, timestamp }) => {
                            self.executor.observe_price(price);

                            let step = self.engine.on_price(price, timestamp);
                            self.handle_step(step).await;

                            if let Some(bar) = self.aggregator.on_trade(price, size, timestamp) {
                                self.handle_bar(&bar).await;
                            }
                        }
                        Some(MarketEvent::Bar(bar)) => {
                            self.executor.observe_price(bar.close);
                            self.handle_bar(&bar).await;
                        }
                        Some(MarketEvent::Closed) | None => {
                            info!("market feed closed; shutting down");
                            break;
                        }
                    }
                }
                _ = snapshot_interval.tick() => {
                    if let Err(e) = self.write_snapshot().await {
                        warn!("snapshot write failed: {e}");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await
    }

    async fn handle_bar(&mut self, bar: &Bar) {
        match self.engine.on_bar(bar) {
            Ok(step) => self.handle_step(step).await,
            // Bad bar: discarded, engine state untouched
            Err(e @ EngineError::MalformedBar { .. }) => warn!("{e}"),
            Err(e) => error!("bar processing failed: {e}"),
        }
    }

    /// Publish a step's events, then submit its intents one at a time,
    /// feeding each acknowledgment straight back into the engine before
    /// the next intent goes out.
    ///
    /// A failed acknowledgment drops the tracker's whole pending chain,
    /// so the remaining intents of the step are stale and must not reach
    /// the exchange: a rejected close would otherwise be followed by the
    /// reversal's open, diverging the exchange position from the
    /// confirmed one. An unreachable executor resolves the same way, as
    /// a synthesized failure, so the chain never stays pending without
    /// an acknowledgment.
    async fn handle_step(&mut self, step: EngineStep) {
        for event in &step.events {
            let _ = self.event_tx.send(event.clone());
        }

        for intent in &step.intents {
            let ack = match self.executor.submit(intent).await {
                Ok(ack) => ack,
                Err(e) => {
                    error!(intent = %intent.id, "submit failed: {e}");
                    OrderAck::failed(intent.id, &format!("executor unreachable: {e}"))
                }
            };
            let failed = matches!(ack.outcome, AckOutcome::Failed { .. });

            match self.engine.on_ack(&ack) {
                Ok(ack_step) => {
                    for event in &ack_step.events {
                        let _ = self.event_tx.send(event.clone());
                    }
                }
                Err(e) => error!("acknowledgment rejected: {e}"),
            }

            if failed {
                warn!(
                    intent = %intent.id,
                    "intent failed; dropping the rest of the step's intents"
                );
                break;
            }
        }
    }

    async fn write_snapshot(&self) -> anyhow::Result<()> {
        let account = self.executor.account();
        let position = self.engine.position();
        let state = NowState {
            timestamp: chrono::Utc::now(),
            instrument: self.engine.instrument().to_string(),
            mode: format!("{:?}", self.settings.trading_mode).to_lowercase(),
            position_side: position.side,
            entry_price: position.entry_price,
            pending_intent: self.engine.has_pending_intent(),
            needs_reconciliation: self.engine.needs_reconciliation(),
            brick_size: self.engine.brick_size(),
            brick_count: self.engine.brick_count(),
            balance: account.balance,
            realized_pnl: account.realized_pnl,
        };
        self.state.write_now(&state).await
    }

    async fn shutdown(mut self) -> anyhow::Result<()> {
        // Cancel anything in flight; the confirmed side is left alone and
        // must be reconciled against the exchange on the next start.
        if let Err(e @ EngineError::AmbiguousPendingPosition) = self.engine.cancel_pending() {
            error!("{e}");
        }
        if let Err(e) = self.write_snapshot().await {
            warn!("final snapshot write failed: {e}");
        }
        info!("runner stopped");
        Ok(())
    }
}
