//! Renko Runner - ATR-adaptive Renko trading agent
//!
//! Wiring order:
//! 1. Load and validate settings (fatal on invalid configuration)
//! 2. Build the engine and the execution backend
//! 3. Attach the ordered market queue and the notification sink
//! 4. Hand everything to the runner's decision loop

use std::time::Duration;
use tracing::info;

use renko_runner::{
    feed, market_channel, BotRunner, EngineEvent, PaperExchange, RenkoEngine, Settings,
    TradingMode,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("starting renko-runner...");

    let settings = Settings::load()?;
    info!(
        instrument = %settings.instrument,
        atr_period = settings.engine.atr_period,
        entry_run = settings.engine.entry_run_length,
        exit_run = settings.engine.exit_run_length,
        "configuration loaded"
    );

    let executor = match settings.trading_mode {
        TradingMode::Paper => PaperExchange::new(&settings.paper),
        TradingMode::Live => {
            anyhow::bail!("live trading requires an exchange executor; none is configured")
        }
    };

    let engine = RenkoEngine::new(&settings.instrument, &settings.engine)?;

    let (market_tx, market_rx) = market_channel();
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<EngineEvent>();

    // Notification sink: serialize engine events to the log. A chat or
    // alerting collaborator would consume this channel instead.
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                info!(target: "renko_runner::notify", "{json}");
            }
        }
    });

    // Paper mode drives the engine from a synthetic random-walk feed; a
    // live deployment replaces this with the exchange stream, serialized
    // into the same queue.
    let start_price = settings.paper.start_price;
    let step = settings.engine.fallback_brick_size;
    tokio::spawn(feed::run_random_walk_feed(
        market_tx,
        start_price,
        step,
        Duration::from_millis(250),
    ));

    let runner = BotRunner::new(settings, engine, executor, market_rx, event_tx);
    runner.run().await
}
