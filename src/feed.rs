//! Ordered market event queue
//!
//! All market data sources are serialized into one queue with a single
//! consumer; the engine itself never sees concurrent events.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tokio::sync::mpsc;
use tracing::debug;

use crate::bar::Bar;

/// One event on the market queue.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    /// A live trade print.
    Trade {
        price: Decimal,
        size: Decimal,
        timestamp: DateTime<Utc>,
    },
    /// A closed bar from a candle feed.
    Bar(Bar),
    /// Feed is done; drain and shut down.
    Closed,
}

/// Build the single ordered queue feeding the decision loop.
pub fn market_channel() -> (mpsc::UnboundedSender<MarketEvent>, mpsc::UnboundedReceiver<MarketEvent>) {
    mpsc::unbounded_channel()
}

/// Synthetic random-walk trade feed for paper mode.
///
/// Emits one trade per tick interval, drifting the price by a random
/// fraction of the step size. Stands in for the exchange stream when no
/// connectivity is wired up.
pub async fn run_random_walk_feed(
    tx: mpsc::UnboundedSender<MarketEvent>,
    start_price: Decimal,
    step: Decimal,
    interval: std::time::Duration,
) {
    use rand::Rng;

    let mut price = start_price;
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        let (move_pct, up) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(0.0_f64..2.0), rng.gen_bool(0.5))
        };
        // f64 -> Decimal via string parse to keep the scale bounded
        let delta = step * Decimal::from_str(&format!("{move_pct:.4}")).unwrap_or(Decimal::ONE);
        price = if up { price + delta } else { (price - delta).max(step) };

        let event = MarketEvent::Trade {
            price,
            size: Decimal::ONE,
            timestamp: Utc::now(),
        };
        if tx.send(event).is_err() {
            debug!("market queue closed; stopping synthetic feed");
            break;
        }
    }
}
