//! Order execution seam
//!
//! The engine only ever sees `OrderIntent` out and `OrderAck` back; this
//! module defines that seam and ships the paper implementation. Live
//! exchange connectivity plugs in behind the same trait.

use anyhow::Result;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{info, warn};

use crate::config::PaperConfig;
use crate::intent::{AckOutcome, IntentAction, OrderAck, OrderIntent, TradeDirection};

/// Execution collaborator: takes an intent, eventually acknowledges it.
pub trait OrderExecutor {
    fn submit(
        &mut self,
        intent: &OrderIntent,
    ) -> impl std::future::Future<Output = Result<OrderAck>> + Send;

    /// Latest traded price, for implementations that fill market orders
    /// locally. Live executors can ignore it.
    fn observe_price(&mut self, _price: Decimal) {}

    /// Account figures for observability snapshots.
    fn account(&self) -> AccountSummary {
        AccountSummary::default()
    }
}

/// Balance and PnL as the executor sees them.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountSummary {
    pub balance: Decimal,
    pub realized_pnl: Decimal,
}

/// Simulated exchange: instant fills at the marked price with slippage
/// jitter, taker fees, and running balance/PnL bookkeeping.
pub struct PaperExchange {
    balance: Decimal,
    taker_fee_rate: Decimal,
    slippage_bps: u32,
    trade_amount: Decimal,
    mark: Option<Decimal>,
    open: Option<OpenLot>,
    realized_pnl: Decimal,
}

#[derive(Debug, Clone, Copy)]
struct OpenLot {
    direction: TradeDirection,
    entry_price: Decimal,
    quantity: Decimal,
}

impl PaperExchange {
    pub fn new(config: &PaperConfig) -> Self {
        Self {
            balance: config.starting_balance,
            taker_fee_rate: config.taker_fee_rate,
            slippage_bps: config.slippage_bps,
            trade_amount: config.trade_amount,
            mark: None,
            open: None,
            realized_pnl: Decimal::ZERO,
        }
    }

    /// Update the price market orders fill against.
    pub fn mark_price(&mut self, price: Decimal) {
        self.mark = Some(price);
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Fill price with adverse slippage: buys fill above the mark, sells
    /// below, by a random fraction of the configured bps.
    fn fill_price(&self, mark: Decimal, buying: bool) -> Decimal {
        use rand::Rng;

        let bps = if self.slippage_bps == 0 {
            0.0
        } else {
            rand::thread_rng().gen_range(0.0..self.slippage_bps as f64)
        };
        let fraction =
            Decimal::from_str(&format!("{:.8}", bps / 10_000.0)).unwrap_or(Decimal::ZERO);
        let slip = mark * fraction;
        if buying {
            mark + slip
        } else {
            mark - slip
        }
    }

    fn execute(&mut self, intent: &OrderIntent) -> OrderAck {
        let mark = match self.mark {
            Some(m) => m,
            None => {
                return OrderAck::failed(intent.id, "no market price observed yet");
            }
        };

        // A buy order opens longs or closes shorts
        let buying = matches!(
            (intent.action, intent.direction),
            (IntentAction::Open, TradeDirection::Long)
                | (IntentAction::Close, TradeDirection::Short)
        );
        let price = self.fill_price(mark, buying);
        let fee = self.trade_amount * self.taker_fee_rate;

        match intent.action {
            IntentAction::Open => {
                if self.open.is_some() {
                    return OrderAck::failed(intent.id, "position already open");
                }
                if price <= Decimal::ZERO {
                    return OrderAck::failed(intent.id, "non-positive fill price");
                }
                self.open = Some(OpenLot {
                    direction: intent.direction,
                    entry_price: price,
                    quantity: self.trade_amount / price,
                });
                self.balance -= fee;
                info!(
                    instrument = %intent.instrument,
                    direction = %intent.direction,
                    price = %price,
                    balance = %self.balance,
                    "paper open filled"
                );
                OrderAck::filled(intent.id, price)
            }
            IntentAction::Close => {
                let lot = match self.open.take() {
                    Some(l) if l.direction == intent.direction => l,
                    Some(l) => {
                        self.open = Some(l);
                        return OrderAck::failed(intent.id, "open position side mismatch");
                    }
                    None => return OrderAck::failed(intent.id, "no open position to close"),
                };
                let pnl = match lot.direction {
                    TradeDirection::Long => (price - lot.entry_price) * lot.quantity,
                    TradeDirection::Short => (lot.entry_price - price) * lot.quantity,
                };
                self.balance += pnl - fee;
                self.realized_pnl += pnl;
                info!(
                    instrument = %intent.instrument,
                    direction = %intent.direction,
                    price = %price,
                    pnl = %pnl,
                    balance = %self.balance,
                    "paper close filled"
                );
                OrderAck::filled(intent.id, price)
            }
        }
    }
}

impl OrderExecutor for PaperExchange {
    async fn submit(&mut self, intent: &OrderIntent) -> Result<OrderAck> {
        let ack = self.execute(intent);
        if let AckOutcome::Failed { reason } = &ack.outcome {
            warn!(intent = %intent.id, reason = %reason, "paper order rejected");
        }
        Ok(ack)
    }

    fn observe_price(&mut self, price: Decimal) {
        self.mark_price(price);
    }

    fn account(&self) -> AccountSummary {
        AccountSummary {
            balance: self.balance,
            realized_pnl: self.realized_pnl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange() -> PaperExchange {
        PaperExchange::new(&PaperConfig {
            starting_balance: Decimal::from(10_000),
            taker_fee_rate: Decimal::new(5, 4), // 0.0005
            slippage_bps: 0,
            trade_amount: Decimal::from(1_000),
            ..PaperConfig::default()
        })
    }

    #[tokio::test]
    async fn open_close_round_trip_books_pnl() {
        let mut ex = exchange();
        ex.mark_price(Decimal::from(100));

        let open = OrderIntent::market("BTC_USDT", IntentAction::Open, TradeDirection::Long);
        let ack = ex.submit(&open).await.unwrap();
        assert_eq!(
            ack.outcome,
            AckOutcome::Filled {
                price: Decimal::from(100)
            }
        );

        // Price doubles; close the long
        ex.mark_price(Decimal::from(200));
        let close = OrderIntent::market("BTC_USDT", IntentAction::Close, TradeDirection::Long);
        let ack = ex.submit(&close).await.unwrap();
        assert!(matches!(ack.outcome, AckOutcome::Filled { .. }));

        // 10 units bought at 100, sold at 200
        assert_eq!(ex.realized_pnl(), Decimal::from(1_000));
        // Balance: +1000 pnl, -2 * 0.5 fees
        assert_eq!(ex.balance(), Decimal::from(10_999));
    }

    #[tokio::test]
    async fn short_profits_when_price_falls() {
        let mut ex = exchange();
        ex.mark_price(Decimal::from(100));
        let open = OrderIntent::market("BTC_USDT", IntentAction::Open, TradeDirection::Short);
        ex.submit(&open).await.unwrap();

        ex.mark_price(Decimal::from(50));
        let close = OrderIntent::market("BTC_USDT", IntentAction::Close, TradeDirection::Short);
        ex.submit(&close).await.unwrap();

        assert_eq!(ex.realized_pnl(), Decimal::from(500));
    }

    #[tokio::test]
    async fn close_without_position_fails() {
        let mut ex = exchange();
        ex.mark_price(Decimal::from(100));
        let close = OrderIntent::market("BTC_USDT", IntentAction::Close, TradeDirection::Long);
        let ack = ex.submit(&close).await.unwrap();
        assert!(matches!(ack.outcome, AckOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn rejects_orders_before_first_mark() {
        let mut ex = exchange();
        let open = OrderIntent::market("BTC_USDT", IntentAction::Open, TradeDirection::Long);
        let ack = ex.submit(&open).await.unwrap();
        assert!(matches!(ack.outcome, AckOutcome::Failed { .. }));
    }
}
