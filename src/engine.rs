//! The Renko/ATR signal engine
//!
//! One engine instance per instrument. A single logical decision loop
//! feeds it events in arrival order; it holds no locks because it assumes
//! single-writer access to all of its state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::atr::AtrEstimator;
use crate::bar::Bar;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::intent::{OrderAck, OrderIntent};
use crate::position::{Position, PositionSide, PositionTracker};
use crate::renko::{Brick, BrickHistory, RenkoBuilder};
use crate::signal::{Signal, SignalEvaluator};
use crate::sizer::BrickSizer;

/// Everything one engine step produced, in emission order.
#[derive(Debug, Default)]
pub struct EngineStep {
    pub bricks: Vec<Brick>,
    pub intents: Vec<OrderIntent>,
    pub events: Vec<EngineEvent>,
}

/// Stateful pipeline: ATR -> brick size -> bricks -> signals -> intents.
pub struct RenkoEngine {
    instrument: String,
    atr: AtrEstimator,
    sizer: BrickSizer,
    builder: RenkoBuilder,
    history: BrickHistory,
    evaluator: SignalEvaluator,
    tracker: PositionTracker,
    /// Last accepted bar timestamp; separate from the builder's tick
    /// clock so the mixed trade+bar feed keeps working.
    last_bar_timestamp: Option<DateTime<Utc>>,
}

impl RenkoEngine {
    /// Build an engine from validated configuration. Invalid configuration
    /// is fatal; no events are processed past this point.
    pub fn new(instrument: &str, config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            instrument: instrument.to_string(),
            atr: AtrEstimator::new(config.atr_period),
            sizer: BrickSizer::new(
                config.brick_multiplier,
                config.min_tick_size,
                config.hysteresis_tolerance,
                config.fallback_brick_size,
            ),
            builder: RenkoBuilder::new(config.fallback_brick_size),
            history: BrickHistory::new(config.history_retention),
            evaluator: SignalEvaluator::new(config.entry_run_length, config.exit_run_length),
            tracker: PositionTracker::new(instrument),
            last_bar_timestamp: None,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn brick_size(&self) -> Decimal {
        self.builder.brick_size()
    }

    pub fn position(&self) -> &Position {
        self.tracker.position()
    }

    pub fn has_pending_intent(&self) -> bool {
        self.tracker.has_pending()
    }

    pub fn needs_reconciliation(&self) -> bool {
        self.tracker.needs_reconciliation()
    }

    pub fn brick_count(&self) -> usize {
        self.history.len()
    }

    /// Warm up from historical bars (oldest first).
    ///
    /// Malformed bars are skipped with a warning. The brick size is
    /// computed once over the whole history, then historical closes are
    /// replayed into the brick history; nothing here emits signals or
    /// intents. With fewer than an ATR period of bars the engine starts
    /// on the fallback brick size.
    pub fn warm_up(&mut self, bars: &[Bar]) -> Decimal {
        let mut accepted = Vec::with_capacity(bars.len());
        for bar in bars {
            match self.atr.update(bar) {
                Ok(_) => accepted.push(bar),
                Err(e) => warn!(instrument = %self.instrument, "skipping bar in warm-up: {e}"),
            }
        }

        let size = self.sizer.recompute(&self.atr.reading());
        self.builder.set_brick_size(size);

        for bar in &accepted {
            for brick in self.builder.on_price(bar.close, bar.timestamp) {
                self.history.push(brick);
            }
        }
        if let Some(last) = accepted.last() {
            self.last_bar_timestamp = Some(last.timestamp);
        }

        info!(
            instrument = %self.instrument,
            bars = accepted.len(),
            bricks = self.history.len(),
            brick_size = %size,
            "warm-up complete"
        );
        size
    }

    /// Process one closed bar: fold it into the ATR, recompute the brick
    /// size (this is the only resize trigger), then route the close price
    /// through the brick builder.
    ///
    /// A malformed bar surfaces as an error and changes nothing; callers
    /// treat it as non-fatal. A bar with a timestamp at or before the
    /// last accepted one is a replay and is dropped before it can touch
    /// the ATR.
    pub fn on_bar(&mut self, bar: &Bar) -> Result<EngineStep, EngineError> {
        if let Some(last) = self.last_bar_timestamp {
            if bar.timestamp <= last {
                debug!(
                    instrument = %self.instrument,
                    timestamp = %bar.timestamp,
                    "dropping stale bar"
                );
                return Ok(EngineStep::default());
            }
        }

        let reading = self.atr.update(bar)?;
        self.last_bar_timestamp = Some(bar.timestamp);

        let old = self.sizer.current();
        let size = self.sizer.recompute(&reading);
        let mut events = Vec::new();
        if old != Some(size) {
            self.builder.set_brick_size(size);
            events.push(EngineEvent::BrickSizeUpdated {
                instrument: self.instrument.clone(),
                old,
                new: size,
                timestamp: bar.timestamp,
            });
        }

        // In a mixed feed the tick path has already consumed this bar's
        // trades and the builder drops the stale timestamp; in a bar-only
        // feed this is where bricks form.
        let mut step = self.on_price(bar.close, bar.timestamp);
        events.append(&mut step.events);
        step.events = events;
        Ok(step)
    }

    /// Process one price tick through bricks, signals, and intents, in
    /// strict order.
    pub fn on_price(&mut self, price: Decimal, timestamp: DateTime<Utc>) -> EngineStep {
        let mut step = EngineStep::default();

        for brick in self.builder.on_price(price, timestamp) {
            debug!(
                instrument = %self.instrument,
                index = brick.index,
                direction = %brick.direction,
                close = %brick.close,
                "brick confirmed"
            );
            self.history.push(brick.clone());
            step.events.push(EngineEvent::BrickConfirmed {
                instrument: self.instrument.clone(),
                brick: brick.clone(),
                timestamp,
            });

            let signal = self.evaluator.evaluate(&self.history, self.tracker.side());
            if signal != Signal::Hold {
                step.events.push(EngineEvent::SignalEmitted {
                    instrument: self.instrument.clone(),
                    signal,
                    brick_index: brick.index,
                    timestamp,
                });
                step.intents
                    .extend(self.tracker.apply(signal, brick.index));
            }

            step.bricks.push(brick);
        }

        step
    }

    /// Apply an order acknowledgment from the execution collaborator.
    pub fn on_ack(&mut self, ack: &OrderAck) -> Result<EngineStep, EngineError> {
        let mut step = EngineStep::default();
        if let Some(transition) = self.tracker.acknowledge(ack)? {
            step.events.push(EngineEvent::PositionTransition {
                instrument: self.instrument.clone(),
                from: transition.from,
                to: transition.to,
                fill_price: transition.fill_price,
                timestamp: Utc::now(),
            });
        }
        Ok(step)
    }

    /// Cancel unacknowledged intents, e.g. on shutdown. Returns
    /// `AmbiguousPendingPosition` when something was actually in flight.
    pub fn cancel_pending(&mut self) -> Result<(), EngineError> {
        self.tracker.cancel_pending()
    }

    /// Authoritative position override (startup restore, or resolution of
    /// an ambiguous pending state).
    pub fn reconcile_position(&mut self, side: PositionSide, entry_price: Option<Decimal>) {
        self.tracker.reconcile(side, entry_price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn flat_bar(close: &str, idx: i64) -> Bar {
        let c = dec(close);
        Bar {
            open: c,
            high: c + dec("5"),
            low: c - dec("5"),
            close: c,
            volume: Decimal::ONE,
            timestamp: ts(idx * 60),
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            atr_period: 2,
            brick_multiplier: Decimal::ONE,
            min_tick_size: dec("0.01"),
            fallback_brick_size: dec("10"),
            entry_run_length: 3,
            exit_run_length: 3,
            hysteresis_tolerance: Decimal::ZERO,
            history_retention: 50,
            bar_interval_secs: 60,
        }
    }

    #[test]
    fn rejects_invalid_configuration() {
        let bad = EngineConfig {
            atr_period: 1,
            ..config()
        };
        assert!(RenkoEngine::new("BTC_USDT", &bad).is_err());
    }

    #[test]
    fn warm_up_uses_fallback_until_atr_ready() {
        let mut engine = RenkoEngine::new("BTC_USDT", &config()).unwrap();
        let size = engine.warm_up(&[flat_bar("100", 0)]);
        assert_eq!(size, dec("10"));
    }

    #[test]
    fn warm_up_seeds_history_without_intents() {
        let mut engine = RenkoEngine::new("BTC_USDT", &config()).unwrap();
        // 10-wide bars -> ATR 10 -> brick size 10; closes walk up 3 bricks
        let bars: Vec<Bar> = ["100", "110", "120", "130"]
            .iter()
            .enumerate()
            .map(|(i, c)| flat_bar(c, i as i64))
            .collect();
        engine.warm_up(&bars);

        assert!(engine.brick_count() >= 3);
        assert!(!engine.has_pending_intent());
        assert_eq!(engine.position().side, PositionSide::Flat);
    }

    #[test]
    fn malformed_bar_is_skipped_in_warm_up() {
        let mut engine = RenkoEngine::new("BTC_USDT", &config()).unwrap();
        let mut bad = flat_bar("100", 1);
        bad.low = bad.high + Decimal::ONE;
        engine.warm_up(&[flat_bar("100", 0), bad, flat_bar("100", 2)]);
        // Two good bars complete the period-2 warm-up
        assert_eq!(engine.brick_size(), dec("10"));
    }

    #[test]
    fn malformed_live_bar_surfaces_error() {
        let mut engine = RenkoEngine::new("BTC_USDT", &config()).unwrap();
        let mut bad = flat_bar("100", 0);
        bad.close = bad.high + Decimal::ONE;
        assert!(matches!(
            engine.on_bar(&bad),
            Err(EngineError::MalformedBar { .. })
        ));
    }

    #[test]
    fn three_up_bricks_emit_one_entry_intent() {
        let mut engine = RenkoEngine::new("BTC_USDT", &config()).unwrap();
        engine.on_price(dec("100"), ts(0)); // seed

        let step = engine.on_price(dec("130"), ts(1));
        assert_eq!(step.bricks.len(), 3);
        assert_eq!(step.intents.len(), 1);
        assert!(step
            .events
            .iter()
            .any(|e| matches!(e, EngineEvent::SignalEmitted { signal: Signal::EnterLong, .. })));
    }

    #[test]
    fn ack_confirms_position_transition() {
        let mut engine = RenkoEngine::new("BTC_USDT", &config()).unwrap();
        engine.on_price(dec("100"), ts(0));
        let step = engine.on_price(dec("130"), ts(1));
        let intent = &step.intents[0];

        let step = engine
            .on_ack(&OrderAck::filled(intent.id, dec("130")))
            .unwrap();
        assert_eq!(engine.position().side, PositionSide::Long);
        assert!(step
            .events
            .iter()
            .any(|e| matches!(e, EngineEvent::PositionTransition { .. })));
    }

    #[test]
    fn replayed_bar_leaves_atr_and_brick_size_alone() {
        let mut engine = RenkoEngine::new("BTC_USDT", &config()).unwrap();

        let wide = Bar {
            open: dec("100"),
            high: dec("110"),
            low: dec("90"),
            close: dec("100"),
            volume: Decimal::ONE,
            timestamp: ts(0),
        };
        let narrow = Bar {
            open: dec("100"),
            high: dec("105"),
            low: dec("95"),
            close: dec("100"),
            volume: Decimal::ONE,
            timestamp: ts(60),
        };

        // TR 20 then TR 10 over a period of 2: ATR 15, brick size 15
        engine.on_bar(&wide).unwrap();
        engine.on_bar(&narrow).unwrap();
        assert_eq!(engine.brick_size(), dec("15"));

        // Replaying the same bar would re-smooth the ATR to 12.5 if it
        // ever reached it; it must be dropped instead
        let step = engine.on_bar(&narrow).unwrap();
        assert!(step.bricks.is_empty());
        assert!(step.events.is_empty());
        assert_eq!(engine.brick_size(), dec("15"));

        // An older bar is just as stale
        let step = engine.on_bar(&wide).unwrap();
        assert!(step.events.is_empty());
        assert_eq!(engine.brick_size(), dec("15"));
    }

    #[test]
    fn warm_up_backfill_shields_against_replayed_bars() {
        let mut engine = RenkoEngine::new("BTC_USDT", &config()).unwrap();
        let bars: Vec<Bar> = ["100", "110"]
            .iter()
            .enumerate()
            .map(|(i, c)| flat_bar(c, i as i64))
            .collect();
        engine.warm_up(&bars);
        let size = engine.brick_size();

        // Re-feeding the last backfill bar live must not move anything
        let step = engine.on_bar(&bars[1]).unwrap();
        assert!(step.events.is_empty());
        assert_eq!(engine.brick_size(), size);
    }

    #[test]
    fn resize_only_happens_on_bar_close() {
        let mut engine = RenkoEngine::new("BTC_USDT", &config()).unwrap();
        assert_eq!(engine.brick_size(), dec("10"));

        // Ticks never resize
        engine.on_price(dec("100"), ts(0));
        engine.on_price(dec("500"), ts(1));
        assert_eq!(engine.brick_size(), dec("10"));

        // Bars do, once the ATR is warm (period 2, 10-wide bars -> ATR 10)
        engine.on_bar(&flat_bar("500", 2)).unwrap();
        let step = engine.on_bar(&flat_bar("500", 3)).unwrap();
        assert_eq!(engine.brick_size(), dec("10"));
        // Same size recomputed: no resize event
        assert!(step.events.is_empty());
    }
}
