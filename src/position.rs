//! Position tracking and intent emission
//!
//! The tracker is the only writer of position state. Confirmed state moves
//! on acknowledgments, never on intent emission, and no new intent is
//! emitted while one is pending.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::intent::{AckOutcome, IntentAction, OrderAck, OrderIntent, TradeDirection};
use crate::signal::Signal;

/// Confirmed position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Flat => write!(f, "flat"),
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

/// Confirmed position state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub entry_price: Option<Decimal>,
    pub entry_brick_index: Option<u64>,
}

impl Position {
    pub fn flat() -> Self {
        Self {
            side: PositionSide::Flat,
            entry_price: None,
            entry_brick_index: None,
        }
    }
}

/// A confirmed side change, reported for the notification sink.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionTransition {
    pub from: PositionSide,
    pub to: PositionSide,
    pub fill_price: Decimal,
}

/// An emitted intent awaiting acknowledgment.
#[derive(Debug, Clone)]
struct PendingIntent {
    intent_id: Uuid,
    action: IntentAction,
    /// Confirmed side once this intent fills.
    effect: PositionSide,
    brick_index: u64,
}

/// Turns signals into idempotent order intents.
pub struct PositionTracker {
    instrument: String,
    position: Position,
    pending: VecDeque<PendingIntent>,
    needs_reconciliation: bool,
}

impl PositionTracker {
    /// Created flat at startup; use [`reconcile`](Self::reconcile) to
    /// restore an authoritative position instead.
    pub fn new(instrument: &str) -> Self {
        Self {
            instrument: instrument.to_string(),
            position: Position::flat(),
            pending: VecDeque::new(),
            needs_reconciliation: false,
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn side(&self) -> PositionSide {
        self.position.side
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn needs_reconciliation(&self) -> bool {
        self.needs_reconciliation
    }

    /// Map a signal to order intents.
    ///
    /// Same-direction entries and exits while flat are no-ops, and nothing
    /// is emitted while an intent is pending or the tracker is waiting on
    /// reconciliation. A reversal is expressed as close-then-open, two
    /// sequential intents, never a single net flip.
    pub fn apply(&mut self, signal: Signal, brick_index: u64) -> Vec<OrderIntent> {
        if self.needs_reconciliation {
            warn!(
                instrument = %self.instrument,
                "suppressing {signal}: position awaiting reconciliation"
            );
            return Vec::new();
        }
        if !self.pending.is_empty() {
            debug!(
                instrument = %self.instrument,
                "suppressing {signal}: intent already pending"
            );
            return Vec::new();
        }

        let steps: Vec<(IntentAction, TradeDirection, PositionSide)> =
            match (signal, self.position.side) {
                (Signal::Hold, _) => Vec::new(),

                (Signal::EnterLong, PositionSide::Long) => Vec::new(),
                (Signal::EnterLong, PositionSide::Flat) => {
                    vec![(IntentAction::Open, TradeDirection::Long, PositionSide::Long)]
                }
                (Signal::EnterLong, PositionSide::Short) => vec![
                    (IntentAction::Close, TradeDirection::Short, PositionSide::Flat),
                    (IntentAction::Open, TradeDirection::Long, PositionSide::Long),
                ],

                (Signal::EnterShort, PositionSide::Short) => Vec::new(),
                (Signal::EnterShort, PositionSide::Flat) => vec![(
                    IntentAction::Open,
                    TradeDirection::Short,
                    PositionSide::Short,
                )],
                (Signal::EnterShort, PositionSide::Long) => vec![
                    (IntentAction::Close, TradeDirection::Long, PositionSide::Flat),
                    (IntentAction::Open, TradeDirection::Short, PositionSide::Short),
                ],

                (Signal::ExitPosition, PositionSide::Flat) => Vec::new(),
                (Signal::ExitPosition, PositionSide::Long) => {
                    vec![(IntentAction::Close, TradeDirection::Long, PositionSide::Flat)]
                }
                (Signal::ExitPosition, PositionSide::Short) => vec![(
                    IntentAction::Close,
                    TradeDirection::Short,
                    PositionSide::Flat,
                )],
            };

        let mut intents = Vec::with_capacity(steps.len());
        for (action, direction, effect) in steps {
            let intent = OrderIntent::market(&self.instrument, action, direction);
            self.pending.push_back(PendingIntent {
                intent_id: intent.id,
                action,
                effect,
                brick_index,
            });
            intents.push(intent);
        }

        if !intents.is_empty() {
            info!(
                instrument = %self.instrument,
                signal = %signal,
                count = intents.len(),
                "emitting order intents"
            );
        }
        intents
    }

    /// Apply an acknowledgment from the execution collaborator.
    ///
    /// A fill advances the confirmed side to the acknowledged intent's
    /// effect. A failure drops the whole pending chain and leaves the
    /// confirmed position unchanged, so a failed close also rejects the
    /// queued reversal open.
    pub fn acknowledge(
        &mut self,
        ack: &OrderAck,
    ) -> Result<Option<PositionTransition>, EngineError> {
        let front = match self.pending.front() {
            Some(p) if p.intent_id == ack.intent_id => p.clone(),
            _ => return Err(EngineError::UnexpectedAck(ack.intent_id)),
        };

        match &ack.outcome {
            AckOutcome::Filled { price } => {
                self.pending.pop_front();
                let from = self.position.side;
                self.position.side = front.effect;
                match front.action {
                    IntentAction::Open => {
                        self.position.entry_price = Some(*price);
                        self.position.entry_brick_index = Some(front.brick_index);
                    }
                    IntentAction::Close => {
                        self.position.entry_price = None;
                        self.position.entry_brick_index = None;
                    }
                }
                info!(
                    instrument = %self.instrument,
                    from = %from,
                    to = %self.position.side,
                    price = %price,
                    "position transition confirmed"
                );
                Ok(Some(PositionTransition {
                    from,
                    to: self.position.side,
                    fill_price: *price,
                }))
            }
            AckOutcome::Failed { reason } => {
                let dropped = self.pending.len();
                self.pending.clear();
                warn!(
                    instrument = %self.instrument,
                    reason = %reason,
                    dropped,
                    "intent failed; position unchanged"
                );
                Ok(None)
            }
        }
    }

    /// Cancel pending intents (e.g. on shutdown).
    ///
    /// The confirmed side is left as-is since the order outcome is
    /// unknown; the tracker refuses further intents until reconciled.
    pub fn cancel_pending(&mut self) -> Result<(), EngineError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.pending.clear();
        self.needs_reconciliation = true;
        Err(EngineError::AmbiguousPendingPosition)
    }

    /// Authoritative override from the exchange's position query, used at
    /// startup or after a cancellation left the state ambiguous.
    pub fn reconcile(&mut self, side: PositionSide, entry_price: Option<Decimal>) {
        info!(
            instrument = %self.instrument,
            side = %side,
            "position reconciled against exchange"
        );
        self.position = Position {
            side,
            entry_price: if side == PositionSide::Flat {
                None
            } else {
                entry_price
            },
            entry_brick_index: None,
        };
        self.pending.clear();
        self.needs_reconciliation = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn enter_long_from_flat() {
        let mut tracker = PositionTracker::new("BTC_USDT");
        let intents = tracker.apply(Signal::EnterLong, 7);
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].action, IntentAction::Open);
        assert_eq!(intents[0].direction, TradeDirection::Long);

        // Side stays flat until the fill arrives
        assert_eq!(tracker.side(), PositionSide::Flat);

        let transition = tracker
            .acknowledge(&OrderAck::filled(intents[0].id, dec(100)))
            .unwrap()
            .unwrap();
        assert_eq!(transition.from, PositionSide::Flat);
        assert_eq!(transition.to, PositionSide::Long);
        assert_eq!(tracker.position().entry_price, Some(dec(100)));
        assert_eq!(tracker.position().entry_brick_index, Some(7));
    }

    #[test]
    fn same_direction_entry_is_noop() {
        let mut tracker = PositionTracker::new("BTC_USDT");
        let intents = tracker.apply(Signal::EnterLong, 0);
        tracker
            .acknowledge(&OrderAck::filled(intents[0].id, dec(100)))
            .unwrap();

        assert!(tracker.apply(Signal::EnterLong, 1).is_empty());
        assert_eq!(tracker.side(), PositionSide::Long);
    }

    #[test]
    fn exit_while_flat_is_noop() {
        let mut tracker = PositionTracker::new("BTC_USDT");
        assert!(tracker.apply(Signal::ExitPosition, 0).is_empty());
    }

    #[test]
    fn reversal_emits_close_then_open() {
        let mut tracker = PositionTracker::new("BTC_USDT");
        let intents = tracker.apply(Signal::EnterShort, 0);
        tracker
            .acknowledge(&OrderAck::filled(intents[0].id, dec(100)))
            .unwrap();

        let intents = tracker.apply(Signal::EnterLong, 5);
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0].action, IntentAction::Close);
        assert_eq!(intents[0].direction, TradeDirection::Short);
        assert_eq!(intents[1].action, IntentAction::Open);
        assert_eq!(intents[1].direction, TradeDirection::Long);

        tracker
            .acknowledge(&OrderAck::filled(intents[0].id, dec(95)))
            .unwrap();
        assert_eq!(tracker.side(), PositionSide::Flat);
        tracker
            .acknowledge(&OrderAck::filled(intents[1].id, dec(96)))
            .unwrap();
        assert_eq!(tracker.side(), PositionSide::Long);
        assert_eq!(tracker.position().entry_brick_index, Some(5));
    }

    #[test]
    fn failed_close_rejects_queued_open() {
        let mut tracker = PositionTracker::new("BTC_USDT");
        let intents = tracker.apply(Signal::EnterShort, 0);
        tracker
            .acknowledge(&OrderAck::filled(intents[0].id, dec(100)))
            .unwrap();

        let intents = tracker.apply(Signal::EnterLong, 3);
        let result = tracker
            .acknowledge(&OrderAck::failed(intents[0].id, "insufficient margin"))
            .unwrap();
        assert!(result.is_none());
        assert_eq!(tracker.side(), PositionSide::Short);
        assert!(!tracker.has_pending());

        // The chain is gone: acking the open now is unexpected
        assert!(tracker
            .acknowledge(&OrderAck::filled(intents[1].id, dec(96)))
            .is_err());
    }

    #[test]
    fn no_new_intents_while_pending() {
        let mut tracker = PositionTracker::new("BTC_USDT");
        let first = tracker.apply(Signal::EnterLong, 0);
        assert_eq!(first.len(), 1);

        // Replay of the same signal while unacknowledged: suppressed
        assert!(tracker.apply(Signal::EnterLong, 0).is_empty());
        assert!(tracker.apply(Signal::EnterShort, 1).is_empty());
    }

    #[test]
    fn cancel_requires_reconciliation() {
        let mut tracker = PositionTracker::new("BTC_USDT");
        tracker.apply(Signal::EnterLong, 0);

        assert!(matches!(
            tracker.cancel_pending(),
            Err(EngineError::AmbiguousPendingPosition)
        ));
        assert!(tracker.needs_reconciliation());

        // Suppressed until reconciled
        assert!(tracker.apply(Signal::EnterShort, 1).is_empty());

        tracker.reconcile(PositionSide::Long, Some(dec(100)));
        assert!(!tracker.needs_reconciliation());
        assert_eq!(tracker.side(), PositionSide::Long);
    }

    #[test]
    fn cancel_without_pending_is_noop() {
        let mut tracker = PositionTracker::new("BTC_USDT");
        assert!(tracker.cancel_pending().is_ok());
        assert!(!tracker.needs_reconciliation());
    }
}
