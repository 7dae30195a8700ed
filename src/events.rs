//! Structured engine events for the external notification sink
//!
//! The engine reports what happened; formatting and routing (console,
//! files, chat webhooks) belong to the surrounding service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::position::PositionSide;
use crate::renko::Brick;
use crate::signal::Signal;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum EngineEvent {
    BrickConfirmed {
        instrument: String,
        brick: Brick,
        timestamp: DateTime<Utc>,
    },
    SignalEmitted {
        instrument: String,
        signal: Signal,
        brick_index: u64,
        timestamp: DateTime<Utc>,
    },
    PositionTransition {
        instrument: String,
        from: PositionSide,
        to: PositionSide,
        fill_price: Decimal,
        timestamp: DateTime<Utc>,
    },
    BrickSizeUpdated {
        instrument: String,
        old: Option<Decimal>,
        new: Decimal,
        timestamp: DateTime<Utc>,
    },
}
