//! Order intents and acknowledgments
//!
//! These types define the contract between the engine and the external
//! execution collaborator.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the intent asks the execution collaborator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentAction {
    Open,
    Close,
}

/// Side of the position the intent refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Long,
    Short,
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDirection::Long => write!(f, "long"),
            TradeDirection::Short => write!(f, "short"),
        }
    }
}

/// Requested execution price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "price")]
pub enum PriceRequest {
    Market,
    Limit(Decimal),
}

/// An engine-emitted request to open or close a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub id: Uuid,
    pub instrument: String,
    pub action: IntentAction,
    pub direction: TradeDirection,
    pub price: PriceRequest,
    pub created_at: DateTime<Utc>,
}

impl OrderIntent {
    pub fn market(instrument: &str, action: IntentAction, direction: TradeDirection) -> Self {
        Self {
            id: Uuid::new_v4(),
            instrument: instrument.to_string(),
            action,
            direction,
            price: PriceRequest::Market,
            created_at: Utc::now(),
        }
    }
}

/// Outcome reported back by the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AckOutcome {
    Filled { price: Decimal },
    Failed { reason: String },
}

/// Acknowledgment for a previously emitted intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub intent_id: Uuid,
    #[serde(flatten)]
    pub outcome: AckOutcome,
}

impl OrderAck {
    pub fn filled(intent_id: Uuid, price: Decimal) -> Self {
        Self {
            intent_id,
            outcome: AckOutcome::Filled { price },
        }
    }

    pub fn failed(intent_id: Uuid, reason: &str) -> Self {
        Self {
            intent_id,
            outcome: AckOutcome::Failed {
                reason: reason.to_string(),
            },
        }
    }
}
