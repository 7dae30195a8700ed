//! Engine error types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Errors the signal engine can surface to the surrounding service.
///
/// I/O-layer failures (network, exchange rejections) never appear here;
/// they reach the engine only as failed order acknowledgments.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Input bar failed OHLC consistency checks. The bar is discarded and
    /// ATR state is left unchanged; not fatal.
    #[error("malformed bar at {timestamp}: high={high} low={low} close={close}")]
    MalformedBar {
        timestamp: DateTime<Utc>,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    },

    /// Rejected configuration; fatal before any event processing begins.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A pending order intent was cancelled before its acknowledgment
    /// arrived. The confirmed position may or may not match the exchange;
    /// the caller must reconcile against the authoritative position.
    #[error("pending intent cancelled before acknowledgment; position requires reconciliation")]
    AmbiguousPendingPosition,

    /// Acknowledgment arrived for an intent the tracker is not waiting on.
    #[error("unexpected acknowledgment for intent {0}")]
    UnexpectedAck(uuid::Uuid),
}
