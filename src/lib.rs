//! Renko Runner Library
//!
//! A trading agent that turns a price stream into Renko bricks with an
//! ATR-adaptive brick size and trades the resulting trend-reversal
//! signals through a pluggable execution seam.

pub mod atr;
pub mod bar;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod feed;
pub mod intent;
pub mod position;
pub mod renko;
pub mod runner;
pub mod signal;
pub mod sizer;
pub mod state;

// Re-export main types for convenience
pub use atr::{AtrEstimator, AtrReading};
pub use bar::{Bar, BarAggregator};
pub use config::{EngineConfig, PaperConfig, Settings, TradingMode};
pub use engine::{EngineStep, RenkoEngine};
pub use error::EngineError;
pub use events::EngineEvent;
pub use executor::{AccountSummary, OrderExecutor, PaperExchange};
pub use feed::{market_channel, MarketEvent};
pub use intent::{AckOutcome, IntentAction, OrderAck, OrderIntent, PriceRequest, TradeDirection};
pub use position::{Position, PositionSide, PositionTracker};
pub use renko::{Brick, BrickHistory, Direction, RenkoBuilder};
pub use runner::BotRunner;
pub use signal::{Signal, SignalEvaluator};
pub use sizer::BrickSizer;
pub use state::{NowState, StateManager};
