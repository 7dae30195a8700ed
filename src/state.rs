//! State snapshots for observability
//!
//! The runner writes a small `state/now.json` the operator (or the
//! surrounding service) can poll. Recovery never reads it back; restarts
//! reconcile against the exchange instead.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

use crate::position::PositionSide;

/// Current runner status (state/now.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowState {
    pub timestamp: DateTime<Utc>,
    pub instrument: String,
    pub mode: String,
    pub position_side: PositionSide,
    pub entry_price: Option<Decimal>,
    pub pending_intent: bool,
    pub needs_reconciliation: bool,
    pub brick_size: Decimal,
    pub brick_count: usize,
    pub balance: Decimal,
    pub realized_pnl: Decimal,
}

/// Writes state files under the workspace directory.
pub struct StateManager {
    state_dir: PathBuf,
}

impl StateManager {
    pub fn new(workspace_dir: &str) -> Self {
        Self {
            state_dir: PathBuf::from(workspace_dir).join("state"),
        }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.state_dir).await?;
        Ok(())
    }

    pub async fn write_now(&self, state: &NowState) -> anyhow::Result<()> {
        let path = self.state_dir.join("now.json");
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&path, json).await?;
        debug!("wrote state/now.json");
        Ok(())
    }
}
