//! Renko brick construction and history

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Brick direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// A confirmed Renko brick. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brick {
    pub direction: Direction,
    pub open: Decimal,
    pub close: Decimal,
    pub index: u64,
}

/// Builds bricks from a price stream.
///
/// `last_close` seeds from the first observed price. Every time the price
/// moves at least one brick size away from it, a brick is confirmed and
/// the boundary advances; a single large move emits as many bricks as it
/// spans. A price exactly on the boundary counts as a crossing.
pub struct RenkoBuilder {
    brick_size: Decimal,
    last_close: Option<Decimal>,
    next_index: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl RenkoBuilder {
    pub fn new(brick_size: Decimal) -> Self {
        Self {
            brick_size,
            last_close: None,
            next_index: 0,
            last_timestamp: None,
        }
    }

    pub fn brick_size(&self) -> Decimal {
        self.brick_size
    }

    /// Applied on bar close only, so geometry never shifts mid-formation.
    pub fn set_brick_size(&mut self, size: Decimal) {
        self.brick_size = size;
    }

    pub fn last_close(&self) -> Option<Decimal> {
        self.last_close
    }

    /// Process one price update, returning the bricks it confirmed.
    ///
    /// Events with a timestamp at or before the last processed one are
    /// dropped: Renko state is order-dependent.
    pub fn on_price(&mut self, price: Decimal, timestamp: DateTime<Utc>) -> Vec<Brick> {
        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                return Vec::new();
            }
        }
        self.last_timestamp = Some(timestamp);

        let mut last_close = match self.last_close {
            Some(c) => c,
            None => {
                // First observation seeds the boundary; no brick yet
                self.last_close = Some(price);
                return Vec::new();
            }
        };

        let mut bricks = Vec::new();
        loop {
            let offset = price - last_close;
            if offset.abs() < self.brick_size {
                break;
            }
            let (direction, close) = if offset > Decimal::ZERO {
                (Direction::Up, last_close + self.brick_size)
            } else {
                (Direction::Down, last_close - self.brick_size)
            };
            bricks.push(Brick {
                direction,
                open: last_close,
                close,
                index: self.next_index,
            });
            self.next_index += 1;
            last_close = close;
        }

        self.last_close = Some(last_close);
        bricks
    }
}

/// Ordered, append-only brick history with a bounded retention window.
#[derive(Debug, Default)]
pub struct BrickHistory {
    bricks: VecDeque<Brick>,
    retention: usize,
}

impl BrickHistory {
    pub fn new(retention: usize) -> Self {
        Self {
            bricks: VecDeque::with_capacity(retention),
            retention,
        }
    }

    pub fn push(&mut self, brick: Brick) {
        if self.bricks.len() == self.retention {
            self.bricks.pop_front();
        }
        self.bricks.push_back(brick);
    }

    pub fn len(&self) -> usize {
        self.bricks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bricks.is_empty()
    }

    pub fn last(&self) -> Option<&Brick> {
        self.bricks.back()
    }

    /// Length of the trailing run of same-direction bricks, with its
    /// direction. Empty history yields None.
    pub fn trailing_run(&self) -> Option<(Direction, usize)> {
        let last = self.bricks.back()?;
        let run = self
            .bricks
            .iter()
            .rev()
            .take_while(|b| b.direction == last.direction)
            .count();
        Some((last.direction, run))
    }
}
