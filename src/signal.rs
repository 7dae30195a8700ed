//! Pattern evaluation over the brick history

use serde::{Deserialize, Serialize};

use crate::position::PositionSide;
use crate::renko::{BrickHistory, Direction};

/// Trading signal derived from recent bricks and the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    EnterLong,
    EnterShort,
    ExitPosition,
    Hold,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::EnterLong => write!(f, "enter_long"),
            Signal::EnterShort => write!(f, "enter_short"),
            Signal::ExitPosition => write!(f, "exit_position"),
            Signal::Hold => write!(f, "hold"),
        }
    }
}

/// Evaluates the trailing brick run against the current position.
///
/// Stateless: the same history and position always produce the same
/// signal. A signal fires only on the brick that completes a run of
/// exactly the configured length, so a run that keeps extending yields
/// one signal total. Entry and exit run lengths are configured
/// independently; insufficient history is always Hold.
pub struct SignalEvaluator {
    entry_run_length: usize,
    exit_run_length: usize,
}

impl SignalEvaluator {
    pub fn new(entry_run_length: usize, exit_run_length: usize) -> Self {
        Self {
            entry_run_length,
            exit_run_length,
        }
    }

    pub fn evaluate(&self, history: &BrickHistory, position: PositionSide) -> Signal {
        let (direction, run) = match history.trailing_run() {
            Some(r) => r,
            None => return Signal::Hold,
        };

        match position {
            PositionSide::Flat => {
                if run == self.entry_run_length {
                    entry_for(direction)
                } else {
                    Signal::Hold
                }
            }
            PositionSide::Long => self.against_open(direction, run, Direction::Up),
            PositionSide::Short => self.against_open(direction, run, Direction::Down),
        }
    }

    /// Open-position branch. A run continuing the position is never acted
    /// on (no pyramiding); an opposite run exits when it completes the exit
    /// length, or reverses when it completes the entry length. Exit wins
    /// when both complete on the same brick.
    fn against_open(&self, direction: Direction, run: usize, held: Direction) -> Signal {
        if direction == held {
            return Signal::Hold;
        }
        if run == self.exit_run_length {
            Signal::ExitPosition
        } else if run == self.entry_run_length {
            entry_for(direction)
        } else {
            Signal::Hold
        }
    }
}

fn entry_for(direction: Direction) -> Signal {
    match direction {
        Direction::Up => Signal::EnterLong,
        Direction::Down => Signal::EnterShort,
    }
}
