//! Brick size derivation from ATR

use rust_decimal::Decimal;
use tracing::debug;

use crate::atr::AtrReading;

/// Derives the current Renko brick size from the latest ATR reading.
///
/// Recompute only on bar close so brick geometry stays stable intra-bar.
/// Hysteresis keeps the old size when a recompute would move it by less
/// than the tolerance fraction.
pub struct BrickSizer {
    multiplier: Decimal,
    tick_size: Decimal,
    tolerance: Decimal,
    fallback: Decimal,
    current: Option<Decimal>,
}

impl BrickSizer {
    pub fn new(
        multiplier: Decimal,
        tick_size: Decimal,
        tolerance: Decimal,
        fallback: Decimal,
    ) -> Self {
        Self {
            multiplier,
            tick_size,
            tolerance,
            fallback,
            current: None,
        }
    }

    /// Current brick size, if one has been computed.
    pub fn current(&self) -> Option<Decimal> {
        self.current
    }

    /// Recompute the brick size from an ATR reading.
    ///
    /// During ATR warm-up the configured fallback size is used. The raw
    /// size is floored to a whole multiple of the instrument tick size and
    /// never drops below one tick.
    pub fn recompute(&mut self, reading: &AtrReading) -> Decimal {
        let raw = match reading.value() {
            Some(atr) => atr * self.multiplier,
            None => self.fallback,
        };
        let floored = self.floor_to_tick(raw);

        let next = match self.current {
            Some(prev) if self.within_tolerance(prev, floored) => prev,
            Some(prev) => {
                debug!(old = %prev, new = %floored, "brick size updated");
                floored
            }
            None => floored,
        };

        self.current = Some(next);
        next
    }

    fn floor_to_tick(&self, raw: Decimal) -> Decimal {
        let ticks = (raw / self.tick_size).floor();
        let floored = ticks * self.tick_size;
        if floored < self.tick_size {
            self.tick_size
        } else {
            floored
        }
    }

    fn within_tolerance(&self, prev: Decimal, next: Decimal) -> bool {
        if prev == next {
            return true;
        }
        if prev.is_zero() {
            return false;
        }
        ((next - prev).abs() / prev) < self.tolerance
    }
}
