//! Average True Range estimator (Wilder smoothing)

use rust_decimal::Decimal;

use crate::bar::Bar;
use crate::error::EngineError;

/// ATR reading returned per bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AtrReading {
    /// Fewer than `required` bars observed so far; no numeric value yet.
    WarmingUp { observed: usize, required: usize },
    /// Smoothed ATR, always >= 0 once warm.
    Ready(Decimal),
}

impl AtrReading {
    pub fn value(&self) -> Option<Decimal> {
        match self {
            AtrReading::Ready(v) => Some(*v),
            AtrReading::WarmingUp { .. } => None,
        }
    }
}

/// Streaming ATR over a fixed period.
///
/// The first `period` true ranges are averaged to seed the value; after
/// that each bar updates it as `atr = (atr * (period - 1) + tr) / period`.
/// The very first bar has no previous close, so its true range is just
/// high - low.
pub struct AtrEstimator {
    period: usize,
    prev_close: Option<Decimal>,
    tr_sum: Decimal,
    observed: usize,
    value: Option<Decimal>,
}

impl AtrEstimator {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            tr_sum: Decimal::ZERO,
            observed: 0,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn reading(&self) -> AtrReading {
        match self.value {
            Some(v) => AtrReading::Ready(v),
            None => AtrReading::WarmingUp {
                observed: self.observed,
                required: self.period,
            },
        }
    }

    /// Fold one closed bar into the estimate. Malformed bars are rejected
    /// without touching any state.
    pub fn update(&mut self, bar: &Bar) -> Result<AtrReading, EngineError> {
        bar.validate()?;

        let tr = true_range(self.prev_close, bar);
        self.prev_close = Some(bar.close);
        self.observed += 1;

        match self.value {
            Some(prev) => {
                let period = Decimal::from(self.period as u64);
                self.value = Some((prev * (period - Decimal::ONE) + tr) / period);
            }
            None => {
                self.tr_sum += tr;
                if self.observed >= self.period {
                    self.value = Some(self.tr_sum / Decimal::from(self.period as u64));
                }
            }
        }

        Ok(self.reading())
    }
}

/// True range: max(high - low, |high - prev_close|, |low - prev_close|).
fn true_range(prev_close: Option<Decimal>, bar: &Bar) -> Decimal {
    let hl = bar.high - bar.low;
    match prev_close {
        Some(pc) => {
            let hc = (bar.high - pc).abs();
            let lc = (bar.low - pc).abs();
            hl.max(hc).max(lc)
        }
        None => hl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(high: i64, low: i64, close: i64, idx: i64) -> Bar {
        Bar {
            open: Decimal::from(close),
            high: Decimal::from(high),
            low: Decimal::from(low),
            close: Decimal::from(close),
            volume: Decimal::ONE,
            timestamp: Utc.timestamp_opt(1_700_000_000 + idx * 60, 0).unwrap(),
        }
    }

    #[test]
    fn warms_up_for_exactly_period_bars() {
        let mut atr = AtrEstimator::new(3);

        for i in 0..2 {
            let reading = atr.update(&bar(110, 100, 105, i)).unwrap();
            assert!(matches!(reading, AtrReading::WarmingUp { .. }));
        }

        let reading = atr.update(&bar(110, 100, 105, 2)).unwrap();
        assert_eq!(reading, AtrReading::Ready(Decimal::from(10)));
    }

    #[test]
    fn wilder_smoothing_after_warmup() {
        let mut atr = AtrEstimator::new(2);
        atr.update(&bar(110, 100, 105, 0)).unwrap(); // tr = 10
        atr.update(&bar(111, 101, 106, 1)).unwrap(); // tr = 10, atr = 10

        // high-low = 4, |high-prev_close| = 4, |low-prev_close| = 0 -> tr = 4
        let reading = atr.update(&bar(110, 106, 108, 2)).unwrap();
        // (10 * 1 + 4) / 2 = 7
        assert_eq!(reading, AtrReading::Ready(Decimal::from(7)));
    }

    #[test]
    fn gap_drives_true_range() {
        let mut atr = AtrEstimator::new(1);
        atr.update(&bar(110, 100, 105, 0)).unwrap();
        // Gap up: |high - prev_close| = 20 dominates high-low = 5
        let reading = atr.update(&bar(125, 120, 122, 1)).unwrap();
        assert_eq!(reading, AtrReading::Ready(Decimal::from(20)));
    }

    #[test]
    fn malformed_bar_leaves_state_untouched() {
        let mut atr = AtrEstimator::new(2);
        atr.update(&bar(110, 100, 105, 0)).unwrap();

        let bad = Bar {
            open: Decimal::from(105),
            high: Decimal::from(100),
            low: Decimal::from(110),
            close: Decimal::from(105),
            volume: Decimal::ONE,
            timestamp: Utc.timestamp_opt(1_700_000_060, 0).unwrap(),
        };
        assert!(atr.update(&bad).is_err());

        // Still one bar short of warm
        assert!(matches!(
            atr.reading(),
            AtrReading::WarmingUp { observed: 1, required: 2 }
        ));
    }
}
