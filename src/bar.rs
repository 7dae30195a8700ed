//! OHLCV bars and trade-to-bar aggregation

use chrono::{DateTime, Duration, DurationRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A closed OHLCV bar. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Open time of the bar's bucket.
    pub timestamp: DateTime<Utc>,
}

impl Bar {
    /// Check OHLC consistency: high must bracket low, and open/close must
    /// sit inside the [low, high] range.
    pub fn validate(&self) -> Result<(), EngineError> {
        let consistent = self.high >= self.low
            && self.close <= self.high
            && self.close >= self.low
            && self.open <= self.high
            && self.open >= self.low;
        if !consistent {
            return Err(EngineError::MalformedBar {
                timestamp: self.timestamp,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        Ok(())
    }
}

/// Aggregates a live trade stream into fixed-duration bars.
///
/// A trade landing in a new bucket closes and returns the previous bar.
/// Trades within the working bucket extend high/low/close/volume in place.
pub struct BarAggregator {
    interval: Duration,
    working: Option<Bar>,
}

impl BarAggregator {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval: Duration::seconds(interval_secs as i64),
            working: None,
        }
    }

    /// Feed one trade; returns the previous bar when the trade opens a
    /// new bucket.
    pub fn on_trade(
        &mut self,
        price: Decimal,
        size: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Option<Bar> {
        let bucket = timestamp
            .duration_trunc(self.interval)
            .unwrap_or(timestamp);

        match &mut self.working {
            Some(bar) if bar.timestamp == bucket => {
                if price > bar.high {
                    bar.high = price;
                }
                if price < bar.low {
                    bar.low = price;
                }
                bar.close = price;
                bar.volume += size;
                None
            }
            working => {
                let closed = working.take();
                *working = Some(Bar {
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: size,
                    timestamp: bucket,
                });
                closed
            }
        }
    }

    /// Close out the working bar, if any. Used on shutdown.
    pub fn flush(&mut self) -> Option<Bar> {
        self.working.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn rejects_inconsistent_bar() {
        let bar = Bar {
            open: d(10),
            high: d(9),
            low: d(11),
            close: d(10),
            volume: d(1),
            timestamp: ts(0),
        };
        assert!(bar.validate().is_err());

        let bar = Bar {
            open: d(10),
            high: d(12),
            low: d(9),
            close: d(13), // close above high
            volume: d(1),
            timestamp: ts(0),
        };
        assert!(bar.validate().is_err());
    }

    #[test]
    fn accepts_consistent_bar() {
        let bar = Bar {
            open: d(10),
            high: d(12),
            low: d(9),
            close: d(11),
            volume: d(1),
            timestamp: ts(0),
        };
        assert!(bar.validate().is_ok());
    }

    #[test]
    fn aggregates_trades_into_buckets() {
        let mut agg = BarAggregator::new(60);

        assert!(agg.on_trade(d(100), d(1), ts(0)).is_none());
        assert!(agg.on_trade(d(105), d(2), ts(10)).is_none());
        assert!(agg.on_trade(d(98), d(1), ts(59)).is_none());

        // First trade of the next minute closes the previous bar
        let bar = agg.on_trade(d(101), d(1), ts(60)).unwrap();
        assert_eq!(bar.open, d(100));
        assert_eq!(bar.high, d(105));
        assert_eq!(bar.low, d(98));
        assert_eq!(bar.close, d(98));
        assert_eq!(bar.volume, d(4));

        let last = agg.flush().unwrap();
        assert_eq!(last.open, d(101));
    }
}
