//! Candle interval definitions.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// First Monday after the Unix epoch; exchange weeks open on Mondays.
const WEEK_ORIGIN_MS: i64 = 4 * 86_400_000;

/// Interval of the candles requested from the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "3m")]
    Minute3,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    #[default]
    Hour1,
    #[serde(rename = "2h")]
    Hour2,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "6h")]
    Hour6,
    #[serde(rename = "8h")]
    Hour8,
    #[serde(rename = "12h")]
    Hour12,
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "3d")]
    Day3,
    #[serde(rename = "1w")]
    Weekly,
    #[serde(rename = "1M")]
    Monthly,
}

impl Timeframe {
    /// Get the duration of the timeframe in seconds.
    pub fn as_secs(&self) -> u64 {
        match self {
            Timeframe::Minute1 => 60,
            Timeframe::Minute3 => 180,
            Timeframe::Minute5 => 300,
            Timeframe::Minute15 => 900,
            Timeframe::Minute30 => 1800,
            Timeframe::Hour1 => 3600,
            Timeframe::Hour2 => 7200,
            Timeframe::Hour4 => 14400,
            Timeframe::Hour6 => 21600,
            Timeframe::Hour8 => 28800,
            Timeframe::Hour12 => 43200,
            Timeframe::Daily => 86400,
            Timeframe::Day3 => 259200,
            Timeframe::Weekly => 604800,
            Timeframe::Monthly => 2592000, // Approximate (30 days)
        }
    }

    /// Get the duration of the timeframe in milliseconds.
    pub fn as_millis(&self) -> i64 {
        self.as_secs() as i64 * 1000
    }

    /// Exchange notation of the interval.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute3 => "3m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour2 => "2h",
            Timeframe::Hour4 => "4h",
            Timeframe::Hour6 => "6h",
            Timeframe::Hour8 => "8h",
            Timeframe::Hour12 => "12h",
            Timeframe::Daily => "1d",
            Timeframe::Day3 => "3d",
            Timeframe::Weekly => "1w",
            Timeframe::Monthly => "1M",
        }
    }

    /// Open time of the candle that follows the one containing `now_ms`.
    pub fn next_boundary(&self, now_ms: i64) -> i64 {
        match self {
            Timeframe::Monthly => next_month_start(now_ms),
            Timeframe::Weekly => {
                let len = self.as_millis();
                let since_origin = now_ms - WEEK_ORIGIN_MS;
                WEEK_ORIGIN_MS + (since_origin.div_euclid(len) + 1) * len
            }
            _ => {
                let len = self.as_millis();
                (now_ms.div_euclid(len) + 1) * len
            }
        }
    }
}

fn next_month_start(now_ms: i64) -> i64 {
    let now: DateTime<Utc> = DateTime::from_timestamp_millis(now_ms).unwrap_or_default();
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(now_ms + Timeframe::Monthly.as_millis())
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
