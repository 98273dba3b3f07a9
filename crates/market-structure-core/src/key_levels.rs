use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Daily reference price levels for one (symbol, date).
///
/// A row is created by the daily calculation with the opening-range fields
/// unset; those are patched in later in the session as the windows complete.
/// Rows are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLevels {
    pub symbol: String,
    pub date: NaiveDate,
    pub previous_day_high: Option<Decimal>,
    pub previous_day_low: Option<Decimal>,
    pub previous_day_open: Option<Decimal>,
    pub previous_day_close: Option<Decimal>,
    pub premarket_high: Option<Decimal>,
    pub premarket_low: Option<Decimal>,
    pub opening_range_5m_high: Option<Decimal>,
    pub opening_range_5m_low: Option<Decimal>,
    pub opening_range_15m_high: Option<Decimal>,
    pub opening_range_15m_low: Option<Decimal>,
    pub last_week_high: Option<Decimal>,
    pub last_week_low: Option<Decimal>,
    pub last_week_close: Option<Decimal>,
    pub equilibrium: Option<Decimal>,
    pub all_time_high: Option<Decimal>,
}

/// The two opening-range windows measured from the session open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpeningRange {
    FiveMinute,
    FifteenMinute,
}

impl OpeningRange {
    /// Window length in minutes; also the minimum bar count required before
    /// the range may be calculated.
    pub fn minutes(&self) -> i64 {
        match self {
            OpeningRange::FiveMinute => 5,
            OpeningRange::FifteenMinute => 15,
        }
    }
}

impl std::fmt::Display for OpeningRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpeningRange::FiveMinute => f.write_str("5m"),
            OpeningRange::FifteenMinute => f.write_str("15m"),
        }
    }
}

/// Names for the intraday proximity levels, in their fixed enumeration
/// order. Distance ties between two levels resolve to the earlier variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelName {
    PreviousDayHigh,
    PreviousDayLow,
    PremarketHigh,
    PremarketLow,
    OpeningRange5mHigh,
    OpeningRange5mLow,
    OpeningRange15mHigh,
    OpeningRange15mLow,
}

impl std::fmt::Display for LevelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LevelName::PreviousDayHigh => "PDH",
            LevelName::PreviousDayLow => "PDL",
            LevelName::PremarketHigh => "PMH",
            LevelName::PremarketLow => "PML",
            LevelName::OpeningRange5mHigh => "OR5H",
            LevelName::OpeningRange5mLow => "OR5L",
            LevelName::OpeningRange15mHigh => "OR15H",
            LevelName::OpeningRange15mLow => "OR15L",
        };
        f.write_str(name)
    }
}

impl KeyLevels {
    /// An empty row for a (symbol, date) key.
    pub fn new(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            previous_day_high: None,
            previous_day_low: None,
            previous_day_open: None,
            previous_day_close: None,
            premarket_high: None,
            premarket_low: None,
            opening_range_5m_high: None,
            opening_range_5m_low: None,
            opening_range_15m_high: None,
            opening_range_15m_low: None,
            last_week_high: None,
            last_week_low: None,
            last_week_close: None,
            equilibrium: None,
            all_time_high: None,
        }
    }

    /// Enforce high >= low for every pair where both sides are set.
    pub fn validate(&self) -> Result<(), StoreError> {
        let pairs = [
            ("previous_day", self.previous_day_high, self.previous_day_low),
            ("premarket", self.premarket_high, self.premarket_low),
            (
                "opening_range_5m",
                self.opening_range_5m_high,
                self.opening_range_5m_low,
            ),
            (
                "opening_range_15m",
                self.opening_range_15m_high,
                self.opening_range_15m_low,
            ),
            ("last_week", self.last_week_high, self.last_week_low),
        ];
        for (name, high, low) in pairs {
            if let (Some(high), Some(low)) = (high, low)
                && high < low
            {
                return Err(StoreError::InvalidLevels(format!(
                    "{name} high {high} below low {low} for {} {}",
                    self.symbol, self.date
                )));
            }
        }
        Ok(())
    }

    /// The set intraday levels in fixed enumeration order:
    /// PDH, PDL, PMH, PML, OR5H, OR5L, OR15H, OR15L.
    pub fn named_levels(&self) -> Vec<(LevelName, Decimal)> {
        [
            (LevelName::PreviousDayHigh, self.previous_day_high),
            (LevelName::PreviousDayLow, self.previous_day_low),
            (LevelName::PremarketHigh, self.premarket_high),
            (LevelName::PremarketLow, self.premarket_low),
            (LevelName::OpeningRange5mHigh, self.opening_range_5m_high),
            (LevelName::OpeningRange5mLow, self.opening_range_5m_low),
            (LevelName::OpeningRange15mHigh, self.opening_range_15m_high),
            (LevelName::OpeningRange15mLow, self.opening_range_15m_low),
        ]
        .into_iter()
        .filter_map(|(name, price)| price.map(|p| (name, p)))
        .collect()
    }
}
