use chrono::{Duration, NaiveDate};
use market_structure_core::bar::Bar;
use market_structure_core::error::StoreError;
use market_structure_core::hours::MarketHours;
use market_structure_core::key_levels::{KeyLevels, LevelName, OpeningRange};
use market_structure_core::level_store::LevelStore;
use market_structure_core::store::BarStore;
use market_structure_core::trading_calendar;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::LevelError;
use crate::event::LevelsUpdate;
use crate::structure::Direction;

/// Calendar-day span searched backwards for the weekly levels. Generous
/// enough to cover a full trading week plus weekends.
pub const WEEKLY_LOOKBACK_DAYS: i64 = 10;

/// Minimum bar count for the weekly window.
pub const MIN_WEEKLY_BARS: usize = 10;

/// Weekly reference prices, computed over bars strictly before a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyLevels {
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub equilibrium: Decimal,
    pub all_time_high: Decimal,
}

/// Round-number reference prices bracketing a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsychologicalLevels {
    pub whole: Decimal,
    pub half: Decimal,
    pub quarter: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Above,
    Below,
    At,
}

/// The nearest set level for a symbol and where price sits relative to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelStatus {
    pub name: LevelName,
    pub level: Decimal,
    pub position: Position,
    pub distance: Decimal,
}

/// Strict-crossing level break test.
///
/// Bullish iff `previous <= level && current > level`; bearish iff
/// `previous >= level && current < level`. A price landing exactly on the
/// level never breaks it in either direction: the origin side is inclusive,
/// the destination side strictly exclusive. Do not loosen.
pub fn level_broken(level: Decimal, current: Decimal, previous: Decimal) -> Option<Direction> {
    if previous <= level && current > level {
        Some(Direction::Bullish)
    } else if previous >= level && current < level {
        Some(Direction::Bearish)
    } else {
        None
    }
}

fn nearest_increment(price: Decimal, increment: Decimal) -> Decimal {
    let down = (price / increment).floor() * increment;
    let up = down + increment;
    // An exact tie rounds up to the next increment
    if price - down < up - price { down } else { up }
}

/// Nearest whole, half, and quarter round numbers to a price.
pub fn nearest_psychological(price: Decimal) -> PsychologicalLevels {
    PsychologicalLevels {
        whole: nearest_increment(price, dec!(1)),
        half: nearest_increment(price, dec!(0.5)),
        quarter: nearest_increment(price, dec!(0.25)),
    }
}

/// Computes and persists daily, opening-range, and weekly key levels.
///
/// Reads are reentrant. Writes are read-modify-write against the level
/// store and assume a single writer per (symbol, date); on the live path
/// the opening range tracker is that writer.
pub struct LevelCalculator {
    bars: BarStore,
    levels: LevelStore,
    hours: MarketHours,
    publisher: Option<broadcast::Sender<LevelsUpdate>>,
}

impl LevelCalculator {
    pub fn new(bars: BarStore, levels: LevelStore, hours: MarketHours) -> Self {
        Self {
            bars,
            levels,
            hours,
            publisher: None,
        }
    }

    /// Broadcast a [`LevelsUpdate`] after every successful write.
    pub fn with_publisher(mut self, publisher: broadcast::Sender<LevelsUpdate>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn hours(&self) -> &MarketHours {
        &self.hours
    }

    pub fn level_store(&self) -> &LevelStore {
        &self.levels
    }

    fn publish(&self, levels: &KeyLevels) {
        if let Some(publisher) = &self.publisher {
            // Send only fails when nobody is subscribed
            let _ = publisher.send(LevelsUpdate {
                symbol: levels.symbol.clone(),
                date: levels.date,
                levels: levels.clone(),
            });
        }
    }

    /// Bars for (symbol, date), with a missing day degrading to empty.
    fn read_day_or_empty(&self, symbol: &str, date: NaiveDate) -> Result<Vec<Bar>, LevelError> {
        match self.bars.read_day(symbol, date) {
            Ok(bars) => Ok(bars),
            Err(StoreError::NoData { .. }) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Compute previous-day, premarket, and weekly levels for a trading
    /// date and upsert the row. Opening-range fields are left unset; they
    /// arrive later in the session via [`Self::update_opening_range`].
    ///
    /// The previous trading day is weekday arithmetic only; market holidays
    /// are a documented gap, resolved by the calendar service elsewhere.
    pub fn calculate_daily(&self, symbol: &str, date: NaiveDate) -> Result<KeyLevels, LevelError> {
        if trading_calendar::is_weekend(date) {
            return Err(LevelError::NotATradingDay { date });
        }

        let previous_day = trading_calendar::previous_trading_day(date);
        let prev_bars = self.read_day_or_empty(symbol, previous_day)?;
        if prev_bars.is_empty() {
            return Err(LevelError::NoPreviousDayData {
                symbol: symbol.to_string(),
                date: previous_day,
            });
        }

        let mut row = KeyLevels::new(symbol, date);
        row.previous_day_high = prev_bars.iter().map(|b| b.high).max();
        row.previous_day_low = prev_bars.iter().map(|b| b.low).min();
        // Bars are chronological: first open, last close
        row.previous_day_open = prev_bars.first().map(|b| b.open);
        row.previous_day_close = prev_bars.last().map(|b| b.close);

        // Premarket bars are optional; an empty window is not an error
        let today_bars = self.read_day_or_empty(symbol, date)?;
        let premarket: Vec<&Bar> = today_bars
            .iter()
            .filter(|b| self.hours.in_premarket(&b.timestamp))
            .collect();
        row.premarket_high = premarket.iter().map(|b| b.high).max();
        row.premarket_low = premarket.iter().map(|b| b.low).min();

        match self.calculate_weekly(symbol, date) {
            Ok(weekly) => {
                row.last_week_high = Some(weekly.high);
                row.last_week_low = Some(weekly.low);
                row.last_week_close = Some(weekly.close);
                row.equilibrium = Some(weekly.equilibrium);
                row.all_time_high = Some(weekly.all_time_high);
            }
            Err(LevelError::InsufficientData { .. }) | Err(LevelError::NoData { .. }) => {
                debug!(symbol, %date, "weekly window underfilled, leaving weekly levels unset");
            }
            Err(e) => return Err(e),
        }

        self.levels.upsert(&row)?;
        self.publish(&row);
        Ok(row)
    }

    /// Weekly high/low/close over bars strictly before `date`, plus the
    /// equilibrium midpoint and the all-time high.
    ///
    /// The all-time high rescans the symbol's full stored history on every
    /// call; nothing documents a staleness tolerance that would justify a
    /// cache, so it stays uncached.
    pub fn calculate_weekly(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<WeeklyLevels, LevelError> {
        let start = date - Duration::days(WEEKLY_LOOKBACK_DAYS);
        let bars: Vec<Bar> = self
            .bars
            .read_range(symbol, start, date - Duration::days(1))?
            .into_iter()
            .filter(|b| self.hours.local_date(&b.timestamp) < date)
            .collect();

        if bars.len() < MIN_WEEKLY_BARS {
            return Err(LevelError::InsufficientData {
                needed: MIN_WEEKLY_BARS,
                got: bars.len(),
            });
        }

        let high = bars.iter().map(|b| b.high).max().expect("nonempty");
        let low = bars.iter().map(|b| b.low).min().expect("nonempty");
        let close = bars.last().map(|b| b.close).expect("nonempty");

        let all_time_high = self
            .bars
            .read_all(symbol)?
            .iter()
            .map(|b| b.high)
            .max()
            .ok_or_else(|| LevelError::NoData {
                symbol: symbol.to_string(),
            })?;

        Ok(WeeklyLevels {
            high,
            low,
            close,
            equilibrium: (high + low) / dec!(2),
            all_time_high,
        })
    }

    /// Compute one opening-range high/low pair from the bars inside
    /// `[open, open + N minutes)` local time and patch it onto the existing
    /// row, preserving every other field.
    pub fn update_opening_range(
        &self,
        symbol: &str,
        date: NaiveDate,
        range: OpeningRange,
    ) -> Result<KeyLevels, LevelError> {
        let needed = range.minutes() as usize;
        let bars = self.read_day_or_empty(symbol, date)?;
        let window: Vec<&Bar> = bars
            .iter()
            .filter(|b| {
                self.hours.in_opening_range(&b.timestamp, range.minutes())
                    && self.hours.local_date(&b.timestamp) == date
            })
            .collect();

        if window.len() < needed {
            return Err(LevelError::InsufficientBars {
                needed,
                got: window.len(),
            });
        }

        let high = window.iter().map(|b| b.high).max().expect("nonempty");
        let low = window.iter().map(|b| b.low).min().expect("nonempty");

        let row = self
            .levels
            .patch_opening_range(symbol, date, range, high, low)
            .map_err(|e| match e {
                StoreError::NotFound { symbol, date } => LevelError::NotFound { symbol, date },
                other => other.into(),
            })?;
        self.publish(&row);
        Ok(row)
    }

    /// Nearest set level to `price` for today's row.
    pub fn level_status(&self, symbol: &str, price: Decimal) -> Result<LevelStatus, LevelError> {
        self.level_status_on(symbol, self.hours.today(), price)
    }

    /// Nearest set level to `price` among PDH, PDL, PMH, PML, OR5H, OR5L,
    /// OR15H, OR15L for (symbol, date). Distance ties resolve to the
    /// earlier name in that fixed order.
    pub fn level_status_on(
        &self,
        symbol: &str,
        date: NaiveDate,
        price: Decimal,
    ) -> Result<LevelStatus, LevelError> {
        let row = self.levels.get(symbol, date).map_err(|e| match e {
            StoreError::NotFound { symbol, date } => LevelError::NotFound { symbol, date },
            other => other.into(),
        })?;

        let mut nearest: Option<(LevelName, Decimal, Decimal)> = None;
        for (name, level) in row.named_levels() {
            let distance = (price - level).abs();
            // Strict comparison keeps the earlier entry on ties
            if nearest.as_ref().is_none_or(|(_, _, best)| distance < *best) {
                nearest = Some((name, level, distance));
            }
        }

        let (name, level, distance) = nearest.ok_or_else(|| LevelError::NotFound {
            symbol: symbol.to_string(),
            date,
        })?;

        let position = if price > level {
            Position::Above
        } else if price < level {
            Position::Below
        } else {
            Position::At
        };

        Ok(LevelStatus {
            name,
            level,
            position,
            distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// UTC instant for an ET wall-clock time (EST, winter dates).
    fn et(y: i32, m: u32, d: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, hour + 5, min, 0).unwrap()
    }

    fn bar(symbol: &str, ts: DateTime<Utc>, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            timestamp: ts,
            open,
            high,
            low,
            close,
            volume: 1000,
            vwap: None,
            trade_count: None,
        }
    }

    fn calculator(root: &std::path::Path) -> LevelCalculator {
        LevelCalculator::new(
            BarStore::new(root),
            LevelStore::new(root),
            MarketHours::us_equities(),
        )
    }

    /// A flat regular-session day: every bar high = base + 1, low = base - 1.
    fn write_session_day(
        store: &BarStore,
        symbol: &str,
        d: NaiveDate,
        base: Decimal,
        bars_count: u32,
    ) {
        let (y, m, dd) = (
            d.format("%Y").to_string().parse().unwrap(),
            d.format("%m").to_string().parse().unwrap(),
            d.format("%d").to_string().parse().unwrap(),
        );
        let bars: Vec<Bar> = (0..bars_count)
            .map(|i| {
                bar(
                    symbol,
                    et(y, m, dd, 9, 30) + Duration::minutes(i as i64),
                    base,
                    base + dec!(1),
                    base - dec!(1),
                    base,
                )
            })
            .collect();
        store.write_day(symbol, d, &bars).unwrap();
    }

    #[test]
    fn level_broken_crossing_rules() {
        // No crossing: both sides already above
        assert_eq!(
            level_broken(dec!(175.00), dec!(175.20), dec!(175.10)),
            None
        );
        // Bullish cross
        assert_eq!(
            level_broken(dec!(175.00), dec!(175.10), dec!(174.90)),
            Some(Direction::Bullish)
        );
        // Bearish cross
        assert_eq!(
            level_broken(dec!(175.00), dec!(174.90), dec!(175.10)),
            Some(Direction::Bearish)
        );
    }

    #[test]
    fn level_broken_landing_on_level_is_never_a_break() {
        assert_eq!(level_broken(dec!(175.00), dec!(175.00), dec!(174.50)), None);
        assert_eq!(level_broken(dec!(175.00), dec!(175.00), dec!(175.50)), None);
    }

    #[test]
    fn level_broken_origin_on_level_counts() {
        // Inclusive origin: starting exactly at the level and moving
        // strictly past it is a break
        assert_eq!(
            level_broken(dec!(175.00), dec!(175.01), dec!(175.00)),
            Some(Direction::Bullish)
        );
        assert_eq!(
            level_broken(dec!(175.00), dec!(174.99), dec!(175.00)),
            Some(Direction::Bearish)
        );
    }

    #[test]
    fn nearest_psychological_brackets_and_ties() {
        let levels = nearest_psychological(dec!(175.23));
        assert_eq!(levels.whole, dec!(175));
        assert_eq!(levels.half, dec!(175.50));
        assert_eq!(levels.quarter, dec!(175.25));

        // Exact tie rounds up; exact increments stay put
        let levels = nearest_psychological(dec!(175.50));
        assert_eq!(levels.whole, dec!(176));
        assert_eq!(levels.half, dec!(175.50));
        assert_eq!(levels.quarter, dec!(175.50));
    }

    #[test]
    fn calculate_daily_rejects_weekend() {
        let dir = tempfile::tempdir().unwrap();
        let calc = calculator(dir.path());
        let result = calc.calculate_daily("AAPL", date(2025, 1, 18)); // Saturday
        assert!(matches!(result, Err(LevelError::NotATradingDay { .. })));
    }

    #[test]
    fn calculate_daily_requires_previous_day_bars() {
        let dir = tempfile::tempdir().unwrap();
        let calc = calculator(dir.path());
        let result = calc.calculate_daily("AAPL", date(2025, 1, 15));
        assert!(matches!(result, Err(LevelError::NoPreviousDayData { .. })));
    }

    #[test]
    fn calculate_daily_previous_day_and_premarket() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());

        // Previous day (Tue Jan 14): three bars with a clear shape
        let prev = vec![
            bar("AAPL", et(2025, 1, 14, 9, 30), dec!(173.00), dec!(174.00), dec!(172.50), dec!(173.50)),
            bar("AAPL", et(2025, 1, 14, 9, 31), dec!(173.50), dec!(176.50), dec!(173.00), dec!(176.00)),
            bar("AAPL", et(2025, 1, 14, 9, 32), dec!(176.00), dec!(176.25), dec!(172.25), dec!(175.10)),
        ];
        store.write_day("AAPL", date(2025, 1, 14), &prev).unwrap();

        // Today (Wed Jan 15): two premarket bars and one regular bar
        let today = vec![
            bar("AAPL", et(2025, 1, 15, 4, 0), dec!(174.50), dec!(175.80), dec!(174.20), dec!(175.00)),
            bar("AAPL", et(2025, 1, 15, 8, 59), dec!(175.00), dec!(175.40), dec!(174.00), dec!(174.30)),
            bar("AAPL", et(2025, 1, 15, 9, 30), dec!(174.30), dec!(176.00), dec!(174.00), dec!(175.90)),
        ];
        store.write_day("AAPL", date(2025, 1, 15), &today).unwrap();

        let calc = calculator(dir.path());
        let row = calc.calculate_daily("AAPL", date(2025, 1, 15)).unwrap();

        assert_eq!(row.previous_day_high, Some(dec!(176.50)));
        assert_eq!(row.previous_day_low, Some(dec!(172.25)));
        assert_eq!(row.previous_day_open, Some(dec!(173.00)));
        assert_eq!(row.previous_day_close, Some(dec!(175.10)));
        // Premarket excludes the 9:30 bar
        assert_eq!(row.premarket_high, Some(dec!(175.80)));
        assert_eq!(row.premarket_low, Some(dec!(174.00)));
        // Opening range untouched at this stage
        assert!(row.opening_range_5m_high.is_none());
        assert!(row.opening_range_15m_high.is_none());

        // Row is persisted
        let stored = calc.level_store().get("AAPL", date(2025, 1, 15)).unwrap();
        assert_eq!(stored, row);
    }

    #[test]
    fn calculate_daily_empty_premarket_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        write_session_day(&store, "AAPL", date(2025, 1, 14), dec!(175), 3);

        let calc = calculator(dir.path());
        let row = calc.calculate_daily("AAPL", date(2025, 1, 15)).unwrap();
        assert!(row.premarket_high.is_none());
        assert!(row.premarket_low.is_none());
        assert_eq!(row.previous_day_high, Some(dec!(176)));
    }

    #[test]
    fn calculate_daily_monday_reaches_back_to_friday() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        write_session_day(&store, "AAPL", date(2025, 1, 10), dec!(180), 3); // Friday

        let calc = calculator(dir.path());
        let row = calc.calculate_daily("AAPL", date(2025, 1, 13)).unwrap(); // Monday
        assert_eq!(row.previous_day_high, Some(dec!(181)));
    }

    #[test]
    fn calculate_daily_fills_weekly_when_history_suffices() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        write_session_day(&store, "AAPL", date(2025, 1, 13), dec!(170), 6);
        write_session_day(&store, "AAPL", date(2025, 1, 14), dec!(174), 6);

        let calc = calculator(dir.path());
        let row = calc.calculate_daily("AAPL", date(2025, 1, 15)).unwrap();

        assert_eq!(row.last_week_high, Some(dec!(175)));
        assert_eq!(row.last_week_low, Some(dec!(169)));
        assert_eq!(row.last_week_close, Some(dec!(174)));
        assert_eq!(row.equilibrium, Some(dec!(172)));
        assert_eq!(row.all_time_high, Some(dec!(175)));
    }

    #[test]
    fn calculate_daily_sparse_history_leaves_weekly_unset() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        // Only 3 bars of history: daily succeeds, weekly window underfilled
        write_session_day(&store, "AAPL", date(2025, 1, 14), dec!(175), 3);

        let calc = calculator(dir.path());
        let row = calc.calculate_daily("AAPL", date(2025, 1, 15)).unwrap();
        assert!(row.last_week_high.is_none());
        assert!(row.equilibrium.is_none());
        assert!(row.all_time_high.is_none());
    }

    #[test]
    fn calculate_weekly_excludes_the_date_itself() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        write_session_day(&store, "AAPL", date(2025, 1, 13), dec!(170), 6);
        write_session_day(&store, "AAPL", date(2025, 1, 14), dec!(174), 6);
        // Bars on the 15th itself must not contribute
        write_session_day(&store, "AAPL", date(2025, 1, 15), dec!(200), 6);

        let calc = calculator(dir.path());
        let weekly = calc.calculate_weekly("AAPL", date(2025, 1, 15)).unwrap();
        assert_eq!(weekly.high, dec!(175));
        assert_eq!(weekly.close, dec!(174));
        // The all-time high does see the whole history
        assert_eq!(weekly.all_time_high, dec!(201));
    }

    #[test]
    fn calculate_weekly_underfilled() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        write_session_day(&store, "AAPL", date(2025, 1, 14), dec!(175), 9);

        let calc = calculator(dir.path());
        let result = calc.calculate_weekly("AAPL", date(2025, 1, 15));
        assert!(matches!(
            result,
            Err(LevelError::InsufficientData { needed: 10, got: 9 })
        ));
    }

    #[test]
    fn update_opening_range_needs_existing_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        write_session_day(&store, "AAPL", date(2025, 1, 15), dec!(175), 20);

        let calc = calculator(dir.path());
        let result = calc.update_opening_range("AAPL", date(2025, 1, 15), OpeningRange::FiveMinute);
        assert!(matches!(result, Err(LevelError::NotFound { .. })));
    }

    #[test]
    fn update_opening_range_insufficient_bars() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        write_session_day(&store, "AAPL", date(2025, 1, 14), dec!(175), 3);
        write_session_day(&store, "AAPL", date(2025, 1, 15), dec!(175), 4);

        let calc = calculator(dir.path());
        calc.calculate_daily("AAPL", date(2025, 1, 15)).unwrap();

        let result = calc.update_opening_range("AAPL", date(2025, 1, 15), OpeningRange::FiveMinute);
        assert!(matches!(
            result,
            Err(LevelError::InsufficientBars { needed: 5, got: 4 })
        ));
    }

    #[test]
    fn update_opening_range_sets_only_requested_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        write_session_day(&store, "AAPL", date(2025, 1, 14), dec!(170), 3);

        // 20 session bars, rising high each minute so the windows differ
        let bars: Vec<Bar> = (0..20)
            .map(|i| {
                bar(
                    "AAPL",
                    et(2025, 1, 15, 9, 30) + Duration::minutes(i),
                    dec!(175),
                    dec!(175) + Decimal::from(i),
                    dec!(174) - Decimal::from(i),
                    dec!(175),
                )
            })
            .collect();
        store.write_day("AAPL", date(2025, 1, 15), &bars).unwrap();

        let calc = calculator(dir.path());
        let daily = calc.calculate_daily("AAPL", date(2025, 1, 15)).unwrap();

        let row = calc
            .update_opening_range("AAPL", date(2025, 1, 15), OpeningRange::FiveMinute)
            .unwrap();
        // Window [9:30, 9:35): offsets 0..4
        assert_eq!(row.opening_range_5m_high, Some(dec!(179)));
        assert_eq!(row.opening_range_5m_low, Some(dec!(170)));
        assert!(row.opening_range_15m_high.is_none());
        assert_eq!(row.previous_day_high, daily.previous_day_high);

        let row = calc
            .update_opening_range("AAPL", date(2025, 1, 15), OpeningRange::FifteenMinute)
            .unwrap();
        // Window [9:30, 9:45): offsets 0..14
        assert_eq!(row.opening_range_15m_high, Some(dec!(189)));
        assert_eq!(row.opening_range_15m_low, Some(dec!(160)));
        assert_eq!(row.opening_range_5m_high, Some(dec!(179)));
    }

    #[test]
    fn level_status_picks_nearest_with_tie_to_fixed_order() {
        let dir = tempfile::tempdir().unwrap();
        let calc = calculator(dir.path());

        let mut row = KeyLevels::new("AAPL", date(2025, 1, 15));
        // PDH and PML equidistant from 175.00; PDH wins by enumeration order
        row.previous_day_high = Some(dec!(175.50));
        row.premarket_low = Some(dec!(174.50));
        calc.level_store().upsert(&row).unwrap();

        let status = calc
            .level_status_on("AAPL", date(2025, 1, 15), dec!(175.00))
            .unwrap();
        assert_eq!(status.name, LevelName::PreviousDayHigh);
        assert_eq!(status.level, dec!(175.50));
        assert_eq!(status.position, Position::Below);
        assert_eq!(status.distance, dec!(0.50));
    }

    #[test]
    fn level_status_at_level() {
        let dir = tempfile::tempdir().unwrap();
        let calc = calculator(dir.path());

        let mut row = KeyLevels::new("AAPL", date(2025, 1, 15));
        row.opening_range_5m_low = Some(dec!(175.00));
        calc.level_store().upsert(&row).unwrap();

        let status = calc
            .level_status_on("AAPL", date(2025, 1, 15), dec!(175.00))
            .unwrap();
        assert_eq!(status.name, LevelName::OpeningRange5mLow);
        assert_eq!(status.position, Position::At);
    }

    #[test]
    fn level_status_empty_row_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let calc = calculator(dir.path());
        calc.level_store()
            .upsert(&KeyLevels::new("AAPL", date(2025, 1, 15)))
            .unwrap();

        let result = calc.level_status_on("AAPL", date(2025, 1, 15), dec!(175.00));
        assert!(matches!(result, Err(LevelError::NotFound { .. })));
    }

    #[test]
    fn level_status_missing_row_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let calc = calculator(dir.path());
        let result = calc.level_status_on("AAPL", date(2025, 1, 15), dec!(175.00));
        assert!(matches!(result, Err(LevelError::NotFound { .. })));
    }

    #[test]
    fn publisher_receives_update_on_daily_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        write_session_day(&store, "AAPL", date(2025, 1, 14), dec!(175), 3);

        let (tx, mut rx) = broadcast::channel(8);
        let calc = calculator(dir.path()).with_publisher(tx);
        let row = calc.calculate_daily("AAPL", date(2025, 1, 15)).unwrap();

        let update = rx.try_recv().unwrap();
        assert_eq!(update.symbol, "AAPL");
        assert_eq!(update.date, date(2025, 1, 15));
        assert_eq!(update.levels, row);
    }
}
