use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Exchange-local session windows for a single market.
///
/// Owned by an external configuration collaborator at deployment time; the
/// default covers US equities on NYSE/Nasdaq hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    pub timezone: Tz,
    /// Regular session open (e.g. 09:30).
    pub open: NaiveTime,
    /// Regular session close (e.g. 16:00).
    pub close: NaiveTime,
    /// Premarket start (e.g. 04:00). Premarket runs until `open`.
    pub premarket_start: NaiveTime,
}

impl MarketHours {
    /// US equities: America/New_York, premarket 4:00, regular 9:30 - 16:00.
    pub fn us_equities() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            open: NaiveTime::from_hms_opt(9, 30, 0).expect("valid time"),
            close: NaiveTime::from_hms_opt(16, 0, 0).expect("valid time"),
            premarket_start: NaiveTime::from_hms_opt(4, 0, 0).expect("valid time"),
        }
    }

    /// Convert a UTC instant to exchange-local time.
    pub fn local(&self, timestamp: &DateTime<Utc>) -> DateTime<Tz> {
        timestamp.with_timezone(&self.timezone)
    }

    /// The exchange-local calendar date of a UTC instant.
    pub fn local_date(&self, timestamp: &DateTime<Utc>) -> NaiveDate {
        self.local(timestamp).date_naive()
    }

    /// True if the instant falls in the premarket window `[premarket_start, open)`.
    pub fn in_premarket(&self, timestamp: &DateTime<Utc>) -> bool {
        let time = self.local(timestamp).time();
        time >= self.premarket_start && time < self.open
    }

    /// True if the instant falls in the regular session `[open, close)`.
    pub fn in_regular(&self, timestamp: &DateTime<Utc>) -> bool {
        let time = self.local(timestamp).time();
        time >= self.open && time < self.close
    }

    /// True if the instant falls in the opening range window
    /// `[open, open + minutes)`.
    pub fn in_opening_range(&self, timestamp: &DateTime<Utc>, minutes: i64) -> bool {
        let time = self.local(timestamp).time();
        time >= self.open && time < self.open + Duration::minutes(minutes)
    }

    /// The exchange-local calendar date "now" (rollover checks).
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    /// The UTC instant of the session open on a given local date.
    ///
    /// Uses the earliest valid local mapping on DST transition days.
    pub fn open_instant(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&date.and_time(self.open))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl Default for MarketHours {
    fn default() -> Self {
        Self::us_equities()
    }
}
