use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Returns all weekdays (Mon-Fri) in the inclusive date range [start, end].
pub fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        if !is_weekend(current) {
            dates.push(current);
        }
        let Some(next) = current.succ_opt() else {
            break;
        };
        current = next;
    }
    dates
}

/// True for Saturday and Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The previous trading day by weekday arithmetic: Monday steps back to
/// Friday, every other day steps back one calendar day.
///
/// Known inconsistency: this ignores market holidays. A holiday-aware
/// trading calendar exists elsewhere in the system; unifying the two would
/// change historical level values for holiday-adjacent dates, so this stays
/// weekday-only until that product decision is made.
pub fn previous_trading_day(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Mon => date - Duration::days(3),
        _ => date - Duration::days(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekdays_skips_weekends() {
        // Mon Jan 13 through Sun Jan 19, 2025
        let result = weekdays(date(2025, 1, 13), date(2025, 1, 19));
        assert_eq!(
            result,
            vec![
                date(2025, 1, 13), // Mon
                date(2025, 1, 14), // Tue
                date(2025, 1, 15), // Wed
                date(2025, 1, 16), // Thu
                date(2025, 1, 17), // Fri
            ]
        );
    }

    #[test]
    fn weekdays_single_day_weekend() {
        // Saturday
        let result = weekdays(date(2025, 1, 18), date(2025, 1, 18));
        assert!(result.is_empty());
    }

    #[test]
    fn weekdays_start_after_end() {
        let result = weekdays(date(2025, 1, 20), date(2025, 1, 15));
        assert!(result.is_empty());
    }

    #[test]
    fn is_weekend_classifies() {
        assert!(is_weekend(date(2025, 1, 18))); // Sat
        assert!(is_weekend(date(2025, 1, 19))); // Sun
        assert!(!is_weekend(date(2025, 1, 17))); // Fri
    }

    #[test]
    fn previous_trading_day_monday_steps_to_friday() {
        assert_eq!(previous_trading_day(date(2025, 1, 13)), date(2025, 1, 10));
    }

    #[test]
    fn previous_trading_day_midweek_steps_one() {
        assert_eq!(previous_trading_day(date(2025, 1, 15)), date(2025, 1, 14));
    }

    #[test]
    fn previous_trading_day_ignores_holidays() {
        // Jan 2, 2025 (Thu) steps to Jan 1 even though that's a market
        // holiday. Documented behavior, not a bug.
        assert_eq!(previous_trading_day(date(2025, 1, 2)), date(2025, 1, 1));
    }
}
