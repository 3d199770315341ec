//! Exchange-calendar time windows for the decision loop
//!
//! All window logic evaluates against the venue's local trading clock
//! (US equities, Eastern Time), independent of host timezone.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

/// The exchange's local clock
pub fn exchange_time(now: DateTime<Utc>) -> DateTime<Tz> {
    now.with_timezone(&New_York)
}

/// Exchange-local calendar date, used as the trading-session boundary
pub fn exchange_date(now: DateTime<Utc>) -> NaiveDate {
    exchange_time(now).date_naive()
}

/// Buy windows: 11:15–12:15 and 14:15–15:15 exchange-local, inclusive
pub fn in_buy_window(et: DateTime<Tz>) -> bool {
    let hour = et.hour();
    let minute = et.minute();
    (hour == 11 && minute >= 15)
        || (hour == 12 && minute <= 15)
        || (hour == 14 && minute >= 15)
        || (hour == 15 && minute <= 15)
}

/// The 09:30 open minute, when the morning VWAP is computed
pub fn is_vwap_compute_minute(et: DateTime<Tz>) -> bool {
    et.hour() == 9 && et.minute() == 30
}

/// The 10:30 minute, when a losing position is converted to a market exit
pub fn is_conversion_minute(et: DateTime<Tz>) -> bool {
    et.hour() == 10 && et.minute() == 30
}

/// The 09:30–10:00 exchange-local window for `now`'s trading day, as UTC
/// instants. `None` only if the local datetime cannot be resolved.
pub fn vwap_window(now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let date = exchange_date(now);
    let start = local_instant(date, 9, 30)?;
    let end = start + chrono::Duration::minutes(30);
    Some((start, end))
}

/// The next 16:05 exchange-local instant strictly after `now`
pub fn next_summary_instant(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = exchange_date(now);
    for offset in 0..3 {
        let instant = today
            .checked_add_days(Days::new(offset))
            .and_then(|date| local_instant(date, 16, 5));
        if let Some(instant) = instant {
            if instant > now {
                return instant;
            }
        }
    }
    now + chrono::Duration::days(1)
}

/// The next 5-minute wall-clock boundary strictly after `now`
pub fn next_snapshot_boundary(now: DateTime<Utc>, interval_secs: i64) -> DateTime<Utc> {
    let secs = now.timestamp();
    let next = secs - secs.rem_euclid(interval_secs) + interval_secs;
    match Utc.timestamp_opt(next, 0) {
        chrono::LocalResult::Single(t) => t,
        _ => now + chrono::Duration::seconds(interval_secs),
    }
}

fn local_instant(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    New_York
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn et(hour: u32, minute: u32) -> DateTime<Tz> {
        New_York
            .with_ymd_and_hms(2024, 1, 16, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_buy_window_boundaries() {
        assert!(!in_buy_window(et(11, 14)));
        assert!(in_buy_window(et(11, 15)));
        assert!(in_buy_window(et(11, 59)));
        assert!(in_buy_window(et(12, 0)));
        assert!(in_buy_window(et(12, 15)));
        assert!(!in_buy_window(et(12, 16)));

        assert!(!in_buy_window(et(14, 14)));
        assert!(in_buy_window(et(14, 15)));
        assert!(in_buy_window(et(15, 15)));
        assert!(!in_buy_window(et(15, 16)));

        assert!(!in_buy_window(et(9, 30)));
        assert!(!in_buy_window(et(13, 0)));
    }

    #[test]
    fn test_vwap_and_conversion_minutes() {
        assert!(is_vwap_compute_minute(et(9, 30)));
        assert!(!is_vwap_compute_minute(et(9, 31)));
        assert!(!is_vwap_compute_minute(et(10, 30)));

        assert!(is_conversion_minute(et(10, 30)));
        assert!(!is_conversion_minute(et(10, 29)));
    }

    #[test]
    fn test_vwap_window_spans_thirty_minutes() {
        let now = et(11, 0).with_timezone(&Utc);
        let (start, end) = vwap_window(now).unwrap();
        assert_eq!(end - start, chrono::Duration::minutes(30));
        assert_eq!(exchange_time(start).hour(), 9);
        assert_eq!(exchange_time(start).minute(), 30);
    }

    #[test]
    fn test_next_summary_rolls_to_tomorrow() {
        let before = et(15, 0).with_timezone(&Utc);
        let after = et(16, 10).with_timezone(&Utc);

        let next_before = next_summary_instant(before);
        assert_eq!(exchange_time(next_before).hour(), 16);
        assert_eq!(exchange_time(next_before).minute(), 5);
        assert_eq!(exchange_date(next_before), exchange_date(before));

        let next_after = next_summary_instant(after);
        assert_eq!(exchange_time(next_after).hour(), 16);
        assert_eq!(
            exchange_date(next_after),
            exchange_date(after).succ_opt().unwrap()
        );
    }

    #[test]
    fn test_snapshot_boundary_alignment() {
        let now = Utc.with_ymd_and_hms(2024, 1, 16, 14, 2, 17).unwrap();
        let boundary = next_snapshot_boundary(now, 300);
        assert_eq!(boundary, Utc.with_ymd_and_hms(2024, 1, 16, 14, 5, 0).unwrap());

        // A boundary instant rolls forward to the next one
        let at_boundary = next_snapshot_boundary(boundary, 300);
        assert_eq!(
            at_boundary,
            Utc.with_ymd_and_hms(2024, 1, 16, 14, 10, 0).unwrap()
        );
    }

    #[test]
    fn test_exchange_date_uses_local_calendar() {
        // 01:00 UTC is still the previous evening in New York
        let now = Utc.with_ymd_and_hms(2024, 1, 17, 1, 0, 0).unwrap();
        assert_eq!(
            exchange_date(now),
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
        );
    }
}
