//! Clock & timezone utilities (spec §4.3's "Clock & TZ utilities" leaf
//! component). Everything here is pure: floor/ceil to the hour, local-date
//! formatting, and week-start-by-configurable-DOW. No I/O, no caching — the
//! caches that use these live in `telemetry-config`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

/// Floor `at` to the top of its UTC hour.
pub fn floor_hour_utc(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .and_hms_opt(at.hour(), 0, 0)
        .expect("hour is always in range")
        .and_utc()
}

/// Ceil `at` to the top of the *next* UTC hour, or `at` itself if it is
/// already exactly on the hour.
pub fn ceil_hour_utc(at: DateTime<Utc>) -> DateTime<Utc> {
    let floor = floor_hour_utc(at);
    if floor == at { floor } else { floor + Duration::hours(1) }
}

/// `at` converted to local wall-clock time in `tz`.
pub fn to_local(at: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    at.with_timezone(&tz)
}

/// `YYYY-MM-DD` local calendar date for `at` in `tz`.
pub fn local_date(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
    to_local(at, tz).date_naive()
}

/// Midnight local, as a UTC instant, for the local calendar date `date` in
/// `tz`. Used to anchor daily bootstrap and week-rollover windows.
pub fn local_midnight_utc(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    tz.from_local_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid"))
        .single()
        .expect("midnight is unambiguous for all IANA zones we configure")
        .with_timezone(&Utc)
}

/// Midnight local on the most recent occurrence of `week_start_dow` at or
/// before `at`'s local date (spec §3 "Week start — midnight local on the
/// configured day-of-week", §4.4 week rollover).
pub fn week_start_utc(at: DateTime<Utc>, tz: Tz, week_start_dow: Weekday) -> DateTime<Utc> {
    let today = local_date(at, tz);
    let back = days_since(today.weekday(), week_start_dow);
    local_midnight_utc(today - Duration::days(back as i64), tz)
}

/// Number of days to go back from `today_dow` to reach the most recent
/// `target_dow`, in `0..=6`.
fn days_since(today_dow: Weekday, target_dow: Weekday) -> u32 {
    let today = today_dow.num_days_from_monday();
    let target = target_dow.num_days_from_monday();
    (today + 7 - target) % 7
}

/// ISO-8601 day-of-week number (`1`=Monday..`7`=Sunday, spec §6
/// `week_start_dow=1..7`) to `chrono::Weekday`. Out-of-range values fall back
/// to Monday.
pub fn weekday_from_iso(dow: u8) -> Weekday {
    match dow {
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        6 => Weekday::Sat,
        7 => Weekday::Sun,
        _ => Weekday::Mon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Detroit;

    fn dt(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, h, m, s).unwrap()
    }

    #[test]
    fn floor_and_ceil_hour() {
        assert_eq!(floor_hour_utc(dt(10, 30, 15)), dt(10, 0, 0));
        assert_eq!(ceil_hour_utc(dt(10, 30, 15)), dt(11, 0, 0));
        assert_eq!(ceil_hour_utc(dt(11, 0, 0)), dt(11, 0, 0));
    }

    #[test]
    fn week_start_lands_on_configured_dow() {
        // 2026-01-05 is a Monday.
        let monday_10am = dt(10, 0, 0);
        let start_mon = week_start_utc(monday_10am, Detroit, Weekday::Mon);
        assert_eq!(local_date(start_mon, Detroit).weekday(), Weekday::Mon);
        assert!(start_mon <= monday_10am);

        let start_sun = week_start_utc(monday_10am, Detroit, Weekday::Sun);
        assert_eq!(local_date(start_sun, Detroit).weekday(), Weekday::Sun);
        // Sunday before this Monday is exactly one day back.
        assert_eq!(local_date(start_sun, Detroit) + Duration::days(1), local_date(start_mon, Detroit));
    }

    #[test]
    fn week_start_is_idempotent_on_the_anchor_itself() {
        let start = week_start_utc(dt(0, 0, 0), Detroit, Weekday::Mon);
        assert_eq!(week_start_utc(start, Detroit, Weekday::Mon), start);
    }
}
