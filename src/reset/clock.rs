//! Reset clock: when is the next farm reset due?
//!
//! The schedule lives in one configured timezone (an IANA zone such as
//! `Europe/Berlin`), so it is the same for the operator and every player no
//! matter where the host machine runs. Intervals are counted in calendar days
//! and each slot is re-anchored at the reset hour, so a daylight-saving change
//! never shifts the wall-clock time of a reset.
//!
//! These are pure functions; the due-check and the progress display both call
//! them with the same inputs and therefore always agree.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike};

pub const SECONDS_PER_DAY: i64 = 86_400;

/// The instant `date` at `hour:00:00` local time in `tz`.
///
/// An ambiguous hour (clocks going back) resolves to its first occurrence.
/// An hour skipped by clocks going forward moves to the hour after the gap.
pub fn at_reset_hour<Tz: TimeZone>(date: NaiveDate, hour: u32, tz: &Tz) -> DateTime<Tz> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let local = date.and_time(time);
    local
        .and_local_timezone(tz.clone())
        .earliest()
        .or_else(|| {
            (local + Duration::hours(1))
                .and_local_timezone(tz.clone())
                .earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&local))
}

/// Convert persisted epoch seconds into the schedule's timezone.
pub fn from_epoch<Tz: TimeZone>(seconds: i64, tz: &Tz) -> Option<DateTime<Tz>> {
    DateTime::from_timestamp(seconds, 0).map(|utc| utc.with_timezone(tz))
}

fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days)).unwrap_or(date)
}

/// First scheduled reset after `last_reset`: `interval_days` later, at `reset_hour`.
pub fn scheduled_after<Tz: TimeZone>(
    last_reset: DateTime<Tz>,
    reset_hour: u32,
    interval_days: u32,
) -> DateTime<Tz> {
    let date = add_days(last_reset.date_naive(), i64::from(interval_days));
    at_reset_hour(date, reset_hour, &last_reset.timezone())
}

/// Date of the first slot on the grid that lies strictly after `now`.
fn next_slot_date<Tz: TimeZone>(
    now: &DateTime<Tz>,
    first: NaiveDate,
    reset_hour: u32,
    interval_days: i64,
) -> NaiveDate {
    let tz = now.timezone();
    let mut date = first;
    let behind = (now.date_naive() - first).num_days();
    if behind > 0 {
        // Skip whole intervals at once; a server offline for months should not loop per step.
        date = add_days(date, behind / interval_days * interval_days);
    }
    while at_reset_hour(date, reset_hour, &tz) <= *now {
        date = add_days(date, interval_days);
    }
    date
}

/// Next reset strictly after `now`.
///
/// With `last_reset == 0` (never reset) this is today at `reset_hour`, or
/// tomorrow if that moment has already passed. Otherwise the schedule starts
/// at [`scheduled_after`] and steps forward by `interval_days` until it lies
/// in the future, however stale the stored timestamp is.
pub fn next_reset_instant<Tz: TimeZone>(
    now: DateTime<Tz>,
    last_reset: i64,
    reset_hour: u32,
    interval_days: u32,
) -> DateTime<Tz> {
    let tz = now.timezone();
    let last = if last_reset == 0 {
        None
    } else {
        from_epoch(last_reset, &tz)
    };

    let Some(last) = last else {
        let today = at_reset_hour(now.date_naive(), reset_hour, &tz);
        return if today <= now {
            at_reset_hour(add_days(now.date_naive(), 1), reset_hour, &tz)
        } else {
            today
        };
    };

    let interval = i64::from(interval_days.max(1));
    let first = add_days(last.date_naive(), interval);
    let date = next_slot_date(&now, first, reset_hour, interval);
    at_reset_hour(date, reset_hour, &tz)
}

/// Latest scheduled slot at or before `now`, if the schedule has reached one.
///
/// This is the slot just before [`next_reset_instant`]; `None` while `now` is
/// still ahead of the first slot after `last_reset`, or when nothing was ever
/// recorded.
pub fn latest_slot_at_or_before<Tz: TimeZone>(
    now: DateTime<Tz>,
    last_reset: i64,
    reset_hour: u32,
    interval_days: u32,
) -> Option<DateTime<Tz>> {
    if last_reset == 0 {
        return None;
    }
    let tz = now.timezone();
    let last = from_epoch(last_reset, &tz)?;
    let interval = i64::from(interval_days.max(1));
    let first = add_days(last.date_naive(), interval);
    let next = next_slot_date(&now, first, reset_hour, interval);
    if next <= first {
        return None;
    }
    Some(at_reset_hour(add_days(next, -interval), reset_hour, &tz))
}

/// Share of the current interval that has elapsed, clamped to `0.0..=1.0`.
pub fn progress_fraction<Tz: TimeZone>(
    now: DateTime<Tz>,
    next_reset: DateTime<Tz>,
    interval_seconds: i64,
) -> f32 {
    if interval_seconds <= 0 {
        return 1.0;
    }
    let until = (next_reset - now).num_seconds();
    let fraction = 1.0 - until as f64 / interval_seconds as f64;
    fraction.clamp(0.0, 1.0) as f32
}

/// Start of the minute `now` falls in.
pub fn minute_start<Tz: TimeZone>(now: DateTime<Tz>) -> DateTime<Tz> {
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Offset};
    use chrono_tz::Europe::Berlin;

    fn cet() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        cet().with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn never_reset_before_hour_is_today() {
        let now = at(2024, 3, 1, 8, 0);
        assert_eq!(next_reset_instant(now, 0, 12, 30), at(2024, 3, 1, 12, 0));
    }

    #[test]
    fn never_reset_after_hour_is_tomorrow() {
        let now = at(2024, 3, 1, 13, 0);
        assert_eq!(next_reset_instant(now, 0, 12, 30), at(2024, 3, 2, 12, 0));
        // exactly on the hour counts as passed
        let now = at(2024, 3, 1, 12, 0);
        assert_eq!(next_reset_instant(now, 0, 12, 30), at(2024, 3, 2, 12, 0));
    }

    #[test]
    fn interval_is_added_to_last_reset_date() {
        let last = at(2024, 3, 1, 12, 0).timestamp();
        let now = at(2024, 3, 10, 9, 0);
        assert_eq!(next_reset_instant(now, last, 12, 30), at(2024, 3, 31, 12, 0));
    }

    #[test]
    fn time_of_day_is_forced_to_reset_hour() {
        let last = at(2024, 3, 1, 17, 45).timestamp();
        let now = at(2024, 3, 2, 0, 0);
        assert_eq!(next_reset_instant(now, last, 6, 7), at(2024, 3, 8, 6, 0));
    }

    #[test]
    fn stale_state_advances_whole_intervals() {
        let last = at(2023, 1, 1, 12, 0);
        let now = at(2024, 6, 15, 9, 30);
        let next = next_reset_instant(now, last.timestamp(), 12, 30);
        assert!(next > now);
        assert!(next - now <= Duration::days(30));
        let days = (next - scheduled_after(last, 12, 30)).num_seconds();
        assert_eq!(days % (30 * SECONDS_PER_DAY), 0);
    }

    #[test]
    fn result_is_always_after_now_and_on_the_grid() {
        let last = at(2024, 1, 5, 3, 12);
        let first = scheduled_after(last, 20, 3);
        for hours in (0..24 * 40).step_by(7) {
            let now = at(2024, 1, 5, 0, 0) + Duration::hours(hours);
            let next = next_reset_instant(now, last.timestamp(), 20, 3);
            assert!(next > now, "next {} not after now {}", next, now);
            assert_eq!((next - first).num_seconds() % (3 * SECONDS_PER_DAY), 0);
            assert!(next >= first);
        }
    }

    #[test]
    fn reset_hour_is_read_in_schedule_offset() {
        // 11:30 UTC is 12:30 in the schedule offset, so today's noon slot is gone
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 11, 30, 0)
            .unwrap()
            .with_timezone(&cet());
        assert_eq!(next_reset_instant(now, 0, 12, 30), at(2024, 3, 2, 12, 0));
    }

    #[test]
    fn progress_is_clamped() {
        let now = at(2024, 3, 1, 12, 0);
        let interval = 30 * SECONDS_PER_DAY;
        assert_eq!(progress_fraction(now, now + Duration::days(30), interval), 0.0);
        assert_eq!(progress_fraction(now, now + Duration::days(60), interval), 0.0);
        assert_eq!(progress_fraction(now, now - Duration::days(1), interval), 1.0);
        let half = progress_fraction(now, now + Duration::days(15), interval);
        assert!((half - 0.5).abs() < 1e-6);
    }

    #[test]
    fn minute_start_truncates_seconds() {
        let t = cet().with_ymd_and_hms(2024, 3, 1, 12, 0, 42).unwrap();
        assert_eq!(minute_start(t), at(2024, 3, 1, 12, 0));
    }

    #[test]
    fn latest_slot_is_the_one_before_next() {
        let last = at(2024, 3, 1, 13, 0).timestamp();
        // not reached yet: the first slot after lastReset is still ahead
        assert_eq!(latest_slot_at_or_before(at(2024, 3, 20, 9, 0), last, 12, 30), None);
        assert_eq!(
            latest_slot_at_or_before(at(2024, 3, 31, 12, 30), last, 12, 30),
            Some(at(2024, 3, 31, 12, 0))
        );
        assert_eq!(
            latest_slot_at_or_before(at(2024, 6, 1, 8, 0), last, 12, 30),
            Some(at(2024, 5, 30, 12, 0))
        );
        assert_eq!(latest_slot_at_or_before(at(2024, 3, 31, 12, 30), 0, 12, 30), None);
    }

    fn berlin(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<chrono_tz::Tz> {
        Berlin.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn summer_reset_keeps_wall_clock_hour() {
        let last = berlin(2024, 6, 10, 12, 0).timestamp();
        let next = next_reset_instant(berlin(2024, 6, 20, 8, 0), last, 12, 30);
        assert_eq!(next, berlin(2024, 7, 10, 12, 0));
        assert_eq!(next.hour(), 12);
        // CEST: noon in Berlin is 10:00 UTC
        assert_eq!(next.naive_utc().hour(), 10);
        assert_eq!(next.offset().fix().local_minus_utc(), 7200);
    }

    #[test]
    fn interval_across_dst_change_stays_on_the_hour() {
        // Winter to summer time: 2024-03-31 has only 23 hours in Berlin
        let last = berlin(2024, 3, 1, 12, 0).timestamp();
        let next = next_reset_instant(berlin(2024, 3, 15, 9, 0), last, 12, 30);
        assert_eq!(next, berlin(2024, 3, 31, 12, 0));
        let after = next_reset_instant(berlin(2024, 3, 31, 12, 0), last, 12, 30);
        assert_eq!(after, berlin(2024, 4, 30, 12, 0));
        // summer back to winter
        let last = berlin(2024, 10, 1, 6, 0).timestamp();
        let next = next_reset_instant(berlin(2024, 10, 20, 0, 0), last, 6, 30);
        assert_eq!(next, berlin(2024, 10, 31, 6, 0));
        assert_eq!(next.offset().fix().local_minus_utc(), 3600);
    }

    #[test]
    fn reset_hour_in_dst_gap_moves_past_it() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(at_reset_hour(day, 2, &Berlin), berlin(2024, 3, 31, 3, 0));
        // the repeated hour in October takes its first occurrence
        let day = NaiveDate::from_ymd_opt(2024, 10, 27).unwrap();
        let slot = at_reset_hour(day, 2, &Berlin);
        assert_eq!(slot.offset().fix().local_minus_utc(), 7200);
    }
}
