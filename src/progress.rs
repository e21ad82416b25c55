//! Countdown bar shown to every online player.
//!
//! The bar fills up over the reset interval and its title spells out how long
//! until the next reset, e.g.
//! `Farm reset in 12 days, 04:05:06 (31.03.2024 at 12:00)`.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use crate::reset::clock::{next_reset_instant, progress_fraction, SECONDS_PER_DAY};

/// What the host should render as the progress bar.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub title: String,
    /// 0.0 right after a reset, 1.0 when the next one is due.
    pub progress: f32,
}

/// Build the progress view for `now` from the persisted schedule.
pub fn render<Tz: TimeZone>(
    now: DateTime<Tz>,
    last_reset: i64,
    reset_hour: u32,
    interval_days: u32,
) -> ProgressView
where
    Tz::Offset: Display,
{
    let next = next_reset_instant(now.clone(), last_reset, reset_hour, interval_days);
    let total = (next.clone() - now.clone()).num_seconds().max(0);
    let days = total / SECONDS_PER_DAY;
    let hours = (total % SECONDS_PER_DAY) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let title = format!(
        "Farm reset in {} days, {:02}:{:02}:{:02} ({} at {:02}:00)",
        days,
        hours,
        minutes,
        seconds,
        next.format("%d.%m.%Y"),
        reset_hour
    );
    let interval_seconds = i64::from(interval_days) * SECONDS_PER_DAY;
    ProgressView {
        title,
        progress: progress_fraction(now, next, interval_seconds),
    }
}
