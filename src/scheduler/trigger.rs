//! Typed job triggers.
//!
//! Triggers are evaluated directly against wall-clock time instead of going
//! through a cron-expression string. A recurring trigger is an explicit set of
//! due hours plus a minute; a one-shot trigger is a single instant.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};

/// When a job is due to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Fires at `minute` past each hour in `hours`, every day.
    Hourly { hours: BTreeSet<u8>, minute: u8 },
    /// Fires once at the given instant.
    Once { at: NaiveDateTime },
}

impl Trigger {
    /// The next occurrence strictly after `now`, or `None` when the trigger
    /// is exhausted (empty hour set, or a one-shot instant already past).
    pub fn next_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Trigger::Hourly { hours, minute } => {
                if hours.is_empty() {
                    return None;
                }
                let today = now.date();
                for &hour in hours {
                    let candidate = today
                        .and_time(NaiveTime::from_hms_opt(hour as u32, *minute as u32, 0)?);
                    if candidate > now {
                        return Some(candidate);
                    }
                }
                // Today's occurrences have passed; wrap to the first hour tomorrow.
                let first = *hours.iter().next()?;
                Some(
                    (today + Duration::days(1))
                        .and_time(NaiveTime::from_hms_opt(first as u32, *minute as u32, 0)?),
                )
            }
            Trigger::Once { at } => {
                if *at > now {
                    Some(*at)
                } else {
                    None
                }
            }
        }
    }

    /// Human-readable description used in job snapshots.
    pub fn describe(&self) -> String {
        match self {
            Trigger::Hourly { hours, minute } => {
                let hours: Vec<String> = hours.iter().map(|h| h.to_string()).collect();
                format!("hours[{}] at :{:02}", hours.join(","), minute)
            }
            Trigger::Once { at } => format!("once at {}", at.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Compute the hour-of-day set for a backup family.
///
/// Returns `{(offset + i*interval) mod 24}` for `i` in `0..24/interval`
/// (integer division — an interval that does not divide 24 evenly is
/// truncated, not rejected). An interval of 0 disables the family and yields
/// the empty set. The offset is reduced modulo the interval.
pub fn backup_hours(interval_hours: u8, offset_hours: u8) -> BTreeSet<u8> {
    let mut hours = BTreeSet::new();
    if interval_hours == 0 {
        return hours;
    }
    let interval = interval_hours.min(24);
    let offset = offset_hours % interval;
    for i in 0..(24 / interval) {
        hours.insert((offset + i * interval) % 24);
    }
    hours
}

/// World-backup hours that are not already covered by a server backup.
///
/// A server backup archives (and then clears) the same world data, so running
/// a world backup in a server-backup hour would duplicate work for nothing.
pub fn world_only_hours(
    world_interval: u8,
    server_interval: u8,
    offset_hours: u8,
) -> BTreeSet<u8> {
    let server = backup_hours(server_interval, offset_hours);
    backup_hours(world_interval, offset_hours)
        .difference(&server)
        .copied()
        .collect()
}

/// Top of the next hour in `hours` strictly after the current hour, wrapping
/// to tomorrow's first hour when none remains today.
pub fn next_hour_in_set(hours: &BTreeSet<u8>, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if hours.is_empty() {
        return None;
    }
    let current = now.hour() as u8;
    let next = hours.iter().copied().find(|&h| h > current);
    let (date, hour) = match next {
        Some(h) => (now.date(), h),
        None => (now.date() + Duration::days(1), *hours.iter().next()?),
    };
    Some(date.and_time(NaiveTime::from_hms_opt(hour as u32, 0, 0)?))
}
