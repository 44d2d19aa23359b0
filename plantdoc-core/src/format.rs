//! Formatting helpers shared across UIs.

use chrono::{DateTime, Datelike, Days, TimeZone, Timelike};

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Format an RFC 3339 timestamp relative to `now` (e.g. "Today, 2:05 PM").
///
/// Calendar days are taken in `now`'s time zone. Output is fully determined
/// by the two arguments. Timestamps that fail to parse are returned as-is.
pub fn format_relative<Tz: TimeZone>(timestamp: &str, now: &DateTime<Tz>) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(ts) => format_relative_time(&ts.with_timezone(&now.timezone()), now),
        Err(e) => {
            tracing::debug!(timestamp, error = %e, "Unparseable history timestamp");
            timestamp.to_string()
        }
    }
}

/// Same as [`format_relative`] for an already-parsed time in `now`'s zone.
pub fn format_relative_time<Tz: TimeZone>(ts: &DateTime<Tz>, now: &DateTime<Tz>) -> String {
    let day = ts.date_naive();
    let today = now.date_naive();

    if day == today {
        return format!("Today, {}", format_time(ts));
    }

    if today.pred_opt() == Some(day) {
        return format!("Yesterday, {}", format_time(ts));
    }

    // Seven calendar days back at the same wall-clock time, exclusive.
    let week_ago = now.clone().checked_sub_days(Days::new(7));
    if week_ago.map_or(false, |cutoff| *ts > cutoff) {
        return format!("{}, {}", day_name(ts), format_time(ts));
    }

    format!(
        "{}/{}/{}, {}",
        ts.month(),
        ts.day(),
        ts.year(),
        format_time(ts)
    )
}

/// 12-hour clock time such as "9:00 AM" or "12:30 PM".
pub fn format_time<Tz: TimeZone>(ts: &DateTime<Tz>) -> String {
    let (is_pm, hour) = ts.hour12();
    format!(
        "{}:{:02} {}",
        hour,
        ts.minute(),
        if is_pm { "PM" } else { "AM" }
    )
}

/// English weekday name, Sunday first.
pub fn day_name<Tz: TimeZone>(ts: &DateTime<Tz>) -> &'static str {
    DAY_NAMES[ts.weekday().num_days_from_sunday() as usize]
}
