// src/utils/time.rs

use chrono::{DateTime, Utc};

/// Current Unix time in seconds.
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Formats a Unix timestamp for display, e.g. `Tuesday, 5 March 2024, 2:05 PM`
/// or, when `short`, `5/03/24, 14:05`.
pub fn user_date(timestamp: i64, short: bool) -> String {
    let format = if short {
        "%-d/%m/%y, %H:%M"
    } else {
        "%A, %-d %B %Y, %-I:%M %p"
    };

    match DateTime::<Utc>::from_timestamp(timestamp, 0) {
        Some(date) => date.format(format).to_string(),
        None => timestamp.to_string(),
    }
}
