// src/util/format.rs

//! Display helpers shared by event messages.

use chrono::Duration;

/// Picks the singular or plural form for a count.
pub fn plural<'a>(count: i64, singular: &'a str, plural: &'a str) -> &'a str {
    if count == 1 {
        singular
    } else {
        plural
    }
}

/// Formats a duration rounded to 10 milliseconds, e.g. "1.25s" or "2m3.5s".
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.num_milliseconds().max(0);
    let ms = (ms / 10) * 10;

    if ms < 1000 {
        return format!("{ms}ms");
    }

    let total_seconds = ms as f64 / 1000.0;
    if total_seconds < 60.0 {
        return trim_zeroes(format!("{total_seconds:.2}"), "s");
    }

    let minutes = (total_seconds / 60.0).floor() as i64;
    let seconds = total_seconds - (minutes as f64) * 60.0;
    if minutes < 60 {
        return format!("{minutes}m{}", trim_zeroes(format!("{seconds:.2}"), "s"));
    }

    let hours = minutes / 60;
    let minutes = minutes % 60;
    format!(
        "{hours}h{minutes}m{}",
        trim_zeroes(format!("{seconds:.2}"), "s")
    )
}

fn trim_zeroes(mut value: String, unit: &str) -> String {
    if value.contains('.') {
        while value.ends_with('0') {
            value.pop();
        }
        if value.ends_with('.') {
            value.pop();
        }
    }
    value + unit
}

/// Formats a transfer rate in mebibits per second with two decimal places.
pub fn bitrate_mbps(transferred: u64, duration: Duration) -> String {
    let ms = duration.num_milliseconds();
    if transferred == 0 || ms <= 0 {
        return "0".to_string();
    }
    const MEBIBIT: f64 = 1_048_576.0;
    let bytes_per_second = transferred as f64 / (ms as f64 / 1000.0);
    format!("{:.02}", bytes_per_second * 8.0 / MEBIBIT)
}
