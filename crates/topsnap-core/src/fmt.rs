//! Formatting helpers for presenting snapshot values.
//!
//! All functions are pure; callers decide on layout and alignment.

/// Format KiB to human-readable size.
pub fn format_kb(kb: u64) -> String {
    if kb == 0 {
        return "0".to_string();
    }
    if kb >= 1024 * 1024 {
        format!("{:.1}G", kb as f64 / (1024.0 * 1024.0))
    } else if kb >= 1024 {
        format!("{:.1}M", kb as f64 / 1024.0)
    } else {
        format!("{}K", kb)
    }
}

/// Format bytes-per-second rate as human-readable.
///
/// `"-"` for an unknown (`NaN`) rate, `"0"` below one byte per second.
pub fn format_bytes_rate(rate: f64) -> String {
    if rate.is_nan() {
        return "-".to_string();
    }
    if rate < 1.0 {
        return "0".to_string();
    }
    if rate >= 1024.0 * 1024.0 * 1024.0 {
        format!("{:.1}G/s", rate / (1024.0 * 1024.0 * 1024.0))
    } else if rate >= 1024.0 * 1024.0 {
        format!("{:.1}M/s", rate / (1024.0 * 1024.0))
    } else if rate >= 1024.0 {
        format!("{:.1}K/s", rate / 1024.0)
    } else {
        format!("{:.0}B/s", rate)
    }
}

/// Format a percentage with one decimal.
pub fn format_percent(value: f32) -> String {
    format!("{:.1}%", value)
}

/// Format CPU time in hundredths of a second, `top` style: `"M:SS.cc"`.
///
/// Switches to `"Hh:MM"` once the minutes no longer fit in three digits.
pub fn format_cpu_time(centis: u64) -> String {
    let total_secs = centis / 100;
    let minutes = total_secs / 60;
    if minutes >= 1000 {
        return format!("{}h:{:02}", minutes / 60, minutes % 60);
    }
    format!("{}:{:02}.{:02}", minutes, total_secs % 60, centis % 100)
}
