//! Human-readable durations for log lines
//!
//! Format is picked by magnitude:
//! - under 100 seconds: `X.XXs`
//! - under 100 minutes: `M:SS`
//! - otherwise: `H:MM:SS`

use std::time::Duration;

const SHORT_FORMAT_MAX_SECS: u64 = 100;
const MEDIUM_FORMAT_MAX_SECS: u64 = 6000;

/// Format a duration for humans.
///
/// ```
/// use maf_common::human_time::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(120)), "2:00");
/// assert_eq!(format_duration(Duration::from_secs(3661 * 2)), "2:02:02");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < SHORT_FORMAT_MAX_SECS {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < MEDIUM_FORMAT_MAX_SECS {
        format!("{}:{:02}", secs / 60, secs % 60)
    } else {
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Like [`format_duration`], but `None` reads as "-"
pub fn format_optional_duration(duration: Option<Duration>) -> String {
    duration.map(format_duration).unwrap_or_else(|| "-".to_string())
}
