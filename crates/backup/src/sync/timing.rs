//! Human-friendly rendering of sync durations

use std::time::Duration;

/// Format an elapsed duration for status output
///
/// Sub-second durations are shown in milliseconds, short ones in seconds
/// with one decimal, longer ones as minutes/hours with zero-padded parts.
pub fn friendly_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        return format!("{}ms", millis);
    }

    let secs = duration.as_secs();
    if secs < 60 {
        return format!("{:.1}s", duration.as_secs_f64());
    }

    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else {
        format!("{}m {:02}s", minutes, seconds)
    }
}
