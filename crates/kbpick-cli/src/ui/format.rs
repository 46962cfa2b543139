//! Formatting utilities for CLI output.

use chrono::{DateTime, Utc};

/// Truncate a string to at most `max_len` characters, ending in `...`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_str("report.pdf", 20), "report.pdf");
/// assert_eq!(truncate_str("quarterly-report.pdf", 10), "quarter...");
/// ```
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return ".".repeat(max_len);
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{}...", kept)
}

/// Format a timestamp relative to `now`.
///
/// - Less than 1 minute: "just now"
/// - Less than 1 hour: "5 mins ago"
/// - Less than 24 hours: "3h ago"
/// - Less than 7 days: "2d ago"
/// - Older or in the future: "2025-01-15"
pub fn format_relative_time_from(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(timestamp);

    if duration.num_seconds() < 0 {
        return timestamp.format("%Y-%m-%d").to_string();
    }

    if duration.num_minutes() < 1 {
        "just now".to_string()
    } else if duration.num_hours() < 1 {
        format!("{} mins ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        timestamp.format("%Y-%m-%d").to_string()
    }
}

/// Format a timestamp relative to the current time.
pub fn format_relative_time(timestamp: DateTime<Utc>) -> String {
    format_relative_time_from(timestamp, Utc::now())
}

/// `1 item`, `3 items`.
pub fn count_noun(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 5), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hello", 3), "...");
        assert_eq!(truncate_str("résumé-final.pdf", 9), "résumé...");
    }

    #[test]
    fn test_format_relative_time() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(format_relative_time_from(now, now), "just now");
        assert_eq!(
            format_relative_time_from(now - Duration::minutes(5), now),
            "5 mins ago"
        );
        assert_eq!(format_relative_time_from(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_relative_time_from(now - Duration::days(2), now), "2d ago");
        assert_eq!(
            format_relative_time_from(now - Duration::days(30), now),
            "2025-02-08"
        );
        assert_eq!(
            format_relative_time_from(now + Duration::days(1), now),
            "2025-03-11"
        );
    }

    #[test]
    fn test_count_noun() {
        assert_eq!(count_noun(1, "item"), "1 item");
        assert_eq!(count_noun(0, "item"), "0 items");
        assert_eq!(count_noun(3, "folder"), "3 folders");
    }
}
