use chrono::{DateTime, Duration, Local, TimeZone};

/// Renders whole seconds as zero-padded `mm:ss`.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Renders an epoch-millisecond timestamp relative to `now`:
/// `Today, 14:05`, `Yesterday, 09:30` or `Mar 4, 2024, 18:00`.
pub fn format_timestamp(timestamp_ms: i64, now: DateTime<Local>) -> String {
    let date = match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(date) => date,
        None => return timestamp_ms.to_string(),
    };

    let time = date.format("%H:%M");
    let today = now.date_naive();

    if date.date_naive() == today {
        format!("Today, {}", time)
    } else if Some(date.date_naive()) == today.checked_sub_signed(Duration::days(1)) {
        format!("Yesterday, {}", time)
    } else {
        format!("{}, {}", date.format("%b %-d, %Y"), time)
    }
}

/// First non-empty line of `content`, cut to `max_chars` characters.
pub fn content_preview(content: &str, max_chars: usize) -> String {
    let first_line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");

    if first_line.chars().count() <= max_chars {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_zero_padded() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(3), "00:03");
        assert_eq!(format_elapsed(75), "01:15");
        assert_eq!(format_elapsed(3600), "60:00");
    }

    #[test]
    fn timestamp_today_and_yesterday() {
        let now = Local.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let this_morning = Local.with_ymd_and_hms(2024, 3, 10, 9, 5, 0).unwrap();
        let yesterday = Local.with_ymd_and_hms(2024, 3, 9, 22, 41, 0).unwrap();

        assert_eq!(
            format_timestamp(this_morning.timestamp_millis(), now),
            "Today, 09:05"
        );
        assert_eq!(
            format_timestamp(yesterday.timestamp_millis(), now),
            "Yesterday, 22:41"
        );
    }

    #[test]
    fn timestamp_older_dates_show_full_date() {
        let now = Local.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let older = Local.with_ymd_and_hms(2023, 12, 4, 18, 0, 0).unwrap();

        assert_eq!(
            format_timestamp(older.timestamp_millis(), now),
            "Dec 4, 2023, 18:00"
        );
    }

    #[test]
    fn preview_skips_blank_lines_and_truncates_on_chars() {
        assert_eq!(content_preview("\n\n  hello\nworld", 10), "hello");
        assert_eq!(content_preview("ééééé", 3), "ééé...");
        assert_eq!(content_preview("", 10), "");
    }
}
