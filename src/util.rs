use std::time::Duration;

/// Formats seconds as `m:ss`
pub fn format_time(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

pub fn format_duration(d: Duration) -> String {
    format_time(d.as_secs())
}

/// Percentage with at most one decimal, dropping a trailing `.0`
pub fn format_percent(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if (rounded - rounded.round()).abs() < f64::EPSILON {
        format!("{}%", rounded.round())
    } else {
        format!("{rounded:.1}%")
    }
}

/// Maps 1-9 to a zero based option index
pub fn digit_to_index(c: char) -> Option<usize> {
    match c.to_digit(10) {
        Some(d) if d > 0 => Some(d as usize - 1),
        _ => None,
    }
}

/// Letter label for an option, `A` for the first
pub fn option_label(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(59), "0:59");
        assert_eq!(format_time(60), "1:00");
        assert_eq!(format_time(600), "10:00");
        assert_eq!(format_time(3725), "62:05");
    }

    #[test]
    fn test_format_duration_truncates_millis() {
        assert_eq!(format_duration(Duration::from_millis(61_900)), "1:01");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(100.0), "100%");
        assert_eq!(format_percent(200.0 / 3.0), "66.7%");
        assert_eq!(format_percent(75.04), "75%");
        assert_eq!(format_percent(0.0), "0%");
    }

    #[test]
    fn test_digit_to_index() {
        assert_eq!(digit_to_index('1'), Some(0));
        assert_eq!(digit_to_index('9'), Some(8));
        assert_eq!(digit_to_index('0'), None);
        assert_eq!(digit_to_index('x'), None);
    }

    #[test]
    fn test_option_label() {
        assert_eq!(option_label(0), 'A');
        assert_eq!(option_label(3), 'D');
    }
}
