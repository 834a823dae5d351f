use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

/// Case-insensitive substring test. `needle` must already be lowercase.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(needle)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    value.as_deref().unwrap_or(default).to_string()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

/// Relative age of a timestamp: "just now", "5m ago", "2h ago", "3d ago".
pub fn format_age(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - since).num_minutes();
    match minutes {
        // Negative means clock skew
        i64::MIN..=0 => "just now".to_string(),
        1..=59 => format!("{}m ago", minutes),
        // 1h 30m rounds up to 2h
        60..=1439 => format!("{}h ago", (minutes + 30) / 60),
        // 1d 12h rounds up to 2d
        _ => format!("{}d ago", (minutes + 720) / 1440),
    }
}

/// Money with two decimals and a rupee sign, e.g. `₹160.00`.
pub fn format_amount(amount: Decimal) -> String {
    format!("₹{:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Cow Milk", "cow"));
        assert!(contains_ignore_case("Cow Milk", ""));
        assert!(!contains_ignore_case("Buffalo Milk", "cow"));
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("₹₹₹₹₹₹", 5), "₹₹...");
    }

    #[test]
    fn test_format_age_rounds() {
        let now = Utc::now();
        let ago = |minutes| format_age(now - chrono::Duration::minutes(minutes), now);
        assert_eq!(ago(0), "just now");
        assert_eq!(ago(-5), "just now");
        assert_eq!(ago(5), "5m ago");
        assert_eq!(ago(89), "1h ago");
        assert_eq!(ago(95), "2h ago");
        assert_eq!(ago(30 * 60), "1d ago");
        assert_eq!(ago(36 * 60), "2d ago");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::from(160)), "₹160.00");
        assert_eq!(format_amount(Decimal::new(12346, 3)), "₹12.35");
    }

    #[test]
    fn test_format_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(format_date(date), "Mar 05, 2024");
    }
}
