pub mod flight;
pub mod hotel;
pub mod offer;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Deserializer};

pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Relative-date words the model sometimes copies verbatim instead of resolving.
const TOMORROW_PLACEHOLDERS: &[&str] = &["tomorrow", "jutro"];

pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), ISO_DATE_FORMAT).ok()
}

pub fn format_iso_date(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}

pub fn is_tomorrow_placeholder(value: &str) -> bool {
    let normalized = value.trim().to_lowercase();
    TOMORROW_PLACEHOLDERS.contains(&normalized.as_str())
}

/// Returns `value` unchanged when it already is an ISO date, otherwise the day after
/// `today`. Applying it twice gives the same result as applying it once.
pub fn repair_to_tomorrow(value: &str, today: NaiveDate) -> String {
    match parse_iso_date(value) {
        Some(date) => format_iso_date(date),
        None => format_iso_date(today + Duration::days(1)),
    }
}

/// Counts the non-blank entries of a comma-separated age list such as `"8, 15,17"`.
pub fn count_csv_entries(value: Option<&str>) -> u32 {
    value
        .map(|raw| raw.split(',').filter(|age| !age.trim().is_empty()).count() as u32)
        .unwrap_or(0)
}

/// Model output uses `null` and `""` interchangeably for unknown text fields.
pub(crate) fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|inner| !inner.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{count_csv_entries, is_tomorrow_placeholder, parse_iso_date, repair_to_tomorrow};

    fn day(year: i32, month: u32, date: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, date).expect("valid date")
    }

    #[test]
    fn placeholder_matching_ignores_case_and_whitespace() {
        assert!(is_tomorrow_placeholder(" Tomorrow "));
        assert!(is_tomorrow_placeholder("JUTRO"));
        assert!(!is_tomorrow_placeholder("2024-01-11"));
    }

    #[test]
    fn repair_keeps_valid_dates_and_replaces_everything_else() {
        let today = day(2024, 1, 10);
        assert_eq!(repair_to_tomorrow("2024-03-05", today), "2024-03-05");
        assert_eq!(repair_to_tomorrow("", today), "2024-01-11");
        assert_eq!(repair_to_tomorrow("tomorrow", today), "2024-01-11");
        assert_eq!(repair_to_tomorrow("next friday", today), "2024-01-11");
    }

    #[test]
    fn repair_is_idempotent() {
        let today = day(2024, 12, 31);
        let once = repair_to_tomorrow("jutro", today);
        let twice = repair_to_tomorrow(&once, today);
        assert_eq!(once, "2025-01-01");
        assert_eq!(once, twice);
    }

    #[test]
    fn csv_counting_skips_blank_entries() {
        assert_eq!(count_csv_entries(Some("8, 15,17")), 3);
        assert_eq!(count_csv_entries(Some("5,,")), 1);
        assert_eq!(count_csv_entries(None), 0);
        assert!(parse_iso_date("2024-02-30").is_none());
    }
}
