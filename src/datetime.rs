use chrono::{DateTime, NaiveDateTime, Utc};

/// Ordered list of timestamp formats seen in the wild across RSS and Atom
/// feeds. The first parser that matches the whole string wins.
const PARSERS: &[fn(&str) -> Option<DateTime<Utc>>] =
    &[parse_rfc2822, parse_iso8601_offset, parse_iso8601_zulu];

/// Parse a feed timestamp into a UTC instant.
///
/// Absent, empty, or unrecognized input yields `None` rather than an
/// error; entries with unparseable dates are still worth keeping.
pub fn parse_feed_datetime(text: Option<&str>) -> Option<DateTime<Utc>> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }
    PARSERS.iter().find_map(|parse| parse(text))
}

/// RSS `pubDate` in RFC 2822 form, covering both the named-timezone
/// ("GMT", "EST") and numeric-offset variants. Feeds routinely carry a
/// weekday that disagrees with the date itself, so a leading weekday
/// token is dropped before parsing instead of failing the whole stamp.
fn parse_rfc2822(text: &str) -> Option<DateTime<Utc>> {
    let text = match text.split_once(',') {
        Some((day, rest)) if day.len() == 3 && day.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest.trim_start()
        }
        _ => text,
    };
    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// ISO 8601 with a numeric offset, e.g. `2024-01-01T10:00:00+02:00`.
fn parse_iso8601_offset(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// ISO 8601 with a literal `Z` suffix, e.g. `2024-01-01T10:00:00Z`.
fn parse_iso8601_zulu(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%SZ")
        .ok()
        .map(|ndt| ndt.and_utc())
}
