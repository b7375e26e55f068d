//! The exported CSV row.

use chrono::NaiveDateTime;
use serde::Serialize;

/// Format of the `Date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One CSV row per exported message.
///
/// Field order is the column order. Headers missing from the message are
/// empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    /// Wall-clock time from the `Date:` header, formatted with [`DATE_FORMAT`].
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Subject")]
    pub subject: String,
    /// Plain-text body collapsed to a single line.
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "Message-ID")]
    pub message_id: String,
}

impl OutputRecord {
    /// Column names, in order.
    pub const HEADERS: [&'static str; 6] = ["Date", "From", "To", "Subject", "Body", "Message-ID"];

    /// Format a naive timestamp for the `Date` column.
    pub fn format_date(date: &NaiveDateTime) -> String {
        date.format(DATE_FORMAT).to_string()
    }
}

/// Collapse every run of whitespace (newlines included) to one space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("Hi\n\nthere"), "Hi there");
        assert_eq!(collapse_whitespace("  a \t b\r\n c  "), "a b c");
        assert_eq!(collapse_whitespace("\n\n"), "");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_format_date() {
        let date = NaiveDateTime::parse_from_str("2024-01-04 09:05:03", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(OutputRecord::format_date(&date), "2024-01-04 09:05:03");
    }
}
