//! Inclusive date range used to select messages.

use chrono::{NaiveDate, NaiveDateTime};

/// Optional inclusive bounds on a message's naive (zone-stripped) timestamp.
///
/// Built from calendar days: the lower bound starts at `00:00:00`, the upper
/// bound is pushed to `23:59:59` of its day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// Earliest accepted timestamp.
    pub start: Option<NaiveDateTime>,
    /// Latest accepted timestamp.
    pub end: Option<NaiveDateTime>,
}

impl DateRange {
    /// A range that accepts every timestamp.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Build a range from day-granularity bounds.
    pub fn from_days(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start: start.and_then(|d| d.and_hms_opt(0, 0, 0)),
            end: end.and_then(|d| d.and_hms_opt(23, 59, 59)),
        }
    }

    /// Whether `timestamp` lies within the range. Both bounds are inclusive.
    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        if self.start.is_some_and(|start| *timestamp < start) {
            return false;
        }
        if self.end.is_some_and(|end| *timestamp > end) {
            return false;
        }
        true
    }

    /// Whether no timestamp can satisfy the range.
    pub fn is_empty(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start > end)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |bound: Option<NaiveDateTime>| {
            bound.map_or_else(|| "None".to_string(), |b| b.to_string())
        };
        write!(f, "{} to {}", show(self.start), show(self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_bounds_expand_to_whole_days() {
        let range = DateRange::from_days(Some(day("2024-01-01")), Some(day("2024-01-31")));
        assert_eq!(range.start, Some(at("2024-01-01 00:00:00")));
        assert_eq!(range.end, Some(at("2024-01-31 23:59:59")));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let range = DateRange::from_days(Some(day("2024-01-01")), Some(day("2024-01-31")));
        assert!(range.contains(&at("2024-01-01 00:00:00")));
        assert!(range.contains(&at("2024-01-31 23:59:59")));
        assert!(!range.contains(&at("2023-12-31 23:59:59")));
        assert!(!range.contains(&at("2024-02-01 00:00:00")));
    }

    #[test]
    fn test_open_ended() {
        let from = DateRange::from_days(Some(day("2024-01-01")), None);
        assert!(from.contains(&at("2099-01-01 00:00:00")));
        assert!(!from.contains(&at("2023-12-31 12:00:00")));

        let until = DateRange::from_days(None, Some(day("2024-01-01")));
        assert!(until.contains(&at("1970-01-01 00:00:00")));
        assert!(!until.contains(&at("2024-01-02 00:00:00")));

        assert!(DateRange::unbounded().contains(&at("2000-06-15 08:30:00")));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let range = DateRange::from_days(Some(day("2024-02-01")), Some(day("2024-01-01")));
        assert!(range.is_empty());
        assert!(!DateRange::unbounded().is_empty());
    }

    #[test]
    fn test_display() {
        let range = DateRange::from_days(Some(day("2024-01-01")), None);
        assert_eq!(range.to_string(), "2024-01-01 00:00:00 to None");
    }
}
