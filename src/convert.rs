//! MBOX → CSV conversion with date-range filtering.
//!
//! Messages are streamed in archive order; each one is either skipped or
//! turned into a single [`OutputRecord`] and written immediately.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{MboxError, Result};
use crate::export::csv::CsvExporter;
use crate::model::range::DateRange;
use crate::model::record::{collapse_whitespace, OutputRecord};
use crate::parser::header::{self, HeaderBlock};
use crate::parser::mbox::{MboxParser, MAX_MESSAGE_SIZE};
use crate::parser::mime::{self, BODY_ERROR_SENTINEL};

/// Knobs for a conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Messages outside this range are skipped.
    pub range: DateRange,
    /// Emit a progress event every this many messages (0 = never).
    pub progress_interval: u64,
    /// Prefix the CSV with a UTF-8 byte order mark.
    pub utf8_bom: bool,
    /// Per-message size cap passed to the MBOX parser.
    pub max_message_size: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            range: DateRange::unbounded(),
            progress_interval: 100,
            utf8_bom: false,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    /// Messages found by the counting pass.
    pub total: u64,
    /// Messages iterated.
    pub processed: u64,
    /// Rows written.
    pub exported: u64,
    /// Messages without a `Date:` header.
    pub missing_date: u64,
    /// Messages whose `Date:` header could not be parsed.
    pub bad_date: u64,
    /// Messages dated outside the range.
    pub out_of_range: u64,
    /// Exported rows whose body fell back to [`BODY_ERROR_SENTINEL`].
    pub body_errors: u64,
}

/// Progress notifications sent to the caller during a run.
#[derive(Debug, Clone, Copy)]
pub enum ConvertEvent<'a> {
    /// The archive was opened and its messages counted.
    Opened { path: &'a Path, total: u64 },
    /// Another `progress_interval` messages were iterated.
    Progress { processed: u64, total: u64 },
}

/// What happened to a single message.
#[derive(Debug)]
pub enum MessageOutcome {
    /// No (or an empty) `Date:` header.
    MissingDate,
    /// The `Date:` header could not be parsed.
    BadDate(MboxError),
    /// Dated outside the requested range.
    OutOfRange,
    /// The row to write. `body_error` is set when the body was replaced by the sentinel.
    Export {
        record: OutputRecord,
        body_error: Option<MboxError>,
    },
}

/// Convert the archive at `mbox_path` into a CSV at `csv_path`.
///
/// Fails before touching `csv_path` when the archive is missing or unreadable.
/// Per-message problems never abort the run; they are logged and counted in
/// the returned [`ConvertSummary`].
pub fn convert_mbox_to_csv(
    mbox_path: &Path,
    csv_path: &Path,
    options: &ConvertOptions,
    on_event: &mut dyn FnMut(ConvertEvent<'_>),
) -> Result<ConvertSummary> {
    let parser = MboxParser::new(mbox_path)?.with_max_message_size(options.max_message_size);
    let total = parser.count_messages()?;
    info!(path = %mbox_path.display(), total, "Opened MBOX");
    on_event(ConvertEvent::Opened {
        path: mbox_path,
        total,
    });

    if options.range.is_empty() {
        warn!(range = %options.range, "Start date is after end date, no message can match");
    }

    let mut exporter = CsvExporter::create(csv_path, options.utf8_bom)?;
    let mut summary = ConvertSummary {
        total,
        ..Default::default()
    };
    let mut write_error: Option<MboxError> = None;

    parser.parse(&mut |offset, raw| {
        summary.processed += 1;
        if options.progress_interval > 0 && summary.processed % options.progress_interval == 0 {
            on_event(ConvertEvent::Progress {
                processed: summary.processed,
                total,
            });
        }

        match convert_message(offset, raw, &options.range) {
            MessageOutcome::MissingDate => {
                debug!(offset, "Skipping message without Date header");
                summary.missing_date += 1;
            }
            MessageOutcome::BadDate(e) => {
                warn!(offset, error = %e, "Skipping message with malformed Date header");
                summary.bad_date += 1;
            }
            MessageOutcome::OutOfRange => summary.out_of_range += 1,
            MessageOutcome::Export { record, body_error } => {
                if let Some(e) = body_error {
                    warn!(offset, error = %e, "Error extracting email body");
                    summary.body_errors += 1;
                }
                if let Err(e) = exporter.write(&record) {
                    write_error = Some(e);
                    return false;
                }
                summary.exported += 1;
            }
        }
        true
    })?;

    if let Some(e) = write_error {
        return Err(e);
    }
    exporter.finish()?;

    info!(
        processed = summary.processed,
        exported = summary.exported,
        missing_date = summary.missing_date,
        bad_date = summary.bad_date,
        out_of_range = summary.out_of_range,
        "Conversion finished"
    );
    Ok(summary)
}

/// Decide the fate of one raw message and, if it is in range, build its row.
///
/// The body is only decoded once the date check has passed.
pub fn convert_message(offset: u64, raw_message: &[u8], range: &DateRange) -> MessageOutcome {
    let headers = HeaderBlock::parse(raw_message);

    let date_raw = match headers.get("date") {
        Some(value) if !value.trim().is_empty() => value,
        _ => return MessageOutcome::MissingDate,
    };
    let Some(date) = header::parse_date(date_raw) else {
        return MessageOutcome::BadDate(MboxError::ParseError {
            offset,
            reason: format!("unparseable Date header {date_raw:?}"),
        });
    };

    // Wall-clock time as written in the header; the offset is dropped, not applied.
    let naive = date.naive_local();
    if !range.contains(&naive) {
        return MessageOutcome::OutOfRange;
    }

    let (body, body_error) = match mime::try_extract_body(raw_message) {
        Ok(body) => (body, None),
        Err(e) => (BODY_ERROR_SENTINEL.to_string(), Some(e)),
    };

    let record = OutputRecord {
        date: OutputRecord::format_date(&naive),
        from: headers.get_decoded("from").unwrap_or_default(),
        to: headers.get_decoded("to").unwrap_or_default(),
        subject: headers.get_decoded("subject").unwrap_or_default(),
        body: collapse_whitespace(&body),
        message_id: headers.get("message-id").unwrap_or_default().to_string(),
    };
    MessageOutcome::Export { record, body_error }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;

    fn january() -> DateRange {
        DateRange::from_days(
            NaiveDate::from_ymd_opt(2024, 1, 1),
            NaiveDate::from_ymd_opt(2024, 1, 31),
        )
    }

    fn message(date_header: &str) -> Vec<u8> {
        format!(
            "From x Mon Jan 01 00:00:00 2024\n{date_header}From: Alice <alice@example.com>\nSubject: Test\n\nHello\n"
        )
        .into_bytes()
    }

    #[test]
    fn test_missing_date() {
        assert!(matches!(
            convert_message(0, &message(""), &january()),
            MessageOutcome::MissingDate
        ));
        assert!(matches!(
            convert_message(0, &message("Date:   \n"), &january()),
            MessageOutcome::MissingDate
        ));
    }

    #[test]
    fn test_bad_date_carries_offset() {
        match convert_message(42, &message("Date: not a date\n"), &january()) {
            MessageOutcome::BadDate(MboxError::ParseError { offset, .. }) => assert_eq!(offset, 42),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        for date in ["Mon, 01 Jan 2024 00:00:00 +0000", "Wed, 31 Jan 2024 23:59:59 +0000"] {
            let raw = message(&format!("Date: {date}\n"));
            assert!(
                matches!(convert_message(0, &raw, &january()), MessageOutcome::Export { .. }),
                "{date} should be exported"
            );
        }
        for date in ["Sun, 31 Dec 2023 23:59:59 +0000", "Thu, 01 Feb 2024 00:00:00 +0000"] {
            let raw = message(&format!("Date: {date}\n"));
            assert!(
                matches!(convert_message(0, &raw, &january()), MessageOutcome::OutOfRange),
                "{date} should be filtered"
            );
        }
    }

    #[test]
    fn test_offset_is_dropped_not_applied() {
        // 23:30 at -0500 is already February in UTC, but the wall clock is in range.
        let raw = message("Date: Wed, 31 Jan 2024 23:30:00 -0500\n");
        match convert_message(0, &raw, &january()) {
            MessageOutcome::Export { record, .. } => assert_eq!(record.date, "2024-01-31 23:30:00"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    /// A message whose `text/plain` part sits `levels` multiparts deep.
    fn nested_message(levels: usize) -> Vec<u8> {
        let mut raw = String::from(
            "From x Mon Jan 01 00:00:00 2024\nDate: Mon, 15 Jan 2024 08:00:00 +0000\nSubject: Deep\nMIME-Version: 1.0\nContent-Type: multipart/mixed; boundary=\"b0\"\n\n",
        );
        for i in 0..levels {
            raw.push_str(&format!(
                "--b{i}\nContent-Type: multipart/mixed; boundary=\"b{}\"\n\n",
                i + 1
            ));
        }
        raw.push_str(&format!(
            "--b{levels}\nContent-Type: text/plain\n\ndeep text\n--b{levels}--\n"
        ));
        for i in (0..levels).rev() {
            raw.push_str(&format!("--b{i}--\n"));
        }
        raw.into_bytes()
    }

    #[test]
    fn test_body_error_still_exports_sentinel() {
        match convert_message(7, &nested_message(40), &DateRange::unbounded()) {
            MessageOutcome::Export { record, body_error } => {
                assert!(matches!(body_error, Some(MboxError::NestingTooDeep(_))));
                assert_eq!(record.body, BODY_ERROR_SENTINEL);
                assert_eq!(record.subject, "Deep");
                assert_eq!(record.date, "2024-01-15 08:00:00");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_shallow_nesting_finds_body() {
        match convert_message(0, &nested_message(3), &DateRange::unbounded()) {
            MessageOutcome::Export { record, body_error } => {
                assert!(body_error.is_none());
                assert_eq!(record.body, "deep text");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_record_fields() {
        let raw = b"From x Mon Jan 01 00:00:00 2024\nDate: Mon, 15 Jan 2024 08:00:00 +0000\nFrom: =?UTF-8?Q?Jos=C3=A9?= <jose@example.com>\nSubject: Multi\n line\nMessage-ID: <m1@example.com>\n\nline one\n\n  line two\n";
        match convert_message(0, raw, &DateRange::unbounded()) {
            MessageOutcome::Export { record, body_error } => {
                assert!(body_error.is_none());
                assert_eq!(record.date, "2024-01-15 08:00:00");
                assert_eq!(record.from, "José <jose@example.com>");
                assert_eq!(record.to, "");
                assert_eq!(record.subject, "Multi line");
                assert_eq!(record.body, "line one line two");
                assert_eq!(record.message_id, "<m1@example.com>");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
