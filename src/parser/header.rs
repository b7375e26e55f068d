//! RFC 5322 header parsing: folding, encoded-words (RFC 2047), and date parsing.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDateTime};

use super::mbox::strip_bom;

/// Base64 engine for encoded words; senders frequently drop the padding.
const ENCODED_WORD_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Formats that carry a numeric offset.
const ZONED_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%b %d %H:%M:%S %Y %z",
];

/// Formats without zone information; parsed as +00:00.
const NAIVE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// The unfolded header fields of one message, in their original order.
#[derive(Debug, Clone, Default)]
pub struct HeaderBlock {
    /// `(lowercase_name, unfolded_value)` pairs.
    fields: Vec<(String, String)>,
}

impl HeaderBlock {
    /// Read the header block of a raw message.
    ///
    /// A leading MBOX `From ` line is skipped. The block ends at the first
    /// blank line, or at the end of the data if there is none.
    pub fn parse(raw_message: &[u8]) -> Self {
        let data = skip_from_line(raw_message);
        let header_bytes = &data[..find_header_end(data).unwrap_or(data.len())];
        let text = header_bytes
            .split(|&b| b == b'\n')
            .map(decode_header_bytes)
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            fields: unfold_headers(&text),
        }
    }

    /// First raw (undecoded) value of a header, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value of a header with RFC 2047 encoded words resolved.
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_encoded_words)
    }
}

/// Skip the `From ` separator line at the start of MBOX messages.
pub(crate) fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = strip_bom(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
        return &[];
    }
    data
}

/// Find the byte offset where headers end (start of the first blank line's terminator).
fn find_header_end(data: &[u8]) -> Option<usize> {
    if data.starts_with(b"\n") || data.starts_with(b"\r\n") {
        return Some(0);
    }
    data.windows(2)
        .position(|w| w == b"\n\n")
        .into_iter()
        .chain(data.windows(4).position(|w| w == b"\r\n\r\n"))
        .min()
}

/// Decode one raw header line to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
/// Each line is decoded on its own.
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Join continuation lines (starting with space or tab) onto the previous header.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = fields.last_mut() {
                let continuation = line.trim();
                if !continuation.is_empty() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(continuation);
                }
            }
        } else if let Some((name, value)) = line.split_once(':') {
            fields.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    fields
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Words that fail to decode are kept verbatim.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two adjacent encoded words is not displayed (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        match decode_word(&remaining[start + 2..]) {
            Some((text, consumed)) => {
                result.push_str(&text);
                remaining = &remaining[start + 2 + consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = &remaining[start + 2..];
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=` (the part after `=?`).
///
/// Returns the decoded text and the number of bytes consumed.
fn decode_word(s: &str) -> Option<(String, usize)> {
    let mut pieces = s.splitn(3, '?');
    let charset = pieces.next()?;
    let encoding = pieces.next()?;
    let rest = pieces.next()?;
    let end = rest.find("?=")?;
    let encoded_text = &rest[..end];
    if charset.is_empty() || encoded_text.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => ENCODED_WORD_BASE64.decode(encoded_text).ok()?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    let consumed = charset.len() + 1 + encoding.len() + 1 + end + 2;
    Some((decode_charset(charset, &bytes), consumed))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => result.push(b' '),
            b'=' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        result.push(byte);
                        i += 2;
                    }
                    None => result.push(b'='),
                }
            }
            b => result.push(b),
        }
        i += 1;
    }
    result
}

/// Decode bytes using a named charset, falling back to lossy UTF-8.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    // RFC 2231 language suffix: "utf-8*en"
    let label = charset.split('*').next().unwrap_or(charset);
    match encoding_rs::Encoding::for_label(label.as_bytes()) {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        None => {
            tracing::debug!(charset = label, "Unknown charset, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822 (including obsolete zone names and two-digit years),
/// RFC 3339, and many broken real-world variants. The offset written in the
/// header is preserved; timestamps without one are taken as +00:00.
pub fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = strip_trailing_comment(date_str.trim());
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt);
    }

    let no_dow = strip_day_of_week(trimmed);
    let imap = normalize_imap_date(no_dow);

    for candidate in [no_dow, imap.as_str()] {
        if let Some(dt) = parse_with_formats(candidate) {
            return Some(dt);
        }
        if let Some(replaced) = replace_named_tz(candidate) {
            if let Some(dt) = parse_with_formats(&replaced) {
                return Some(dt);
            }
        }
    }

    mail_parser_date(trimmed)
}

fn parse_with_formats(candidate: &str) -> Option<DateTime<FixedOffset>> {
    ZONED_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(candidate, fmt).ok())
        .or_else(|| {
            NAIVE_FORMATS.iter().find_map(|fmt| {
                NaiveDateTime::parse_from_str(candidate, fmt)
                    .ok()
                    .map(|ndt| ndt.and_utc().fixed_offset())
            })
        })
}

/// Attempt to parse a date using `mail-parser`'s lenient parser.
fn mail_parser_date(input: &str) -> Option<DateTime<FixedOffset>> {
    // Wrap input in a minimal RFC 5322 message so mail-parser can parse it
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = mail_parser::MessageParser::default().parse(fake_msg.as_bytes())?;
    DateTime::parse_from_rfc3339(&parsed.date()?.to_rfc3339()).ok()
}

/// Drop a trailing `(comment)`, as in `+0000 (UTC)`.
fn strip_trailing_comment(s: &str) -> &str {
    if s.ends_with(')') {
        if let Some(open) = s.rfind('(') {
            return s[..open].trim_end();
        }
    }
    s
}

/// Strip a leading day-of-week prefix (`"Thu, "` or `"Thu "`).
fn strip_day_of_week(s: &str) -> &str {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    let Some(prefix) = s.get(..3) else {
        return s;
    };
    if !DAYS.iter().any(|d| d.eq_ignore_ascii_case(prefix)) {
        return s;
    }
    let rest = &s[3..];
    match rest.chars().next() {
        Some(',') => rest[1..].trim_start(),
        Some(' ') => rest.trim_start(),
        _ => s,
    }
}

/// Normalize IMAP-style dates: `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    let (date, rest) = s.split_once(' ').unwrap_or((s, ""));
    let parts: Vec<&str> = date.split('-').collect();
    let is_imap = parts.len() == 3
        && parts[0].chars().all(|c| c.is_ascii_digit())
        && parts[1].len() == 3
        && parts[1].chars().all(|c| c.is_ascii_alphabetic())
        && parts[2].chars().all(|c| c.is_ascii_digit());
    if !is_imap {
        return s.to_string();
    }
    let month: String = parts[1]
        .chars()
        .enumerate()
        .map(|(i, c)| if i == 0 { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
        .collect();
    let joined = format!("{} {} {}", parts[0], month, parts[2]);
    if rest.is_empty() {
        joined
    } else {
        format!("{joined} {rest}")
    }
}

/// Replace a trailing timezone abbreviation with its numeric offset.
fn replace_named_tz(s: &str) -> Option<String> {
    const ZONES: [(&str, &str); 14] = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    let (head, zone) = s.rsplit_once(' ')?;
    ZONES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(zone))
        .map(|(_, offset)| format!("{head} {offset}"))
}
