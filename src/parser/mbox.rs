//! Streaming MBOX parser.
//!
//! Reads MBOX files line by line through a 1 MB buffer.
//! Never loads the entire file into memory. Tolerant of malformed input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{MboxError, Result};

/// Size of the internal read buffer (1 MB for fast sequential reads on modern SSDs).
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Default maximum message size in bytes (256 MB).
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Streaming MBOX parser.
///
/// Reads through the file sequentially, invoking a caller-supplied callback for
/// every message boundary it finds. The parser is tolerant of:
///
/// - Mixed `\n` and `\r\n` line endings
/// - `From ` lines not preceded by a blank line (logs a warning, still splits)
/// - Truncated messages at EOF
/// - NUL bytes and other binary content in the body
/// - UTF-8 BOM at the start of the file
pub struct MboxParser {
    path: PathBuf,
    file_size: u64,
    max_message_size: usize,
}

impl MboxParser {
    /// Create a parser for the given MBOX file.
    ///
    /// Verifies that the file exists and is readable, but does NOT validate
    /// that it is actually an MBOX.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MboxError::FileNotFound(path.clone())
            } else {
                MboxError::io(&path, e)
            }
        })?;
        if metadata.is_dir() {
            return Err(MboxError::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "is a directory"),
            ));
        }
        Ok(Self {
            path,
            file_size: metadata.len(),
            max_message_size: MAX_MESSAGE_SIZE,
        })
    }

    /// Override the per-message size cap. Bytes past the cap are dropped.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Count the messages in the file without retaining any of them.
    pub fn count_messages(&self) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let mut lines = self.open_lines()?;
        let mut count: u64 = 0;
        while lines.next_line()? {
            if lines.is_separator() {
                count += 1;
            }
        }
        debug!(path = %self.path.display(), count, "Counted messages");
        Ok(count)
    }

    /// Parse the full MBOX, calling `message_callback` for each message found.
    ///
    /// The callback receives `(offset, raw_bytes)` and returns `true` to
    /// continue or `false` to abort early. `raw_bytes` still starts with the
    /// `From ` separator line.
    ///
    /// Returns the number of messages delivered.
    pub fn parse(&self, message_callback: &mut dyn FnMut(u64, &[u8]) -> bool) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let mut lines = self.open_lines()?;
        let mut count: u64 = 0;
        let mut message_buf: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut message_start: u64 = 0;
        let mut prev_line_was_empty = true;
        let mut in_message = false;
        let mut truncated = false;

        while lines.next_line()? {
            let line_offset = lines.offset;

            if lines.is_separator() {
                if !prev_line_was_empty {
                    warn!(
                        offset = line_offset,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                if in_message {
                    if !message_callback(message_start, &message_buf) {
                        return Ok(count);
                    }
                    count += 1;
                }
                in_message = true;
                message_start = line_offset;
                message_buf.clear();
                message_buf.extend_from_slice(&lines.line);
                truncated = false;
            } else if !in_message {
                if !is_blank_line(&lines.line) {
                    warn!(offset = line_offset, "Skipping content before first 'From ' separator");
                }
            } else if message_buf.len() + lines.line.len() <= self.max_message_size {
                message_buf.extend_from_slice(&lines.line);
            } else if !truncated {
                warn!(
                    offset = message_start,
                    max_size = self.max_message_size,
                    "Message exceeds maximum size, truncating body"
                );
                truncated = true;
            }

            prev_line_was_empty = is_blank_line(&lines.line);
        }

        // Flush last message
        if in_message && message_callback(message_start, &message_buf) {
            count += 1;
        }

        Ok(count)
    }

    fn open_lines(&self) -> Result<LineReader<'_>> {
        let file = File::open(&self.path).map_err(|e| MboxError::io(&self.path, e))?;
        Ok(LineReader {
            path: &self.path,
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            line: Vec::with_capacity(4096),
            offset: 0,
            line_no: 0,
        })
    }
}

/// Reads one raw line at a time into a reusable buffer, tracking its byte offset.
struct LineReader<'a> {
    path: &'a Path,
    reader: BufReader<File>,
    /// Current line including its terminator.
    line: Vec<u8>,
    /// Byte offset of `line` within the file.
    offset: u64,
    /// 1-based number of `line`.
    line_no: u64,
}

impl LineReader<'_> {
    /// Advance to the next line. Returns `false` at EOF.
    fn next_line(&mut self) -> Result<bool> {
        self.offset += self.line.len() as u64;
        self.line.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.line)
            .map_err(|e| MboxError::io(self.path, e))?;
        if read == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        Ok(true)
    }

    /// Whether the current line starts a new message.
    fn is_separator(&self) -> bool {
        if self.line_no == 1 {
            is_mbox_separator(strip_bom(&self.line))
        } else {
            is_mbox_separator(&self.line)
        }
    }
}

/// Drop a leading UTF-8 byte order mark.
pub(crate) fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    fn write_mbox(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    fn collect(parser: &MboxParser) -> Vec<(u64, Vec<u8>)> {
        let mut messages = Vec::new();
        parser
            .parse(&mut |offset, bytes| {
                messages.push((offset, bytes.to_vec()));
                true
            })
            .unwrap();
        messages
    }

    #[test]
    fn test_is_mbox_separator() {
        assert!(is_mbox_separator(
            b"From user@example.com Thu Jan 01 00:00:00 2024\n"
        ));
        assert!(!is_mbox_separator(b"from user@example.com\n")); // lowercase
        assert!(!is_mbox_separator(b">From user@example.com\n")); // escaped
        assert!(!is_mbox_separator(b"Subject: From here\n"));
    }

    #[test]
    fn test_is_blank_line() {
        assert!(is_blank_line(b"\n"));
        assert!(is_blank_line(b"\r\n"));
        assert!(is_blank_line(b"  \n"));
        assert!(!is_blank_line(b"hello\n"));
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom(b"\xEF\xBB\xBFFrom x"), b"From x");
        assert_eq!(strip_bom(b"From x"), b"From x");
    }

    #[test]
    fn test_missing_file() {
        let err = MboxParser::new("/definitely/not/here.mbox").err().unwrap();
        assert!(matches!(err, MboxError::FileNotFound(_)));
    }

    #[test]
    fn test_split_offsets_and_crlf() {
        let data = b"From a Mon Jan 01 00:00:00 2024\r\nSubject: one\r\n\r\nbody\r\n\r\nFrom b Mon Jan 01 00:00:00 2024\r\nSubject: two\r\n\r\nbody\r\n";
        let file = write_mbox(data);
        let parser = MboxParser::new(file.path()).unwrap();
        let messages = collect(&parser);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, 0);
        assert!(messages[1].1.starts_with(b"From b"));
        assert_eq!(
            &data[messages[1].0 as usize..messages[1].0 as usize + 6],
            b"From b"
        );
        assert_eq!(parser.count_messages().unwrap(), 2);
    }

    #[test]
    fn test_separator_without_blank_line_still_splits() {
        let file = write_mbox(
            b"From a Mon Jan 01 00:00:00 2024\nSubject: one\n\nbody\nFrom b Mon Jan 01 00:00:00 2024\nSubject: two\n\nbody\n",
        );
        let parser = MboxParser::new(file.path()).unwrap();
        assert_eq!(collect(&parser).len(), 2);
        assert_eq!(parser.count_messages().unwrap(), 2);
    }

    #[test]
    fn test_escaped_from_in_body() {
        let file = write_mbox(
            b"From a Mon Jan 01 00:00:00 2024\nSubject: one\n\n>From the top\nbody\n",
        );
        let parser = MboxParser::new(file.path()).unwrap();
        let messages = collect(&parser);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.ends_with(b">From the top\nbody\n"));
    }

    #[test]
    fn test_bom_at_start() {
        let file = write_mbox(b"\xEF\xBB\xBFFrom a Mon Jan 01 00:00:00 2024\nSubject: one\n\nbody\n");
        let parser = MboxParser::new(file.path()).unwrap();
        assert_eq!(collect(&parser).len(), 1);
        assert_eq!(parser.count_messages().unwrap(), 1);
    }

    #[test]
    fn test_preamble_before_first_separator_is_ignored() {
        let file = write_mbox(b"garbage line\n\nFrom a Mon Jan 01 00:00:00 2024\nSubject: one\n\nbody\n");
        let parser = MboxParser::new(file.path()).unwrap();
        let messages = collect(&parser);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.starts_with(b"From a"));
        assert_eq!(parser.count_messages().unwrap(), 1);
    }

    #[test]
    fn test_truncates_oversized_message() {
        let mut data = b"From a Mon Jan 01 00:00:00 2024\nSubject: big\n\n".to_vec();
        for _ in 0..100 {
            data.extend_from_slice(b"0123456789\n");
        }
        let file = write_mbox(&data);
        let parser = MboxParser::new(file.path())
            .unwrap()
            .with_max_message_size(128);
        let messages = collect(&parser);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.len() <= 128);
    }

    #[test]
    fn test_callback_can_stop_early() {
        let file = write_mbox(
            b"From a Mon Jan 01 00:00:00 2024\n\nx\n\nFrom b Mon Jan 01 00:00:00 2024\n\ny\n",
        );
        let parser = MboxParser::new(file.path()).unwrap();
        let mut seen = 0;
        let delivered = parser
            .parse(&mut |_, _| {
                seen += 1;
                false
            })
            .unwrap();
        assert_eq!(seen, 1);
        assert_eq!(delivered, 0);
    }
}
