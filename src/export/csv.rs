//! Stream message records to a CSV file.
//!
//! Output is UTF-8 with a fixed header row, minimal quoting, and CRLF record
//! terminators. An optional BOM helps Excel detect the encoding.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{MboxError, Result};
use crate::model::record::OutputRecord;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Writes one [`OutputRecord`] at a time; nothing is buffered beyond the
/// underlying writer's buffer.
pub struct CsvExporter<W: Write> {
    writer: csv::Writer<W>,
    path: PathBuf,
}

impl CsvExporter<BufWriter<File>> {
    /// Create (or truncate) `path` and write the header row.
    pub fn create(path: &Path, utf8_bom: bool) -> Result<Self> {
        let file = File::create(path).map_err(|e| MboxError::io(path, e))?;
        Self::from_writer(BufWriter::new(file), path, utf8_bom)
    }
}

impl<W: Write> CsvExporter<W> {
    /// Wrap an arbitrary writer. `path` is only used in error messages.
    pub fn from_writer(mut inner: W, path: impl Into<PathBuf>, utf8_bom: bool) -> Result<Self> {
        let path = path.into();
        if utf8_bom {
            inner
                .write_all(&UTF8_BOM)
                .map_err(|e| MboxError::io(&path, e))?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::CRLF)
            .from_writer(inner);
        writer
            .write_record(OutputRecord::HEADERS)
            .map_err(|e| MboxError::csv(&path, e))?;

        Ok(Self { writer, path })
    }

    /// Append one row.
    pub fn write(&mut self, record: &OutputRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .map_err(|e| MboxError::csv(&self.path, e))
    }

    /// Flush everything and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        let path = self.path;
        self.writer
            .into_inner()
            .map_err(|e| MboxError::io(&path, e.into_error()))
    }
}
