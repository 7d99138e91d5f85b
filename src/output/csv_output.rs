//! CSV output sink
//!
//! Rows are appended to the output file in the fixed schema order. The
//! header is written only when the file is new or empty, and the writer is
//! flushed after every row.

use super::traits::RecordSink;
use crate::record::Record;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Append-only CSV writer for enriched records
pub struct CsvSink {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows_written: u64,
}

impl CsvSink {
    /// Opens the output file for appending, creating it if needed
    ///
    /// # Arguments
    ///
    /// * `path` - Output CSV path
    ///
    /// # Returns
    ///
    /// * `Ok(CsvSink)` - Sink positioned at the end of the file
    /// * `Err(EnrichError)` - The file could not be opened
    pub fn open(path: &Path) -> crate::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let needs_header = file.metadata()?.len() == 0;

        let writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        tracing::debug!(path = %path.display(), needs_header, "output file opened");

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvSink {
    fn write_record(&mut self, record: &Record) -> crate::Result<()> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

/// Counts data rows already present in an output file
///
/// A missing or empty file has zero rows. The header row is not counted.
pub fn count_output_rows(path: &Path) -> crate::Result<u64> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    if file.metadata()?.len() == 0 {
        return Ok(0);
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(file);
    let mut row = csv::ByteRecord::new();
    let mut count = 0;
    while reader.read_byte_record(&mut row)? {
        count += 1;
    }
    Ok(count)
}
