//! Output sink trait
//!
//! The coordinator hands every finished record to a [`RecordSink`]. Sinks
//! must make each row durable before returning so an interrupted run never
//! leaves a partial row behind.

use crate::record::Record;

/// Destination for finished records
pub trait RecordSink {
    /// Writes one record as a complete row
    fn write_record(&mut self, record: &Record) -> crate::Result<()>;

    /// Rows written through this sink since it was opened
    fn rows_written(&self) -> u64;
}
