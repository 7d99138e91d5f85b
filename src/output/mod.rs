//! Output module for enriched rows and run reporting
//!
//! This module handles:
//! - Appending finished records to the output CSV
//! - Counting rows already written, for resume
//! - Tracking run statistics and replacing the status file

mod csv_output;
pub mod stats;
mod traits;

pub use csv_output::{count_output_rows, CsvSink};
pub use stats::{print_summary, RunStats};
pub use traits::RecordSink;
