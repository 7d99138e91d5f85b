//! Run statistics and the status file
//!
//! [`RunStats`] tracks counters for the current run. After every written
//! row the coordinator replaces the status file with a fresh JSON snapshot
//! so an external dashboard can follow progress.

use crate::record::{Diagnostic, Record};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

/// Live counters for one enrichment run
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    /// When the run started (RFC 3339)
    pub started_at: DateTime<Utc>,

    /// Rows appended to the output file
    pub written: u64,

    /// Input rows handled this run
    pub processed: u64,

    /// Rows whose deadline passed or whose worker was killed
    pub timeouts: u64,

    /// Rows that hit the per-record fetch ceiling
    pub fetch_budget_exhausted: u64,

    /// Rows that ended in an extraction or worker error
    pub errors: u64,

    pub rate_rows_per_sec: f64,
    pub elapsed_sec: f64,

    /// Website or name of the last written row
    pub last_site: String,

    /// `ok`, `error`, `watchdog_timeout`, `watchdog_killed` or `fetch_budget_exhausted`
    pub last_status: String,

    /// The last written row's notes
    pub last_note: String,

    pub last_updated: DateTime<Utc>,

    /// SHA-256 of the configuration file
    pub config_hash: String,

    #[serde(skip)]
    clock: Instant,
}

impl RunStats {
    /// Starts a new set of counters
    pub fn new(config_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            written: 0,
            processed: 0,
            timeouts: 0,
            fetch_budget_exhausted: 0,
            errors: 0,
            rate_rows_per_sec: 0.0,
            elapsed_sec: 0.0,
            last_site: String::new(),
            last_status: String::new(),
            last_note: String::new(),
            last_updated: now,
            config_hash: config_hash.into(),
            clock: Instant::now(),
        }
    }

    /// Counts one written row and classifies its outcome
    pub fn record_written(&mut self, record: &Record) {
        self.written += 1;
        self.processed += 1;

        let status = match record.diagnostic() {
            Some(d) if d.is_error() => {
                self.errors += 1;
                "error"
            }
            Some(Diagnostic::WatchdogTimeout) => {
                self.timeouts += 1;
                "watchdog_timeout"
            }
            Some(Diagnostic::WatchdogKilled) => {
                self.timeouts += 1;
                "watchdog_killed"
            }
            Some(Diagnostic::FetchBudgetExhausted) => {
                self.fetch_budget_exhausted += 1;
                "fetch_budget_exhausted"
            }
            _ => "ok",
        };

        self.last_site = record.label().to_string();
        self.last_status = status.to_string();
        self.last_note = record.notes.clone();
        self.touch();
    }

    /// Refreshes elapsed time, rate and the update timestamp
    pub fn touch(&mut self) {
        self.elapsed_sec = self.clock.elapsed().as_secs_f64();
        self.rate_rows_per_sec = self.written as f64 / self.elapsed_sec.max(1.0);
        self.last_updated = Utc::now();
    }

    /// Replaces the status file atomically
    ///
    /// The snapshot is written to a sibling `.tmp` file and renamed over
    /// the target, so readers never observe a half-written document.
    pub fn write_status(&self, path: &Path) -> crate::Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);

        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Prints the end-of-run summary to stdout
pub fn print_summary(stats: &RunStats, interrupted: bool) {
    if interrupted {
        println!("=== Enrichment Stopped ===\n");
    } else {
        println!("=== Enrichment Complete ===\n");
    }

    println!("  Rows processed: {}", stats.processed);
    println!("  Rows written: {}", stats.written);
    println!("  Timeouts: {}", stats.timeouts);
    println!("  Fetch budget exhausted: {}", stats.fetch_budget_exhausted);
    println!("  Errors: {}", stats.errors);
    println!(
        "  Elapsed: {:.1} min ({:.2} rows/sec)",
        stats.elapsed_sec / 60.0,
        stats.rate_rows_per_sec
    );
}
