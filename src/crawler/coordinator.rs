//! Run coordinator - main enrichment orchestration logic
//!
//! This module drives a whole run:
//! - Working out the resume point from the output file
//! - Feeding input rows to a pool of worker lanes
//! - Writing finished records in input order, one row per input row
//! - Replacing the status file after every row
//! - Stopping intake promptly on SIGINT or SIGTERM

use super::enricher::Enricher;
use super::runner::IsolationRunner;
use crate::config::Config;
use crate::output::{count_output_rows, CsvSink, RecordSink, RunStats};
use crate::record::{Diagnostic, Finalizer, InputReader, Record};
use crate::state::HostCircuitBreaker;
use crate::url::host_key;
use crate::EnrichError;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Rows between progress log lines
const PROGRESS_EVERY: u64 = 25;

type SharedJobs = Arc<Mutex<mpsc::Receiver<(u64, Record)>>>;

/// Run-level switches taken from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Stop after this many input rows
    pub limit: Option<usize>,

    /// Skip exactly this many input rows; overrides `resume`
    pub resume_from: Option<usize>,

    /// Skip as many input rows as the output file already holds
    pub resume: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limit: None,
            resume_from: None,
            resume: true,
        }
    }
}

/// What a finished run reports
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stats: RunStats,

    /// Input rows skipped by resume
    pub skipped: usize,

    /// True if a shutdown signal stopped the run early
    pub interrupted: bool,
}

/// Main run coordinator
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    options: RunOptions,
    breaker: Arc<HostCircuitBreaker>,
}

impl Coordinator {
    /// Creates a coordinator for one run
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the configuration file, reported in the status file
    /// * `options` - Resume and limit switches
    pub fn new(config: Config, config_hash: impl Into<String>, options: RunOptions) -> Self {
        let breaker = Arc::new(HostCircuitBreaker::from_config(&config.breaker));
        Self {
            config: Arc::new(config),
            config_hash: config_hash.into(),
            options,
            breaker,
        }
    }

    /// The breaker shared by every lane in this run
    pub fn breaker(&self) -> &Arc<HostCircuitBreaker> {
        &self.breaker
    }

    /// Number of input rows the run will skip
    pub fn resume_point(&self) -> crate::Result<usize> {
        if let Some(index) = self.options.resume_from {
            return Ok(index);
        }
        if !self.options.resume {
            return Ok(0);
        }
        let written = count_output_rows(Path::new(&self.config.io.output_path))?;
        Ok(usize::try_from(written).unwrap_or(usize::MAX))
    }

    /// Runs until the input is exhausted or `shutdown` is cancelled
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - Run finished or was stopped cleanly
    /// * `Err(EnrichError)` - Input or output files could not be used
    pub async fn run(&self, shutdown: CancellationToken) -> crate::Result<RunSummary> {
        let io = &self.config.io;
        let skipped = self.resume_point()?;
        tracing::info!(
            "Resume: skipping first {} input rows; appending to {}",
            skipped,
            io.output_path
        );

        let reader = InputReader::open(Path::new(&io.input_path))?;
        let mut sink = CsvSink::open(Path::new(&io.output_path))?;
        let status_path = Path::new(&io.status_path);

        let mut stats = RunStats::new(self.config_hash.clone());
        write_status(&stats, status_path);

        let workers = self.config.enrich.workers.max(1) as usize;
        let (jobs_tx, jobs_rx) = mpsc::channel::<(u64, Record)>(workers * 2);
        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<(u64, Record)>();
        let jobs: SharedJobs = Arc::new(Mutex::new(jobs_rx));

        let finalizer = Finalizer::new(self.config.email_policy.clone());
        let mut lanes = JoinSet::new();
        for id in 0..workers {
            let lane = build_lane(id, &self.config, &self.breaker)?;
            let config = Arc::clone(&self.config);
            let breaker = Arc::clone(&self.breaker);
            lanes.spawn(lane_loop(
                id,
                lane,
                move || build_lane(id, &config, &breaker),
                finalizer.clone(),
                Arc::clone(&jobs),
                results_tx.clone(),
            ));
        }
        drop(results_tx);
        drop(jobs);

        let limit = self.options.limit;
        let feeder_stop = shutdown.clone();
        let feeder = tokio::task::spawn_blocking(move || {
            feed_records(reader, skipped, limit, jobs_tx, feeder_stop)
        });

        tracing::info!(
            "Enriching with {} worker(s), isolation {}",
            workers,
            if self.config.enrich.isolation { "on" } else { "off" }
        );

        let mut pending: BTreeMap<u64, Record> = BTreeMap::new();
        let mut next_index = 0u64;
        let mut interrupted = false;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, stopping intake");
                    interrupted = true;
                    break;
                }
                result = results_rx.recv() => {
                    let Some((index, record)) = result else {
                        break;
                    };
                    pending.insert(index, record);

                    while let Some(record) = pending.remove(&next_index) {
                        self.write_row(&mut sink, &mut stats, &record)?;
                        next_index += 1;
                    }
                }
            }
        }

        if interrupted {
            lanes.abort_all();
            while lanes.join_next().await.is_some() {}
            if !pending.is_empty() {
                tracing::info!(
                    "Abandoned {} finished record(s) behind unfinished ones",
                    pending.len()
                );
            }
        } else {
            if !pending.is_empty() {
                tracing::warn!(
                    "{} record(s) finished out of order after a lane failure",
                    pending.len()
                );
                for record in std::mem::take(&mut pending).into_values() {
                    self.write_row(&mut sink, &mut stats, &record)?;
                }
            }

            match feeder.await {
                Ok(result) => {
                    result?;
                }
                Err(error) => return Err(EnrichError::Worker(error.to_string())),
            }
        }

        stats.touch();
        write_status(&stats, status_path);

        tracing::info!(
            "Run {}: {} rows written in {:.1}s",
            if interrupted { "stopped" } else { "completed" },
            stats.written,
            stats.elapsed_sec
        );

        Ok(RunSummary {
            stats,
            skipped,
            interrupted,
        })
    }

    fn write_row(
        &self,
        sink: &mut CsvSink,
        stats: &mut RunStats,
        record: &Record,
    ) -> crate::Result<()> {
        sink.write_record(record)?;
        stats.record_written(record);
        write_status(stats, Path::new(&self.config.io.status_path));

        if stats.written % PROGRESS_EVERY == 0 {
            tracing::info!(
                "Progress: {} rows written, {:.2} rows/sec, elapsed {:.1} min",
                stats.written,
                stats.rate_rows_per_sec,
                stats.elapsed_sec / 60.0
            );
        }
        Ok(())
    }
}

/// Runs a complete enrichment, stopping early on SIGINT or SIGTERM
///
/// # Example
///
/// ```no_run
/// use lead_ripple::config::load_config_with_hash;
/// use lead_ripple::crawler::{run_enrichment, RunOptions};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("enrich.toml"))?;
/// let summary = run_enrichment(config, hash, RunOptions::default()).await?;
/// println!("wrote {} rows", summary.stats.written);
/// # Ok(())
/// # }
/// ```
pub async fn run_enrichment(
    config: Config,
    config_hash: String,
    options: RunOptions,
) -> crate::Result<RunSummary> {
    let shutdown = CancellationToken::new();
    let listener = tokio::spawn(cancel_on_signal(shutdown.clone()));

    let coordinator = Coordinator::new(config, config_hash, options);
    let summary = coordinator.run(shutdown).await;

    listener.abort();
    summary
}

/// Cancels the token on the first SIGINT or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", error);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", error);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl-C received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
    token.cancel();
}

/// Reads input rows and queues them as records, numbered from zero
fn feed_records(
    reader: InputReader,
    skip: usize,
    limit: Option<usize>,
    jobs: mpsc::Sender<(u64, Record)>,
    shutdown: CancellationToken,
) -> crate::Result<u64> {
    let mut fed = 0u64;
    for row in reader.skip(skip).take(limit.unwrap_or(usize::MAX)) {
        if shutdown.is_cancelled() {
            break;
        }
        let record = Record::from_input_row(&row?);
        if jobs.blocking_send((fed, record)).is_err() {
            break;
        }
        fed += 1;
    }
    tracing::debug!(rows = fed, "input exhausted");
    Ok(fed)
}

/// Status file updates are best effort
fn write_status(stats: &RunStats, path: &Path) {
    if let Err(error) = stats.write_status(path) {
        tracing::warn!("Failed to write status file {}: {}", path.display(), error);
    }
}

/// Anything that turns one input record into one output record
trait RecordLane: Send + 'static {
    fn process(&mut self, record: Record) -> impl Future<Output = Record> + Send;
}

/// One concurrent processing slot
enum Lane {
    Isolated(IsolationRunner<Enricher>),
    Inline(InlineLane),
}

impl RecordLane for Lane {
    async fn process(&mut self, record: Record) -> Record {
        match self {
            Lane::Isolated(runner) => runner.run(record).await,
            Lane::Inline(lane) => lane.process(record).await,
        }
    }
}

fn build_lane(
    id: usize,
    config: &Arc<Config>,
    breaker: &Arc<HostCircuitBreaker>,
) -> crate::Result<Lane> {
    if config.enrich.isolation {
        return Ok(Lane::Isolated(IsolationRunner::for_config(
            id,
            Arc::clone(config),
            Arc::clone(breaker),
        )));
    }

    let enricher = Enricher::from_config(config, Arc::clone(breaker))?;
    Ok(Lane::Inline(InlineLane {
        enricher,
        finalizer: Finalizer::new(config.email_policy.clone()),
        hard_timeout: config.enrich.hard_timeout(),
        breaker: Arc::clone(breaker),
    }))
}

/// Runs records on the coordinator's runtime without a dedicated thread
///
/// Each record still gets its own task, so a panic or a stall past the
/// hard timeout costs only that record.
struct InlineLane {
    enricher: Enricher,
    finalizer: Finalizer,
    hard_timeout: Duration,
    breaker: Arc<HostCircuitBreaker>,
}

impl InlineLane {
    async fn process(&self, record: Record) -> Record {
        let pristine = record.clone();
        let enricher = self.enricher.clone();
        let task = tokio::spawn(async move { enricher.enrich(record).await });
        let abort = task.abort_handle();

        match tokio::time::timeout(self.hard_timeout, task).await {
            Ok(Ok(record)) => record,
            Ok(Err(error)) => {
                tracing::warn!(site = pristine.label(), %error, "record task failed");
                self.fallback(pristine, Diagnostic::EnrichError)
            }
            Err(_) => {
                abort.abort();
                tracing::warn!(site = pristine.label(), "hard timeout, record abandoned");
                self.breaker.record_failure(&host_key(&pristine.website));
                self.fallback(pristine, Diagnostic::WatchdogKilled)
            }
        }
    }

    fn fallback(&self, record: Record, diagnostic: Diagnostic) -> Record {
        fallback_row(&self.finalizer, record, diagnostic)
    }
}

/// The row written when a record could not be processed normally
fn fallback_row(finalizer: &Finalizer, mut record: Record, diagnostic: Diagnostic) -> Record {
    record.push_note(diagnostic);
    finalizer.finalize(&mut record);
    record
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Pulls records until the queue closes, sending back exactly one row each
///
/// Each record runs in its own task. If that task panics, the lane is lost
/// with it: the record becomes an `enrich_error` row from its input copy
/// and a fresh lane is built before the next record.
async fn lane_loop<L, B>(
    id: usize,
    lane: L,
    rebuild: B,
    finalizer: Finalizer,
    jobs: SharedJobs,
    results: mpsc::UnboundedSender<(u64, Record)>,
) where
    L: RecordLane,
    B: Fn() -> crate::Result<L> + Send + 'static,
{
    let mut lane = Some(lane);
    loop {
        let next = jobs.lock().await.recv().await;
        let Some((index, record)) = next else {
            break;
        };
        let pristine = record.clone();

        let current = match lane.take() {
            Some(current) => Some(current),
            None => match rebuild() {
                Ok(fresh) => Some(fresh),
                Err(error) => {
                    tracing::error!(lane = id, %error, "failed to rebuild lane");
                    None
                }
            },
        };

        let row = match current {
            Some(mut current) => {
                let task = tokio::spawn(async move {
                    let record = current.process(record).await;
                    (current, record)
                });
                let _guard = AbortOnDrop(task.abort_handle());
                match task.await {
                    Ok((current, record)) => {
                        lane = Some(current);
                        record
                    }
                    Err(error) => {
                        tracing::error!(
                            lane = id,
                            site = pristine.label(),
                            %error,
                            "lane failed, replacing it"
                        );
                        fallback_row(&finalizer, pristine, Diagnostic::EnrichError)
                    }
                }
            }
            None => fallback_row(&finalizer, pristine, Diagnostic::EnrichError),
        };

        if results.send((index, row)).is_err() {
            break;
        }
    }
}
