//! Isolation runner with a hard per-record timeout
//!
//! Each record is handed to a dedicated worker OS thread that owns a
//! single-threaded tokio runtime and its own pipeline instance (and with it
//! its own HTTP connection pool). The supervisor waits at most the hard
//! timeout for the result. On expiry it signals cancellation, abandons the
//! worker thread, counts a failure against the record's host, and emits the
//! record as it was before the worker touched it. A fresh worker takes over
//! for the next record.
//!
//! Threads cannot be killed safely, so an abandoned worker stuck in a CPU
//! loop keeps running until it returns. It never receives another job and
//! never blocks the supervisor.

use super::enricher::Enricher;
use crate::config::Config;
use crate::record::{Diagnostic, Finalizer, Record};
use crate::state::HostCircuitBreaker;
use crate::url::host_key;
use crate::EnrichError;
use std::future::Future;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// A per-record processing pipeline run inside a worker thread
///
/// The pipeline is built on the worker thread and never leaves it, so it
/// does not need to be `Send`.
pub trait RecordPipeline: 'static {
    /// Processes one record, returning it finalized
    fn process(&self, record: Record) -> impl Future<Output = Record>;
}

impl RecordPipeline for Enricher {
    fn process(&self, record: Record) -> impl Future<Output = Record> {
        self.enrich(record)
    }
}

/// Builds a pipeline on a fresh worker thread
pub type PipelineFactory<P> = Arc<dyn Fn() -> Result<P, EnrichError> + Send + Sync>;

/// One unit of work sent to a worker thread
struct Job {
    record: Record,
    reply: oneshot::Sender<Record>,
    cancel: oneshot::Receiver<()>,
}

/// Handle to a live worker thread
struct Worker {
    jobs: mpsc::Sender<Job>,
    generation: u64,
}

/// Supervises one worker thread at a time
pub struct IsolationRunner<P: RecordPipeline> {
    id: usize,
    factory: PipelineFactory<P>,
    hard_timeout: Duration,
    breaker: Arc<HostCircuitBreaker>,
    finalizer: Finalizer,
    worker: Option<Worker>,
    generation: u64,
}

impl IsolationRunner<Enricher> {
    /// Creates a runner whose workers each build their own [`Enricher`]
    pub fn for_config(id: usize, config: Arc<Config>, breaker: Arc<HostCircuitBreaker>) -> Self {
        let hard_timeout = config.enrich.hard_timeout();
        let finalizer = Finalizer::new(config.email_policy.clone());
        let worker_breaker = Arc::clone(&breaker);
        let factory: PipelineFactory<Enricher> = Arc::new(move || {
            Enricher::from_config(&config, Arc::clone(&worker_breaker)).map_err(EnrichError::from)
        });
        Self::new(id, factory, hard_timeout, breaker, finalizer)
    }
}

impl<P: RecordPipeline> IsolationRunner<P> {
    /// Creates a runner; the first worker is started lazily
    ///
    /// # Arguments
    ///
    /// * `id` - Runner number, used in thread names and logs
    /// * `factory` - Builds the pipeline on each new worker thread
    /// * `hard_timeout` - Longest wait for one record
    /// * `breaker` - Shared breaker that is told about killed records
    /// * `finalizer` - Applied to records the runner emits itself
    pub fn new(
        id: usize,
        factory: PipelineFactory<P>,
        hard_timeout: Duration,
        breaker: Arc<HostCircuitBreaker>,
        finalizer: Finalizer,
    ) -> Self {
        Self {
            id,
            factory,
            hard_timeout,
            breaker,
            finalizer,
            worker: None,
            generation: 0,
        }
    }

    /// Number of workers started so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Processes one record with a hard timeout
    ///
    /// Always returns exactly one finalized record.
    pub async fn run(&mut self, record: Record) -> Record {
        let pristine = record.clone();

        if let Err(error) = self.ensure_worker().await {
            tracing::warn!(runner = self.id, %error, "failed to start worker");
            return self.fallback(pristine, Diagnostic::EnrichError);
        }
        let Some(jobs) = self.worker.as_ref().map(|worker| worker.jobs.clone()) else {
            return self.fallback(pristine, Diagnostic::EnrichError);
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let job = Job {
            record,
            reply: reply_tx,
            cancel: cancel_rx,
        };

        if jobs.send(job).is_err() {
            tracing::warn!(runner = self.id, "worker exited before accepting a record");
            self.retire_worker();
            return self.fallback(pristine, Diagnostic::EnrichError);
        }

        match tokio::time::timeout(self.hard_timeout, reply_rx).await {
            Ok(Ok(record)) => record,
            Ok(Err(_)) => {
                tracing::warn!(
                    runner = self.id,
                    site = pristine.label(),
                    "worker died while processing record"
                );
                self.replace_worker().await;
                self.fallback(pristine, Diagnostic::EnrichError)
            }
            Err(_) => {
                tracing::warn!(
                    runner = self.id,
                    site = pristine.label(),
                    timeout_secs = self.hard_timeout.as_secs_f64(),
                    "hard timeout, abandoning worker"
                );
                let _ = cancel_tx.send(());
                self.breaker.record_failure(&host_key(&pristine.website));
                self.replace_worker().await;
                self.fallback(pristine, Diagnostic::WatchdogKilled)
            }
        }
    }

    /// Finalizes the runner's own copy of a record with a diagnostic note
    fn fallback(&self, mut record: Record, diagnostic: Diagnostic) -> Record {
        record.push_note(diagnostic);
        self.finalizer.finalize(&mut record);
        record
    }

    async fn ensure_worker(&mut self) -> Result<(), EnrichError> {
        if self.worker.is_none() {
            let worker = self.spawn_worker().await?;
            self.worker = Some(worker);
        }
        Ok(())
    }

    /// Drops the current worker; its thread exits once it notices
    fn retire_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            tracing::debug!(runner = self.id, generation = worker.generation, "worker retired");
        }
    }

    /// Retires the current worker and starts its replacement
    async fn replace_worker(&mut self) {
        self.retire_worker();
        match self.spawn_worker().await {
            Ok(worker) => self.worker = Some(worker),
            // Retried on the next record
            Err(error) => tracing::warn!(runner = self.id, %error, "failed to replace worker"),
        }
    }

    async fn spawn_worker(&mut self) -> Result<Worker, EnrichError> {
        self.generation += 1;
        let generation = self.generation;
        let factory = Arc::clone(&self.factory);
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();

        std::thread::Builder::new()
            .name(format!("enrich-{}-{}", self.id, generation))
            .spawn(move || worker_main(factory, jobs_rx, ready_tx))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                tracing::debug!(runner = self.id, generation, "worker started");
                Ok(Worker {
                    jobs: jobs_tx,
                    generation,
                })
            }
            Ok(Err(message)) => Err(EnrichError::Worker(message)),
            Err(_) => Err(EnrichError::Worker(
                "worker exited during startup".to_string(),
            )),
        }
    }
}

/// Body of a worker thread: build a runtime and pipeline, then serve jobs
fn worker_main<P: RecordPipeline>(
    factory: PipelineFactory<P>,
    jobs: mpsc::Receiver<Job>,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            let _ = ready.send(Err(format!("failed to build runtime: {}", error)));
            return;
        }
    };

    let pipeline = {
        let _guard = runtime.enter();
        match factory() {
            Ok(pipeline) => pipeline,
            Err(error) => {
                let _ = ready.send(Err(error.to_string()));
                return;
            }
        }
    };

    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Ok(Job {
        record,
        reply,
        cancel,
    }) = jobs.recv()
    {
        let finished = runtime.block_on(async {
            tokio::select! {
                record = pipeline.process(record) => Some(record),
                _ = cancel => None,
            }
        });

        match finished {
            Some(record) => {
                if reply.send(record).is_err() {
                    // Supervisor gave up on this worker
                    return;
                }
            }
            None => return,
        }
    }
}
