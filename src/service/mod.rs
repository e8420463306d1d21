//! # Log Service Module
//!
//! Core batched log-persistence pipeline. Every ingested event is emitted
//! immediately through the tracing sink, then buffered; the buffer is
//! flushed to the store either when it reaches the configured batch size or
//! when the background flush scheduler ticks. Persistence runs through a
//! bounded-retry coordinator with exponential backoff and jitter, and
//! batches that exhaust their retries land in a bounded re-delivery queue.
//!
//! ## Features
//!
//! - **Batched Ingest**: one store transaction per batch instead of per event
//! - **Bounded Retries**: exponential backoff with jitter, transient-only
//! - **Failed-Batch Queue**: bounded FIFO, drop-oldest, re-delivered in the
//!   background
//! - **Cancellable Scheduler**: broadcast-signalled flush loop with a final
//!   forced flush at shutdown
//!
//! The state lock is held across the persistence write. Callers that cross
//! the batch threshold pay the flush latency, retries included; concurrent
//! `log` calls queue behind an in-flight flush. This favors simplicity over
//! tail-latency isolation.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};

use crate::store::{LogEvent, LogLevel, LogStore, SourceContext, StoreError};

/// Maximum number of failed batches retained for re-delivery. When the
/// queue is full the oldest batch is dropped.
const FAILED_BATCH_CAPACITY: usize = 100;
/// Failed batches attempted per scheduler wake-up.
const REDELIVERY_BATCHES_PER_CYCLE: usize = 5;
/// Upper bound for the random backoff jitter, in milliseconds.
const JITTER_MAX_MILLIS: u64 = 100;

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Tuning for the pipeline. Fixed for the lifetime of a service instance.
#[derive(Debug, Clone)]
pub struct LogServiceConfig {
    /// Buffer size that triggers an inline flush from the ingest path.
    pub batch_size: usize,
    /// How often the background scheduler wakes up.
    pub flush_interval: Duration,
    /// Persistence attempts per batch before it is queued for re-delivery.
    pub max_retries: u32,
    /// Backoff base; attempt `n` waits `base * 2^n` plus jitter.
    pub retry_base_delay: Duration,
    /// Ceiling for any single backoff delay.
    pub retry_max_delay: Duration,
}

impl Default for LogServiceConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            flush_interval: Duration::from_secs(2),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(5),
        }
    }
}

struct ServiceState {
    batch: Vec<LogEvent>,
    last_flush: DateTime<Utc>,
    failed_batches: VecDeque<Vec<LogEvent>>,
}

struct ServiceInner<S> {
    config: LogServiceConfig,
    store: S,
    state: Mutex<ServiceState>,
    shutdown_tx: broadcast::Sender<()>,
    flush_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Batched, retrying log-persistence service.
///
/// Cheap to clone; clones share the same buffer, queue and scheduler.
/// Construct once per process, `initialize` at startup, `shutdown` at
/// teardown.
pub struct LogService<S: LogStore> {
    inner: Arc<ServiceInner<S>>,
}

impl<S: LogStore> Clone for LogService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

impl<S: LogStore + 'static> LogService<S> {
    pub fn new(store: S, config: LogServiceConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(ServiceInner {
                config,
                store,
                state: Mutex::new(ServiceState {
                    batch: Vec::new(),
                    last_flush: Utc::now(),
                    failed_batches: VecDeque::new(),
                }),
                shutdown_tx,
                flush_task: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Start the background flush scheduler. Calling this more than once is
    /// ignored with a warning.
    pub fn initialize(&self) {
        let mut task = self.inner.flush_task.lock().unwrap();
        if task.is_some() {
            warn!(
                target: "logvault::service",
                "log service already initialized, ignoring"
            );
            return;
        }
        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        let service = self.clone();
        *task = Some(tokio::spawn(async move {
            service.run_scheduler(shutdown_rx).await;
        }));
        info!(
            target: "logvault::service",
            "log service initialized with batch_size={}, flush_interval={:?}",
            self.inner.config.batch_size,
            self.inner.config.flush_interval
        );
    }

    /// Stop the scheduler and flush whatever remains in the buffer.
    ///
    /// The cancellation is awaited to completion before the final flush, so
    /// no flush runs concurrently with the scheduler once shutdown begins.
    /// Batches already in the failed queue are NOT re-delivered here; if any
    /// remain they are lost with the process.
    pub async fn shutdown(&self) {
        let task = self.inner.flush_task.lock().unwrap().take();
        if let Some(task) = task {
            if self.inner.shutdown_tx.send(()).is_err() {
                warn!(
                    target: "logvault::service",
                    "flush scheduler was already gone at shutdown"
                );
            }
            if let Err(e) = task.await {
                warn!(
                    target: "logvault::service",
                    "flush scheduler task ended abnormally: {}", e
                );
            }
        }

        self.force_flush().await;

        let state = self.inner.state.lock().await;
        debug!(
            target: "logvault::service",
            "final flush completed at {}", state.last_flush
        );
        if !state.failed_batches.is_empty() {
            warn!(
                target: "logvault::service",
                "{} failed batches remain undelivered and will be lost",
                state.failed_batches.len()
            );
        }
        info!(target: "logvault::service", "log service shutdown complete");
    }

    /// Log a message: immediate console emission, then buffer for durable
    /// persistence. If this call fills the batch, it also pays for the flush.
    #[track_caller]
    pub fn log<'a>(
        &'a self,
        message: impl Into<String> + 'a,
        level: LogLevel,
    ) -> impl Future<Output = ()> + 'a {
        self.log_with_context(message, level, SourceContext::capture())
    }

    #[track_caller]
    pub fn log_debug<'a>(&'a self, message: impl Into<String> + 'a) -> impl Future<Output = ()> + 'a {
        self.log(message, LogLevel::Debug)
    }

    #[track_caller]
    pub fn log_info<'a>(&'a self, message: impl Into<String> + 'a) -> impl Future<Output = ()> + 'a {
        self.log(message, LogLevel::Info)
    }

    #[track_caller]
    pub fn log_warning<'a>(&'a self, message: impl Into<String> + 'a) -> impl Future<Output = ()> + 'a {
        self.log(message, LogLevel::Warning)
    }

    #[track_caller]
    pub fn log_error<'a>(&'a self, message: impl Into<String> + 'a) -> impl Future<Output = ()> + 'a {
        self.log(message, LogLevel::Error)
    }

    #[track_caller]
    pub fn log_critical<'a>(&'a self, message: impl Into<String> + 'a) -> impl Future<Output = ()> + 'a {
        self.log(message, LogLevel::Critical)
    }

    /// `log` with a caller-supplied context, for call sites that want
    /// function-name attribution or carry context from elsewhere.
    pub async fn log_with_context(
        &self,
        message: impl Into<String>,
        level: LogLevel,
        context: SourceContext,
    ) {
        let message = message.into();
        let context = context.to_string();
        emit_console(level, &message, &context);

        let mut state = self.inner.state.lock().await;
        state.batch.push(LogEvent {
            message,
            level,
            context,
            timestamp: Utc::now(),
        });
        if state.batch.len() >= self.inner.config.batch_size {
            self.flush_locked(&mut state).await;
        }
    }

    ///////////////////////////////////////////////////////////////////////////
    //****                      Private Functions                        ****//
    ///////////////////////////////////////////////////////////////////////////

    async fn force_flush(&self) {
        let mut state = self.inner.state.lock().await;
        self.flush_locked(&mut state).await;
    }

    /// Flush the current batch. Must be called with the state lock held;
    /// the whole batch is moved out atomically so no event is flushed twice
    /// or dropped between enqueue and flush.
    async fn flush_locked(&self, state: &mut ServiceState) {
        if state.batch.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut state.batch);
        state.last_flush = Utc::now();
        debug!(
            target: "logvault::service",
            "flushing batch of {} events", batch.len()
        );

        if !self.persist_with_retry(&batch).await {
            error!(
                target: "logvault::service",
                "failed to persist batch of {} events after {} attempts, queued for re-delivery",
                batch.len(),
                self.inner.config.max_retries
            );
            push_failed(state, batch);
        }
    }

    /// Attempt persistence up to `max_retries` times. Transient failures
    /// back off and retry; terminal failures abort immediately. Nothing
    /// propagates past this boundary, callers only see the boolean.
    async fn persist_with_retry(&self, batch: &[LogEvent]) -> bool {
        let max_retries = self.inner.config.max_retries;
        for attempt in 0..max_retries {
            match self.inner.store.persist(batch).await {
                Ok(()) => return true,
                Err(StoreError::Transient(reason)) => {
                    if attempt + 1 < max_retries {
                        let delay = self.backoff_delay(attempt);
                        warn!(
                            target: "logvault::service",
                            "storage error on attempt {}/{}: {}. retrying in {:?}",
                            attempt + 1,
                            max_retries,
                            reason,
                            delay
                        );
                        sleep(delay).await;
                    } else {
                        error!(
                            target: "logvault::service",
                            "final persistence attempt failed: {}", reason
                        );
                    }
                }
                Err(StoreError::Terminal(reason)) => {
                    error!(
                        target: "logvault::service",
                        "unexpected error persisting batch: {}", reason
                    );
                    return false;
                }
            }
        }
        false
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.inner.config.retry_base_delay;
        let jitter = Duration::from_millis(rand::rng().random_range(0..JITTER_MAX_MILLIS));
        let backoff = base.saturating_mul(2u32.saturating_pow(attempt)).saturating_add(jitter);
        backoff.min(self.inner.config.retry_max_delay)
    }

    /// Background loop: flush on an interval and re-deliver failed batches,
    /// until the shutdown signal arrives. Persistence failures are absorbed
    /// inside the cycle, so one bad cycle never stops the next.
    async fn run_scheduler(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(target: "logvault::service", "flush scheduler started");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(target: "logvault::service", "flush scheduler shutting down");
                    break;
                }
                _ = sleep(self.inner.config.flush_interval) => {}
            }

            let mut state = self.inner.state.lock().await;
            if !state.batch.is_empty() {
                self.flush_locked(&mut state).await;
            }
            if !state.failed_batches.is_empty() {
                self.redeliver_failed_batches(&mut state).await;
            }
        }
    }

    /// Take up to [`REDELIVERY_BATCHES_PER_CYCLE`] batches from the front of
    /// the failed queue and retry them. Still-failing batches go back to the
    /// tail, so a persistently failing batch cycles behind newer failures.
    async fn redeliver_failed_batches(&self, state: &mut ServiceState) {
        let to_retry = state.failed_batches.len().min(REDELIVERY_BATCHES_PER_CYCLE);
        let mut redelivered = 0usize;
        for _ in 0..to_retry {
            let Some(batch) = state.failed_batches.pop_front() else {
                break;
            };
            if self.persist_with_retry(&batch).await {
                redelivered += 1;
            } else {
                push_failed(state, batch);
            }
        }
        if redelivered > 0 {
            info!(
                target: "logvault::service",
                "re-delivered {} previously failed batches", redelivered
            );
        }
    }
}

fn push_failed(state: &mut ServiceState, batch: Vec<LogEvent>) {
    if state.failed_batches.len() >= FAILED_BATCH_CAPACITY {
        state.failed_batches.pop_front();
        warn!(
            target: "logvault::service",
            "failed-batch queue full, dropping oldest batch"
        );
    }
    state.failed_batches.push_back(batch);
}

fn emit_console(level: LogLevel, message: &str, context: &str) {
    match level {
        LogLevel::Debug => {
            debug!(target: "logvault::app", context = %context, "{}", message)
        }
        LogLevel::Info => {
            info!(target: "logvault::app", context = %context, "{}", message)
        }
        LogLevel::Warning => {
            warn!(target: "logvault::app", context = %context, "{}", message)
        }
        LogLevel::Error => {
            error!(target: "logvault::app", context = %context, "{}", message)
        }
        LogLevel::Critical => {
            error!(target: "logvault::app", context = %context, severity = "critical", "{}", message)
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
