//! Single-consumer background work queue.
//!
//! [`WorkQueue`] owns an in-memory FIFO of [`Job`]s and exactly one worker
//! task that drains it. At most one job per tenant is queued or processing at
//! any instant; a second [`WorkQueue::add_job`] for the same tenant joins the
//! existing job instead of creating another. Failed attempts go back to the
//! tail of the queue until `max_attempts` is exhausted. Every transition is
//! mirrored into the injected [`StatusStore`].
//!
//! The queue itself is not durable: a restart loses queued jobs. Records left
//! `in_progress` by a crashed process must be reconciled by the composition
//! root before [`WorkQueue::start`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cadence_core::AppConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::error::{JobFailure, QueueError, WorkError};
use crate::executor::{run_guarded, WorkExecutor, WorkOutput};
use crate::job::{Job, JobOutcome, JobStatus};
use crate::store::{StatusRecord, StatusStore};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(60 * 60);

/// Tuning knobs for a [`WorkQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Total executor attempts per job, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry. Zero
    /// re-queues immediately.
    pub retry_backoff_base: Duration,
    /// Deadline for one executor call; `None` waits indefinitely.
    pub job_timeout: Option<Duration>,
    /// Calibration constant for ETA estimates.
    pub avg_job_duration: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_backoff_base: Duration::from_secs(5),
            job_timeout: Some(Duration::from_secs(900)),
            avg_job_duration: Duration::from_secs(60),
        }
    }
}

impl QueueSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.queue_max_attempts.max(1),
            retry_backoff_base: Duration::from_secs(config.queue_retry_backoff_base_secs),
            job_timeout: (config.queue_job_timeout_secs > 0)
                .then(|| Duration::from_secs(config.queue_job_timeout_secs)),
            avg_job_duration: Duration::from_secs(config.queue_avg_job_secs),
        }
    }

    /// Delay before a job that has failed `attempts` times becomes ready again.
    ///
    /// `base × 2^(attempts-1)`, capped at one hour.
    #[must_use]
    pub fn retry_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(10);
        self.retry_backoff_base
            .saturating_mul(1u32 << exponent)
            .min(MAX_RETRY_DELAY)
    }

    /// `position × avg_job_duration`, in whole seconds.
    #[must_use]
    pub fn estimate_seconds(&self, position: usize) -> u64 {
        u64::try_from(position)
            .unwrap_or(u64::MAX)
            .saturating_mul(self.avg_job_duration.as_secs())
    }
}

/// Result of [`WorkQueue::add_job`] as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnqueueReceipt {
    /// `false` when the tenant already had a job in flight.
    pub queued: bool,
    /// 1-based queue position, or `0` while the job is processing.
    pub position: usize,
    pub queue_length: usize,
    pub estimated_seconds: u64,
}

/// Receipt plus a handle resolving to the job's terminal outcome.
#[derive(Debug)]
pub struct Enqueued {
    pub receipt: EnqueueReceipt,
    pub handle: JobHandle,
}

/// Resolves once the job reaches `completed` or `failed`.
#[derive(Debug)]
pub struct JobHandle {
    rx: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    /// Wait for the terminal outcome. Dropping the handle does not affect the job.
    pub async fn wait(self) -> JobOutcome {
        self.rx.await.unwrap_or(JobOutcome::Abandoned)
    }
}

/// Status of one tenant as seen by the status query surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusView {
    pub tenant_id: String,
    pub status: JobStatus,
    pub message: String,
    pub in_progress: bool,
    pub position: Option<usize>,
    pub queue_length: usize,
    pub estimated_seconds: Option<u64>,
    pub attempts: Option<u32>,
    pub last_error: Option<String>,
    pub result_summary: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerState {
    pub is_processing: bool,
    pub current_job: Option<Job>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub worker: WorkerState,
    pub pending: Vec<Job>,
}

struct Entry {
    job: Job,
    waiters: Vec<oneshot::Sender<JobOutcome>>,
}

impl Entry {
    fn resolve(self, outcome: &JobOutcome) {
        for waiter in self.waiters {
            // Receivers that were dropped simply miss the outcome.
            let _ = waiter.send(outcome.clone());
        }
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Entry>,
    current: Option<Entry>,
    stopping: bool,
}

impl QueueState {
    fn position_of(&self, tenant_id: &str) -> Option<usize> {
        self.pending
            .iter()
            .position(|e| e.job.tenant_id == tenant_id)
    }

    fn current_is(&self, tenant_id: &str) -> bool {
        self.current
            .as_ref()
            .is_some_and(|e| e.job.tenant_id == tenant_id)
    }
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
    started: AtomicBool,
    executor: Arc<dyn WorkExecutor>,
    store: Arc<dyn StatusStore>,
    settings: QueueSettings,
}

/// Cloneable handle to the process-wide work queue.
#[derive(Clone)]
pub struct WorkQueue {
    shared: Arc<Shared>,
}

impl WorkQueue {
    pub fn new(
        executor: Arc<dyn WorkExecutor>,
        store: Arc<dyn StatusStore>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                wake: Notify::new(),
                started: AtomicBool::new(false),
                executor,
                store,
                settings,
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &QueueSettings {
        &self.shared.settings
    }

    /// Spawn the single worker task.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::AlreadyStarted`] if this queue was started before.
    pub fn start(&self) -> Result<WorkerHandle, QueueError> {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(QueueError::AlreadyStarted);
        }
        let queue = self.clone();
        let join = tokio::spawn(async move { queue.run().await });
        Ok(WorkerHandle {
            queue: self.clone(),
            join,
        })
    }

    /// Enqueue a job for `tenant_id` unless one is already queued or running.
    ///
    /// The returned handle resolves with the terminal outcome of whichever job
    /// now represents the tenant, new or existing. Once the queue is stopping,
    /// nothing is enqueued and the handle resolves as abandoned.
    pub async fn add_job(&self, tenant_id: &str) -> Enqueued {
        let (tx, rx) = oneshot::channel();
        let handle = JobHandle { rx };
        let settings = &self.shared.settings;

        let mut state = self.shared.state.lock().await;
        let queue_length = state.pending.len();

        if state.stopping {
            drop(state);
            let _ = tx.send(JobOutcome::Abandoned);
            tracing::warn!(tenant_id, "queue: worker stopped; job not enqueued");
            return Enqueued {
                receipt: EnqueueReceipt {
                    queued: false,
                    position: 0,
                    queue_length: 0,
                    estimated_seconds: 0,
                },
                handle,
            };
        }

        if state.current_is(tenant_id) {
            if let Some(current) = state.current.as_mut() {
                current.waiters.push(tx);
            }
            tracing::debug!(tenant_id, "queue: job already processing; not enqueued");
            return Enqueued {
                receipt: EnqueueReceipt {
                    queued: false,
                    position: 0,
                    queue_length,
                    estimated_seconds: 0,
                },
                handle,
            };
        }

        if let Some(index) = state.position_of(tenant_id) {
            state.pending[index].waiters.push(tx);
            let position = index + 1;
            tracing::debug!(tenant_id, position, "queue: job already queued; not enqueued");
            return Enqueued {
                receipt: EnqueueReceipt {
                    queued: false,
                    position,
                    queue_length,
                    estimated_seconds: settings.estimate_seconds(position),
                },
                handle,
            };
        }

        let now = Utc::now();
        let job = Job::new(tenant_id, settings.max_attempts, now);
        let position = state.pending.len() + 1;
        let record = job.to_record(format!("Queued (position {position})"), now);
        state.pending.push_back(Entry {
            job,
            waiters: vec![tx],
        });

        // Written under the lock so the worker's "processing" write for this
        // job can never be overtaken by this "queued" write.
        self.persist(tenant_id, &record).await;
        drop(state);

        self.shared.wake.notify_one();
        tracing::info!(tenant_id, position, "queue: job enqueued");

        Enqueued {
            receipt: EnqueueReceipt {
                queued: true,
                position,
                queue_length: position,
                estimated_seconds: settings.estimate_seconds(position),
            },
            handle,
        }
    }

    /// Current status for `tenant_id`: live queue state first, then the last
    /// persisted record, then `idle`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Store`] if the persisted record cannot be read.
    pub async fn get_status(&self, tenant_id: &str) -> Result<JobStatusView, QueueError> {
        let settings = &self.shared.settings;
        let queue_length = {
            let state = self.shared.state.lock().await;
            let queue_length = state.pending.len();

            if let Some(entry) = state.current.as_ref().filter(|_| state.current_is(tenant_id)) {
                let job = &entry.job;
                return Ok(JobStatusView {
                    tenant_id: tenant_id.to_string(),
                    status: JobStatus::Processing,
                    message: format!(
                        "Processing (attempt {} of {})",
                        job.attempts + 1,
                        job.max_attempts
                    ),
                    in_progress: true,
                    position: Some(0),
                    queue_length,
                    estimated_seconds: Some(0),
                    attempts: Some(job.attempts),
                    last_error: job.last_error.clone(),
                    result_summary: None,
                    updated_at: job.started_at,
                });
            }

            if let Some(index) = state.position_of(tenant_id) {
                let job = &state.pending[index].job;
                let position = index + 1;
                let message = match (job.status, job.last_error.as_deref()) {
                    (JobStatus::Retrying, Some(err)) => {
                        format!("Retrying (position {position}): {err}")
                    }
                    _ => format!("Queued (position {position})"),
                };
                return Ok(JobStatusView {
                    tenant_id: tenant_id.to_string(),
                    status: job.status,
                    message,
                    in_progress: true,
                    position: Some(position),
                    queue_length,
                    estimated_seconds: Some(settings.estimate_seconds(position)),
                    attempts: Some(job.attempts),
                    last_error: job.last_error.clone(),
                    result_summary: None,
                    updated_at: Some(job.enqueued_at),
                });
            }

            queue_length
        };

        let view = match self.shared.store.load(tenant_id).await? {
            Some(record) => JobStatusView {
                tenant_id: tenant_id.to_string(),
                status: record.status,
                message: record.message,
                in_progress: record.in_progress,
                position: None,
                queue_length,
                estimated_seconds: None,
                attempts: None,
                last_error: record.last_error,
                result_summary: record.result_summary,
                updated_at: Some(record.updated_at),
            },
            None => JobStatusView {
                tenant_id: tenant_id.to_string(),
                status: JobStatus::Idle,
                message: "No job has run for this tenant".to_string(),
                in_progress: false,
                position: None,
                queue_length,
                estimated_seconds: None,
                attempts: None,
                last_error: None,
                result_summary: None,
                updated_at: None,
            },
        };
        Ok(view)
    }

    /// Point-in-time copy of the worker state and pending jobs.
    pub async fn snapshot(&self) -> QueueSnapshot {
        let state = self.shared.state.lock().await;
        QueueSnapshot {
            worker: WorkerState {
                is_processing: state.current.is_some(),
                current_job: state.current.as_ref().map(|e| e.job.clone()),
            },
            pending: state.pending.iter().map(|e| e.job.clone()).collect(),
        }
    }

    async fn run(self) {
        tracing::info!(
            max_attempts = self.shared.settings.max_attempts,
            "queue: worker started"
        );
        while let Some(job) = self.next_job().await {
            self.process(job).await;
        }
        tracing::info!("queue: worker stopped");
    }

    /// Wait for the first ready job, move it to `current`, and return a copy.
    /// Returns `None` once the queue is stopping.
    async fn next_job(&self) -> Option<Job> {
        loop {
            let wait = {
                let mut state = self.shared.state.lock().await;
                if state.stopping {
                    return None;
                }

                let now = Utc::now();
                let ready = state.pending.iter().position(|e| e.job.ready_at <= now);
                if let Some(mut entry) = ready.and_then(|index| state.pending.remove(index)) {
                    entry.job.mark_processing(now);
                    let job = entry.job.clone();
                    state.current = Some(entry);
                    return Some(job);
                }

                state
                    .pending
                    .iter()
                    .map(|e| e.job.ready_at)
                    .min()
                    .map(|earliest| (earliest - now).to_std().unwrap_or_default())
            };

            match wait {
                Some(delay) => {
                    tokio::select! {
                        () = self.shared.wake.notified() => {}
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                None => self.shared.wake.notified().await,
            }
        }
    }

    async fn process(&self, mut job: Job) {
        let tenant_id = job.tenant_id.clone();
        let attempt = job.attempts + 1;
        let started_at = job.started_at.unwrap_or_else(Utc::now);

        let record = job.to_record(
            format!("Processing (attempt {attempt} of {})", job.max_attempts),
            started_at,
        );
        self.persist(&tenant_id, &record).await;
        tracing::info!(tenant_id = %tenant_id, attempt, "queue: job started");

        let clock = Instant::now();
        let result = self.execute(&tenant_id).await;
        let elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        let now = Utc::now();

        match result {
            Ok(output) => {
                job.mark_completed(now);
                let message = output
                    .summary
                    .clone()
                    .unwrap_or_else(|| "Completed".to_string());
                let mut record = job.to_record(message, now);
                record.result_summary = output.summary.clone();
                self.persist(&tenant_id, &record).await;
                tracing::info!(tenant_id = %tenant_id, attempt, elapsed_ms, "queue: job completed");

                self.finish(&tenant_id, &JobOutcome::Completed {
                    summary: output.summary,
                })
                .await;
            }
            Err(error) => {
                job.attempts += 1;
                job.last_error = Some(error.to_string());

                if job.attempts < job.max_attempts {
                    let failure = JobFailure::Transient {
                        attempt: job.attempts,
                        max_attempts: job.max_attempts,
                        error,
                    };
                    let delay = self.shared.settings.retry_delay(job.attempts);
                    let ready_at =
                        now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
                    job.mark_retrying(ready_at);

                    let record = job.to_record(format!("Retrying: {failure}"), now);
                    self.persist(&tenant_id, &record).await;
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        elapsed_ms,
                        retry_in_secs = delay.as_secs(),
                        error = %failure,
                        "queue: job failed; re-queued at tail"
                    );

                    self.requeue(&tenant_id, job).await;
                } else {
                    let failure = JobFailure::Permanent {
                        attempts: job.attempts,
                        error,
                    };
                    job.mark_failed(now);

                    let record = job.to_record(format!("Failed: {failure}"), now);
                    self.persist(&tenant_id, &record).await;
                    tracing::error!(
                        tenant_id = %tenant_id,
                        elapsed_ms,
                        error = %failure,
                        "queue: job failed permanently"
                    );

                    self.finish(
                        &tenant_id,
                        &JobOutcome::Failed {
                            attempts: job.attempts,
                            error: job.last_error.clone().unwrap_or_default(),
                        },
                    )
                    .await;
                }
            }
        }
    }

    async fn execute(&self, tenant_id: &str) -> Result<WorkOutput, WorkError> {
        let work = run_guarded(self.shared.executor.as_ref(), tenant_id);
        match self.shared.settings.job_timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .unwrap_or(Err(WorkError::TimedOut(limit))),
            None => work.await,
        }
    }

    /// Clear `current` and deliver the terminal outcome to every waiter.
    async fn finish(&self, tenant_id: &str, outcome: &JobOutcome) {
        let entry = self.shared.state.lock().await.current.take();
        match entry {
            Some(entry) => entry.resolve(outcome),
            None => tracing::error!(tenant_id, "queue: finished job missing from worker state"),
        }
    }

    /// Move the current job back to the tail of the queue.
    async fn requeue(&self, tenant_id: &str, job: Job) {
        let mut state = self.shared.state.lock().await;
        match state.current.take() {
            Some(mut entry) => {
                entry.job = job;
                state.pending.push_back(entry);
            }
            None => tracing::error!(tenant_id, "queue: retried job missing from worker state"),
        }
    }

    async fn persist(&self, tenant_id: &str, record: &StatusRecord) {
        if let Err(e) = self.shared.store.save(tenant_id, record).await {
            tracing::warn!(
                tenant_id,
                status = %record.status,
                error = %e,
                "queue: failed to persist job status"
            );
        }
    }

    /// Ask the worker to exit after its current job. Jobs still queued are
    /// abandoned and their waiters resolved with [`JobOutcome::Abandoned`].
    async fn shutdown(&self) -> usize {
        let mut state = self.shared.state.lock().await;
        state.stopping = true;
        let abandoned: Vec<Entry> = state.pending.drain(..).collect();
        drop(state);
        self.shared.wake.notify_one();

        let count = abandoned.len();
        for entry in abandoned {
            entry.resolve(&JobOutcome::Abandoned);
        }
        count
    }
}

/// Lifecycle handle returned by [`WorkQueue::start`].
pub struct WorkerHandle {
    queue: WorkQueue,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Stop the worker, letting any in-flight job run to completion first.
    pub async fn stop(self) {
        let abandoned = self.queue.shutdown().await;
        if abandoned > 0 {
            tracing::warn!(abandoned, "queue: stopping with jobs still queued");
        }
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "queue: worker task ended abnormally");
        }
    }
}
