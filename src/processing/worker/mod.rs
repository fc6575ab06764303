//! Fixed size pool of worker threads fed by a bounded FIFO queue.
//!
//! ```text
//! submit(job) ──► [ bounded queue, 2 × workers ] ──► worker 1..N ──► ResultSlot ──► JobHandle
//!                                                     ▲
//!                                 stop signal ────────┘
//! ```
//!
//! `submit` blocks while the queue is full. Each idle worker waits on the queue
//! and the stop signal at the same time. Once it sees the stop signal it runs
//! whatever is still queued, without blocking, and exits. Every job that
//! reaches a worker gets exactly one result; jobs left in the queue after all
//! workers exited get a [`JobError::Submission`] result.

pub mod pipeline;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{select, Receiver, Sender};
use log::{debug, error, info, warn};
use thiserror::Error;

use super::job::{Job, JobError, JobSpec};

pub use pipeline::Pipeline;

pub trait ImageWorker: Send + Sync + 'static {
    fn process(&self, job: JobSpec) -> Result<PathBuf, JobError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl PoolConfig {
    /// Queue capacity defaults to twice the number of workers.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            queue_capacity: workers.saturating_mul(2),
        }
    }

    pub fn with_queue_capacity(self, queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("pool cannot be started from state {0:?}")]
    AlreadyStarted(PoolState),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("pool is not accepting jobs in state {0:?}")]
    NotAccepting(PoolState),
    #[error("job queue was closed before job {0} could be queued")]
    QueueClosed(String),
}

struct Inner {
    state: PoolState,
    jobs_tx: Option<Sender<Job>>,
    jobs_rx: Option<Receiver<Job>>,
    stop_tx: Option<Sender<()>>,
    threads: Vec<JoinHandle<()>>,
}

pub struct WorkerPool<W: ImageWorker> {
    config: PoolConfig,
    worker: Arc<W>,
    inner: Mutex<Inner>,
}

impl<W: ImageWorker> WorkerPool<W> {
    pub fn new(config: PoolConfig, worker: W) -> Result<Self, PoolError> {
        if config.workers == 0 {
            return Err(PoolError::InvalidConfig("at least one worker is required"));
        }
        if config.queue_capacity == 0 {
            return Err(PoolError::InvalidConfig("queue capacity must be at least 1"));
        }

        let (jobs_tx, jobs_rx) = crossbeam_channel::bounded(config.queue_capacity);

        Ok(Self {
            config,
            worker: Arc::new(worker),
            inner: Mutex::new(Inner {
                state: PoolState::Created,
                jobs_tx: Some(jobs_tx),
                jobs_rx: Some(jobs_rx),
                stop_tx: None,
                threads: Vec::new(),
            }),
        })
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    pub fn state(&self) -> PoolState {
        self.lock().state
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start(&self) -> Result<(), PoolError> {
        let mut inner = self.lock();
        if inner.state != PoolState::Created {
            return Err(PoolError::AlreadyStarted(inner.state));
        }
        let Some(jobs_rx) = inner.jobs_rx.clone() else {
            return Err(PoolError::AlreadyStarted(inner.state));
        };

        info!("Starting worker pool with {} workers", self.config.workers);
        inner.state = PoolState::Starting;

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        for id in 1..=self.config.workers {
            let jobs = jobs_rx.clone();
            let stop = stop_rx.clone();
            let worker = Arc::clone(&self.worker);

            let spawned = thread::Builder::new()
                .name(format!("image-worker-{id}"))
                .spawn(move || worker_loop(id, worker.as_ref(), jobs, stop));

            match spawned {
                Ok(handle) => inner.threads.push(handle),
                Err(e) => {
                    error!("Unable to spawn worker {}: {}", id, e);
                    drop(stop_tx);
                    join_all(std::mem::take(&mut inner.threads));
                    inner.state = PoolState::Stopped;
                    inner.jobs_tx = None;
                    if let Some(rx) = inner.jobs_rx.take() {
                        reject_remaining(&rx);
                    }
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        inner.stop_tx = Some(stop_tx);
        inner.state = PoolState::Running;
        Ok(())
    }

    /// Queues a job, blocking while the queue is full.
    pub fn submit(&self, job: Job) -> Result<(), PoolError> {
        let sender = {
            let inner = self.lock();
            match inner.state {
                PoolState::Created | PoolState::Starting | PoolState::Running => {}
                state => return Err(PoolError::NotAccepting(state)),
            }
            match &inner.jobs_tx {
                Some(tx) => tx.clone(),
                None => return Err(PoolError::NotAccepting(inner.state)),
            }
        };

        debug!("Queueing job {}", job.id());
        sender
            .send(job)
            .map_err(|unsent| PoolError::QueueClosed(unsent.into_inner().id().to_string()))
    }

    /// Signals every worker, waits for all of them to exit, then releases the
    /// queue. Calling it again is a no-op.
    pub fn stop(&self) {
        let (stop_tx, threads, jobs_rx) = {
            let mut inner = self.lock();
            match inner.state {
                PoolState::Stopping | PoolState::Stopped => {
                    warn!("Worker pool is already {:?}", inner.state);
                    return;
                }
                PoolState::Created | PoolState::Starting | PoolState::Running => {}
            }
            info!("Stopping worker pool...");
            inner.state = PoolState::Stopping;
            inner.jobs_tx = None;
            (
                inner.stop_tx.take(),
                std::mem::take(&mut inner.threads),
                inner.jobs_rx.take(),
            )
        };

        drop(stop_tx);
        join_all(threads);

        if let Some(rx) = jobs_rx {
            reject_remaining(&rx);
        }

        self.lock().state = PoolState::Stopped;
        info!("Worker pool stopped");
    }
}

impl<W: ImageWorker> Drop for WorkerPool<W> {
    fn drop(&mut self) {
        if !matches!(self.state(), PoolState::Stopped) {
            self.stop();
        }
    }
}

fn join_all(threads: Vec<JoinHandle<()>>) {
    for handle in threads {
        let name = handle.thread().name().unwrap_or("worker").to_string();
        if handle.join().is_err() {
            error!("{} panicked outside of a job", name);
        }
    }
}

fn reject_remaining(jobs: &Receiver<Job>) {
    for job in jobs.try_iter() {
        warn!("Job {} was still queued when the pool stopped", job.id());
        let (_, slot) = job.into_parts();
        slot.fill(Err(JobError::Submission(
            "worker pool stopped before the job was started".to_string(),
        )));
    }
}

fn worker_loop<W: ImageWorker>(id: usize, worker: &W, jobs: Receiver<Job>, stop: Receiver<()>) {
    info!("Worker {} started", id);

    loop {
        select! {
            recv(jobs) -> job => match job {
                Ok(job) => run_job(id, worker, job),
                Err(_) => break,
            },
            recv(stop) -> _ => {
                for job in jobs.try_iter() {
                    run_job(id, worker, job);
                }
                break;
            }
        }
    }

    info!("Worker {} stopping", id);
}

fn run_job<W: ImageWorker>(id: usize, worker: &W, job: Job) {
    let (spec, slot) = job.into_parts();
    let job_id = spec.id.clone();
    debug!("Worker {} processing job {}", id, job_id);

    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker.process(spec)))
        .unwrap_or_else(|payload| {
            error!("Worker {} caught a panic in job {}", id, job_id);
            Err(JobError::Transform(panic_message(payload.as_ref())))
        });

    match &outcome {
        Ok(path) => info!(
            "Job {} finished in {:?} -> {}",
            job_id,
            started.elapsed(),
            path.display()
        ),
        Err(e) => warn!("Job {} failed: {}", job_id, e),
    }

    slot.fill(outcome);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
