use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::debug;
use thiserror::Error;

use super::buffer::PixelBuffer;
use super::operation::Operation;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("failed to encode {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },
    #[error("transform failed: {0}")]
    Transform(String),
    #[error("no result within {0:?}")]
    Timeout(Duration),
    #[error("job was not run: {0}")]
    Submission(String),
}

#[derive(Debug, Clone)]
pub enum JobSource {
    Path(PathBuf),
    Buffer(PixelBuffer),
}

/// What a worker needs to run a job. Never modified after submission.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub id: String,
    pub source: JobSource,
    pub output: PathBuf,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub job_id: String,
    pub outcome: Result<PathBuf, JobError>,
}

impl JobResult {
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.outcome.as_ref().err()
    }
}

/// Write side of a job's one-shot result channel.
#[derive(Debug)]
pub struct ResultSlot {
    job_id: String,
    sender: Sender<JobResult>,
}

impl ResultSlot {
    /// The slot is buffered, so this never blocks, whether or not the caller
    /// is still waiting.
    pub fn fill(self, outcome: Result<PathBuf, JobError>) {
        let result = JobResult {
            job_id: self.job_id,
            outcome,
        };
        if let Err(unread) = self.sender.try_send(result) {
            debug!("Result of job {} was abandoned by its caller", unread.into_inner().job_id);
        }
    }
}

/// Read side of a job's one-shot result channel.
#[derive(Debug)]
pub struct JobHandle {
    job_id: String,
    receiver: Receiver<JobResult>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Waits for the job's single result. Dropping the handle afterwards (or
    /// instead) leaves the worker unaffected.
    pub fn wait(self, timeout: Duration) -> Result<JobResult, JobError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => Err(JobError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(JobError::Submission(format!(
                "job {} was dropped without a result",
                self.job_id
            ))),
        }
    }
}

/// A unit of work queued on the pool together with its result slot.
#[derive(Debug)]
pub struct Job {
    spec: JobSpec,
    slot: ResultSlot,
}

impl Job {
    pub fn new(spec: JobSpec) -> (Job, JobHandle) {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let handle = JobHandle {
            job_id: spec.id.clone(),
            receiver,
        };
        let slot = ResultSlot {
            job_id: spec.id.clone(),
            sender,
        };
        (Job { spec, slot }, handle)
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn into_parts(self) -> (JobSpec, ResultSlot) {
        (self.spec, self.slot)
    }
}
