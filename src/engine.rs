use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::processing::job::{Job, JobError, JobHandle, JobSource, JobSpec};
use crate::processing::operation::{Operation, OperationError, OperationSpec};
use crate::processing::worker::{ImageWorker, Pipeline, PoolError, WorkerPool};
use crate::validation::{
    generate_job_id, generate_processed_filename, generate_unique_filename, validate_file,
    FileRejected,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub filename: String,
    #[serde(default)]
    pub operations: Vec<OperationSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(#[from] OperationError),
    #[error("file rejected: {0}")]
    FileRejected(#[from] FileRejected),
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker pool: {0}")]
    Pool(#[from] PoolError),
    #[error("processing failed: {0}")]
    ProcessingFailed(JobError),
    #[error("no result after {0:?}")]
    Timeout(Duration),
}

impl EngineError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Timeout(_))
    }

    /// What the caller's client gets to see. Processing details stay in the logs.
    pub fn to_response(&self) -> ProcessResponse {
        let message = match self {
            EngineError::ProcessingFailed(_) | EngineError::Pool(_) | EngineError::Io(_) => {
                "Processing failed".to_string()
            }
            EngineError::Timeout(_) => "Processing timeout".to_string(),
            EngineError::FileNotFound(_) => "File not found".to_string(),
            EngineError::FileRejected(_) => "Invalid file format or size".to_string(),
            EngineError::InvalidRequest(_) | EngineError::InvalidOperation(_) => self.to_string(),
        };

        ProcessResponse {
            success: false,
            message,
            download_url: None,
        }
    }
}

/// A submitted job the caller has not collected yet.
#[derive(Debug)]
pub struct PendingJob {
    handle: JobHandle,
    output_filename: String,
    download_prefix: String,
}

impl PendingJob {
    pub fn job_id(&self) -> &str {
        self.handle.job_id()
    }

    pub fn output_filename(&self) -> &str {
        &self.output_filename
    }

    /// Gives up after `timeout`; the job itself keeps running to completion.
    pub fn wait(self, timeout: Duration) -> Result<ProcessResponse, EngineError> {
        let job_id = self.handle.job_id().to_string();

        let result = match self.handle.wait(timeout) {
            Ok(result) => result,
            Err(JobError::Timeout(after)) => {
                warn!("Job {} timed out after {:?}", job_id, after);
                return Err(EngineError::Timeout(after));
            }
            Err(e) => return Err(EngineError::ProcessingFailed(e)),
        };

        match result.outcome {
            Ok(_) => Ok(ProcessResponse {
                success: true,
                message: "Image processed successfully".to_string(),
                download_url: Some(format!(
                    "{}/{}",
                    self.download_prefix.trim_end_matches('/'),
                    self.output_filename
                )),
            }),
            Err(e) => {
                error!("Processing error in job {}: {}", job_id, e);
                Err(EngineError::ProcessingFailed(e))
            }
        }
    }
}

/// Accepts uploads and processing requests and runs them on the worker pool.
pub struct Engine<W: ImageWorker = Pipeline> {
    pool: WorkerPool<W>,
    config: Config,
}

impl Engine<Pipeline> {
    pub fn start(config: Config) -> Result<Self, EngineError> {
        Self::with_worker(config, Pipeline::new())
    }
}

impl<W: ImageWorker> Engine<W> {
    pub fn with_worker(config: Config, worker: W) -> Result<Self, EngineError> {
        fs::create_dir_all(&config.upload_dir)?;

        let pool = WorkerPool::new(config.pool, worker)?;
        pool.start()?;
        info!(
            "Engine ready: {} workers, queue of {}, uploads in {}",
            config.pool.workers,
            config.pool.queue_capacity,
            config.upload_dir.display()
        );

        Ok(Self { pool, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validates `source` and copies it into the upload directory under a
    /// fresh name, which is returned.
    pub fn upload(&self, source: &Path) -> Result<String, EngineError> {
        let original = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| EngineError::InvalidRequest(format!("{} has no file name", source.display())))?;

        let metadata = fs::metadata(source).map_err(|_| EngineError::FileNotFound(source.to_path_buf()))?;
        validate_file(
            original,
            metadata.len(),
            &self.config.allowed_formats,
            self.config.max_file_size,
        )?;

        let filename = generate_unique_filename(original);
        fs::copy(source, self.config.upload_dir.join(&filename))?;
        info!("Uploaded {} as {}", source.display(), filename);

        Ok(filename)
    }

    pub fn submit(&self, request: &ProcessRequest) -> Result<PendingJob, EngineError> {
        let input = self.resolve_upload(&request.filename)?;
        if !input.is_file() {
            return Err(EngineError::FileNotFound(input));
        }

        let operations = Operation::decode_all(&request.operations, &self.config.limits)?;
        let output_filename = generate_processed_filename(&request.filename);

        let (job, handle) = Job::new(JobSpec {
            id: generate_job_id(),
            source: JobSource::Path(input),
            output: self.config.upload_dir.join(&output_filename),
            operations,
        });
        info!(
            "Submitting job {} for {} ({} operations)",
            job.id(),
            request.filename,
            job.spec().operations.len()
        );
        self.pool.submit(job)?;

        Ok(PendingJob {
            handle,
            output_filename,
            download_prefix: self.config.download_prefix.clone(),
        })
    }

    /// Submits and waits up to the configured timeout.
    pub fn process(&self, request: &ProcessRequest) -> Result<ProcessResponse, EngineError> {
        self.submit(request)?.wait(self.config.result_timeout)
    }

    pub fn shutdown(self) {
        self.pool.stop();
    }

    fn resolve_upload(&self, filename: &str) -> Result<PathBuf, EngineError> {
        let is_plain_name = Path::new(filename).file_name().and_then(|n| n.to_str()) == Some(filename);
        if filename.is_empty() || !is_plain_name {
            return Err(EngineError::InvalidRequest(format!(
                "`{filename}` is not a plain file name"
            )));
        }
        Ok(self.config.upload_dir.join(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::worker::PoolConfig;
    use crate::tests_common::{solid_rgba, write_test_image};
    use crossbeam_channel::{Receiver, Sender};
    use image::GenericImageView;
    use serde_json::json;
    use tempfile::TempDir;

    fn config(dir: &Path) -> Config {
        Config {
            pool: PoolConfig::new(2),
            result_timeout: Duration::from_secs(10),
            upload_dir: dir.join("uploads"),
            ..Config::default()
        }
    }

    fn request(filename: &str, operations: serde_json::Value) -> ProcessRequest {
        serde_json::from_value(json!({ "filename": filename, "operations": operations })).unwrap()
    }

    #[test]
    fn upload_then_process_returns_download_url() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::start(config(tmp.path())).unwrap();
        let source = write_test_image(tmp.path(), "photo.png", &solid_rgba(40, 30, [255, 0, 0, 255]));

        let stored = engine.upload(&source).unwrap();
        let response = engine
            .process(&request(
                &stored,
                json!([
                    {"type": "resize", "params": {"width": 100, "height": 50}},
                    {"type": "grayscale"}
                ]),
            ))
            .unwrap();

        assert!(response.success);
        let url = response.download_url.unwrap();
        assert!(url.starts_with("/download/photo_"));
        let output = tmp.path().join("uploads").join(url.trim_start_matches("/download/"));
        let decoded = image::open(output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
        assert_eq!(decoded.color(), image::ColorType::L8);
        engine.shutdown();
    }

    #[test]
    fn upload_rejects_disallowed_extension() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::start(config(tmp.path())).unwrap();
        let source = tmp.path().join("notes.txt");
        fs::write(&source, "hello").unwrap();

        let err = engine.upload(&source).unwrap_err();

        assert!(matches!(err, EngineError::FileRejected(FileRejected::UnsupportedFormat(_))));
        assert_eq!(err.to_response().message, "Invalid file format or size");
        engine.shutdown();
    }

    #[test]
    fn unknown_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::start(config(tmp.path())).unwrap();

        let err = engine.submit(&request("ghost.png", json!([]))).unwrap_err();

        assert!(matches!(err, EngineError::FileNotFound(_)));
        engine.shutdown();
    }

    #[test]
    fn path_traversal_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::start(config(tmp.path())).unwrap();

        let err = engine.submit(&request("../secret.png", json!([]))).unwrap_err();

        assert!(matches!(err, EngineError::InvalidRequest(_)));
        engine.shutdown();
    }

    #[test]
    fn malformed_operation_is_rejected_before_submission() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::start(config(tmp.path())).unwrap();
        let source = write_test_image(tmp.path(), "a.png", &solid_rgba(2, 2, [1, 1, 1, 255]));
        let stored = engine.upload(&source).unwrap();

        let err = engine
            .submit(&request(&stored, json!([{"type": "resize", "params": {"width": "wide"}}])))
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidOperation(_)));
        engine.shutdown();
    }

    #[test]
    fn oversized_operations_are_rejected_before_submission() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::start(config(tmp.path())).unwrap();
        let source = write_test_image(tmp.path(), "b.png", &solid_rgba(2, 2, [1, 1, 1, 255]));
        let stored = engine.upload(&source).unwrap();

        for operations in [
            json!([{"type": "blur", "params": {"radius": 1.0e6}}]),
            json!([{"type": "resize", "params": {"width": 100000, "height": 100000}}]),
        ] {
            let err = engine.submit(&request(&stored, operations)).unwrap_err();
            assert!(matches!(
                err,
                EngineError::InvalidOperation(OperationError::OutOfRange { .. })
            ));
        }
        engine.shutdown();
    }

    #[test]
    fn undecodable_upload_maps_to_processing_failed() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::start(config(tmp.path())).unwrap();
        let source = tmp.path().join("broken.png");
        fs::write(&source, b"not an image").unwrap();
        let stored = engine.upload(&source).unwrap();

        let err = engine.process(&request(&stored, json!([]))).unwrap_err();

        assert!(matches!(err, EngineError::ProcessingFailed(JobError::Decode { .. })));
        assert_eq!(err.to_response().message, "Processing failed");
        engine.shutdown();
    }

    struct StalledWorker {
        gate: Receiver<()>,
    }

    impl ImageWorker for StalledWorker {
        fn process(&self, job: JobSpec) -> Result<PathBuf, JobError> {
            let _ = self.gate.recv();
            Ok(job.output)
        }
    }

    #[test]
    fn slow_job_maps_to_timeout_response() {
        let tmp = TempDir::new().unwrap();
        let (gate, gate_rx): (Sender<()>, Receiver<()>) = crossbeam_channel::unbounded();
        let mut config = config(tmp.path());
        config.result_timeout = Duration::from_millis(50);
        let engine = Engine::with_worker(config, StalledWorker { gate: gate_rx }).unwrap();
        let source = write_test_image(tmp.path(), "slow.png", &solid_rgba(2, 2, [0, 0, 0, 255]));
        let stored = engine.upload(&source).unwrap();

        let err = engine.process(&request(&stored, json!([]))).unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.to_response().message, "Processing timeout");
        drop(gate);
        engine.shutdown();
    }

    #[test]
    fn response_serializes_like_the_http_payload() {
        let ok = ProcessResponse {
            success: true,
            message: "Image processed successfully".into(),
            download_url: Some("/download/x.png".into()),
        };
        let failed = EngineError::Timeout(Duration::from_secs(30)).to_response();

        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"success": true, "message": "Image processed successfully", "download_url": "/download/x.png"})
        );
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"success": false, "message": "Processing timeout"})
        );
    }
}
