use std::path::PathBuf;

use log::{debug, warn};

use super::ImageWorker;
use crate::processing::buffer::PixelBuffer;
use crate::processing::data_loader::{load_image, save_image};
use crate::processing::filters;
use crate::processing::job::{JobError, JobSource, JobSpec};
use crate::processing::operation::Operation;

/// Decode, apply every operation in order, encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline;

impl Pipeline {
    pub fn new() -> Self {
        Pipeline
    }
}

impl ImageWorker for Pipeline {
    fn process(&self, job: JobSpec) -> Result<PathBuf, JobError> {
        let mut buffer = match job.source {
            JobSource::Buffer(buffer) => buffer,
            JobSource::Path(path) => load_image(&path).map_err(|e| JobError::Decode {
                reason: e.to_string(),
                path,
            })?,
        };

        for operation in &job.operations {
            buffer = apply(operation, buffer);
        }

        save_image(&job.output, &buffer).map_err(|e| JobError::Encode {
            path: job.output.clone(),
            reason: e.to_string(),
        })?;

        Ok(job.output)
    }
}

pub fn apply(operation: &Operation, buffer: PixelBuffer) -> PixelBuffer {
    debug!("applying {:?} to {:?} buffer", operation, buffer.dimensions());

    match operation {
        Operation::Resize { width, height } => filters::resize(&buffer, *width, *height),
        Operation::Grayscale => filters::grayscale(&buffer),
        Operation::Blur { radius } => filters::blur(&buffer, *radius),
        Operation::Unrecognized(kind) => {
            warn!("Skipping unrecognized operation `{}`", kind);
            buffer
        }
    }
}
