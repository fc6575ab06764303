use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::processing::operation::OperationLimits;
use crate::processing::worker::PoolConfig;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 << 20;
pub const DEFAULT_ALLOWED_FORMATS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value `{value}`")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub pool: PoolConfig,
    /// Set when the queue capacity was configured rather than derived from
    /// the worker count.
    pub queue_capacity_override: Option<usize>,
    pub limits: OperationLimits,
    pub result_timeout: Duration,
    pub upload_dir: PathBuf,
    pub max_file_size: u64,
    pub allowed_formats: Vec<String>,
    pub download_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool: PoolConfig::new(default_workers()),
            queue_capacity_override: None,
            limits: OperationLimits::default(),
            result_timeout: DEFAULT_TIMEOUT,
            upload_dir: PathBuf::from("uploads"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_formats: DEFAULT_ALLOWED_FORMATS.iter().map(|f| f.to_string()).collect(),
            download_prefix: "/download".to_string(),
        }
    }
}

impl Config {
    /// Reads `IMG_*` variables on top of the defaults. Call `dotenvy` first if
    /// `.env` files should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let workers = parsed::<usize>("IMG_WORKERS")?.unwrap_or(defaults.pool.workers);
        let queue_capacity_override = parsed::<usize>("IMG_QUEUE_CAPACITY")?;
        let pool = pool_config(workers, queue_capacity_override);

        let limits = OperationLimits {
            max_dimension: parsed::<u32>("IMG_MAX_DIMENSION")?
                .unwrap_or(defaults.limits.max_dimension),
            max_blur_radius: parsed::<f64>("IMG_MAX_BLUR_RADIUS")?
                .unwrap_or(defaults.limits.max_blur_radius),
        };

        let result_timeout = parsed::<u64>("IMG_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.result_timeout);

        let allowed_formats = match var("IMG_ALLOWED_FORMATS") {
            Some(list) => list
                .split(',')
                .map(|f| f.trim().to_ascii_lowercase())
                .filter(|f| !f.is_empty())
                .map(|f| if f.starts_with('.') { f } else { format!(".{f}") })
                .collect(),
            None => defaults.allowed_formats,
        };

        Ok(Self {
            pool,
            queue_capacity_override,
            limits,
            result_timeout,
            upload_dir: var("IMG_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_file_size: parsed::<u64>("IMG_MAX_FILE_SIZE")?.unwrap_or(defaults.max_file_size),
            allowed_formats,
            download_prefix: var("IMG_DOWNLOAD_PREFIX").unwrap_or(defaults.download_prefix),
        })
    }

    /// Changes the worker count. A configured queue capacity is kept, a
    /// derived one follows the new count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.pool = pool_config(workers, self.queue_capacity_override);
        self
    }
}

fn pool_config(workers: usize, queue_capacity: Option<usize>) -> PoolConfig {
    let pool = PoolConfig::new(workers);
    match queue_capacity {
        Some(capacity) => pool.with_queue_capacity(capacity),
        None => pool,
    }
}

fn default_workers() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn var(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    var(name)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: name,
                value: value.clone(),
            })
        })
        .transpose()
}
