use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use image_pool::config::Config;
use image_pool::engine::{Engine, ProcessRequest};
use image_pool::processing::operation::OperationSpec;

#[derive(Parser, Debug)]
#[command(about = "Resize, grayscale and blur images on a bounded worker pool")]
struct Args {
    /// Images to process
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Operations as JSON, e.g. '[{"type":"resize","params":{"width":100,"height":50}},{"type":"grayscale"}]'
    #[arg(short, long, default_value = "[]")]
    operations: String,

    /// Number of worker threads (overrides IMG_WORKERS)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Seconds to wait for each result (overrides IMG_TIMEOUT_SECS)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Where uploads and results are stored (overrides IMG_UPLOAD_DIR)
    #[arg(short, long)]
    upload_dir: Option<PathBuf>,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    // init .env
    dotenvy::dotenv().ok();
    dotenvy::from_filename(".env.local").ok();

    // init logger
    env_logger::init();

    // init cli
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if let Some(timeout) = args.timeout {
        config.result_timeout = Duration::from_secs(timeout);
    }
    if let Some(upload_dir) = args.upload_dir {
        config.upload_dir = upload_dir;
    }

    let operations: Vec<OperationSpec> = serde_json::from_str(&args.operations)?;
    let timeout = config.result_timeout;
    let engine = Engine::start(config)?;

    // submit everything first so the pool works on several images at once
    let mut pending = Vec::new();
    for input in &args.inputs {
        let submitted = engine.upload(input).and_then(|filename| {
            engine.submit(&ProcessRequest {
                filename,
                operations: operations.clone(),
            })
        });

        match submitted {
            Ok(job) => {
                info!("{} queued as {}", input.display(), job.job_id());
                pending.push((input, job));
            }
            Err(e) => {
                error!("{}: {}", input.display(), e);
                println!("{}: {}", input.display(), serde_json::to_string(&e.to_response())?);
            }
        }
    }

    for (input, job) in pending {
        let response = job.wait(timeout).unwrap_or_else(|e| {
            error!("{}: {}", input.display(), e);
            e.to_response()
        });
        println!("{}: {}", input.display(), serde_json::to_string(&response)?);
    }

    engine.shutdown();

    Ok(())
}
