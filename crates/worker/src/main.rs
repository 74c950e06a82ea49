use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use tracing::info;

use worker::config::WorkerConfig;
use worker::pipeline::Worker;
use worker::transport::{ZmqPull, ZmqPush};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = WorkerConfig::from_args(&args)?;
    info!(
        cfg = %config.cfg.display(),
        weights = %config.weights.display(),
        variant = config.kind.label(),
        gpu = config.gpu,
        threshold = config.threshold,
        pool = config.pool_capacity,
        pull = %config.pull_endpoint,
        push = %config.push_endpoint,
        "starting worker"
    );

    let mut detector = build_detector(&config)?;

    let context = zmq::Context::new();
    let pull = ZmqPull::connect(&context, &config.pull_endpoint)
        .context("pull socket setup failed")?;
    let push = ZmqPush::connect(&context, &config.push_endpoint)
        .context("push socket setup failed")?;

    let worker = Worker::new(config.pool_capacity);
    let shutdown = worker.shutdown_flag();
    ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
        .context("failed to install signal handler")?;

    worker.run(pull, push, detector.as_mut(), config.threshold)?;

    for (kind, dropped) in worker.counters().snapshot() {
        if dropped > 0 {
            info!(kind, dropped, "frames dropped");
        }
    }
    info!("worker stopped");
    Ok(())
}

#[cfg(feature = "with-tch")]
fn build_detector(config: &WorkerConfig) -> Result<Box<dyn detect_core::Detect>> {
    use worker::config::DetectorKind;

    match config.kind {
        DetectorKind::Object => {
            let names = config
                .names
                .as_ref()
                .context("object variant requires a class names file")?;
            let detector =
                detect_core::ObjectDetector::load(&config.cfg, &config.weights, names, config.gpu)?;
            Ok(Box::new(detector))
        }
        DetectorKind::Pose => {
            let detector =
                detect_core::PoseDetector::load(&config.cfg, &config.weights, config.gpu)?;
            Ok(Box::new(detector))
        }
    }
}

#[cfg(not(feature = "with-tch"))]
fn build_detector(_config: &WorkerConfig) -> Result<Box<dyn detect_core::Detect>> {
    anyhow::bail!("this build has no model runtime; rebuild with `--features with-tch`")
}
