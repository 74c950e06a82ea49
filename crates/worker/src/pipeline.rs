//! The three-stage pipeline: ingress → inference → egress.
//!
//! Ingress and egress run on their own named threads; the inference loop
//! runs on the calling thread. The stages share the frame pool, the two
//! bounded queues, the drop counters, and the shutdown flag. Every frame
//! is owned by exactly one stage (or queued between two) at any instant,
//! and every exit path returns its blocks to the pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use detect_core::Detect;
use frame_core::{codec, Frame, FramePool, FrameQueue, PoolExhausted};
use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, error, info, warn};

use crate::counters::{DropKind, PipelineCounters};
use crate::transport::{PullEndpoint, PushEndpoint};

/// Quality of the re-encoded egress JPEG.
const EGRESS_JPEG_QUALITY: u8 = 50;
/// How long a stage waits on its input before rechecking the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Everything the three stages share.
pub struct Worker {
    pool: Arc<FramePool>,
    unprocessed: FrameQueue,
    processed: FrameQueue,
    counters: Arc<PipelineCounters>,
    shutdown: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(pool_capacity: usize) -> Self {
        Self {
            pool: Arc::new(FramePool::new(pool_capacity)),
            unprocessed: FrameQueue::bounded(pool_capacity),
            processed: FrameQueue::bounded(pool_capacity),
            counters: Arc::new(PipelineCounters::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag observed by all three stages; setting it stops the pipeline
    /// within one poll interval per stage.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn counters(&self) -> Arc<PipelineCounters> {
        Arc::clone(&self.counters)
    }

    pub fn pool(&self) -> Arc<FramePool> {
        Arc::clone(&self.pool)
    }

    /// Run until the shutdown flag is set, then join the side threads and
    /// drain any in-flight frames back into the pool.
    pub fn run<Pull, Push>(
        &self,
        pull: Pull,
        push: Push,
        detector: &mut dyn Detect,
        threshold: f32,
    ) -> Result<()>
    where
        Pull: PullEndpoint + 'static,
        Push: PushEndpoint + 'static,
    {
        let ingress = {
            let pool = Arc::clone(&self.pool);
            let queue = self.unprocessed.clone();
            let counters = Arc::clone(&self.counters);
            let shutdown = Arc::clone(&self.shutdown);
            thread::Builder::new()
                .name("worker-ingress".into())
                .spawn(move || ingress_loop(pull, &pool, &queue, &counters, &shutdown))
                .context("failed to spawn ingress thread")?
        };

        let egress = {
            let pool = Arc::clone(&self.pool);
            let queue = self.processed.clone();
            let counters = Arc::clone(&self.counters);
            let shutdown = Arc::clone(&self.shutdown);
            thread::Builder::new()
                .name("worker-egress".into())
                .spawn(move || egress_loop(push, &pool, &queue, &counters, &shutdown))
                .context("failed to spawn egress thread")?
        };

        self.inference_loop(detector, threshold);

        if ingress.join().is_err() {
            error!("ingress thread panicked");
        }
        if egress.join().is_err() {
            error!("egress thread panicked");
        }
        self.drain();
        Ok(())
    }

    fn inference_loop(&self, detector: &mut dyn Detect, threshold: f32) {
        while !self.shutdown.load(Ordering::Relaxed) {
            let Some(mut frame) = self.unprocessed.pop_timeout(POLL_INTERVAL) else {
                continue;
            };
            match process_frame(&mut frame, detector, threshold) {
                Ok(()) => {
                    self.processed.push(frame);
                    metrics::gauge!("worker_queue_depth", "queue" => "processed")
                        .set(self.processed.len() as f64);
                }
                Err(kind) => {
                    self.counters.record(kind);
                    self.pool.free(frame);
                }
            }
        }
    }

    fn drain(&self) {
        let mut reclaimed = 0usize;
        while let Some(frame) = self.unprocessed.try_pop() {
            self.pool.free(frame);
            reclaimed += 1;
        }
        while let Some(frame) = self.processed.try_pop() {
            self.pool.free(frame);
            reclaimed += 1;
        }
        if reclaimed > 0 {
            info!(reclaimed, "returned in-flight frames to the pool");
        }
    }
}

/// Pull envelopes off the wire and turn them into queued frames.
fn ingress_loop(
    mut pull: impl PullEndpoint,
    pool: &FramePool,
    queue: &FrameQueue,
    counters: &PipelineCounters,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let payload = match pull.recv(POLL_INTERVAL) {
            Ok(Some(payload)) => payload,
            Ok(None) => continue,
            Err(err) => {
                counters.record(DropKind::TransportError);
                error!(%err, "receive failed");
                thread::sleep(POLL_INTERVAL);
                continue;
            }
        };
        if payload.is_empty() {
            continue;
        }

        let mut frame = match pool.alloc() {
            Ok(frame) => frame,
            Err(PoolExhausted) => {
                counters.record(DropKind::PoolExhausted);
                warn!("frame pool exhausted, dropping envelope");
                continue;
            }
        };
        match codec::decode(&payload, &mut frame) {
            Ok(()) => {
                debug!(seq = ?frame.sequence(), msg_len = frame.msg().len(), "frame received");
                queue.push(frame);
                metrics::gauge!("worker_queue_depth", "queue" => "unprocessed")
                    .set(queue.len() as f64);
            }
            Err(err) => {
                counters.record(DropKind::EnvelopeMalformed);
                debug!(%err, "dropping malformed envelope");
                pool.free(frame);
            }
        }
    }
}

/// Decode, detect, annotate, and re-encode one frame in place.
fn process_frame(
    frame: &mut Frame,
    detector: &mut dyn Detect,
    threshold: f32,
) -> Result<(), DropKind> {
    let seq = frame.sequence().ok_or(DropKind::EnvelopeMalformed)?;

    let decoded = image::load_from_memory(frame.msg().bytes()).map_err(|err| {
        debug!(seq, %err, "image decode failed");
        DropKind::ImageDecodeFailed
    })?;
    let mut image = decoded.to_rgb8();

    let started = Instant::now();
    if let Err(err) = detector.detect(&image, threshold) {
        warn!(seq, %err, "inference failed");
        return Err(DropKind::InferenceFailed);
    }
    let elapsed = started.elapsed();
    metrics::histogram!("worker_detect_seconds").record(elapsed.as_secs_f64());
    debug!(seq, elapsed_ms = elapsed.as_millis() as u64, "detector pass");

    let report = detector.report(seq);
    frame.det_mut().set(report.as_bytes()).map_err(|err| {
        debug!(seq, %err, "detection result dropped");
        DropKind::ResultOverflow
    })?;

    detector.draw(&mut image);

    let mut jpeg = Vec::with_capacity(image.as_raw().len() / 4);
    JpegEncoder::new_with_quality(&mut jpeg, EGRESS_JPEG_QUALITY)
        .encode_image(&image)
        .map_err(|err| {
            debug!(seq, %err, "image encode failed");
            DropKind::ImageDecodeFailed
        })?;
    frame.msg_mut().set(&jpeg).map_err(|err| {
        debug!(seq, %err, "encoded image dropped");
        DropKind::ResultOverflow
    })?;

    Ok(())
}

/// Envelope processed frames and hand them to the sink.
fn egress_loop(
    mut push: impl PushEndpoint,
    pool: &FramePool,
    queue: &FrameQueue,
    counters: &PipelineCounters,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let Some(frame) = queue.pop_timeout(POLL_INTERVAL) else {
            continue;
        };
        match codec::encode(&frame) {
            Ok(envelope) => match push.send(&envelope) {
                Ok(()) => {
                    debug!(seq = ?frame.sequence(), len = envelope.len(), "frame forwarded")
                }
                Err(err) => {
                    counters.record(DropKind::TransportError);
                    error!(%err, "send failed");
                }
            },
            Err(err) => {
                counters.record(DropKind::EnvelopeMalformed);
                warn!(%err, "frame could not be enveloped");
            }
        }
        pool.free(frame);
    }
}
