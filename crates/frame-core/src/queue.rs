//! Bounded FIFO handoff between pipeline stages.
//!
//! A thin wrapper over a bounded crossbeam channel. The channel capacity is
//! sized to the frame pool, so a `push` can never block: a frame must be
//! allocated before it can be queued, and at most `capacity` frames exist.
//! Consumers use timed pops instead of busy checks, which also bounds how
//! long a stage can go without observing the shutdown flag.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::frame::Frame;

/// Thread-safe FIFO of frames.
///
/// Clones share the same underlying queue.
#[derive(Clone)]
pub struct FrameQueue {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

impl FrameQueue {
    /// Create a queue that can hold at most `capacity` frames.
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Append a frame.
    ///
    /// Never blocks when the capacity matches the frame pool's; the queue
    /// cannot be fuller than the number of live frames.
    pub fn push(&self, frame: Frame) {
        self.tx.send(frame).expect("frame queue disconnected");
    }

    /// Pop the oldest frame if one is immediately available.
    pub fn try_pop(&self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Pop the oldest frame, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Frame> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
