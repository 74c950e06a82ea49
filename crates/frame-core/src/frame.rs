//! The unit of work: a frame bundling three fixed-capacity buffers, and the
//! pool that hands frames out.
//!
//! A frame is either *pooled* (its blocks sit on the free lists) or *live*
//! (owned by exactly one pipeline stage or queued between two of them).
//! Because the buffers are moved, never shared, a live frame always has a
//! single writer.

use std::fmt;

use thiserror::Error;

use crate::pool::{Block, BlockPool, PoolExhausted};

/// Capacity of the sequence-identifier buffer.
pub const SEQ_CAPACITY: usize = 100;
/// Capacity of the image payload buffer.
pub const MSG_CAPACITY: usize = 76_800;
/// Capacity of the detection-result buffer.
pub const DET_CAPACITY: usize = 25_600;
/// Upper bound on a wire envelope carrying one frame.
pub const ENVELOPE_MAX: usize = MSG_CAPACITY * 2;
/// Default number of frames a pool can keep in flight.
pub const DEFAULT_POOL_CAPACITY: usize = 5_000;

/// Error returned when content does not fit a frame buffer.
///
/// The last byte of every buffer is reserved as a sentinel, so the largest
/// storable content is one byte short of the capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("content of {len} bytes does not fit a {capacity}-byte frame buffer")]
pub struct BufferOverflow {
    pub len: usize,
    pub capacity: usize,
}

/// One fixed-capacity buffer plus the length of its current content.
pub struct FrameBuf {
    data: Block,
    len: usize,
}

impl FrameBuf {
    fn new(data: Block) -> Self {
        Self { data, len: 0 }
    }

    /// Current content.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Replace the content, keeping the recorded length strictly below the
    /// capacity and writing a zero sentinel right after it.
    pub fn set(&mut self, content: &[u8]) -> Result<(), BufferOverflow> {
        if content.len() >= self.data.len() {
            return Err(BufferOverflow {
                len: content.len(),
                capacity: self.data.len(),
            });
        }
        self.data[..content.len()].copy_from_slice(content);
        self.data[content.len()] = 0;
        self.len = content.len();
        Ok(())
    }

    /// Forget the content without touching the underlying block.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl fmt::Debug for FrameBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuf")
            .field("len", &self.len)
            .field("capacity", &self.data.len())
            .finish()
    }
}

/// A sequence identifier, an image payload, and a detection result moving
/// through the pipeline together.
#[derive(Debug)]
pub struct Frame {
    seq: FrameBuf,
    msg: FrameBuf,
    det: FrameBuf,
}

impl Frame {
    pub fn seq(&self) -> &FrameBuf {
        &self.seq
    }

    pub fn msg(&self) -> &FrameBuf {
        &self.msg
    }

    pub fn det(&self) -> &FrameBuf {
        &self.det
    }

    pub fn seq_mut(&mut self) -> &mut FrameBuf {
        &mut self.seq
    }

    pub fn msg_mut(&mut self) -> &mut FrameBuf {
        &mut self.msg
    }

    pub fn det_mut(&mut self) -> &mut FrameBuf {
        &mut self.det
    }

    /// Parse the sequence buffer as the decimal identifier assigned upstream.
    pub fn sequence(&self) -> Option<u64> {
        std::str::from_utf8(self.seq.bytes()).ok()?.parse().ok()
    }

    /// Reset all three content lengths without touching pool state.
    pub fn reset(&mut self) {
        self.seq.clear();
        self.msg.clear();
        self.det.clear();
    }
}

/// Pool of frames backed by three block pools, one per buffer kind.
///
/// The three pools share one capacity, so a frame can be assembled exactly
/// when none of them is exhausted; a partial assembly is rolled back before
/// the failure is reported.
pub struct FramePool {
    seq: BlockPool,
    msg: BlockPool,
    det: BlockPool,
}

impl FramePool {
    /// Preallocate `capacity` frames' worth of blocks.
    pub fn new(capacity: usize) -> Self {
        Self {
            seq: BlockPool::new(SEQ_CAPACITY, capacity),
            msg: BlockPool::new(MSG_CAPACITY, capacity),
            det: BlockPool::new(DET_CAPACITY, capacity),
        }
    }

    #[cfg(test)]
    fn with_capacities(seq: usize, msg: usize, det: usize) -> Self {
        Self {
            seq: BlockPool::new(SEQ_CAPACITY, seq),
            msg: BlockPool::new(MSG_CAPACITY, msg),
            det: BlockPool::new(DET_CAPACITY, det),
        }
    }

    /// Assemble a frame from one block of each kind, all lengths zero.
    pub fn alloc(&self) -> Result<Frame, PoolExhausted> {
        let seq = self.seq.acquire()?;
        let msg = match self.msg.acquire() {
            Ok(block) => block,
            Err(err) => {
                self.seq.release(seq);
                return Err(err);
            }
        };
        let det = match self.det.acquire() {
            Ok(block) => block,
            Err(err) => {
                self.seq.release(seq);
                self.msg.release(msg);
                return Err(err);
            }
        };
        Ok(Frame {
            seq: FrameBuf::new(seq),
            msg: FrameBuf::new(msg),
            det: FrameBuf::new(det),
        })
    }

    /// Return a frame's blocks to their pools, consuming the frame.
    pub fn free(&self, frame: Frame) {
        self.seq.release(frame.seq.data);
        self.msg.release(frame.msg.data);
        self.det.release(frame.det.data);
    }

    /// Number of frames that can still be allocated.
    pub fn available(&self) -> usize {
        self.seq
            .available()
            .min(self.msg.available())
            .min(self.det.available())
    }

    pub fn capacity(&self) -> usize {
        self.seq.capacity()
    }
}

// Frames compare by content in tests; production code never needs equality.
#[cfg(test)]
impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.seq.bytes() == other.seq.bytes()
            && self.msg.bytes() == other.msg.bytes()
            && self.det.bytes() == other.det.bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_yields_empty_buffers() {
        let pool = FramePool::new(2);
        let frame = pool.alloc().unwrap();
        assert_eq!(frame.seq().len(), 0);
        assert_eq!(frame.msg().len(), 0);
        assert_eq!(frame.det().len(), 0);
        assert_eq!(frame.seq().capacity(), SEQ_CAPACITY);
        assert_eq!(frame.msg().capacity(), MSG_CAPACITY);
        assert_eq!(frame.det().capacity(), DET_CAPACITY);
        assert_eq!(pool.available(), 1);
        pool.free(frame);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn set_rejects_content_at_capacity() {
        let pool = FramePool::new(1);
        let mut frame = pool.alloc().unwrap();

        let fits = vec![0xAB; SEQ_CAPACITY - 1];
        frame.seq_mut().set(&fits).unwrap();
        assert_eq!(frame.seq().bytes(), fits.as_slice());

        let too_big = vec![0xAB; SEQ_CAPACITY];
        assert_eq!(
            frame.seq_mut().set(&too_big),
            Err(BufferOverflow {
                len: SEQ_CAPACITY,
                capacity: SEQ_CAPACITY,
            })
        );
        // a rejected write leaves the previous content in place
        assert_eq!(frame.seq().bytes(), fits.as_slice());
        pool.free(frame);
    }

    #[test]
    fn partial_allocation_rolls_back() {
        let pool = FramePool::with_capacities(2, 1, 2);
        let held = pool.alloc().unwrap();

        // the message pool is exhausted; the sequence block taken by this
        // attempt must come back
        assert_eq!(pool.alloc(), Err(PoolExhausted));
        assert_eq!(pool.seq.available(), 1);
        assert_eq!(pool.det.available(), 1);

        pool.free(held);
        assert!(pool.alloc().is_ok());
    }

    #[test]
    fn sequence_parses_ascii_decimal() {
        let pool = FramePool::new(1);
        let mut frame = pool.alloc().unwrap();
        frame.seq_mut().set(b"42").unwrap();
        assert_eq!(frame.sequence(), Some(42));

        frame.seq_mut().set(b"not a number").unwrap();
        assert_eq!(frame.sequence(), None);
        pool.free(frame);
    }

    #[test]
    fn reset_clears_lengths_only() {
        let pool = FramePool::new(1);
        let mut frame = pool.alloc().unwrap();
        frame.seq_mut().set(b"7").unwrap();
        frame.msg_mut().set(b"payload").unwrap();
        frame.det_mut().set(b"{}").unwrap();

        frame.reset();
        assert!(frame.seq().is_empty());
        assert!(frame.msg().is_empty());
        assert!(frame.det().is_empty());
        assert_eq!(pool.available(), 0);
        pool.free(frame);
    }
}
