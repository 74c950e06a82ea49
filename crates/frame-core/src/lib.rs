//! Frame plumbing shared by the worker's pipeline stages: preallocated block
//! pools, the three-buffer frame and its pool, the bounded queues that hand
//! frames between stages, and the wire codec for the envelope format.

pub use frame::{
    BufferOverflow, Frame, FrameBuf, FramePool, DEFAULT_POOL_CAPACITY, DET_CAPACITY, ENVELOPE_MAX,
    MSG_CAPACITY, SEQ_CAPACITY,
};
pub use pool::{Block, BlockPool, PoolExhausted};
pub use queue::FrameQueue;

pub mod codec;
pub mod frame;
pub mod pool;
pub mod queue;
