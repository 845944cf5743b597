//! Errors reported while setting up a stream.
//!
//! Only initialization can fail. Runtime conditions (another stream already
//! active, underrun) are reported through return values and callbacks.

use thiserror::Error;

/// Reasons [`Stream::new`](crate::stream::Stream::new) rejects a configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The channel mask selects no voices.
    #[error("channel mask selects no voices")]
    NoChannels,

    /// The channel mask selects a voice the SPU does not have.
    #[error("voice {channel} is out of range")]
    ChannelOutOfRange { channel: u32 },

    /// A chunk would be empty.
    #[error("interleave must be non-zero")]
    ZeroInterleave,

    /// SPU RAM addresses are programmed in 8-byte units.
    #[error("spu address {spu_address:#x} and interleave {interleave} must be multiples of 8")]
    Misaligned { spu_address: u32, interleave: usize },

    /// Both half-buffers must lie inside SPU RAM.
    #[error("half-buffers end at {end:#x}, past the end of SPU RAM")]
    OutsideSpuRam { end: u64 },

    /// Chunks must tile the ring buffer exactly so each one is contiguous.
    #[error("buffer size {buffer_size} is not a non-zero multiple of chunk size {chunk_size}")]
    BufferNotChunkAligned { buffer_size: usize, chunk_size: usize },

    /// The refill threshold can never be crossed from above.
    #[error("refill threshold {threshold} must be below buffer size {buffer_size}")]
    ThresholdTooLarge { threshold: usize, buffer_size: usize },

    /// The ring buffer storage could not be allocated.
    #[error("failed to allocate {bytes} bytes of ring buffer storage")]
    Allocation { bytes: usize },
}

pub type Result<T> = core::result::Result<T, StreamError>;
