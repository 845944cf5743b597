//! Per-stream state shared between foreground code and the handlers.

use core::sync::atomic::{AtomicU32, Ordering};

use spin::Mutex;

use crate::config::{Callback, ChannelMask, StreamConfig};
use crate::ring::{RingBuffer, RingStorage};

/// Mutable state, guarded by [`Context::state`].
#[derive(Debug)]
pub(crate) struct StreamState {
    pub ring: RingBuffer,
    /// Half-buffer (0 or 1) targeted by the most recent upload. The other
    /// half is the one currently playing.
    pub db_active: u8,
    /// An upload is in flight.
    pub buffering: bool,
    /// Chunks consumed since init.
    pub chunk_counter: u32,
    /// The refill callback has fired and the buffer has not risen above the
    /// threshold since.
    pub callback_issued: bool,
}

/// Everything the interrupt handlers need to service one stream.
pub(crate) struct Context {
    pub channel_mask: ChannelMask,
    pub interleave: usize,
    pub spu_address: u32,
    pub buffer_size: usize,
    pub refill_threshold: usize,
    pub chunk_size: usize,
    pub sample_rate: AtomicU32,
    pub refill_callback: Option<Callback>,
    pub underrun_callback: Option<Callback>,
    pub storage: RingStorage,
    pub state: Mutex<StreamState>,
}

impl Context {
    /// Build a context from an already validated configuration.
    pub fn new(config: StreamConfig, storage: RingStorage) -> Self {
        let chunk_size = config.chunk_size();
        Context {
            channel_mask: config.channel_mask,
            interleave: config.interleave,
            spu_address: config.spu_address,
            buffer_size: config.buffer_size,
            refill_threshold: config.refill_threshold,
            chunk_size,
            sample_rate: AtomicU32::new(config.sample_rate),
            refill_callback: config.refill_callback,
            underrun_callback: config.underrun_callback,
            state: Mutex::new(StreamState {
                ring: RingBuffer::new(config.buffer_size),
                db_active: 0,
                buffering: false,
                chunk_counter: 0,
                callback_issued: false,
            }),
            storage,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    /// SPU RAM address of half-buffer `half`.
    pub fn half_address(&self, half: u8) -> u32 {
        self.spu_address + half as u32 * self.chunk_size as u32
    }

    /// `(voice, address)` for every voice, given the start of a half-buffer.
    /// Each voice's data follows the previous one's, `interleave` bytes apart.
    pub fn voice_addresses(&self, base: u32) -> impl Iterator<Item = (u8, u32)> + '_ {
        let stride = self.interleave as u32;
        self.channel_mask
            .voices()
            .enumerate()
            .map(move |(i, voice)| (voice, base + i as u32 * stride))
    }
}
