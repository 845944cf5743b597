//! Stream configuration.
//!
//! A [`StreamConfig`] is copied into the stream at init time. Only the sample
//! rate can change afterwards, via
//! [`Stream::set_sample_rate()`](crate::stream::Stream::set_sample_rate).
//!
//! ```ignore
//! let config = StreamConfig::new(ChannelMask::new(0b11), 0x800, 0x1010, 44_100, 0x8000)
//!     .refill_threshold(0x4000)
//!     .on_refill(|| REFILL.store(true, Ordering::Relaxed))
//!     .on_underrun(|| UNDERRUNS.fetch_add(1, Ordering::Relaxed));
//! ```

use alloc::sync::Arc;
use core::fmt;

use crate::constants::SPU_VOICE_COUNT;

/// Notification invoked from interrupt context.
///
/// Keep these short: set a flag or wake a task. They run with the SPU
/// interrupt masked.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Set of SPU voices a stream plays on, one bit per voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelMask(u32);

impl ChannelMask {
    /// Build a mask from raw bits (bit N = voice N).
    pub const fn new(bits: u32) -> Self {
        ChannelMask(bits)
    }

    /// Raw mask bits, as written to the key-on/key-off registers.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Number of voices selected.
    pub const fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Highest selected voice, if any.
    pub const fn highest(self) -> Option<u32> {
        if self.0 == 0 {
            None
        } else {
            Some(31 - self.0.leading_zeros())
        }
    }

    /// Whether every selected voice exists on the SPU.
    pub const fn fits_spu(self) -> bool {
        (self.0 >> SPU_VOICE_COUNT) == 0
    }

    /// Iterate over selected voice indices, lowest first.
    pub fn voices(self) -> Voices {
        Voices { remaining: self.0 }
    }
}

/// Iterator over the voice indices of a [`ChannelMask`].
#[derive(Debug, Clone)]
pub struct Voices {
    remaining: u32,
}

impl Iterator for Voices {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.remaining == 0 {
            return None;
        }
        let voice = self.remaining.trailing_zeros();
        self.remaining &= self.remaining - 1;
        Some(voice as u8)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Voices {}

/// Parameters of a stream.
#[derive(Clone)]
pub struct StreamConfig {
    /// Voices used, one per interleaved channel in ascending voice order.
    pub channel_mask: ChannelMask,
    /// Bytes of each channel within one chunk.
    pub interleave: usize,
    /// SPU RAM address of the first half-buffer. The second half follows
    /// it directly, one chunk later.
    pub spu_address: u32,
    /// Playback sample rate in Hz.
    pub sample_rate: u32,
    /// Ring buffer capacity in bytes.
    pub buffer_size: usize,
    /// Buffered length at or below which `refill_callback` fires.
    pub refill_threshold: usize,
    pub refill_callback: Option<Callback>,
    pub underrun_callback: Option<Callback>,
}

impl StreamConfig {
    /// Create a configuration with no callbacks and a refill threshold of
    /// half the buffer.
    pub fn new(
        channel_mask: ChannelMask,
        interleave: usize,
        spu_address: u32,
        sample_rate: u32,
        buffer_size: usize,
    ) -> Self {
        StreamConfig {
            channel_mask,
            interleave,
            spu_address,
            sample_rate,
            buffer_size,
            refill_threshold: buffer_size / 2,
            refill_callback: None,
            underrun_callback: None,
        }
    }

    pub fn refill_threshold(mut self, threshold: usize) -> Self {
        self.refill_threshold = threshold;
        self
    }

    /// Called once each time the buffered length drops to or below the
    /// refill threshold.
    pub fn on_refill<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.refill_callback = Some(Arc::new(f));
        self
    }

    /// Called at a chunk boundary when less than one chunk is buffered.
    pub fn on_underrun<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.underrun_callback = Some(Arc::new(f));
        self
    }

    /// Bytes consumed per chunk boundary: `interleave * channels`.
    pub fn chunk_size(&self) -> usize {
        self.interleave * self.channel_mask.count()
    }
}

impl fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConfig")
            .field("channel_mask", &self.channel_mask)
            .field("interleave", &self.interleave)
            .field("spu_address", &self.spu_address)
            .field("sample_rate", &self.sample_rate)
            .field("buffer_size", &self.buffer_size)
            .field("refill_threshold", &self.refill_threshold)
            .field("refill_callback", &self.refill_callback.is_some())
            .field("underrun_callback", &self.underrun_callback.is_some())
            .finish()
    }
}
