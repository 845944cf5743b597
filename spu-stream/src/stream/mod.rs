//! Interrupt-driven PCM streaming into SPU RAM.
//!
//! A [`Stream`] owns a ring buffer that application code fills from outside
//! interrupt context. Two half-buffers in SPU RAM, each one chunk long, are
//! played back to back: while the voices play one half, the other is
//! refilled from the ring by the SPU IRQ handler.
//!
//! ## SPU RAM layout
//!
//! ```text
//! spu_address                spu_address + chunk_size
//! ┌──────────────────────────┬──────────────────────────┐
//! │ half 0                   │ half 1                   │
//! │ ch0 │ ch1 │ ... (interl.)│ ch0 │ ch1 │ ...          │
//! └──────────────────────────┴──────────────────────────┘
//! ```
//!
//! Every channel's slice must end with an ADPCM block carrying the loop-end
//! flag, so voices jump to their loop address at the end of each half. Fed
//! data is uploaded as-is; see [`adpcm::mark_loop_end()`](crate::adpcm::mark_loop_end)
//! for producers that need to set the flags.
//!
//! ## Usage
//!
//! ```ignore
//! let mut stream = Stream::new(&device, config)?;
//!
//! // Prime the buffer, then start.
//! while stream.write(decoder.next_bytes()) > 0 {}
//! stream.start(false);
//!
//! // Feed whenever the refill callback asks for data.
//! loop {
//!     let region = stream.feed_region();
//!     if region.is_empty() { break; }
//!     let n = decoder.read_into(region);
//!     stream.feed(n);
//! }
//! ```
//!
//! ## Concurrency
//!
//! Only one stream per [`SpuDevice`] plays at a time. Foreground access to
//! state the handlers share is wrapped in the platform's fast critical
//! section; handler installation and removal use the full one.

mod context;
mod device;
mod handlers;

pub use device::SpuDevice;

use alloc::sync::{Arc, Weak};

use crate::config::{ChannelMask, StreamConfig};
use crate::error::{Result, StreamError};
use crate::constants::{SPU_RAM_ALIGN, SPU_RAM_SIZE};
use crate::irq::{CriticalSection, Handler, InterruptSource, Masked, Subscription};
use crate::ring::RingStorage;
use crate::spu::registers::pitch_for_rate;
use crate::spu::{Adsr, Spu};

use context::Context;
use device::Hub;

/// One PCM stream and its ring buffer.
///
/// Creating a stream installs the SPU IRQ and DMA handlers; dropping it
/// restores the handlers that were installed before. Streams must therefore
/// be dropped in reverse creation order.
///
/// Dropping an active stream stops it first.
pub struct Stream<S: Spu, C: CriticalSection, I: InterruptSource> {
    hub: Arc<Hub<S, C, I>>,
    ctx: Arc<Context>,
    subscriptions: Option<(Subscription, Subscription)>,
}

impl<S, C, I> Stream<S, C, I>
where
    S: Spu + Send + Sync + 'static,
    C: CriticalSection + Send + Sync + 'static,
    I: InterruptSource + Send + Sync + 'static,
{
    /// Validate `config`, allocate the ring buffer and install the handlers.
    pub fn new(device: &SpuDevice<S, C, I>, config: StreamConfig) -> Result<Self> {
        validate(&config)?;

        let storage = RingStorage::try_new(config.buffer_size)?;
        let ctx = Arc::new(Context::new(config, storage));
        let hub = device.hub.clone();

        let subscriptions = {
            let _guard = hub.cs.full();
            let irq = hub.spu_irq.subscribe(handler(&hub, Hub::on_chunk_boundary));
            let dma = hub.dma_irq.subscribe(handler(&hub, Hub::on_transfer_complete));
            (irq, dma)
        };

        log::debug!(
            "stream init: voices {:#x}, chunk {} bytes, ring {} bytes @ spu {:#x}",
            ctx.channel_mask.bits(),
            ctx.chunk_size,
            ctx.buffer_size,
            ctx.spu_address
        );

        Ok(Stream {
            hub,
            ctx,
            subscriptions: Some(subscriptions),
        })
    }
}

/// Wrap a hub method as an interrupt handler. The handler holds a weak
/// reference so installed handlers never keep the device alive.
fn handler<S, C, I>(hub: &Arc<Hub<S, C, I>>, f: fn(&Hub<S, C, I>, Masked<'_>)) -> Handler
where
    S: Send + Sync + 'static,
    C: Send + Sync + 'static,
    I: Send + Sync + 'static,
{
    let hub: Weak<Hub<S, C, I>> = Arc::downgrade(hub);
    Arc::new(move || {
        if let Some(hub) = hub.upgrade() {
            // SAFETY: interrupt sources run their handlers from the vector
            // with the stream sources masked.
            f(&hub, unsafe { Masked::assume() });
        }
    })
}

fn validate(config: &StreamConfig) -> Result<()> {
    let mask = config.channel_mask;
    if mask.is_empty() {
        return Err(StreamError::NoChannels);
    }
    if !mask.fits_spu() {
        return Err(StreamError::ChannelOutOfRange {
            channel: mask.highest().unwrap_or_default(),
        });
    }
    if config.interleave == 0 {
        return Err(StreamError::ZeroInterleave);
    }
    if config.spu_address % SPU_RAM_ALIGN as u32 != 0 || config.interleave % SPU_RAM_ALIGN != 0 {
        return Err(StreamError::Misaligned {
            spu_address: config.spu_address,
            interleave: config.interleave,
        });
    }

    // Both halves must be addressable; this also bounds `chunk_size()`.
    let end = (config.interleave as u64)
        .checked_mul(2 * mask.count() as u64)
        .and_then(|halves| halves.checked_add(config.spu_address as u64))
        .unwrap_or(u64::MAX);
    if end > SPU_RAM_SIZE as u64 {
        return Err(StreamError::OutsideSpuRam { end });
    }

    let chunk_size = config.chunk_size();
    if config.buffer_size == 0 || config.buffer_size % chunk_size != 0 {
        return Err(StreamError::BufferNotChunkAligned {
            buffer_size: config.buffer_size,
            chunk_size,
        });
    }
    if config.refill_threshold >= config.buffer_size {
        return Err(StreamError::ThresholdTooLarge {
            threshold: config.refill_threshold,
            buffer_size: config.buffer_size,
        });
    }
    Ok(())
}

impl<S, C, I> Stream<S, C, I>
where
    S: Spu,
    C: CriticalSection,
    I: InterruptSource,
{
    /// Make this the active stream and start playback.
    ///
    /// With `resume == false` the first chunk is uploaded synchronously
    /// before the voices are keyed on. With `resume == true` the half-buffers
    /// are assumed to still hold the data left by [`SpuDevice::stop()`].
    ///
    /// Returns `false`, changing nothing, if any stream (including this one)
    /// is already active on the device.
    pub fn start(&self, resume: bool) -> bool {
        if !self.hub.with_active(|slot, cs| slot.try_acquire(&self.ctx, cs)) {
            log::debug!("stream start refused: device busy");
            return false;
        }

        let spu = &self.hub.spu;
        if !resume {
            self.pump();
            spu.wait_transfer();
        }

        let half = {
            let _guard = self.hub.cs.fast();
            let half = self.ctx.state.lock().db_active;
            half
        };
        let base = self.ctx.half_address(half);
        let pitch = pitch_for_rate(self.ctx.sample_rate());

        spu.key_off(self.ctx.channel_mask);
        for (voice, address) in self.ctx.voice_addresses(base) {
            spu.set_voice_start(voice, address);
            spu.set_voice_pitch(voice, pitch);
            spu.set_voice_adsr(voice, Adsr::STREAM);
        }

        // Queue the following chunk into the other half before the voices
        // start, so they have somewhere to jump.
        self.pump();
        spu.key_on(self.ctx.channel_mask);

        log::debug!(
            "stream started (resume: {}) from half {} @ {:#x}",
            resume,
            half,
            base
        );
        true
    }

    /// Change the playback rate. Takes effect immediately if the stream is
    /// playing, otherwise on the next [`start()`](Self::start).
    pub fn set_sample_rate(&self, sample_rate: u32) {
        self.ctx
            .sample_rate
            .store(sample_rate, core::sync::atomic::Ordering::Relaxed);

        if !self.is_active() {
            return;
        }
        let pitch = pitch_for_rate(sample_rate);
        for voice in self.ctx.channel_mask.voices() {
            self.hub.spu.set_voice_pitch(voice, pitch);
        }
        log::debug!("stream sample rate set to {} Hz", sample_rate);
    }

    pub fn sample_rate(&self) -> u32 {
        self.ctx.sample_rate()
    }

    /// Whether this stream is the one the device is servicing.
    pub fn is_active(&self) -> bool {
        self.hub.with_active(|slot, cs| slot.is_active(&self.ctx, cs))
    }

    /// Bytes that can be fed before the ring buffer is full.
    pub fn refill_length(&self) -> usize {
        self.with_state(|state| state.ring.free())
    }

    /// Writable region at the ring's head.
    ///
    /// Fill some prefix of it and commit with [`feed()`](Self::feed). The
    /// region is empty when the buffer is full. It never wraps: once it has
    /// been filled, the next call returns the region at the start of the
    /// buffer.
    ///
    /// While an upload is in flight the chunk being copied is still free
    /// space in the ring but is held back from the region.
    pub fn feed_region(&mut self) -> &mut [u8] {
        let chunk_size = self.ctx.chunk_size;
        let (head, length) = self.with_state(|state| {
            let ring = &state.ring;
            let writable = if state.buffering {
                ring.free().saturating_sub(chunk_size)
            } else {
                ring.free()
            };
            (ring.head(), ring.contiguous_free().min(writable))
        });

        // SAFETY: `[head, head + length)` is free space and excludes the
        // chunk an in-flight upload reads from. `&mut self` makes this the
        // only producer until the region is committed with `feed()`.
        unsafe { self.ctx.storage.region_mut(head, length) }
    }

    /// Commit `length` bytes written through [`feed_region()`](Self::feed_region).
    ///
    /// The length is clamped to the free space; the number of bytes
    /// committed is returned.
    pub fn feed(&mut self, length: usize) -> usize {
        let threshold = self.ctx.refill_threshold;
        self.with_state(|state| {
            let committed = state.ring.commit(length);
            if state.ring.len() > threshold {
                state.callback_issued = false;
            }
            committed
        })
    }

    /// Copy as much of `data` as fits into the ring buffer.
    ///
    /// Returns the number of bytes taken.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let mut written = 0;
        while written < data.len() {
            let region = self.feed_region();
            if region.is_empty() {
                break;
            }
            let n = region.len().min(data.len() - written);
            region[..n].copy_from_slice(&data[written..written + n]);
            written += self.feed(n);
        }
        written
    }

    /// Bytes currently buffered.
    pub fn buffered_length(&self) -> usize {
        self.with_state(|state| state.ring.len())
    }

    /// Chunks consumed since init.
    pub fn chunk_counter(&self) -> u32 {
        self.with_state(|state| state.chunk_counter)
    }

    /// Whether a chunk upload is in flight.
    pub fn is_buffering(&self) -> bool {
        self.with_state(|state| state.buffering)
    }

    /// Half-buffer (0 or 1) the most recent chunk was uploaded to.
    pub fn active_half(&self) -> u8 {
        self.with_state(|state| state.db_active)
    }

    /// Whether the refill callback has fired since the buffer last rose
    /// above the threshold.
    pub fn refill_requested(&self) -> bool {
        self.with_state(|state| state.callback_issued)
    }

    pub fn chunk_size(&self) -> usize {
        self.ctx.chunk_size
    }

    pub fn buffer_size(&self) -> usize {
        self.ctx.buffer_size
    }

    pub fn channel_mask(&self) -> ChannelMask {
        self.ctx.channel_mask
    }

    /// Tear the stream down. Equivalent to dropping it.
    pub fn destroy(self) {}

    /// Service a chunk boundary from foreground code.
    fn pump(&self) {
        let guard = self.hub.cs.fast();
        self.hub.on_chunk_boundary(guard.masked());
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut context::StreamState) -> R) -> R {
        let _guard = self.hub.cs.fast();
        let mut state = self.ctx.state.lock();
        f(&mut state)
    }
}

impl<S, C, I> Drop for Stream<S, C, I>
where
    S: Spu,
    C: CriticalSection,
    I: InterruptSource,
{
    fn drop(&mut self) {
        if self.is_active() {
            self.hub.stop();
        }

        if let Some((irq, dma)) = self.subscriptions.take() {
            let _guard = self.hub.cs.full();
            self.hub.dma_irq.unsubscribe(dma);
            self.hub.spu_irq.unsubscribe(irq);
        }
        log::debug!("stream destroyed");
    }
}
