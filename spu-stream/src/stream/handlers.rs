//! The two interrupt handlers that keep SPU RAM one chunk ahead of playback.
//!
//! ```text
//!             SPU IRQ (voice reached watch address)
//!                          │
//!        ┌─────────────────▼──────────────────┐
//!        │ disable IRQ                         │
//!        │ buffered < chunk? ── underrun ──────┼──► callback, re-enable IRQ
//!        │ flip db_active, buffering = true    │
//!        │ consume chunk from ring tail        │
//!        │ watch + loop addrs → target half    │
//!        │ start upload → target half          │
//!        └─────────────────┬──────────────────┘
//!                          │
//!             DMA IRQ (upload finished)
//!                          │
//!        ┌─────────────────▼──────────────────┐
//!        │ enable IRQ, buffering = false       │
//!        └────────────────────────────────────┘
//! ```
//!
//! The IRQ stays disabled while the upload runs: the transfer itself writes
//! to the watch address, and the voices must not be allowed to jump into a
//! half that is still being filled.

use crate::irq::Masked;
use crate::spu::Spu;

use super::context::Context;
use super::device::Hub;

/// Result of servicing a chunk boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkOutcome {
    Uploaded { refill: bool },
    Underrun { buffered: usize },
}

impl<S: Spu, C, I> Hub<S, C, I> {
    /// SPU IRQ handler: a voice reached the watch address, so the half it
    /// just left can be refilled.
    ///
    /// Foreground code priming a stream calls this too, inside the fast
    /// critical section, so an upload that finishes at once cannot run the
    /// completion handler while the state lock is held here.
    pub(crate) fn on_chunk_boundary(&self, cs: Masked<'_>) {
        // Acknowledging the IRQ means disabling it; it is re-enabled once the
        // next chunk has landed.
        self.spu.set_irq_enabled(false);

        let Some(ctx) = self.active.current(cs) else {
            return;
        };

        // Callbacks run after the state lock is released so they may query
        // the stream.
        match self.upload_next_chunk(&ctx) {
            ChunkOutcome::Uploaded { refill } => {
                if refill {
                    if let Some(callback) = &ctx.refill_callback {
                        callback();
                    }
                }
            }
            ChunkOutcome::Underrun { buffered } => {
                log::warn!(
                    "stream underrun: {} of {} bytes buffered",
                    buffered,
                    ctx.chunk_size
                );
                if let Some(callback) = &ctx.underrun_callback {
                    callback();
                }
                // Keep the IRQ alive so playback resumes once data arrives;
                // the voices replay stale data until then.
                self.spu.set_irq_enabled(true);
            }
        }
    }

    fn upload_next_chunk(&self, ctx: &Context) -> ChunkOutcome {
        let mut state = ctx.state.lock();

        let buffered = state.ring.len();
        let Some(offset) = state.ring.consume(ctx.chunk_size) else {
            return ChunkOutcome::Underrun { buffered };
        };

        state.db_active ^= 1;
        state.buffering = true;
        state.chunk_counter = state.chunk_counter.wrapping_add(1);

        let refill = state.ring.len() <= ctx.refill_threshold && !state.callback_issued;
        if refill {
            state.callback_issued = true;
        }

        // Fire the next IRQ when playback enters the half being filled now,
        // and make every voice jump there instead of looping over the half
        // it is playing.
        let address = ctx.half_address(state.db_active);
        self.spu.set_irq_address(address);
        for (voice, voice_address) in ctx.voice_addresses(address) {
            self.spu.set_voice_loop(voice, voice_address);
        }

        // SAFETY: these bytes were valid until the `consume()` above. Now
        // that `buffering` is set, `feed_region()` holds them back until the
        // completion handler clears it.
        let chunk = unsafe { ctx.storage.region(offset, ctx.chunk_size) };
        self.spu.start_transfer(address, chunk);

        log::trace!(
            "chunk {} -> half {} @ {:#x}, {} bytes left",
            state.chunk_counter,
            state.db_active,
            address,
            state.ring.len()
        );

        ChunkOutcome::Uploaded { refill }
    }

    /// DMA completion handler: the chunk has landed, arm the next boundary.
    pub(crate) fn on_transfer_complete(&self, cs: Masked<'_>) {
        self.spu.set_irq_enabled(true);

        if let Some(ctx) = self.active.current(cs) {
            ctx.state.lock().buffering = false;
        }
    }
}
