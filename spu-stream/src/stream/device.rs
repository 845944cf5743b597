//! Device-wide state: the SPU, its interrupt sources and the active stream.

use alloc::sync::Arc;

use crate::constants::DUMMY_BLOCK_ADDR;
use crate::irq::{ActiveSlot, CriticalSection, InterruptSource, Masked};
use crate::spu::Spu;

use super::context::Context;

/// State shared by every stream on one SPU and by the installed handlers.
pub(crate) struct Hub<S, C, I> {
    pub spu: S,
    pub cs: C,
    pub spu_irq: I,
    pub dma_irq: I,
    pub active: ActiveSlot<Context>,
}

/// Handle to one SPU and the hardware collaborators streams run on.
///
/// Create one per SPU and pass it to [`Stream::new()`](super::Stream::new).
/// Cloning is cheap and yields another handle to the same device.
///
/// ```ignore
/// static SPU_IRQ: InterruptLine = InterruptLine::new("spu");
/// static SPU_DMA: InterruptLine = InterruptLine::new("spu-dma");
///
/// let device = SpuDevice::new(PsxSpu::take(), PsxCriticalSection, &SPU_IRQ, &SPU_DMA);
/// ```
pub struct SpuDevice<S, C, I> {
    pub(crate) hub: Arc<Hub<S, C, I>>,
}

impl<S, C, I> Clone for SpuDevice<S, C, I> {
    fn clone(&self) -> Self {
        SpuDevice {
            hub: self.hub.clone(),
        }
    }
}

impl<S, C, I> SpuDevice<S, C, I>
where
    S: Spu,
    C: CriticalSection,
    I: InterruptSource,
{
    /// Wrap the SPU together with its IRQ and DMA-completion sources.
    pub fn new(spu: S, cs: C, spu_irq: I, dma_irq: I) -> Self {
        SpuDevice {
            hub: Arc::new(Hub {
                spu,
                cs,
                spu_irq,
                dma_irq,
                active: ActiveSlot::new(),
            }),
        }
    }

    pub fn spu(&self) -> &S {
        &self.hub.spu
    }

    pub fn critical_section(&self) -> &C {
        &self.hub.cs
    }

    /// Whether any stream is currently playing on this device.
    pub fn has_active_stream(&self) -> bool {
        self.hub.with_active(|slot, cs| !slot.is_empty(cs))
    }

    /// Stop whichever stream is active.
    ///
    /// Waits for an in-flight upload to finish first. Returns `false` if no
    /// stream was active. A stopped stream keeps its buffered data and can
    /// be restarted with `start(true)`.
    pub fn stop(&self) -> bool {
        self.hub.stop()
    }
}

impl<S, C: CriticalSection, I> Hub<S, C, I> {
    /// Foreground access to the active slot, with the handlers masked.
    pub(crate) fn with_active<R>(
        &self,
        f: impl FnOnce(&ActiveSlot<Context>, Masked<'_>) -> R,
    ) -> R {
        let guard = self.cs.fast();
        f(&self.active, guard.masked())
    }
}

impl<S: Spu, C: CriticalSection, I> Hub<S, C, I> {
    pub(crate) fn stop(&self) -> bool {
        let Some(ctx) = self.with_active(|slot, cs| slot.current(cs)) else {
            return false;
        };

        // Let an in-flight upload land while the stream is still active, so
        // the completion handler clears its `buffering` flag.
        let buffering = {
            let _guard = self.cs.fast();
            let buffering = ctx.state.lock().buffering;
            buffering
        };
        if buffering {
            self.spu.wait_transfer();
        }

        // Voices keep reading SPU RAM even when released, so park them on the
        // silent dummy block where they cannot reach the watch address.
        self.spu.key_off(ctx.channel_mask);
        for voice in ctx.channel_mask.voices() {
            self.spu.set_voice_start(voice, DUMMY_BLOCK_ADDR);
        }
        self.spu.key_on(ctx.channel_mask);

        self.with_active(|slot, cs| slot.release(&ctx, cs));
        log::debug!("stream stopped on voices {:#x}", ctx.channel_mask.bits());
        true
    }
}
