//! SPU hardware access.
//!
//! The streaming core never touches registers directly; it drives the SPU
//! through the [`Spu`] trait so it can run against real hardware or a
//! simulated device. All addresses passed through the trait are byte
//! addresses in SPU RAM; implementations convert them with
//! [`registers::to_spu_address()`]; [`RegisterSpu`] is the stock
//! implementation over raw register access.

mod mmio;
pub mod registers;

pub use mmio::{RegisterBus, RegisterSpu};

use crate::config::ChannelMask;

/// Voice envelope register pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adsr {
    pub adsr1: u16,
    pub adsr2: u16,
}

impl Adsr {
    /// Instant attack to full volume, sustain at maximum, no release
    /// shaping. Streams are never keyed off mid-chunk, so the envelope only
    /// has to stay out of the way.
    pub const STREAM: Adsr = Adsr {
        adsr1: 0x00FF,
        adsr2: 0x0000,
    };
}

/// Register-level operations the streaming core needs from the SPU.
///
/// Methods take `&self`: they are called both from foreground code and from
/// interrupt handlers, and map to volatile register writes on hardware.
pub trait Spu {
    /// Set or clear the IRQ enable bit. Clearing it also acknowledges a
    /// pending IRQ.
    fn set_irq_enabled(&self, enabled: bool);

    /// Program the IRQ watch address.
    fn set_irq_address(&self, address: u32);

    /// Program the address a voice starts reading from on key-on.
    fn set_voice_start(&self, voice: u8, address: u32);

    /// Override the address a voice jumps to at its next loop-end flag.
    fn set_voice_loop(&self, voice: u8, address: u32);

    fn set_voice_pitch(&self, voice: u8, pitch: u16);

    fn set_voice_adsr(&self, voice: u8, adsr: Adsr);

    /// Start every voice in `voices` simultaneously.
    fn key_on(&self, voices: ChannelMask);

    /// Release every voice in `voices` simultaneously.
    fn key_off(&self, voices: ChannelMask);

    /// Begin uploading `data` to SPU RAM at `address`.
    ///
    /// Completion is signalled through the DMA interrupt source, which may
    /// be raised before this returns. Callers keep the stream interrupt
    /// sources masked.
    fn start_transfer(&self, address: u32, data: &[u8]);

    /// Poll whether the last upload has finished.
    fn is_transfer_complete(&self) -> bool;

    /// Block until the last upload has finished.
    fn wait_transfer(&self) {
        while !self.is_transfer_complete() {
            core::hint::spin_loop();
        }
    }
}
