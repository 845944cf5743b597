//! [`Spu`] implementation over raw 16-bit register access.
//!
//! The driver is generic over a [`RegisterBus`], which supplies volatile
//! register reads and writes plus the SPU DMA channel. Platform crates
//! implement the bus on top of their MMIO and DMA layer.
//!
//! ```ignore
//! let spu = RegisterSpu::new(PsxBus::take());
//! let device = SpuDevice::new(spu, PsxCriticalSection, &SPU_IRQ, &SPU_DMA);
//! ```

use super::registers as reg;
use super::{Adsr, Spu};
use crate::config::ChannelMask;

/// Register and DMA access the SPU driver needs from the platform.
pub trait RegisterBus {
    /// Read a 16-bit register.
    fn read(&self, address: u32) -> u16;

    /// Write a 16-bit register.
    fn write(&self, address: u32, value: u16);

    /// Hand `data` to the SPU DMA channel. The SPU must already be in DMA
    /// write mode with its transfer address programmed.
    fn dma_write(&self, data: &[u8]);

    /// Whether the SPU DMA channel is still running.
    fn dma_busy(&self) -> bool;
}

/// SPU driver issuing register writes through a [`RegisterBus`].
pub struct RegisterSpu<B> {
    bus: B,
}

impl<B: RegisterBus> RegisterSpu<B> {
    pub fn new(bus: B) -> Self {
        RegisterSpu { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Read-modify-write: `new = (current & !mask) | value`.
    fn modify(&self, address: u32, value: u16, mask: u16) {
        let current = self.bus.read(address);
        self.bus.write(address, (current & !mask) | value);
    }

    /// Key-on and key-off are 24-bit masks split across two registers.
    fn write_voice_mask(&self, address: u32, voices: ChannelMask) {
        let bits = voices.bits();
        self.bus.write(address, bits as u16);
        self.bus.write(address + 2, (bits >> 16) as u16);
    }
}

impl<B: RegisterBus> Spu for RegisterSpu<B> {
    fn set_irq_enabled(&self, enabled: bool) {
        let value = if enabled { reg::CTRL_IRQ_ENABLE } else { 0 };
        self.modify(reg::SPU_CTRL, value, reg::CTRL_IRQ_ENABLE);
    }

    fn set_irq_address(&self, address: u32) {
        self.bus.write(reg::SPU_IRQ_ADDR, reg::to_spu_address(address));
    }

    fn set_voice_start(&self, voice: u8, address: u32) {
        self.bus.write(
            reg::voice_register(voice, reg::VOICE_START_ADDR),
            reg::to_spu_address(address),
        );
    }

    fn set_voice_loop(&self, voice: u8, address: u32) {
        self.bus.write(
            reg::voice_register(voice, reg::VOICE_LOOP_ADDR),
            reg::to_spu_address(address),
        );
    }

    fn set_voice_pitch(&self, voice: u8, pitch: u16) {
        self.bus.write(reg::voice_register(voice, reg::VOICE_PITCH), pitch);
    }

    fn set_voice_adsr(&self, voice: u8, adsr: Adsr) {
        self.bus.write(reg::voice_register(voice, reg::VOICE_ADSR1), adsr.adsr1);
        self.bus.write(reg::voice_register(voice, reg::VOICE_ADSR2), adsr.adsr2);
    }

    fn key_on(&self, voices: ChannelMask) {
        self.write_voice_mask(reg::SPU_KEY_ON, voices);
    }

    fn key_off(&self, voices: ChannelMask) {
        self.write_voice_mask(reg::SPU_KEY_OFF, voices);
    }

    fn start_transfer(&self, address: u32, data: &[u8]) {
        self.bus.write(reg::SPU_TRANSFER_ADDR, reg::to_spu_address(address));
        self.modify(
            reg::SPU_CTRL,
            reg::CTRL_TRANSFER_DMA_WRITE,
            reg::CTRL_TRANSFER_MODE_MASK,
        );
        self.bus.dma_write(data);
    }

    fn is_transfer_complete(&self) -> bool {
        !self.bus.dma_busy() && self.bus.read(reg::SPU_STAT) & reg::STAT_TRANSFER_BUSY == 0
    }
}
