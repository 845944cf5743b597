//! SPU register map and unit conversions.
//!
//! Register addresses are 32-bit bus addresses; every register holds a
//! 16-bit value. Addresses inside SPU RAM are programmed in 8-byte units.

// ── Voice registers ────────────────────────────────────────────────────────

/// Base address of voice 0's register block.
pub const SPU_VOICE_BASE: u32 = 0x1F80_1C00;

/// Distance between consecutive voice register blocks.
pub const SPU_VOICE_STRIDE: u32 = 0x10;

/// Sample rate (pitch) register offset. `0x1000` = 44.1 kHz.
pub const VOICE_PITCH: u32 = 0x4;

/// Start address register offset. Latched on key-on.
pub const VOICE_START_ADDR: u32 = 0x6;

/// ADSR register offsets.
/// - ADSR1 bits 15:8: attack mode/shift/step, bits 7:4: decay shift,
///   bits 3:0: sustain level
/// - ADSR2: sustain and release rates
pub const VOICE_ADSR1: u32 = 0x8;
pub const VOICE_ADSR2: u32 = 0xA;

/// Loop (repeat) address register offset. Written by the hardware when a
/// block with the loop-start flag is read; overwriting it afterwards
/// redirects the voice's next jump.
pub const VOICE_LOOP_ADDR: u32 = 0xE;

// ── Global registers ───────────────────────────────────────────────────────

/// Key-on (voices 0–15 low half, 16–23 high half).
pub const SPU_KEY_ON: u32 = 0x1F80_1D88;

/// Key-off, same layout as key-on.
pub const SPU_KEY_OFF: u32 = 0x1F80_1D8C;

/// IRQ watch address: the IRQ fires when any voice (or transfer) touches it.
pub const SPU_IRQ_ADDR: u32 = 0x1F80_1DA4;

/// Data transfer start address.
pub const SPU_TRANSFER_ADDR: u32 = 0x1F80_1DA6;

/// Control register.
/// - Bit 15 : SPU enable
/// - Bit 6  : IRQ enable (clearing it also acknowledges a pending IRQ)
/// - Bits 5:4: transfer mode (0=stop, 1=manual, 2=DMA write, 3=DMA read)
pub const SPU_CTRL: u32 = 0x1F80_1DAA;

/// Status register. Bit 10: data transfer busy.
pub const SPU_STAT: u32 = 0x1F80_1DAE;

pub const CTRL_IRQ_ENABLE: u16 = 1 << 6;

/// Control register transfer-mode field and its DMA-write setting.
pub const CTRL_TRANSFER_MODE_MASK: u16 = 0b11 << 4;
pub const CTRL_TRANSFER_DMA_WRITE: u16 = 0b10 << 4;

/// Status register: data transfer busy.
pub const STAT_TRANSFER_BUSY: u16 = 1 << 10;

/// Absolute address of a voice register.
pub const fn voice_register(voice: u8, offset: u32) -> u32 {
    SPU_VOICE_BASE + voice as u32 * SPU_VOICE_STRIDE + offset
}

/// Convert a byte address in SPU RAM to the 8-byte units used by address
/// registers.
pub const fn to_spu_address(byte_address: u32) -> u16 {
    (byte_address >> 3) as u16
}

/// Pitch register value for a sample rate in Hz (`0x1000` = 44.1 kHz).
pub fn pitch_for_rate(sample_rate: u32) -> u16 {
    let pitch = ((sample_rate as u64) << 12) / crate::constants::SPU_BASE_SAMPLE_RATE as u64;
    pitch.min(u16::MAX as u64) as u16
}
