/// Number of hardware voices on the SPU.
pub const SPU_VOICE_COUNT: usize = 24;

/// Size of SPU RAM in bytes.
pub const SPU_RAM_SIZE: u32 = 0x8_0000;

/// SPU RAM addresses are programmed in units of this many bytes.
pub const SPU_RAM_ALIGN: usize = 8;

/// Address of the 16-byte silent looping block parked voices read from.
///
/// All voices keep reading SPU RAM even when keyed off, so a stopped stream's
/// voices are pointed here to keep them away from the IRQ watch address.
pub const DUMMY_BLOCK_ADDR: u32 = 0x1000;

/// Size of one SPU ADPCM block in bytes (2 header bytes + 14 data bytes).
pub const ADPCM_BLOCK_SIZE: usize = 16;

/// Sample rate that corresponds to a voice pitch of `0x1000`.
pub const SPU_BASE_SAMPLE_RATE: u32 = 44_100;
