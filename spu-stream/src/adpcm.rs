//! SPU ADPCM block flags.
//!
//! Streamed data is uploaded verbatim, so each channel's slice of a chunk
//! must already end with a block flagged loop-end + repeat; that flag is
//! what makes the voice jump to the loop address the chunk handler
//! programs. Encoders normally emit it. These helpers are for producers that
//! build chunks from raw blocks.
//!
//! Block layout (16 bytes): `[shift/filter, flags, 14 data bytes]`.

use crate::constants::ADPCM_BLOCK_SIZE;

/// Flags byte: end of the looped region; jump to the loop address.
pub const FLAG_LOOP_END: u8 = 1 << 0;

/// Flags byte: keep playing after the jump (without it the voice releases).
pub const FLAG_LOOP_REPEAT: u8 = 1 << 1;

/// Flags byte: record this block's address as the loop address.
pub const FLAG_LOOP_START: u8 = 1 << 2;

const FLAGS_OFFSET: usize = 1;

/// Set loop-end + repeat on the last block of every channel in `chunk`.
///
/// `chunk` is split into `interleave`-byte channel slices; a trailing
/// partial slice is left alone. Nothing is marked if `interleave` is
/// shorter than one block.
pub fn mark_loop_end(chunk: &mut [u8], interleave: usize) {
    if interleave < ADPCM_BLOCK_SIZE {
        return;
    }
    for channel in chunk.chunks_exact_mut(interleave) {
        let flags = channel.len() - ADPCM_BLOCK_SIZE + FLAGS_OFFSET;
        channel[flags] |= FLAG_LOOP_END | FLAG_LOOP_REPEAT;
    }
}

/// Whether every channel slice in `chunk` ends with a repeating loop-end
/// block.
pub fn has_loop_end(chunk: &[u8], interleave: usize) -> bool {
    if interleave < ADPCM_BLOCK_SIZE {
        return false;
    }
    let mask = FLAG_LOOP_END | FLAG_LOOP_REPEAT;
    chunk.chunks_exact(interleave).all(|channel| {
        channel[channel.len() - ADPCM_BLOCK_SIZE + FLAGS_OFFSET] & mask == mask
    })
}
