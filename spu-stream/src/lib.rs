//! # spu-stream
//!
//! A `no_std` (+ `alloc`) driver that streams PCM/ADPCM audio from a ring
//! buffer in main RAM to the PlayStation SPU, driven entirely by the SPU IRQ
//! and SPU DMA-completion interrupts.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Config | [`config`] / [`error`] | Stream parameters, validation errors |
//! | Memory | [`ring`] | Byte ring buffer shared with the IRQ handler |
//! | Platform | [`irq`] | Critical sections, interrupt sources, active-stream slot |
//! | Hardware | [`spu`] | `Spu` trait, register map, `RegisterSpu` driver |
//! | Streaming | [`stream`] | `SpuDevice`, `Stream`, interrupt handlers |
//! | Data | [`adpcm`] | Loop-flag helpers for producers |
//!
//! ## Quick start
//!
//! ```ignore
//! use spu_stream::config::{ChannelMask, StreamConfig};
//! use spu_stream::irq::InterruptLine;
//! use spu_stream::stream::{SpuDevice, Stream};
//!
//! static SPU_IRQ: InterruptLine = InterruptLine::new("spu");
//! static SPU_DMA: InterruptLine = InterruptLine::new("spu-dma");
//!
//! let device = SpuDevice::new(spu, cs, &SPU_IRQ, &SPU_DMA);
//! let config = StreamConfig::new(ChannelMask::new(0b11), 0x800, 0x1010, 44_100, 0x10000)
//!     .on_refill(|| REFILL.store(true, Ordering::Relaxed));
//!
//! let mut stream = Stream::new(&device, config)?;
//! stream.write(&first_chunks);
//! stream.start(false);
//!
//! // From the platform's interrupt vector:
//! SPU_IRQ.trigger();   // on IRQ9 / SPU
//! SPU_DMA.trigger();   // on DMA4 completion
//! ```
//!
//! ## Stream parameters
//!
//! - **Chunk:** `interleave × channels` bytes, uploaded per SPU IRQ
//! - **SPU RAM:** two chunks at `spu_address` (double buffer)
//! - **Ring buffer:** a whole number of chunks, allocated once at init

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod constants;
pub mod error;
pub mod config;
pub mod ring;
pub mod irq;
pub mod spu;
pub mod stream;
pub mod adpcm;

pub use config::{ChannelMask, StreamConfig};
pub use error::StreamError;
pub use stream::{SpuDevice, Stream};

#[cfg(test)]
mod testing;
