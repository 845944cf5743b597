//! Interrupt plumbing shared by every stream.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`CriticalSection`] | Full/fast interrupt masking with RAII guards |
//! | [`InterruptSource`] / [`InterruptLine`] | Handler slot per hardware source |
//! | [`ActiveSlot`] | Which stream the handlers service |

pub mod critical;
pub mod line;
pub mod registry;

pub use critical::{CriticalSection, FastGuard, FullGuard, Masked};
pub use line::{Handler, InterruptLine, InterruptSource, Subscription};
pub use registry::ActiveSlot;
