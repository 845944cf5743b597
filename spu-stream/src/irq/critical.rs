//! Scoped interrupt masking.
//!
//! Platforms provide two flavours of critical section:
//!
//! - **full**: masks every interrupt. Nestable: [`enter()`](CriticalSection::enter)
//!   reports whether it actually changed the mask, and only that caller
//!   unmasks again. Used for one-off setup/teardown (handler installation).
//! - **fast**: masks only the sources this crate shares state with. Cheap,
//!   used around every short read-modify-write of the ring cursors.
//!
//! Both are exposed as RAII guards so every exit path releases them. A guard
//! hands out [`Masked`] tokens, which state shared with the handlers asks for
//! in place of taking its own lock blindly.

use core::marker::PhantomData;

/// Proof that the interrupt sources shared with the stream handlers are
/// masked for `'cs`.
///
/// Borrowed from a [`FastGuard`] or [`FullGuard`]. The handlers themselves
/// run with those sources masked and create theirs with
/// [`Masked::assume()`].
#[derive(Debug, Clone, Copy)]
pub struct Masked<'cs> {
    _cs: PhantomData<&'cs ()>,
}

impl<'cs> Masked<'cs> {
    /// # Safety
    ///
    /// The stream interrupt sources must stay masked while the token is in
    /// use, as they are inside their own handlers.
    pub unsafe fn assume() -> Self {
        Masked { _cs: PhantomData }
    }
}

/// Platform interrupt masking primitives.
pub trait CriticalSection {
    /// Mask all interrupts.
    ///
    /// Returns `true` if interrupts were enabled before the call, i.e. the
    /// caller is responsible for calling [`exit()`](Self::exit).
    fn enter(&self) -> bool;

    /// Unmask all interrupts.
    fn exit(&self);

    /// Mask the interrupt sources shared with stream handlers.
    fn fast_enter(&self);

    /// Undo [`fast_enter()`](Self::fast_enter).
    fn fast_exit(&self);

    /// Enter a full critical section for the lifetime of the returned guard.
    fn full(&self) -> FullGuard<'_, Self>
    where
        Self: Sized,
    {
        let restore = self.enter();
        FullGuard { cs: self, restore }
    }

    /// Enter a fast critical section for the lifetime of the returned guard.
    fn fast(&self) -> FastGuard<'_, Self>
    where
        Self: Sized,
    {
        self.fast_enter();
        FastGuard { cs: self }
    }
}

/// Guard for a full critical section. Unmasks on drop only if entering it
/// did the masking.
#[must_use = "the critical section ends when the guard is dropped"]
pub struct FullGuard<'a, C: CriticalSection> {
    cs: &'a C,
    restore: bool,
}

impl<C: CriticalSection> FullGuard<'_, C> {
    /// Whether this guard will unmask interrupts when dropped.
    pub fn restores(&self) -> bool {
        self.restore
    }

    pub fn masked(&self) -> Masked<'_> {
        Masked { _cs: PhantomData }
    }
}

impl<C: CriticalSection> Drop for FullGuard<'_, C> {
    fn drop(&mut self) {
        if self.restore {
            self.cs.exit();
        }
    }
}

/// Guard for a fast critical section.
#[must_use = "the critical section ends when the guard is dropped"]
pub struct FastGuard<'a, C: CriticalSection> {
    cs: &'a C,
}

impl<C: CriticalSection> FastGuard<'_, C> {
    pub fn masked(&self) -> Masked<'_> {
        Masked { _cs: PhantomData }
    }
}

impl<C: CriticalSection> Drop for FastGuard<'_, C> {
    fn drop(&mut self) {
        self.cs.fast_exit();
    }
}
