//! Interrupt sources as swappable handler slots.
//!
//! Each hardware source (SPU IRQ, SPU DMA completion) holds exactly one
//! handler. Installing a handler hands back the previous one inside a
//! [`Subscription`], and unsubscribing puts it back, so drivers can be
//! stacked and torn down in reverse order.
//!
//! On hardware the platform's vector calls [`InterruptSource::trigger()`] on
//! a static [`InterruptLine`]; in tests the harness calls it directly to
//! simulate the device.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use spin::Mutex;

/// Interrupt handler.
pub type Handler = Arc<dyn Fn() + Send + Sync>;

/// Proof of an installed handler, carrying the handler it replaced.
#[must_use = "dropping a subscription leaks the previous handler instead of restoring it"]
pub struct Subscription {
    previous: Option<Handler>,
}

impl Subscription {
    pub fn new(previous: Option<Handler>) -> Self {
        Subscription { previous }
    }

    /// The handler that was installed before this subscription.
    pub fn into_previous(self) -> Option<Handler> {
        self.previous
    }

    pub fn had_previous(&self) -> bool {
        self.previous.is_some()
    }
}

/// A single interrupt source that handlers can be attached to.
pub trait InterruptSource {
    /// Install `handler`, returning a subscription holding the previous one.
    fn subscribe(&self, handler: Handler) -> Subscription;

    /// Reinstall the handler saved in `subscription`.
    fn unsubscribe(&self, subscription: Subscription);

    /// Run the installed handler, if any, as if the interrupt fired.
    ///
    /// Call from the interrupt vector, with the stream interrupt sources
    /// masked: installed stream handlers rely on it.
    fn trigger(&self);
}

impl<T: InterruptSource + ?Sized> InterruptSource for Arc<T> {
    fn subscribe(&self, handler: Handler) -> Subscription {
        (**self).subscribe(handler)
    }

    fn unsubscribe(&self, subscription: Subscription) {
        (**self).unsubscribe(subscription)
    }

    fn trigger(&self) {
        (**self).trigger()
    }
}

impl<T: InterruptSource + ?Sized> InterruptSource for &'static T {
    fn subscribe(&self, handler: Handler) -> Subscription {
        (**self).subscribe(handler)
    }

    fn unsubscribe(&self, subscription: Subscription) {
        (**self).unsubscribe(subscription)
    }

    fn trigger(&self) {
        (**self).trigger()
    }
}

/// Software interrupt line with one handler slot.
pub struct InterruptLine {
    name: &'static str,
    handler: Mutex<Option<Handler>>,
    triggered: AtomicU32,
}

impl InterruptLine {
    pub const fn new(name: &'static str) -> Self {
        InterruptLine {
            name,
            handler: Mutex::new(None),
            triggered: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_subscribed(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Number of times [`trigger()`](InterruptSource::trigger) has run.
    pub fn trigger_count(&self) -> u32 {
        self.triggered.load(Ordering::Relaxed)
    }
}

impl InterruptSource for InterruptLine {
    fn subscribe(&self, handler: Handler) -> Subscription {
        let previous = self.handler.lock().replace(handler);
        log::trace!("{}: handler installed", self.name);
        Subscription::new(previous)
    }

    fn unsubscribe(&self, subscription: Subscription) {
        *self.handler.lock() = subscription.into_previous();
        log::trace!("{}: handler restored", self.name);
    }

    fn trigger(&self) {
        self.triggered.fetch_add(1, Ordering::Relaxed);
        // Release the slot before running: the handler may trigger other lines.
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Handler) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handler: Handler = Arc::new(move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
        (count, handler)
    }

    #[test]
    fn trigger_without_handler_is_noop() {
        let line = InterruptLine::new("test");
        line.trigger();
        assert_eq!(line.trigger_count(), 1);
        assert!(!line.is_subscribed());
    }

    #[test]
    fn subscribe_replaces_and_unsubscribe_restores() {
        let line = InterruptLine::new("test");
        let (first_count, first) = counter();
        let (second_count, second) = counter();

        let sub1 = line.subscribe(first);
        assert!(!sub1.had_previous());
        line.trigger();

        let sub2 = line.subscribe(second);
        assert!(sub2.had_previous());
        line.trigger();
        line.trigger();

        assert_eq!(first_count.load(Ordering::Relaxed), 1);
        assert_eq!(second_count.load(Ordering::Relaxed), 2);

        line.unsubscribe(sub2);
        line.trigger();
        assert_eq!(first_count.load(Ordering::Relaxed), 2);

        line.unsubscribe(sub1);
        assert!(!line.is_subscribed());
    }

    #[test]
    fn handler_may_trigger_another_line() {
        let inner = Arc::new(InterruptLine::new("inner"));
        let outer = InterruptLine::new("outer");
        let (count, handler) = counter();
        let _inner_sub = inner.subscribe(handler);

        let chained = inner.clone();
        let _outer_sub = outer.subscribe(Arc::new(move || chained.trigger()));
        outer.trigger();

        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn static_line() {
        static LINE: InterruptLine = InterruptLine::new("static");
        let (count, handler) = counter();
        let source: &'static InterruptLine = &LINE;
        let sub = InterruptSource::subscribe(&source, handler);
        InterruptSource::trigger(&source);
        InterruptSource::unsubscribe(&source, sub);
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
