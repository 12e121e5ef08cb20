//! Process-wide invalidation broadcast.
//!
//! A single named signal with any number of emitters and subscribers. Emission
//! is fire-and-forget with synchronous dispatch: currently registered
//! listeners run in registration order before `emit` returns. There is no
//! payload and no delivery guarantee beyond "currently registered listeners
//! receive it".

use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

type Listener = Box<dyn Fn() + Send + Sync>;

/// Handle returned by [`InvalidationChannel::subscribe`], used to detach the
/// listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

/// No-payload publish/subscribe channel.
///
/// Listeners run inline on the emitting task and must not subscribe or
/// unsubscribe from within dispatch (the registry lock is held). Listeners
/// must not assume a particular emission order across independent emitters.
#[derive(Default)]
pub struct InvalidationChannel {
    listeners: RwLock<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl InvalidationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Box::new(listener)));
        Subscription(id)
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != subscription.0);
    }

    /// Dispatch to all currently registered listeners, in registration order.
    pub fn emit(&self) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        trace!(listeners = listeners.len(), "invalidation signal");
        for (_, listener) in listeners.iter() {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emit_reaches_all_subscribers() {
        let channel = InvalidationChannel::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            channel.subscribe(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        channel.emit();
        channel.emit();
        assert_eq!(count.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let channel = InvalidationChannel::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            channel.subscribe(move || {
                order.lock().unwrap().push(tag);
            });
        }

        channel.emit();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribed_listener_no_longer_fires() {
        let channel = InvalidationChannel::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_for_listener = count.clone();
        let subscription = channel.subscribe(move || {
            count_for_listener.fetch_add(1, Ordering::SeqCst);
        });

        channel.emit();
        channel.unsubscribe(subscription);
        channel.emit();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn emit_without_listeners_is_a_no_op() {
        let channel = InvalidationChannel::new();
        channel.emit();
    }
}
