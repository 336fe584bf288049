//! Subscriber registry used to publish interception events.
//!
//! Publishers hold a [`CallbackRegistry`] and broadcast to whatever is
//! registered without knowing the subscribers. Broadcasting works on a
//! snapshot of the subscriber list, so a subscriber may register or
//! unregister (itself or others) while a broadcast is running.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::error;

use crate::types::HookResult;
use crate::util::panic_message;

/// Identifies one subscriber inside one registry.
///
/// Issued monotonically starting at 1 and never reused by the same registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackHandle(u64);

impl CallbackHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Result of one broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastReport {
    /// Subscribers that returned normally.
    pub delivered: usize,
    /// Subscribers that panicked.
    pub failed: usize,
}

type Snapshot<F> = SmallVec<[(CallbackHandle, Arc<F>); 4]>;

pub struct CallbackRegistry<F: ?Sized> {
    next_handle: AtomicU64,
    subscribers: Mutex<Snapshot<F>>,
}

impl<F: ?Sized> CallbackRegistry<F> {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            subscribers: Mutex::new(SmallVec::new()),
        }
    }

    /// Adds a subscriber at the end of the delivery order.
    pub fn register(&self, callback: Box<F>) -> CallbackHandle {
        let handle = CallbackHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((handle, Arc::from(callback)));
        handle
    }

    /// Removes a subscriber. Unknown handles are ignored and return `false`.
    ///
    /// A broadcast already in progress still delivers to the removed
    /// subscriber if it was part of that broadcast's snapshot.
    pub fn unregister(&self, handle: CallbackHandle) -> bool {
        let mut subscribers = self.subscribers.lock();
        match subscribers.iter().position(|(h, _)| *h == handle) {
            Some(index) => {
                subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    fn snapshot(&self) -> Snapshot<F> {
        self.subscribers
            .lock()
            .iter()
            .map(|(handle, callback)| (*handle, Arc::clone(callback)))
            .collect()
    }

    /// Invokes every subscriber in registration order on the calling thread.
    ///
    /// A panicking subscriber is logged and counted; the rest still run.
    pub fn broadcast(&self, mut invoke: impl FnMut(&F)) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for (handle, callback) in self.snapshot() {
            match catch_unwind(AssertUnwindSafe(|| invoke(&callback))) {
                Ok(()) => report.delivered += 1,
                Err(payload) => {
                    error!(
                        "Subscriber {} panicked: {}",
                        handle.id(),
                        panic_message(payload.as_ref())
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Broadcast for intercepted calls.
    ///
    /// Every subscriber observes the call; the first one to return
    /// `Handled` decides the result.
    pub fn intercept<R>(&self, mut invoke: impl FnMut(&F) -> HookResult<R>) -> HookResult<R> {
        let mut result = HookResult::PassThrough;
        for (handle, callback) in self.snapshot() {
            match catch_unwind(AssertUnwindSafe(|| invoke(&callback))) {
                Ok(HookResult::Handled(value)) if !result.is_handled() => {
                    result = HookResult::Handled(value);
                }
                Ok(_) => {}
                Err(payload) => {
                    error!(
                        "Hook subscriber {} panicked: {}",
                        handle.id(),
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        result
    }
}

impl<F: ?Sized> Default for CallbackRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    type Listener = dyn Fn(u32) + Send + Sync;

    #[test]
    fn test_handles_are_monotonic() {
        let registry: CallbackRegistry<Listener> = CallbackRegistry::new();
        let first = registry.register(Box::new(|_| {}));
        let second = registry.register(Box::new(|_| {}));
        assert!(second > first);
        assert!(registry.unregister(second));
        let third = registry.register(Box::new(|_| {}));
        assert!(third > second, "handles are never reused");
    }

    #[test]
    fn test_broadcast_in_registration_order() {
        let registry: CallbackRegistry<Listener> = CallbackRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..4u32 {
            let order = order.clone();
            registry.register(Box::new(move |value| order.lock().push((tag, value))));
        }

        let report = registry.broadcast(|callback| callback(9));
        assert_eq!(report, BroadcastReport { delivered: 4, failed: 0 });
        assert_eq!(*order.lock(), vec![(0, 9), (1, 9), (2, 9), (3, 9)]);
    }

    #[test]
    fn test_unregister_unknown_handle_is_noop() {
        let registry: CallbackRegistry<Listener> = CallbackRegistry::new();
        let handle = registry.register(Box::new(|_| {}));
        assert!(registry.unregister(handle));
        assert!(!registry.unregister(handle));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let registry: CallbackRegistry<Listener> = CallbackRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let before = hits.clone();
        registry.register(Box::new(move |_| {
            before.fetch_add(1, Ordering::SeqCst);
        }));
        registry.register(Box::new(|_| panic!("subscriber failure")));
        let after = hits.clone();
        registry.register(Box::new(move |_| {
            after.fetch_add(1, Ordering::SeqCst);
        }));

        let report = registry.broadcast(|callback| callback(1));
        assert_eq!(report, BroadcastReport { delivered: 2, failed: 1 });
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // Still usable afterwards
        let report = registry.broadcast(|callback| callback(2));
        assert_eq!(report.failed, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_unregister_during_broadcast_keeps_snapshot() {
        let registry: Arc<CallbackRegistry<Listener>> = Arc::new(CallbackRegistry::new());
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let victim_slot = Arc::new(Mutex::new(None::<CallbackHandle>));

        let reg = registry.clone();
        let slot = victim_slot.clone();
        let log = delivered.clone();
        registry.register(Box::new(move |_| {
            log.lock().push("remover");
            if let Some(handle) = slot.lock().take() {
                assert!(reg.unregister(handle));
            }
        }));
        let log = delivered.clone();
        let victim = registry.register(Box::new(move |_| log.lock().push("victim")));
        let log = delivered.clone();
        registry.register(Box::new(move |_| log.lock().push("bystander")));
        *victim_slot.lock() = Some(victim);

        registry.broadcast(|callback| callback(0));
        assert_eq!(*delivered.lock(), vec!["remover", "victim", "bystander"]);

        delivered.lock().clear();
        registry.broadcast(|callback| callback(0));
        assert_eq!(*delivered.lock(), vec!["remover", "bystander"]);
    }

    #[test]
    fn test_register_during_broadcast_applies_next_time() {
        let registry: Arc<CallbackRegistry<Listener>> = Arc::new(CallbackRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let reg = registry.clone();
        let counter = hits.clone();
        registry.register(Box::new(move |_| {
            let counter = counter.clone();
            reg.register(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        registry.broadcast(|callback| callback(0));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 2);

        registry.broadcast(|callback| callback(0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_intercept_first_handled_wins() {
        let registry: CallbackRegistry<dyn Fn(i32) -> HookResult<i32> + Send + Sync> =
            CallbackRegistry::new();
        let observed = Arc::new(AtomicUsize::new(0));

        let seen = observed.clone();
        registry.register(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            HookResult::PassThrough
        }));
        registry.register(Box::new(|value| HookResult::Handled(value * 2)));
        registry.register(Box::new(|_| panic!("hook failure")));
        let seen = observed.clone();
        registry.register(Box::new(move |value| {
            seen.fetch_add(1, Ordering::SeqCst);
            HookResult::Handled(value * 3)
        }));

        assert_eq!(registry.intercept(|hook| hook(5)), HookResult::Handled(10));
        assert_eq!(observed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_intercept_without_subscribers_passes_through() {
        let registry: CallbackRegistry<dyn Fn() -> HookResult<()> + Send + Sync> =
            CallbackRegistry::new();
        assert_eq!(registry.intercept(|hook| hook()), HookResult::PassThrough);
    }
}
