use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::error;

/// Callback invoked with the new lock state on every transition.
pub type LockListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Token returned by `add_listener`, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Ordered listener registry. Insertion order is notification order and the
/// same callback may be registered more than once.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Vec<(ListenerId, LockListener)>,
    next_id: u64,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: LockListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    /// Returns `true` if the token was registered.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Removes every registration of this exact callback. Returns how many were dropped.
    pub fn remove_callback(&mut self, listener: &LockListener) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, entry)| !Arc::ptr_eq(entry, listener));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the callbacks in notification order, so they can run without
    /// the registry being borrowed.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LockListener> {
        self.entries.iter().map(|(_, listener)| Arc::clone(listener)).collect()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

/// Calls each listener in order. A panicking listener is logged and skipped;
/// the rest are still notified. Returns how many listeners panicked.
pub fn notify_all(listeners: &[LockListener], is_locked: bool) -> usize {
    let mut failures = 0;
    for (index, listener) in listeners.iter().enumerate() {
        if catch_unwind(AssertUnwindSafe(|| listener(is_locked))).is_err() {
            failures += 1;
            error!("Lock listener #{} panicked while handling locked={}", index, is_locked);
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (LockListener, Arc<Mutex<Vec<bool>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let listener: LockListener = Arc::new(move |locked: bool| sink.lock().unwrap().push(locked));
        (listener, calls)
    }

    #[test]
    fn test_ids_are_unique_and_removal_by_id() {
        let mut registry = ListenerRegistry::new();
        let (listener, _) = recorder();
        let a = registry.add(Arc::clone(&listener));
        let b = registry.add(listener);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_callback_drops_every_occurrence() {
        let mut registry = ListenerRegistry::new();
        let (dup, _) = recorder();
        let (other, _) = recorder();
        registry.add(Arc::clone(&dup));
        registry.add(Arc::clone(&other));
        registry.add(Arc::clone(&dup));

        assert_eq!(registry.remove_callback(&dup), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.remove_callback(&dup), 0);
    }

    #[test]
    fn test_notification_order_follows_insertion() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry.add(Arc::new(move |_: bool| order.lock().unwrap().push(tag)));
        }

        notify_all(&registry.snapshot(), true);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let mut registry = ListenerRegistry::new();
        registry.add(Arc::new(|_: bool| panic!("faulty subscriber")));
        let (listener, calls) = recorder();
        registry.add(listener);

        let failures = notify_all(&registry.snapshot(), true);
        assert_eq!(failures, 1);
        assert_eq!(*calls.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_notify_with_no_listeners() {
        assert_eq!(notify_all(&[], false), 0);
    }
}
