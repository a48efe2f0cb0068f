//! Change listeners shared by the store and the selection models.
//!
//! Listener IDs start at 1 and are never reused; 0 is never handed out so
//! callers can use it as "not registered". Callbacks run outside the
//! registry lock, so a listener may add or remove listeners or trigger
//! another notification. A panicking listener is logged and skipped.
//!
//! Notifications from different threads are serialized: all listeners for
//! one notification finish before the next notification starts. A nested
//! notification raised from inside a listener runs immediately on the same
//! thread.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

pub type ListenerId = u64;

/// A registered callback.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registered {
    next_id: ListenerId,
    listeners: BTreeMap<ListenerId, Listener>,
}

#[derive(Default)]
struct Dispatch {
    owner: Option<ThreadId>,
    depth: usize,
}

#[derive(Default)]
pub struct ListenerRegistry {
    registered: Mutex<Registered>,
    dispatch: Mutex<Dispatch>,
    turn: Condvar,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("count", &self.len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registered = lock(&self.registered);
        registered.next_id += 1;
        let id = registered.next_id;
        registered.listeners.insert(id, Arc::new(listener));
        id
    }

    /// Unknown IDs are ignored.
    pub fn remove(&self, id: ListenerId) {
        lock(&self.registered).listeners.remove(&id);
    }

    pub fn len(&self) -> usize {
        lock(&self.registered).listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every registered listener once, in registration order.
    pub fn notify(&self) {
        let _turn = self.enter();
        let snapshot: Vec<(ListenerId, Listener)> = lock(&self.registered)
            .listeners
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (id, listener) in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener())) {
                tracing::error!(listener = id, reason = panic_message(&*panic), "listener panicked");
            }
        }
    }

    fn enter(&self) -> DispatchTurn<'_> {
        let me = thread::current().id();
        let mut dispatch = lock(&self.dispatch);
        while dispatch.owner.is_some_and(|owner| owner != me) {
            dispatch = self
                .turn
                .wait(dispatch)
                .unwrap_or_else(PoisonError::into_inner);
        }
        dispatch.owner = Some(me);
        dispatch.depth += 1;
        DispatchTurn { registry: self }
    }
}

struct DispatchTurn<'a> {
    registry: &'a ListenerRegistry,
}

impl Drop for DispatchTurn<'_> {
    fn drop(&mut self) {
        let mut dispatch = lock(&self.registry.dispatch);
        dispatch.depth = dispatch.depth.saturating_sub(1);
        if dispatch.depth == 0 {
            dispatch.owner = None;
            self.registry.turn.notify_all();
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn ids_start_at_one_and_never_repeat() {
        let registry = ListenerRegistry::new();
        let a = registry.add(|| {});
        let b = registry.add(|| {});
        registry.remove(a);
        let c = registry.add(|| {});
        assert_eq!((a, b, c), (1, 2, 3));
        registry.remove(99);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = registry.add(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        registry.remove(id);
        registry.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.add(|| panic!("boom"));
        let counter = Arc::clone(&hits);
        registry.add(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify();
        registry.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listener_can_reenter_registry() {
        let registry = Arc::new(ListenerRegistry::new());
        let inner = Arc::clone(&registry);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        registry.add(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                inner.add(|| {});
                inner.notify();
            }
        });

        registry.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn notifications_from_threads_do_not_interleave() {
        let registry = Arc::new(ListenerRegistry::new());
        let active = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));
        {
            let active = Arc::clone(&active);
            let overlap = Arc::clone(&overlap);
            registry.add(move || {
                if active.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlap.fetch_add(1, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_millis(5));
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        registry.notify();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }
}
