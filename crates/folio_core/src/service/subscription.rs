//! Change listeners for the project store.
//!
//! # Responsibility
//! - Keep the list of registered change callbacks.
//! - Hand out `Subscription` handles that remove exactly one callback.
//!
//! # Invariants
//! - Each registered callback runs exactly once per `notify_all`.
//! - Callbacks run outside the registry lock, so they may read the store or
//!   unsubscribe themselves.
//! - `Subscription::unsubscribe` is idempotent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Shared callback list owned by one store instance.
#[derive(Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Listeners>>,
    notifications: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback and returns its removal handle.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let mut guard = lock(&self.inner);
        let id = guard.next_id;
        guard.next_id += 1;
        guard.entries.push((id, Arc::new(listener)));
        Subscription {
            registry: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Invokes every registered callback once.
    pub fn notify_all(&self) {
        let snapshot: Vec<Listener> = lock(&self.inner)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        self.notifications.fetch_add(1, Ordering::Relaxed);
        for listener in snapshot {
            listener();
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of notification rounds issued so far.
    pub fn notification_count(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }
}

/// Removal handle returned by `ProjectStore::subscribe`.
///
/// Dropping the handle keeps the callback registered; call `unsubscribe`.
#[derive(Debug, Clone)]
pub struct Subscription {
    registry: Weak<Mutex<Listeners>>,
    id: u64,
}

impl Subscription {
    /// Removes this callback. Later calls, or calls after the store is gone,
    /// are no-ops.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock(inner: &Mutex<Listeners>) -> std::sync::MutexGuard<'_, Listeners> {
    // Listeners never run under this lock; a poisoned list is still whole.
    inner
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
