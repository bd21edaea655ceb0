//! Listener registry keyed by event kind.
//!
//! One registry type serves the bridge's public events and the collaborators'
//! own event tables (see [`subscribe`]). Callbacks run synchronously, in
//! registration order.
//!
//! # Dispatch Semantics
//!
//! - Registering the same callback twice keeps both entries; both fire.
//! - Removal is by identity (`Arc` pointer), removing every matching entry.
//! - A callback returning `Err` stops the remaining dispatch for that emit and
//!   the error reaches the emitter. Listeners are not isolated from each other.
//!
//! # Re-entrancy
//!
//! [`emit_shared`] collects the callbacks under the lock, then releases it
//! before invoking them. Callbacks may therefore subscribe, revoke, or emit on
//! the same registry without deadlocking.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::subscription::Subscription;

/// A registered callback.
pub type Listener<E> = Arc<dyn Fn(&E) -> Result<()> + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener<E, F>(callback: F) -> Listener<E>
where
    F: Fn(&E) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(callback)
}

/// Ordered callback lists per event kind.
pub struct ListenerRegistry<K, E> {
    listeners: HashMap<K, Vec<Listener<E>>>,
}

impl<K, E> Default for ListenerRegistry<K, E> {
    fn default() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }
}

impl<K: std::fmt::Debug, E> std::fmt::Debug for ListenerRegistry<K, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("kinds", &self.listeners.keys().collect::<Vec<_>>())
            .field(
                "total_listeners",
                &self.listeners.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

impl<K, E> ListenerRegistry<K, E>
where
    K: Copy + Eq + Hash + std::fmt::Debug,
{
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback for `kind`.
    pub fn on(&mut self, kind: K, listener: Listener<E>) {
        self.listeners.entry(kind).or_default().push(listener);
    }

    /// Remove every entry identical to `listener` from `kind`.
    ///
    /// Logs a warning and does nothing when `kind` was never registered.
    /// Returns the number of entries removed.
    pub fn off(&mut self, kind: K, listener: &Listener<E>) -> usize {
        if !self.listeners.contains_key(&kind) {
            log::warn!("No listeners registered for {:?}", kind);
            return 0;
        }
        self.remove(kind, listener)
    }

    /// Like [`off`](Self::off) without the warning. Used by revocation,
    /// which may legitimately run after [`clear`](Self::clear).
    fn remove(&mut self, kind: K, listener: &Listener<E>) -> usize {
        let Some(list) = self.listeners.get_mut(&kind) else {
            return 0;
        };
        let before = list.len();
        list.retain(|registered| !Arc::ptr_eq(registered, listener));
        before - list.len()
    }

    /// Drop every listener of every kind.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Invoke every callback for `kind` with `event`.
    ///
    /// Returns how many callbacks ran.
    pub fn emit(&self, kind: K, event: &E) -> Result<usize> {
        match self.listeners.get(&kind) {
            Some(list) => dispatch(list, event),
            None => Ok(0),
        }
    }

    /// Snapshot of the callbacks currently registered for `kind`.
    #[must_use]
    pub fn listeners(&self, kind: K) -> Vec<Listener<E>> {
        self.listeners.get(&kind).cloned().unwrap_or_default()
    }

    /// Whether any callback is registered for `kind`.
    #[must_use]
    pub fn has_listeners(&self, kind: K) -> bool {
        self.listeners.get(&kind).is_some_and(|list| !list.is_empty())
    }

    /// Total callbacks across all kinds.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }
}

/// Invoke `listeners` in order, stopping at the first error.
pub fn dispatch<E>(listeners: &[Listener<E>], event: &E) -> Result<usize> {
    for listener in listeners {
        listener(event)?;
    }
    Ok(listeners.len())
}

/// Registry shared between an event source and its subscribers.
pub type SharedRegistry<K, E> = Arc<Mutex<ListenerRegistry<K, E>>>;

/// Create a new shared registry.
#[must_use]
pub fn new_shared_registry<K, E>() -> SharedRegistry<K, E> {
    Arc::new(Mutex::new(ListenerRegistry::default()))
}

/// Register `listener` on a shared registry and return a handle that removes
/// it again.
///
/// The handle holds only a weak reference to the registry.
pub fn subscribe<K, E>(registry: &SharedRegistry<K, E>, kind: K, listener: Listener<E>) -> Subscription
where
    K: Copy + Eq + Hash + std::fmt::Debug + Send + 'static,
    E: 'static,
{
    registry
        .lock()
        .expect("Listener registry mutex poisoned")
        .on(kind, Arc::clone(&listener));

    let weak = Arc::downgrade(registry);
    Subscription::new(move || {
        if let Some(registry) = weak.upgrade() {
            registry
                .lock()
                .expect("Listener registry mutex poisoned")
                .remove(kind, &listener);
        }
    })
}

/// Emit on a shared registry without holding its lock during dispatch.
pub fn emit_shared<K, E>(registry: &SharedRegistry<K, E>, kind: K, event: &E) -> Result<usize>
where
    K: Copy + Eq + Hash + std::fmt::Debug,
{
    let listeners = registry
        .lock()
        .expect("Listener registry mutex poisoned")
        .listeners(kind);
    // Lock released here
    dispatch(&listeners, event)
}
