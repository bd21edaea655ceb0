//! Revocable subscription handles.
//!
//! Every `on_*` / `subscribe` call on a collaborator hands back a
//! [`Subscription`]. Revoking it (explicitly or by dropping it) removes the
//! callback it registered. Revocation runs at most once.

use scopeguard::ScopeGuard;

/// Boxed revocation action.
type Revoker = Box<dyn FnOnce() + Send>;

fn run_revoker(revoke: Revoker) {
    revoke();
}

/// Handle to one registered callback. Dropping it revokes the callback.
pub struct Subscription {
    guard: Option<ScopeGuard<Revoker, fn(Revoker)>>,
}

impl Subscription {
    /// Wrap a revocation action.
    pub fn new<F>(revoke: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let revoke: Revoker = Box::new(revoke);
        Self {
            guard: Some(scopeguard::guard(revoke, run_revoker as fn(Revoker))),
        }
    }

    /// A subscription with nothing to revoke.
    #[must_use]
    pub fn empty() -> Self {
        Self { guard: None }
    }

    /// Revoke now. Later calls are no-ops.
    pub fn revoke(&mut self) {
        // Dropping the guard runs the revoker.
        drop(self.guard.take());
    }

    /// Whether the revocation action has not run yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.guard.is_some()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// An owned set of subscriptions revoked together.
#[derive(Debug, Default)]
pub struct Subscriptions {
    held: Vec<Subscription>,
}

impl Subscriptions {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a subscription.
    pub fn push(&mut self, subscription: Subscription) {
        self.held.push(subscription);
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Whether no subscriptions are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Revoke every held subscription, in registration order.
    pub fn revoke_all(&mut self) {
        for mut subscription in self.held.drain(..) {
            subscription.revoke();
        }
    }

    /// Move every held subscription out, leaving the set empty.
    ///
    /// Lets the owner revoke outside of a lock.
    #[must_use]
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}
