//! Synchronous publish/subscribe registry
//!
//! Listeners are invoked after the owning component has released its own lock, so a
//! listener may read the component's state again without deadlocking. Every snapshot
//! carries the owner's revision number; one thread at a time drains the queue of
//! published snapshots, in revision order, and a snapshot older than one already
//! delivered is dropped. Listeners therefore always end on the latest state even when
//! several threads publish at once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Token returned by [`Subscribers::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
    /// Published but not yet delivered, keyed by revision
    pending: Vec<(u64, T)>,
    /// Highest revision handed to listeners
    delivered: u64,
    /// A thread is currently delivering
    draining: bool,
}

/// Listener registry delivering full snapshots of `T`
pub struct Subscribers<T> {
    registry: Mutex<Registry<T>>,
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                next_id: 1,
                listeners: Vec::new(),
                pending: Vec::new(),
                delivered: 0,
                draining: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the id was unknown (already unsubscribed)
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|(sid, _)| *sid != id);
        registry.listeners.len() != before
    }

    /// Publish `snapshot` at revision `rev` to every listener, in subscription order
    ///
    /// If another thread is already delivering, the snapshot is queued for it and this
    /// call returns at once. A listener that publishes again (directly or by mutating
    /// the owner) has its snapshot delivered after the current one finishes.
    pub fn notify(&self, rev: u64, snapshot: T) {
        {
            let mut registry = self.lock();
            registry.pending.push((rev, snapshot));
            if registry.draining {
                return;
            }
            registry.draining = true;
        }

        let mut drain = Drain {
            subscribers: self,
            armed: true,
        };

        loop {
            let (batch, listeners) = {
                let mut registry = self.lock();
                if registry.pending.is_empty() {
                    registry.draining = false;
                    drain.armed = false;
                    return;
                }

                let mut batch = std::mem::take(&mut registry.pending);
                batch.sort_by_key(|(rev, _)| *rev);
                let delivered = registry.delivered;
                batch.retain(|(rev, _)| {
                    let fresh = *rev > delivered;
                    if !fresh {
                        debug!(
                            "Dropping superseded snapshot rev {} (delivered {})",
                            rev, delivered
                        );
                    }
                    fresh
                });
                if let Some((last, _)) = batch.last() {
                    registry.delivered = *last;
                }

                // Clone the list so listeners can (un)subscribe while being notified
                let listeners: Vec<Listener<T>> = registry
                    .listeners
                    .iter()
                    .map(|(_, l)| Arc::clone(l))
                    .collect();
                (batch, listeners)
            };

            for (_, snapshot) in &batch {
                for listener in &listeners {
                    listener(snapshot);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the draining flag if a listener panics mid-delivery
struct Drain<'a, T> {
    subscribers: &'a Subscribers<T>,
    armed: bool,
}

impl<T> Drop for Drain<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.subscribers.lock().draining = false;
        }
    }
}
