//! Dependency Nodes
//!
//! A [`Dep`] is the broadcast point of one reactive field (or of one
//! reactive container, for structural changes). It holds the ids of the
//! subscribers interested in it, in the order they subscribed.
//!
//! Deps reference subscribers by id only. The subscriber side holds the
//! `Dep` handles it depends on, so the graph has no ownership cycle: a Dep
//! lives as long as its field or some subscriber still references it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

use super::runtime::Runtime;
use super::SubscriberId;
use crate::config;

/// Unique identifier for a dependency node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(u64);

impl DepId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct DepInner {
    id: DepId,
    subscribers: RefCell<IndexSet<SubscriberId>>,
}

/// A dependency node. Cloning yields another handle to the same node.
#[derive(Clone)]
pub struct Dep(Rc<DepInner>);

impl Dep {
    pub fn new() -> Self {
        Self(Rc::new(DepInner {
            id: DepId::next(),
            subscribers: RefCell::new(IndexSet::new()),
        }))
    }

    pub fn id(&self) -> DepId {
        self.0.id
    }

    /// Register a subscriber. Only called while that subscriber is evaluating.
    pub(crate) fn add_subscriber(&self, subscriber: SubscriberId) {
        self.0.subscribers.borrow_mut().insert(subscriber);
    }

    /// Remove a subscriber. Does nothing if it is not subscribed.
    pub fn remove_subscriber(&self, subscriber: SubscriberId) {
        self.0.subscribers.borrow_mut().shift_remove(&subscriber);
    }

    /// Link this node with the currently evaluating subscriber, if any.
    pub fn depend(&self) {
        if let Some(subscriber) = Runtime::current_subscriber() {
            subscriber.add_dep(self);
        }
    }

    /// Tell every subscriber that the value behind this node changed.
    ///
    /// Works on a snapshot, so subscribers may subscribe or unsubscribe
    /// while the notification is in progress.
    pub fn notify(&self) {
        let mut subscribers: Vec<SubscriberId> =
            self.0.subscribers.borrow().iter().copied().collect();

        // Synchronous flushes run right here, so keep them in creation order.
        if !config::with_config(|c| c.async_flush) {
            subscribers.sort();
        }

        tracing::trace!(dep = self.0.id.0, count = subscribers.len(), "notify");

        for id in subscribers {
            if let Some(subscriber) = Runtime::lookup(id) {
                subscriber.update();
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    pub fn has_subscriber(&self, subscriber: SubscriberId) -> bool {
        self.0.subscribers.borrow().contains(&subscriber)
    }

    /// Subscriber ids in subscription order.
    pub fn subscribers(&self) -> Vec<SubscriberId> {
        self.0.subscribers.borrow().iter().copied().collect()
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.0.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
