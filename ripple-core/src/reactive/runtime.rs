//! Reactive Runtime
//!
//! The runtime is the registry that connects dependency nodes to the
//! subscribers they notify. Deps only store subscriber ids; the runtime
//! resolves an id back to a live subscriber.
//!
//! # How It Works
//!
//! 1. When a subscriber is created, it registers with the runtime.
//!
//! 2. When a field is read inside an evaluation, the field's Dep asks the
//!    runtime for the current subscriber and links itself with it.
//!
//! 3. When a field changes, its Dep resolves each subscribed id and calls
//!    `update()` on the ones still alive.
//!
//! The registry holds weak references, so it never keeps a subscriber
//! alive on its own. Owners (a [`Scope`](crate::Scope) or a handle such as
//! [`Effect`](super::Effect)) hold the strong references.
//!
//! # Thread Confinement
//!
//! The registry is thread-local. Reactive state built on one thread is
//! only ever observed there; evaluating across threads would need
//! per-worker contexts and a thread-safe Dep, which this core does not
//! provide.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static REGISTRY: RefCell<HashMap<SubscriberId, Weak<Subscriber>>> = RefCell::new(HashMap::new());
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Register a subscriber with the runtime.
    pub fn register(subscriber: &Rc<Subscriber>) {
        REGISTRY.with(|registry| {
            registry
                .borrow_mut()
                .insert(subscriber.id(), Rc::downgrade(subscriber));
        });
    }

    /// Unregister a subscriber.
    pub fn unregister(id: SubscriberId) {
        let _ = REGISTRY.try_with(|registry| {
            registry.borrow_mut().remove(&id);
        });
    }

    /// Resolve an id to a live subscriber.
    pub fn lookup(id: SubscriberId) -> Option<Rc<Subscriber>> {
        REGISTRY.with(|registry| registry.borrow().get(&id).and_then(Weak::upgrade))
    }

    /// The subscriber currently collecting dependencies, if any.
    pub fn current_subscriber() -> Option<Rc<Subscriber>> {
        ReactiveContext::current_subscriber().and_then(Self::lookup)
    }

    /// Check if we're inside a tracking evaluation.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Number of live registered subscribers.
    pub fn subscriber_count() -> usize {
        REGISTRY.with(|registry| {
            registry
                .borrow()
                .values()
                .filter(|weak| weak.strong_count() > 0)
                .count()
        })
    }
}
