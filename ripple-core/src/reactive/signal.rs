//! Signal Implementation
//!
//! A Signal is a standalone reactive field: one value with its own
//! dependency node, outside of any map. Reads and writes follow exactly the
//! rules of a reactive map field.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within an evaluation, the evaluating subscriber
//!    starts depending on it. If the value is a wrapped container, the
//!    subscriber also depends on the container's structural node.
//!
//! 2. Writing a value that is the same as the current one does nothing
//!    (NaN counts as the same as NaN).
//!
//! 3. Any other write stores the value, wraps it if observation is on, and
//!    notifies subscribers.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::dep::{Dep, DepId};
use crate::observer::{observe, track_field_read, Value};

/// A reactive cell holding one [`Value`].
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// ```
#[derive(Clone)]
pub struct Signal {
    dep: Dep,
    value: Rc<RefCell<Value>>,
    shallow: bool,
}

impl Signal {
    /// Create a new signal. Container values are made reactive.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::create(value.into(), false)
    }

    /// Create a signal that does not wrap or track into its value.
    pub fn shallow(value: impl Into<Value>) -> Self {
        Self::create(value.into(), true)
    }

    fn create(value: Value, shallow: bool) -> Self {
        if !shallow {
            observe(&value, false);
        }
        Self {
            dep: Dep::new(),
            value: Rc::new(RefCell::new(value)),
            shallow,
        }
    }

    pub fn id(&self) -> DepId {
        self.dep.id()
    }

    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Get the current value, tracking it if a subscriber is evaluating.
    pub fn get(&self) -> Value {
        let value = self.value.borrow().clone();
        track_field_read(&self.dep, &value, self.shallow);
        value
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Set a new value and notify subscribers if it changed.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        if self.value.borrow().same(&value) {
            return;
        }
        *self.value.borrow_mut() = value.clone();
        if !self.shallow {
            observe(&value, false);
        }
        self.dep.notify();
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = f(&self.get_untracked());
        self.set(next);
    }

    pub fn subscriber_count(&self) -> usize {
        self.dep.subscriber_count()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
