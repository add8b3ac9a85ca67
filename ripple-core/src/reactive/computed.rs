//! Computed Values
//!
//! A Computed is a cached derived value backed by a lazy subscriber.
//!
//! # How Computed Values Work
//!
//! 1. Creation does not evaluate anything; the value starts dirty.
//!
//! 2. On access, a dirty value is evaluated and cached. Clean values are
//!    returned from the cache.
//!
//! 3. When a dependency changes, the subscriber is only marked dirty. No
//!    work happens until the value is read again.
//!
//! 4. A read from inside another evaluation makes the reader depend on
//!    every input of the computed value, so a change to those inputs
//!    invalidates the reader as well.

use std::fmt;
use std::rc::Rc;

use super::runtime::Runtime;
use super::{Expr, Subscriber, SubscriberId, SubscriberOptions};
use crate::error::{warn, ReactiveError};
use crate::observer::Value;
use crate::scope::Scope;

/// Receives the value assigned to a writable computed value.
pub type ComputedSetter = Rc<dyn Fn(Value) -> Result<(), ReactiveError>>;

/// A lazily evaluated, cached derived value.
#[derive(Clone)]
pub struct Computed {
    subscriber: Rc<Subscriber>,
    name: Rc<str>,
    setter: Option<ComputedSetter>,
}

impl Computed {
    /// Create an ownerless computed value.
    ///
    /// Keep the handle alive for as long as the value is used.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> Result<Value, ReactiveError> + 'static,
    {
        Self::with_owner(None, None, Expr::func(compute), None)
    }

    /// Create an ownerless computed value whose assignments go to `set`.
    pub fn with_setter<F, S>(compute: F, set: S) -> Self
    where
        F: Fn() -> Result<Value, ReactiveError> + 'static,
        S: Fn(Value) -> Result<(), ReactiveError> + 'static,
    {
        Self::with_owner(None, None, Expr::func(compute), Some(Rc::new(set)))
    }

    pub(crate) fn with_owner(
        owner: Option<&Scope>,
        name: Option<&str>,
        expr: Expr,
        setter: Option<ComputedSetter>,
    ) -> Self {
        let options = SubscriberOptions::default().lazy();
        let subscriber = Subscriber::build(owner, expr, None, options);
        let name: Rc<str> = Rc::from(name.unwrap_or_else(|| subscriber.expression()));
        Self {
            subscriber,
            name,
            setter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Assign to the computed value.
    ///
    /// The value is handed to the setter, which is expected to write the
    /// inputs; the cached value itself is never overwritten. Without a
    /// setter the assignment is dropped with a warning.
    pub fn set(&self, value: impl Into<Value>) -> Result<(), ReactiveError> {
        match &self.setter {
            Some(setter) => setter(value.into()),
            None => {
                warn(ReactiveError::ComputedWithoutSetter(self.name.to_string()));
                Ok(())
            }
        }
    }

    /// Get the current value, evaluating it first if it is dirty.
    pub fn get(&self) -> Result<Value, ReactiveError> {
        if self.subscriber.is_dirty() {
            self.subscriber.evaluate()?;
        }
        if Runtime::is_tracking() {
            self.subscriber.depend();
        }
        Ok(self.subscriber.value())
    }

    pub fn is_dirty(&self) -> bool {
        self.subscriber.is_dirty()
    }

    pub fn id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    pub fn subscriber(&self) -> &Rc<Subscriber> {
        &self.subscriber
    }

    pub fn dispose(&self) {
        self.subscriber.teardown();
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("name", &self.name)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
