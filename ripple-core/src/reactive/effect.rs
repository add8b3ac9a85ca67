//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever the
//! reactive fields it read change. It is the ownerless form of a render
//! subscriber.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued on the scheduler
//!    and re-runs once in the next flush, however many of its dependencies
//!    changed.
//!
//! 3. Each run re-collects dependencies, so fields that are no longer read
//!    stop triggering the effect.

use std::cell::Cell;
use std::rc::Rc;

use super::{Expr, Subscriber, SubscriberId, SubscriberOptions};
use crate::error::{handle_error, ReactiveError};
use crate::observer::Value;

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let c = count.clone();
/// let effect = Effect::new(move || {
///     println!("Count is: {:?}", c.get());
/// });
///
/// count.set(5);  // Prints "Count is: Number(5)" on the next flush
/// ```
#[derive(Clone)]
pub struct Effect {
    subscriber: Rc<Subscriber>,
    run_count: Rc<Cell<usize>>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    /// Keep the handle alive for as long as the effect should run.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_options(run, SubscriberOptions::default())
    }

    /// Create an effect with explicit options (e.g. `sync`, `before`).
    pub fn with_options<F>(run: F, options: SubscriberOptions) -> Self
    where
        F: Fn() + 'static,
    {
        let run_count = Rc::new(Cell::new(0));
        let count = run_count.clone();
        let expr = Expr::func(move || {
            run();
            count.set(count.get() + 1);
            Ok(Value::Null)
        });

        let options = SubscriberOptions { lazy: false, ..options };
        let subscriber = Subscriber::build(None, expr, None, options);
        if let Err(err) = subscriber.run_initial() {
            handle_error(&err, "effect");
        }

        Self { subscriber, run_count }
    }

    pub fn id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    /// Run the effect function now, outside of the scheduler.
    pub fn execute(&self) -> Result<(), ReactiveError> {
        self.subscriber.run()
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.subscriber.teardown();
    }

    pub fn is_disposed(&self) -> bool {
        !self.subscriber.is_active()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.run_count.get()
    }

    pub fn dependency_count(&self) -> usize {
        self.subscriber.dependency_count()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
