//! Subscribers
//!
//! A Subscriber is a computation unit bound to an expression. It evaluates
//! the expression inside a reactive context, remembers which dependency
//! nodes it read, and re-evaluates when one of them notifies.
//!
//! Every render function, computed value and explicit watch is a
//! subscriber; they differ only in their mode flags:
//!
//! - `lazy`: only marked dirty on change, evaluated on demand (computed).
//! - `sync`: re-run immediately on change instead of being queued.
//! - `deep`: collect dependencies on every nested reactive field.
//! - `user`: errors from the getter or callback are reported, not returned.
//!
//! # Dependency bookkeeping
//!
//! Each subscriber keeps two dependency sets: the ones read during the last
//! evaluation (`deps`) and the ones read during the current one
//! (`new_deps`). After an evaluation, nodes present only in `deps` are
//! unsubscribed and the sets are swapped. A node is registered with the
//! subscriber only the first time it is read in a cycle and only if it was
//! not already held from the previous cycle.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::dep::{Dep, DepId};
use super::expr::{Expr, Getter};
use super::runtime::Runtime;
use super::traverse::traverse;
use crate::error::{handle_error, ReactiveError};
use crate::observer::Value;
use crate::scheduler;
use crate::scope::{Scope, WeakScope};

/// Unique identifier for a subscriber.
///
/// Ids are handed out in creation order, which is also the order the
/// scheduler runs subscribers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Invoked with `(new_value, old_value)` when a subscriber's value changes.
pub type Callback = Rc<dyn Fn(&Value, &Value) -> Result<(), ReactiveError>>;

/// Mode flags for a subscriber.
#[derive(Clone, Default)]
pub struct SubscriberOptions {
    pub deep: bool,
    pub user: bool,
    pub lazy: bool,
    pub sync: bool,
    /// Runs right before the scheduler re-runs the subscriber.
    pub before: Option<Rc<dyn Fn()>>,
}

impl SubscriberOptions {
    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    pub fn user(mut self) -> Self {
        self.user = true;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    pub fn before(mut self, hook: impl Fn() + 'static) -> Self {
        self.before = Some(Rc::new(hook));
        self
    }
}

struct SubscriberState {
    value: Value,
    dirty: bool,
    active: bool,
    deps: IndexMap<DepId, Dep>,
    new_deps: IndexMap<DepId, Dep>,
}

/// A computation that re-evaluates when the reactive fields it read change.
pub struct Subscriber {
    id: SubscriberId,
    expression: String,
    getter: Getter,
    callback: Option<Callback>,
    deep: bool,
    user: bool,
    lazy: bool,
    sync: bool,
    before: Option<Rc<dyn Fn()>>,
    owner: Option<WeakScope>,
    state: RefCell<SubscriberState>,
}

impl Subscriber {
    /// Create a subscriber and, unless it is lazy, evaluate it once to
    /// collect its initial dependencies.
    ///
    /// A failing initial evaluation of a non-user subscriber tears the
    /// subscriber down again and returns the error.
    pub fn new(
        owner: Option<&Scope>,
        expr: Expr,
        callback: Option<Callback>,
        options: SubscriberOptions,
    ) -> Result<Rc<Self>, ReactiveError> {
        let subscriber = Self::build(owner, expr, callback, options);
        if !subscriber.lazy {
            if let Err(err) = subscriber.run_initial() {
                subscriber.teardown();
                return Err(err);
            }
        }
        Ok(subscriber)
    }

    /// First evaluation of a subscriber created with [`Subscriber::build`].
    pub(crate) fn run_initial(&self) -> Result<(), ReactiveError> {
        let value = self.get()?;
        self.state.borrow_mut().value = value;
        Ok(())
    }

    /// Create and register a subscriber without evaluating it.
    pub(crate) fn build(
        owner: Option<&Scope>,
        expr: Expr,
        callback: Option<Callback>,
        options: SubscriberOptions,
    ) -> Rc<Self> {
        let owner = owner.map(Scope::downgrade);
        let expression = expr.describe();
        let getter = expr.into_getter(owner.clone());

        let subscriber = Rc::new(Self {
            id: SubscriberId::new(),
            expression,
            getter,
            callback,
            deep: options.deep,
            user: options.user,
            lazy: options.lazy,
            sync: options.sync,
            before: options.before,
            owner,
            state: RefCell::new(SubscriberState {
                value: Value::Null,
                dirty: options.lazy,
                active: true,
                deps: IndexMap::new(),
                new_deps: IndexMap::new(),
            }),
        });

        Runtime::register(&subscriber);
        if let Some(scope) = subscriber.owner() {
            scope.add_subscriber(Rc::clone(&subscriber));
        }
        tracing::trace!(id = subscriber.id.0, expression = %subscriber.expression, "subscriber created");
        subscriber
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Human-readable name used in diagnostics.
    pub fn describe(&self) -> String {
        if self.user {
            format!("watcher with expression \"{}\"", self.expression)
        } else {
            format!("subscriber {} ({})", self.id, self.expression)
        }
    }

    /// The last evaluated value.
    pub fn value(&self) -> Value {
        self.state.borrow().value.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.borrow().dirty
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn is_user(&self) -> bool {
        self.user
    }

    pub fn owner(&self) -> Option<Scope> {
        self.owner.as_ref().and_then(WeakScope::upgrade)
    }

    pub(crate) fn before_hook(&self) -> Option<Rc<dyn Fn()>> {
        self.before.clone()
    }

    pub fn dependency_count(&self) -> usize {
        self.state.borrow().deps.len()
    }

    pub fn depends_on(&self, dep: DepId) -> bool {
        self.state.borrow().deps.contains_key(&dep)
    }

    /// Evaluate the getter and re-collect dependencies.
    pub fn get(&self) -> Result<Value, ReactiveError> {
        let ctx = ReactiveContext::enter(self.id);

        let result = match (self.getter)() {
            Ok(value) => Ok(value),
            Err(err) if self.user => {
                handle_error(&err, &format!("getter for watcher \"{}\"", self.expression));
                Ok(Value::Null)
            }
            Err(err) => Err(err),
        };

        if self.deep {
            if let Ok(value) = &result {
                traverse(value);
            }
        }

        drop(ctx);
        self.cleanup_deps();
        result
    }

    /// Record a dependency read during the current evaluation.
    pub(crate) fn add_dep(&self, dep: &Dep) {
        let id = dep.id();
        let mut state = self.state.borrow_mut();
        if state.new_deps.contains_key(&id) {
            return;
        }
        state.new_deps.insert(id, dep.clone());
        if !state.deps.contains_key(&id) {
            dep.add_subscriber(self.id);
        }
    }

    /// Drop subscriptions that were not renewed, then promote `new_deps`.
    fn cleanup_deps(&self) {
        let stale: Vec<Dep> = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let stale = state
                .deps
                .iter()
                .filter(|(id, _)| !state.new_deps.contains_key(*id))
                .map(|(_, dep)| dep.clone())
                .collect();
            std::mem::swap(&mut state.deps, &mut state.new_deps);
            state.new_deps.clear();
            stale
        };

        for dep in stale {
            dep.remove_subscriber(self.id);
        }
    }

    /// Called by a dependency node when it changes.
    pub fn update(self: &Rc<Self>) {
        if self.lazy {
            self.state.borrow_mut().dirty = true;
        } else if self.sync {
            if let Err(err) = self.run() {
                handle_error(&err, &format!("sync update of {}", self.describe()));
            }
        } else {
            scheduler::queue_subscriber(Rc::clone(self));
        }
    }

    /// Re-evaluate and fire the callback if the value changed.
    ///
    /// Maps, lists and deep values always fire, since they may have been
    /// mutated in place without changing identity.
    pub fn run(&self) -> Result<(), ReactiveError> {
        if !self.is_active() {
            return Ok(());
        }

        let value = self.get()?;
        let old = {
            let mut state = self.state.borrow_mut();
            if !value.same(&state.value) || value.is_object() || self.deep {
                Some(std::mem::replace(&mut state.value, value.clone()))
            } else {
                None
            }
        };

        let (Some(old), Some(callback)) = (old, self.callback.as_ref()) else {
            return Ok(());
        };

        match callback(&value, &old) {
            Err(err) if self.user => {
                handle_error(&err, &format!("callback for watcher \"{}\"", self.expression));
                Ok(())
            }
            result => result,
        }
    }

    /// Evaluate a lazy subscriber and clear its dirty flag.
    pub fn evaluate(&self) -> Result<(), ReactiveError> {
        let value = self.get()?;
        let mut state = self.state.borrow_mut();
        state.value = value;
        state.dirty = false;
        Ok(())
    }

    /// Make the current subscriber depend on everything this one read.
    pub fn depend(&self) {
        let deps: Vec<Dep> = self.state.borrow().deps.values().cloned().collect();
        for dep in deps.iter().rev() {
            dep.depend();
        }
    }

    /// Unsubscribe from every dependency node and deactivate.
    pub fn teardown(&self) {
        if !self.is_active() {
            return;
        }

        if let Some(scope) = self.owner() {
            if !scope.is_being_destroyed() {
                scope.remove_subscriber(self.id);
            }
        }

        let deps = std::mem::take(&mut self.state.borrow_mut().deps);
        for dep in deps.values().rev() {
            dep.remove_subscriber(self.id);
        }

        self.state.borrow_mut().active = false;
        Runtime::unregister(self.id);
        tracing::trace!(id = self.id.0, "subscriber torn down");
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for dep in state.deps.values().chain(state.new_deps.values()) {
            dep.remove_subscriber(self.id);
        }
        Runtime::unregister(self.id);
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("expression", &self.expression)
            .field("lazy", &self.lazy)
            .field("dirty", &state.dirty)
            .field("active", &state.active)
            .field("dependency_count", &state.deps.len())
            .finish()
    }
}
