//! Scopes
//!
//! A [`Scope`] is the owner a rendering layer builds on: it holds root
//! state, props, computed values, watches and one render subscriber, and
//! tears all of them down together.
//!
//! Subscribers keep a weak link to their scope, and the scope keeps the
//! subscribers alive. Dropping the last `Scope` handle therefore releases
//! everything it owns, while [`Scope::destroy`] also unsubscribes it
//! eagerly and fires the `Destroyed` hooks.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::{handle_error, warn, ReactiveError};
use crate::observer::{define_reactive, observe, toggle_observing, CustomSetter, ReactiveMap, Value};
use crate::reactive::{
    watch, Computed, ComputedSetter, Expr, ReactiveContext, Subscriber, SubscriberId, SubscriberOptions,
    WatchHandle, WatchOptions,
};

/// Lifecycle points a scope can be observed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Mounted,
    /// Before the render subscriber re-runs in a flush.
    BeforeUpdate,
    /// After a flush re-ran the render subscriber.
    Updated,
    Destroyed,
}

type HookFn = Rc<dyn Fn() -> Result<(), ReactiveError>>;

struct ScopeInner {
    name: String,
    data: RefCell<Option<ReactiveMap>>,
    props: RefCell<Option<ReactiveMap>>,
    computed: RefCell<IndexMap<String, Computed>>,
    subscribers: RefCell<Vec<Rc<Subscriber>>>,
    render: RefCell<Option<Rc<Subscriber>>>,
    hooks: RefCell<HashMap<Hook, Vec<HookFn>>>,
    updating_props: Cell<bool>,
    mounted: Cell<bool>,
    being_destroyed: Cell<bool>,
    destroyed: Cell<bool>,
}

/// Owner of root state and subscribers. Clones share the same scope.
#[derive(Clone)]
pub struct Scope(Rc<ScopeInner>);

/// Non-owning link from a subscriber back to its scope.
#[derive(Clone)]
pub struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    pub fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(Scope)
    }
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Rc::new(ScopeInner {
            name: name.into(),
            data: RefCell::new(None),
            props: RefCell::new(None),
            computed: RefCell::new(IndexMap::new()),
            subscribers: RefCell::new(Vec::new()),
            render: RefCell::new(None),
            hooks: RefCell::new(HashMap::new()),
            updating_props: Cell::new(false),
            mounted: Cell::new(false),
            being_destroyed: Cell::new(false),
            destroyed: Cell::new(false),
        }))
    }

    pub fn downgrade(&self) -> WeakScope {
        WeakScope(Rc::downgrade(&self.0))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Install the root state and make it reactive.
    ///
    /// Anything but a map is replaced with an empty map after a warning. A
    /// scope has one root state for its lifetime.
    pub fn init_data(&self, data: impl Into<Value>) -> ReactiveMap {
        if let Some(existing) = self.data() {
            warn(ReactiveError::RootReplacement(self.0.name.clone()));
            return existing;
        }

        let map = match data.into() {
            Value::Map(map) => map,
            _ => {
                warn(ReactiveError::NonMapData(self.0.name.clone()));
                ReactiveMap::new()
            }
        };
        observe(&Value::from(map.clone()), true);
        *self.0.data.borrow_mut() = Some(map.clone());
        map
    }

    pub fn data(&self) -> Option<ReactiveMap> {
        self.0.data.borrow().clone()
    }

    /// Root state cannot be swapped out; mutate its fields instead.
    pub fn replace_data(&self, _data: impl Into<Value>) {
        warn(ReactiveError::RootReplacement(self.0.name.clone()));
    }

    /// Install props: reactive fields whose values belong to someone else.
    ///
    /// Prop values are not wrapped, and writing a prop outside of
    /// [`Scope::update_props`] warns.
    pub fn init_props<K, V>(&self, values: impl IntoIterator<Item = (K, V)>) -> ReactiveMap
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let props = ReactiveMap::new();
        toggle_observing(false);
        for (key, value) in values {
            let key = key.into();
            define_reactive(&props, &key, Some(value.into()), Some(self.prop_setter()), false);
        }
        toggle_observing(true);
        *self.0.props.borrow_mut() = Some(props.clone());
        props
    }

    fn prop_setter(&self) -> CustomSetter {
        let scope = self.downgrade();
        Rc::new(move |key: &str| {
            let updating = scope.upgrade().is_some_and(|s| s.0.updating_props.get());
            if !updating {
                warn(ReactiveError::PropMutation(key.to_string()));
            }
        })
    }

    /// Pass new prop values down from the owner.
    pub fn update_props<K, V>(&self, values: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let Some(props) = self.props() else {
            return;
        };
        self.0.updating_props.set(true);
        toggle_observing(false);
        for (key, value) in values {
            let key = key.into();
            if props.is_reactive(&key) {
                props.insert(key, value);
            } else {
                warn(ReactiveError::UnknownProp(key));
            }
        }
        toggle_observing(true);
        self.0.updating_props.set(false);
    }

    pub fn props(&self) -> Option<ReactiveMap> {
        self.0.props.borrow().clone()
    }

    /// Define a named, lazily evaluated value owned by this scope.
    pub fn computed<F>(&self, name: impl Into<String>, compute: F) -> Computed
    where
        F: Fn() -> Result<Value, ReactiveError> + 'static,
    {
        self.define_computed(name.into(), Expr::func(compute), None)
    }

    /// Define a named computed value that accepts assignments through `set`.
    pub fn computed_with_setter<F, S>(&self, name: impl Into<String>, compute: F, set: S) -> Computed
    where
        F: Fn() -> Result<Value, ReactiveError> + 'static,
        S: Fn(Value) -> Result<(), ReactiveError> + 'static,
    {
        self.define_computed(name.into(), Expr::func(compute), Some(Rc::new(set)))
    }

    fn define_computed(&self, name: String, expr: Expr, setter: Option<ComputedSetter>) -> Computed {
        let computed = Computed::with_owner(Some(self), Some(name.as_str()), expr, setter);
        self.0.computed.borrow_mut().insert(name, computed.clone());
        computed
    }

    /// Assign to a computed value by name. Unknown names are ignored.
    pub fn set_computed(&self, name: &str, value: impl Into<Value>) -> Result<(), ReactiveError> {
        let computed = self.0.computed.borrow().get(name).cloned();
        match computed {
            Some(computed) => computed.set(value),
            None => Ok(()),
        }
    }

    /// Read a computed value by name. Unknown names read as `Null`.
    pub fn computed_value(&self, name: &str) -> Result<Value, ReactiveError> {
        let computed = self.0.computed.borrow().get(name).cloned();
        match computed {
            Some(computed) => computed.get(),
            None => Ok(Value::Null),
        }
    }

    /// Resolve the first segment of a path: computed values, then props,
    /// then root state.
    pub fn resolve(&self, name: &str) -> Result<Value, ReactiveError> {
        if self.0.computed.borrow().contains_key(name) {
            return self.computed_value(name);
        }
        for map in [self.props(), self.data()].into_iter().flatten() {
            if map.contains_key(name) {
                return Ok(map.get(name).unwrap_or_default());
            }
        }
        Ok(Value::Null)
    }

    // ------------------------------------------------------------------
    // Subscribers
    // ------------------------------------------------------------------

    /// Watch an expression. Paths resolve against this scope.
    pub fn watch<F>(
        &self,
        expr: impl Into<Expr>,
        callback: F,
        options: WatchOptions,
    ) -> Result<WatchHandle, ReactiveError>
    where
        F: Fn(&Value, &Value) -> Result<(), ReactiveError> + 'static,
    {
        watch(Some(self), expr, callback, options)
    }

    /// Create the render subscriber and fire `Mounted`.
    ///
    /// Re-renders fire `BeforeUpdate` first while the scope is mounted. An
    /// error from the first render is returned and nothing is mounted.
    pub fn mount<F>(&self, render: F) -> Result<(), ReactiveError>
    where
        F: Fn() -> Result<(), ReactiveError> + 'static,
    {
        if self.is_destroyed() {
            return Ok(());
        }

        let weak = self.downgrade();
        let before = move || {
            if let Some(scope) = weak.upgrade() {
                if scope.is_mounted() && !scope.is_destroyed() {
                    scope.call_hook(Hook::BeforeUpdate);
                }
            }
        };
        let expr = Expr::func(move || {
            render()?;
            Ok(Value::Null)
        });
        let options = SubscriberOptions::default().before(before);

        let subscriber = Subscriber::build(Some(self), expr, None, options);
        *self.0.render.borrow_mut() = Some(Rc::clone(&subscriber));
        if let Err(err) = subscriber.run_initial() {
            subscriber.teardown();
            *self.0.render.borrow_mut() = None;
            return Err(err);
        }

        self.0.mounted.set(true);
        tracing::debug!(scope = %self.0.name, render = subscriber.id().raw(), "scope mounted");
        self.call_hook(Hook::Mounted);
        Ok(())
    }

    pub fn render_subscriber_id(&self) -> Option<SubscriberId> {
        self.0.render.borrow().as_ref().map(|s| s.id())
    }

    pub(crate) fn add_subscriber(&self, subscriber: Rc<Subscriber>) {
        self.0.subscribers.borrow_mut().push(subscriber);
    }

    pub(crate) fn remove_subscriber(&self, id: SubscriberId) {
        self.0.subscribers.borrow_mut().retain(|s| s.id() != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn on<F>(&self, hook: Hook, f: F)
    where
        F: Fn() -> Result<(), ReactiveError> + 'static,
    {
        self.0.hooks.borrow_mut().entry(hook).or_default().push(Rc::new(f));
    }

    /// Run the handlers of `hook` without tracking. Handler errors are
    /// reported.
    pub(crate) fn call_hook(&self, hook: Hook) {
        let handlers = self.0.hooks.borrow().get(&hook).cloned().unwrap_or_default();
        let _ctx = ReactiveContext::untracked();
        for handler in handlers {
            if let Err(err) = handler() {
                handle_error(&err, &format!("{hook:?} hook of scope \"{}\"", self.0.name));
            }
        }
    }

    /// Tear down every subscriber, release the root state and fire
    /// `Destroyed`. Calling it again does nothing.
    pub fn destroy(&self) {
        if self.0.being_destroyed.replace(true) {
            return;
        }

        let render = self.0.render.borrow_mut().take();
        if let Some(render) = render {
            render.teardown();
        }
        let subscribers = std::mem::take(&mut *self.0.subscribers.borrow_mut());
        for subscriber in subscribers.iter().rev() {
            subscriber.teardown();
        }
        if let Some(observer) = self.data().and_then(|data| data.observer()) {
            observer.release_root();
        }

        self.0.destroyed.set(true);
        tracing::debug!(scope = %self.0.name, "scope destroyed");
        self.call_hook(Hook::Destroyed);
    }

    pub fn is_mounted(&self) -> bool {
        self.0.mounted.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    pub fn is_being_destroyed(&self) -> bool {
        self.0.being_destroyed.get()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.0.name)
            .field("subscribers", &self.subscriber_count())
            .field("mounted", &self.is_mounted())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
