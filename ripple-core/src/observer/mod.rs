//! Reactive Containers
//!
//! This module turns plain maps and lists into reactive state.
//!
//! # Concepts
//!
//! ## Observers
//!
//! [`observe`] wraps a map or list: it attaches an [`Observer`] carrying
//! the container's structural dependency node, then makes every existing
//! map key a reactive field and wraps every list element. A container is
//! wrapped at most once; the observer is attached before the walk so
//! cyclic data terminates.
//!
//! ## Reactive fields
//!
//! Reading a reactive field depends on the field's node and, if the value
//! is a wrapped container, on the container's node too. That second edge is
//! what lets [`set_field`], [`delete_field`] and list mutations reach the
//! subscribers that read the container.
//!
//! ## Observation switch
//!
//! [`toggle_observing`] suspends wrapping for the current thread. Owners use
//! it while installing values they do not own, such as props.

mod list;
mod map;
mod value;

use std::cell::Cell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

pub use list::ReactiveList;
pub use map::ReactiveMap;
pub use value::Value;

use crate::error::{warn, ReactiveError};
use crate::reactive::{Dep, Runtime};

/// Runs with the key whenever a reactive field is written with a new value,
/// before the value is stored.
pub type CustomSetter = Rc<dyn Fn(&str)>;

/// Marker attached to a wrapped container.
pub struct Observer {
    dep: Dep,
    root_count: Cell<usize>,
}

impl Observer {
    fn new() -> Self {
        Self { dep: Dep::new(), root_count: Cell::new(0) }
    }

    /// Structural node, notified on key addition/removal and list mutation.
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Number of scopes using the container as root state.
    pub fn root_count(&self) -> usize {
        self.root_count.get()
    }

    pub(crate) fn release_root(&self) {
        self.root_count.set(self.root_count.get().saturating_sub(1));
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("dep", &self.dep.id())
            .field("root_count", &self.root_count())
            .finish()
    }
}

thread_local! {
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

/// Enable or disable wrapping of new containers on this thread.
pub fn toggle_observing(value: bool) {
    SHOULD_OBSERVE.with(|flag| flag.set(value));
}

pub fn should_observe() -> bool {
    SHOULD_OBSERVE.with(Cell::get)
}

/// Make a value reactive and return its observer.
///
/// Returns the existing observer for an already wrapped container, a new
/// one for a non-frozen map or list while observation is enabled, and
/// `None` otherwise. `as_root` counts the container as root state of one
/// more scope.
pub fn observe(value: &Value, as_root: bool) -> Option<Rc<Observer>> {
    let observer = match value {
        Value::Map(map) => observe_map(map),
        Value::List(list) => observe_list(list),
        _ => None,
    }?;
    if as_root {
        observer.root_count.set(observer.root_count.get() + 1);
    }
    Some(observer)
}

fn observe_map(map: &ReactiveMap) -> Option<Rc<Observer>> {
    if let Some(observer) = map.observer() {
        return Some(observer);
    }
    if !should_observe() || map.is_frozen() {
        return None;
    }

    let observer = Rc::new(Observer::new());
    map.set_observer(Rc::clone(&observer));
    for key in map.keys() {
        define_reactive(map, &key, None, None, false);
    }
    tracing::trace!(dep = observer.dep.id().raw(), fields = map.len(), "map observed");
    Some(observer)
}

fn observe_list(list: &ReactiveList) -> Option<Rc<Observer>> {
    if let Some(observer) = list.observer() {
        return Some(observer);
    }
    if !should_observe() || list.is_frozen() {
        return None;
    }

    let observer = Rc::new(Observer::new());
    list.set_observer(Rc::clone(&observer));
    for item in list.to_vec() {
        observe(&item, false);
    }
    tracing::trace!(dep = observer.dep.id().raw(), items = list.len(), "list observed");
    Some(observer)
}

/// Install `key` as a reactive field of `map`.
///
/// Without an explicit `value` the field keeps its current value. Unless
/// `shallow`, the value is wrapped too. Frozen maps are left untouched.
pub fn define_reactive(
    map: &ReactiveMap,
    key: &str,
    value: Option<Value>,
    custom_setter: Option<CustomSetter>,
    shallow: bool,
) {
    if map.is_frozen() {
        return;
    }
    let value = value.or_else(|| map.get_untracked(key)).unwrap_or_default();
    if !shallow {
        observe(&value, false);
    }
    map.define_field(key, value, Dep::new(), custom_setter, shallow);
}

/// A map key or list index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl Key {
    /// The list index this key denotes, if any.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            Key::Name(name) => name.parse().ok(),
        }
    }

    fn into_name(self) -> String {
        match self {
            Key::Name(name) => name,
            Key::Index(index) => index.to_string(),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// Set a key on a map or an index on a list, adding a reactive field and
/// notifying the container's subscribers if the key is new.
///
/// Root state containers and primitives are rejected with a warning. The
/// value is returned in every case.
pub fn set_field(target: &Value, key: impl Into<Key>, value: impl Into<Value>) -> Value {
    let key = key.into();
    let value = value.into();

    match target {
        Value::List(list) => match key.as_index() {
            Some(index) => {
                list.pad_to(index);
                list.splice(index, 1, [value.clone()]);
            }
            None => warn(ReactiveError::InvalidPath(key.into_name())),
        },
        Value::Map(map) => {
            let key = key.into_name();
            if map.contains_key(&key) {
                map.insert(key, value.clone());
                return value;
            }
            let Some(observer) = map.observer() else {
                map.insert(key, value.clone());
                return value;
            };
            if observer.root_count() > 0 {
                warn(ReactiveError::RootMutation);
                return value;
            }
            define_reactive(map, &key, Some(value.clone()), None, false);
            observer.dep().notify();
        }
        _ => warn(ReactiveError::PrimitiveTarget("set")),
    }
    value
}

/// Remove a key from a map or an index from a list, notifying the
/// container's subscribers if it was wrapped.
pub fn delete_field(target: &Value, key: impl Into<Key>) {
    let key = key.into();

    match target {
        Value::List(list) => {
            if let Some(index) = key.as_index() {
                if index < list.len() {
                    list.splice(index, 1, []);
                }
            }
        }
        Value::Map(map) => {
            let observer = map.observer();
            if observer.as_ref().is_some_and(|ob| ob.root_count() > 0) {
                warn(ReactiveError::RootMutation);
                return;
            }
            let key = key.into_name();
            if !map.contains_key(&key) {
                return;
            }
            if map.is_frozen() {
                warn(ReactiveError::Frozen);
                return;
            }
            map.remove_field(&key);
            if let Some(observer) = observer {
                observer.dep().notify();
            }
        }
        _ => warn(ReactiveError::PrimitiveTarget("delete")),
    }
}

/// Register a read of a reactive field with the evaluating subscriber.
pub(crate) fn track_field_read(dep: &Dep, value: &Value, shallow: bool) {
    if !Runtime::is_tracking() {
        return;
    }
    dep.depend();
    if shallow {
        return;
    }
    if let Some(observer) = value.observer() {
        observer.dep().depend();
        if let Value::List(list) = value {
            depend_array(list, &mut HashSet::new());
        }
    }
}

/// Depend on every wrapped element of a list, recursing into nested lists,
/// since element access itself is not tracked. Each list is walked once.
fn depend_array(list: &ReactiveList, seen: &mut HashSet<*const ()>) {
    if !seen.insert(list.as_ptr()) {
        return;
    }
    for item in list.to_vec() {
        if let Some(observer) = item.observer() {
            observer.dep().depend();
        }
        if let Value::List(inner) = &item {
            depend_array(inner, seen);
        }
    }
}
