//! Ordered maps of named fields.
//!
//! A field is either plain (stored and read without tracking) or reactive
//! (owns a dependency node). Fields become reactive when the map is wrapped
//! by [`observe`](super::observe) or through [`set_field`](super::set_field)
//! and [`define_reactive`](super::define_reactive).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{observe, track_field_read, CustomSetter, Observer, Value};
use crate::error::{warn, ReactiveError};
use crate::reactive::Dep;

struct Field {
    value: Value,
    dep: Option<Dep>,
    shallow: bool,
    custom_setter: Option<CustomSetter>,
}

impl Field {
    fn plain(value: Value) -> Self {
        Self { value, dep: None, shallow: false, custom_setter: None }
    }
}

#[derive(Default)]
struct MapInner {
    fields: IndexMap<String, Field>,
    observer: Option<Rc<Observer>>,
    frozen: bool,
}

/// A shared, ordered map of fields. Clones share the same storage.
#[derive(Clone, Default)]
pub struct ReactiveMap(Rc<RefCell<MapInner>>);

/// Snapshot of a reactive field taken before a write.
struct WriteTarget {
    dep: Dep,
    shallow: bool,
    custom_setter: Option<CustomSetter>,
    unchanged: bool,
}

impl ReactiveMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a field. Reactive fields register with the evaluating
    /// subscriber.
    pub fn get(&self, key: &str) -> Option<Value> {
        let (value, dep, shallow) = {
            let inner = self.0.borrow();
            let field = inner.fields.get(key)?;
            (field.value.clone(), field.dep.clone(), field.shallow)
        };
        if let Some(dep) = dep {
            track_field_read(&dep, &value, shallow);
        }
        Some(value)
    }

    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        self.0.borrow().fields.get(key).map(|field| field.value.clone())
    }

    /// Assign a field.
    ///
    /// Writing a reactive field is a no-op when the value is the same;
    /// otherwise the custom setter runs, the value is stored and wrapped
    /// (unless the field is shallow) and the field's subscribers are
    /// notified. Any other key is stored plainly without notification.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if self.is_frozen() {
            warn(ReactiveError::Frozen);
            return;
        }

        let target = {
            let inner = self.0.borrow();
            inner.fields.get(&key).and_then(|field| {
                field.dep.as_ref().map(|dep| WriteTarget {
                    dep: dep.clone(),
                    shallow: field.shallow,
                    custom_setter: field.custom_setter.clone(),
                    unchanged: field.value.same(&value),
                })
            })
        };

        let Some(target) = target else {
            let mut inner = self.0.borrow_mut();
            match inner.fields.get_mut(&key) {
                Some(field) => field.value = value,
                None => {
                    inner.fields.insert(key, Field::plain(value));
                }
            }
            return;
        };

        if target.unchanged {
            return;
        }
        if let Some(setter) = &target.custom_setter {
            setter(&key);
        }
        if let Some(field) = self.0.borrow_mut().fields.get_mut(&key) {
            field.value = value.clone();
        }
        if !target.shallow {
            observe(&value, false);
        }
        target.dep.notify();
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().fields.is_empty()
    }

    /// Keys in insertion order. Not tracked.
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().fields.keys().cloned().collect()
    }

    pub fn entries_untracked(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .fields
            .iter()
            .map(|(key, field)| (key.clone(), field.value.clone()))
            .collect()
    }

    pub fn is_reactive(&self, key: &str) -> bool {
        self.dep(key).is_some()
    }

    /// The dependency node of a reactive field.
    pub fn dep(&self, key: &str) -> Option<Dep> {
        self.0.borrow().fields.get(key).and_then(|field| field.dep.clone())
    }

    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.borrow().observer.clone()
    }

    /// Freeze the map: it will not be wrapped or traversed, and writes are
    /// rejected.
    pub fn freeze(&self) {
        self.0.borrow_mut().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub fn ptr_eq(&self, other: &ReactiveMap) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    pub(crate) fn set_observer(&self, observer: Rc<Observer>) {
        self.0.borrow_mut().observer = Some(observer);
    }

    /// Install a reactive field, keeping the key's position if it exists.
    pub(crate) fn define_field(
        &self,
        key: &str,
        value: Value,
        dep: Dep,
        custom_setter: Option<CustomSetter>,
        shallow: bool,
    ) {
        let field = Field { value, dep: Some(dep), shallow, custom_setter };
        self.0.borrow_mut().fields.insert(key.to_owned(), field);
    }

    pub(crate) fn remove_field(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().fields.shift_remove(key).map(|field| field.value)
    }
}

impl<K, V> FromIterator<(K, V)> for ReactiveMap
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let fields = iter
            .into_iter()
            .map(|(key, value)| (key.into(), Field::plain(value.into())))
            .collect();
        Self(Rc::new(RefCell::new(MapInner { fields, ..MapInner::default() })))
    }
}

impl fmt::Debug for ReactiveMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::from(self.clone()).to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::reactive::{Expr, Subscriber, SubscriberOptions};
    use std::cell::Cell;

    fn sync_reader(map: &ReactiveMap, key: &'static str) -> (Rc<Subscriber>, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let (m, r) = (map.clone(), runs.clone());
        let subscriber = Subscriber::new(
            None,
            Expr::func(move || {
                r.set(r.get() + 1);
                Ok(m.get(key).unwrap_or_default())
            }),
            None,
            SubscriberOptions::default().sync(),
        )
        .unwrap();
        (subscriber, runs)
    }

    #[test]
    fn plain_maps_are_not_tracked() {
        let map: ReactiveMap = [("a", 1)].into_iter().collect();
        let (subscriber, runs) = sync_reader(&map, "a");

        assert_eq!(subscriber.dependency_count(), 0);
        map.insert("a", 2);
        assert_eq!(runs.get(), 1);
        assert_eq!(map.get("a"), Some(Value::from(2)));
    }

    #[test]
    fn reactive_writes_notify_when_changed() {
        let map: ReactiveMap = [("a", 1)].into_iter().collect();
        observe(&Value::from(map.clone()), false);
        let (_subscriber, runs) = sync_reader(&map, "a");

        map.insert("a", 1);
        assert_eq!(runs.get(), 1);

        map.insert("a", 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn new_keys_are_plain() {
        let map: ReactiveMap = [("a", 1)].into_iter().collect();
        observe(&Value::from(map.clone()), false);

        map.insert("b", 2);
        assert!(map.is_reactive("a"));
        assert!(!map.is_reactive("b"));
        assert_eq!(map.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn assigned_containers_become_reactive() {
        let map: ReactiveMap = [("a", 1)].into_iter().collect();
        observe(&Value::from(map.clone()), false);

        let child: ReactiveMap = [("x", 1)].into_iter().collect();
        map.insert("a", child.clone());
        assert!(child.observer().is_some());
        assert!(child.is_reactive("x"));
    }

    #[test]
    fn custom_setter_runs_before_store() {
        let map = ReactiveMap::new();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let c = calls.clone();
        map.define_field(
            "p",
            Value::from(1),
            Dep::new(),
            Some(Rc::new(move |key: &str| c.borrow_mut().push(key.to_string()))),
            false,
        );

        map.insert("p", 1);
        map.insert("p", 2);
        assert_eq!(*calls.borrow(), vec!["p".to_string()]);
    }

    #[test]
    fn frozen_maps_reject_writes() {
        let warned = Rc::new(Cell::new(0));
        let w = warned.clone();
        config::configure(|c| c.warn_handler = Some(Rc::new(move |_: &ReactiveError| w.set(w.get() + 1))));

        let map: ReactiveMap = [("a", 1)].into_iter().collect();
        map.freeze();
        map.insert("a", 2);

        assert_eq!(map.get("a"), Some(Value::from(1)));
        assert_eq!(warned.get(), 1);
        config::reset();
    }
}
