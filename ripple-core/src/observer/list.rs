//! Ordered lists with intercepted mutations.
//!
//! Element access is not tracked. A subscriber depends on a list through
//! the field holding it, which also depends on the list's structural node.
//! Every mutating method notifies that node exactly once.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use super::{observe, Observer, Value};
use crate::error::{warn, ReactiveError};

type Inserted = SmallVec<[Value; 4]>;

#[derive(Default)]
struct ListInner {
    items: Vec<Value>,
    observer: Option<Rc<Observer>>,
    frozen: bool,
}

/// A shared, ordered list of values. Clones share the same storage.
#[derive(Clone, Default)]
pub struct ReactiveList(Rc<RefCell<ListInner>>);

impl ReactiveList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().items.get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().items.clone()
    }

    /// Append an element, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        self.mutate(|items| {
            items.push(value.clone());
            (items.len(), smallvec::smallvec![value])
        })
        .unwrap_or_else(|| self.len())
    }

    pub fn pop(&self) -> Option<Value> {
        self.mutate(|items| (items.pop(), Inserted::new())).flatten()
    }

    /// Remove the first element.
    pub fn shift(&self) -> Option<Value> {
        self.mutate(|items| {
            let first = (!items.is_empty()).then(|| items.remove(0));
            (first, Inserted::new())
        })
        .flatten()
    }

    /// Prepend elements, returning the new length.
    pub fn unshift(&self, values: impl IntoIterator<Item = Value>) -> usize {
        let values: Inserted = values.into_iter().collect();
        self.mutate(|items| {
            items.splice(0..0, values.iter().cloned());
            (items.len(), values)
        })
        .unwrap_or_else(|| self.len())
    }

    /// Remove `delete_count` elements at `start` and insert `values` in
    /// their place. Returns the removed elements. Out-of-range arguments
    /// are clamped.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        values: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        let values: Inserted = values.into_iter().collect();
        self.mutate(|items| {
            let start = start.min(items.len());
            let end = start + delete_count.min(items.len() - start);
            let removed = items.splice(start..end, values.iter().cloned()).collect();
            (removed, values)
        })
        .unwrap_or_default()
    }

    /// Sort in place. The list reads as empty while `compare` runs.
    pub fn sort_by<F>(&self, mut compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.mutate(|items| {
            items.sort_by(&mut compare);
            ((), Inserted::new())
        });
    }

    pub fn reverse(&self) {
        self.mutate(|items| {
            items.reverse();
            ((), Inserted::new())
        });
    }

    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.borrow().observer.clone()
    }

    pub fn freeze(&self) {
        self.0.borrow_mut().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub fn ptr_eq(&self, other: &ReactiveList) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    pub(crate) fn set_observer(&self, observer: Rc<Observer>) {
        self.0.borrow_mut().observer = Some(observer);
    }

    /// Grow with `Null` up to `len` without notifying.
    pub(crate) fn pad_to(&self, len: usize) {
        let mut inner = self.0.borrow_mut();
        if !inner.frozen && inner.items.len() < len {
            inner.items.resize(len, Value::Null);
        }
    }

    /// Run a mutation with the items moved out of the cell, then wrap the
    /// inserted elements and notify once if the list is observed.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> (R, Inserted)) -> Option<R> {
        if self.is_frozen() {
            warn(ReactiveError::Frozen);
            return None;
        }

        let mut items = std::mem::take(&mut self.0.borrow_mut().items);
        let (result, inserted) = f(&mut items);
        let observer = {
            let mut inner = self.0.borrow_mut();
            inner.items = items;
            inner.observer.clone()
        };

        if let Some(observer) = observer {
            for value in &inserted {
                observe(value, false);
            }
            tracing::trace!(inserted = inserted.len(), "list mutated");
            observer.dep().notify();
        }
        Some(result)
    }
}

impl<V: Into<Value>> FromIterator<V> for ReactiveList {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let items = iter.into_iter().map(Into::into).collect();
        Self(Rc::new(RefCell::new(ListInner { items, ..ListInner::default() })))
    }
}

impl fmt::Debug for ReactiveList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::from(self.clone()).to_json())
    }
}
