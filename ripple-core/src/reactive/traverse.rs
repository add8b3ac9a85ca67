//! Deep traversal: read every nested reactive field of a value so the
//! currently evaluating subscriber depends on all of them.

use std::collections::HashSet;

use crate::observer::Value;

/// Recursively touch every field and element reachable from `value`.
///
/// Frozen containers and opaque values are skipped. Every container is
/// visited once per traversal, keyed by its allocation, so cyclic
/// structures terminate whether or not they are wrapped.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    visit(value, &mut seen);
}

fn visit(value: &Value, seen: &mut HashSet<*const ()>) {
    match value {
        Value::Map(map) => {
            if map.is_frozen() || !seen.insert(map.as_ptr()) {
                return;
            }
            for key in map.keys().iter().rev() {
                if let Some(child) = map.get(key) {
                    visit(&child, seen);
                }
            }
        }
        Value::List(list) => {
            if list.is_frozen() || !seen.insert(list.as_ptr()) {
                return;
            }
            for item in list.to_vec().iter().rev() {
                visit(item, seen);
            }
        }
        _ => {}
    }
}
