//! Observer - wraps plain state so reads are tracked and writes notify.
//!
//! `observe_value` installs an [`Observer`] on a container: every existing
//! object key is made reactive via [`define_reactive`], every array element
//! is observed in turn. The observer owns the structural dep used for
//! "a key was added / an element was inserted" notifications; each object
//! key additionally owns its own dep.
//!
//! A container is never wrapped twice (the existing observer is returned),
//! frozen containers and primitives are never observed, and virtual nodes
//! cannot enter the value model at all.

use std::cell::Cell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::instance::lifecycle::is_updating_child_component;
use crate::value::{Arr, Entry, Guard, Obj, Value};
use crate::warn::warn;

use super::dep::{target, Dep};

// =============================================================================
// Observer
// =============================================================================

pub struct Observer {
    /// Structural dep: notified on key addition/removal and array mutation.
    pub dep: Rc<Dep>,
    /// Number of component instances using this container as root `$data`.
    pub vm_count: Cell<usize>,
}

/// Observe a value. Returns the (possibly pre-existing) observer for
/// containers, `None` for primitives and frozen containers.
pub fn observe_value(value: &Value) -> Option<Rc<Observer>> {
    match value {
        Value::Obj(object) => {
            if object.is_frozen() {
                return None;
            }
            if let Some(ob) = object.observer() {
                return Some(ob);
            }
            let ob = Rc::new(Observer {
                dep: Dep::new(),
                vm_count: Cell::new(0),
            });
            object.0.borrow_mut().ob = Some(ob.clone());
            // Walk every existing key and convert it.
            for key in object.keys() {
                let val = object.raw_get(&key);
                define_reactive(object, &key, val);
            }
            Some(ob)
        }
        Value::Arr(array) => {
            if array.is_frozen() {
                return None;
            }
            if let Some(ob) = array.observer() {
                return Some(ob);
            }
            let ob = Rc::new(Observer {
                dep: Dep::new(),
                vm_count: Cell::new(0),
            });
            array.0.borrow_mut().ob = Some(ob.clone());
            for item in array.to_vec() {
                observe_value(&item);
            }
            Some(ob)
        }
        _ => None,
    }
}

/// Observe a component's root `$data`, bumping the root refcount.
pub fn observe_root(value: &Value) -> Option<Rc<Observer>> {
    let ob = observe_value(value);
    if let Some(ob) = &ob {
        ob.vm_count.set(ob.vm_count.get() + 1);
    }
    ob
}

// =============================================================================
// defineReactive
// =============================================================================

/// Make a key reactive: allocate its dep, observe its value, (re)install
/// the entry.
pub fn define_reactive(obj: &Obj, key: &str, value: Value) -> Rc<Dep> {
    define_reactive_with(obj, key, value, false, Guard::None)
}

pub fn define_reactive_with(
    obj: &Obj,
    key: &str,
    value: Value,
    shallow: bool,
    guard: Guard,
) -> Rc<Dep> {
    let dep = Dep::new();
    if !shallow {
        observe_value(&value);
    }
    obj.0.borrow_mut().entries.insert(
        key.to_string(),
        Entry {
            value,
            dep: Some(dep.clone()),
            shallow,
            guard,
        },
    );
    dep
}

// =============================================================================
// Tracked object access
// =============================================================================

impl Obj {
    /// Tracked read.
    ///
    /// If a target watcher is evaluating, it depends on the key's dep, on
    /// the child value's observer dep, and - for arrays - on every
    /// element's observer dep (elements of arrays cannot be key-wise
    /// tracked).
    pub fn get(&self, key: &str) -> Value {
        let (value, dep) = {
            let data = self.0.borrow();
            match data.entries.get(key) {
                Some(entry) => (entry.value.clone(), entry.dep.clone()),
                None => (Value::Undefined, None),
            }
        };
        if let Some(dep) = dep {
            if target().is_some() {
                dep.depend();
                match &value {
                    Value::Obj(child) => {
                        if let Some(ob) = child.observer() {
                            ob.dep.depend();
                        }
                    }
                    Value::Arr(child) => {
                        if let Some(ob) = child.observer() {
                            ob.dep.depend();
                        }
                        depend_array(child);
                    }
                    _ => {}
                }
            }
        }
        value
    }

    /// Tracked write.
    ///
    /// Same-value writes (NaN-safe) are skipped before any guard fires.
    /// Writes to undeclared keys add a plain, non-reactive entry; runtime
    /// key addition goes through [`set`].
    pub fn set(&self, key: &str, new_value: Value) {
        enum Outcome {
            Added,
            Unchanged,
            Changed {
                dep: Option<Rc<Dep>>,
                shallow: bool,
                guard: Guard,
            },
        }
        let outcome = {
            let mut data = self.0.borrow_mut();
            match data.entries.get_mut(key) {
                None => {
                    data.entries
                        .insert(key.to_string(), Entry::plain(new_value.clone()));
                    Outcome::Added
                }
                Some(entry) => {
                    if Value::same(&entry.value, &new_value) {
                        Outcome::Unchanged
                    } else {
                        let dep = entry.dep.clone();
                        let shallow = entry.shallow;
                        let guard = entry.guard;
                        entry.value = new_value.clone();
                        Outcome::Changed {
                            dep,
                            shallow,
                            guard,
                        }
                    }
                }
            }
        };
        match outcome {
            Outcome::Added | Outcome::Unchanged => {}
            Outcome::Changed {
                dep,
                shallow,
                guard,
            } => {
                match guard {
                    Guard::Prop if !is_updating_child_component() => warn(format!(
                        "Avoid mutating a prop directly since the value will be overwritten \
                         whenever the parent component re-renders: prop \"{key}\""
                    )),
                    Guard::Injection => warn(format!(
                        "Avoid mutating an injected value directly: \"{key}\""
                    )),
                    Guard::InstanceReadonly if !is_updating_child_component() => {
                        warn(format!("\"{key}\" is readonly"))
                    }
                    _ => {}
                }
                if !shallow {
                    observe_value(&new_value);
                }
                if let Some(dep) = dep {
                    dep.notify();
                }
            }
        }
    }
}

/// Depend on every element's observer dep, recursively for nested arrays.
fn depend_array(array: &Arr) {
    for item in array.to_vec() {
        match &item {
            Value::Obj(child) => {
                if let Some(ob) = child.observer() {
                    ob.dep.depend();
                }
            }
            Value::Arr(child) => {
                if let Some(ob) = child.observer() {
                    ob.dep.depend();
                }
                depend_array(child);
            }
            _ => {}
        }
    }
}

// =============================================================================
// Intercepted array mutators
// =============================================================================

impl Arr {
    fn notify_mutation(&self, inserted: &[Value]) {
        if let Some(ob) = self.observer() {
            for value in inserted {
                observe_value(value);
            }
            ob.dep.notify();
        }
    }

    pub fn push(&self, value: Value) {
        self.0.borrow_mut().items.push(value.clone());
        self.notify_mutation(&[value]);
    }

    pub fn pop(&self) -> Value {
        let popped = self.0.borrow_mut().items.pop().unwrap_or(Value::Undefined);
        self.notify_mutation(&[]);
        popped
    }

    pub fn shift(&self) -> Value {
        let shifted = {
            let mut data = self.0.borrow_mut();
            if data.items.is_empty() {
                Value::Undefined
            } else {
                data.items.remove(0)
            }
        };
        self.notify_mutation(&[]);
        shifted
    }

    pub fn unshift(&self, value: Value) {
        self.0.borrow_mut().items.insert(0, value.clone());
        self.notify_mutation(&[value]);
    }

    /// Remove `delete_count` items at `start`, inserting `items` in their
    /// place. Returns the removed items.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        let removed: Vec<Value> = {
            let mut data = self.0.borrow_mut();
            let len = data.items.len();
            let start = start.min(len);
            let end = (start + delete_count).min(len);
            data.items.splice(start..end, items.clone()).collect()
        };
        self.notify_mutation(&items);
        removed
    }

    pub fn reverse(&self) {
        self.0.borrow_mut().items.reverse();
        self.notify_mutation(&[]);
    }

    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) {
        self.0.borrow_mut().items.sort_by(compare);
        self.notify_mutation(&[]);
    }
}

// =============================================================================
// Runtime key addition / removal
// =============================================================================

/// Add a reactive key at runtime (or replace an array index), waking
/// subscribers that only depend on structure.
pub fn set(target_value: &Value, key: &str, value: Value) -> Value {
    match target_value {
        Value::Arr(array) => {
            let Ok(index) = key.parse::<usize>() else {
                warn(format!("invalid array index for set: \"{key}\""));
                return value;
            };
            let len = array.len();
            if index < len {
                array.splice(index, 1, vec![value.clone()]);
            } else {
                array.splice(len, 0, vec![value.clone()]);
            }
            value
        }
        Value::Obj(object) => {
            if object.has(key) {
                object.set(key, value.clone());
                return value;
            }
            let ob = object.observer();
            if object.is_runtime_internal()
                || ob.as_ref().is_some_and(|ob| ob.vm_count.get() > 0)
            {
                warn(
                    "Avoid adding reactive properties to a component instance or its \
                     root $data at runtime - declare it upfront in the data option",
                );
                return value;
            }
            match ob {
                None => object.raw_set(key, value.clone()),
                Some(ob) => {
                    define_reactive(object, key, value.clone());
                    ob.dep.notify();
                }
            }
            value
        }
        _ => {
            warn(format!(
                "Cannot set reactive property on undefined, null, or primitive value: {}",
                target_value.type_name()
            ));
            value
        }
    }
}

/// Remove a key at runtime, notifying structural subscribers.
pub fn del(target_value: &Value, key: &str) {
    match target_value {
        Value::Arr(array) => {
            if let Ok(index) = key.parse::<usize>() {
                if index < array.len() {
                    array.splice(index, 1, Vec::new());
                }
            }
        }
        Value::Obj(object) => {
            let ob = object.observer();
            if object.is_runtime_internal()
                || ob.as_ref().is_some_and(|ob| ob.vm_count.get() > 0)
            {
                warn(
                    "Avoid deleting properties on a component instance or its root \
                     $data - set it to null instead",
                );
                return;
            }
            let removed = object.0.borrow_mut().entries.shift_remove(key).is_some();
            if removed {
                if let Some(ob) = ob {
                    ob.dep.notify();
                }
            }
        }
        _ => {
            warn(format!(
                "Cannot delete reactive property on undefined, null, or primitive value: {}",
                target_value.type_name()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactivity::watcher::{Watcher, WatcherOptions};
    use crate::value::{arr, obj};
    use crate::warn;
    use std::cell::RefCell;

    fn counting_watcher(getter: impl Fn() -> Value + 'static) -> (Rc<Watcher>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        let w = Watcher::create(
            None,
            Box::new(getter),
            Box::new(move |_, _| count_clone.set(count_clone.get() + 1)),
            WatcherOptions {
                sync: true,
                ..Default::default()
            },
            None,
            false,
        );
        (w, count)
    }

    #[test]
    fn test_observe_is_idempotent() {
        let state = obj([("a", Value::Num(1.0))]);
        let ob1 = observe_value(&state).unwrap();
        let ob2 = observe_value(&state).unwrap();
        assert!(Rc::ptr_eq(&ob1, &ob2));
    }

    #[test]
    fn test_frozen_not_observed() {
        let state = Obj::from_pairs([("a", Value::Num(1.0))]);
        state.freeze();
        assert!(observe_value(&Value::Obj(state)).is_none());
    }

    #[test]
    fn test_primitives_not_observed() {
        assert!(observe_value(&Value::Num(1.0)).is_none());
        assert!(observe_value(&Value::Null).is_none());
    }

    #[test]
    fn test_write_notifies_sync_watcher() {
        let state = obj([("a", Value::Num(1.0))]);
        observe_value(&state);
        let o = state.as_obj().unwrap().clone();
        let o2 = o.clone();
        let (_w, count) = counting_watcher(move || o2.get("a"));

        o.set("a", Value::Num(2.0));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_same_value_write_skipped() {
        let state = obj([("a", Value::Num(2.0))]);
        observe_value(&state);
        let o = state.as_obj().unwrap().clone();
        let o2 = o.clone();
        let (_w, count) = counting_watcher(move || o2.get("a"));

        o.set("a", Value::Num(2.0));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_nan_write_skipped() {
        let state = obj([("a", Value::Num(f64::NAN))]);
        observe_value(&state);
        let o = state.as_obj().unwrap().clone();
        let o2 = o.clone();
        let (_w, count) = counting_watcher(move || o2.get("a"));

        o.set("a", Value::Num(f64::NAN));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_new_value_gets_observed() {
        let state = obj([("nested", Value::Null)]);
        observe_value(&state);
        let o = state.as_obj().unwrap().clone();

        let replacement = Obj::from_pairs([("x", Value::Num(1.0))]);
        o.set("nested", Value::Obj(replacement.clone()));
        assert!(replacement.observer().is_some());
    }

    #[test]
    fn test_array_push_notifies_once() {
        let state = arr([Value::Num(1.0), Value::Num(2.0), Value::Num(3.0)]);
        observe_value(&state);
        let a = state.as_arr().unwrap().clone();

        // Subscribe to the array's structural dep, the way a reactive
        // parent read would.
        let state_clone = state.clone();
        let (_w, count) = counting_watcher(move || {
            if let Value::Arr(arr) = &state_clone {
                if let Some(ob) = arr.observer() {
                    ob.dep.depend();
                }
            }
            Value::Undefined
        });

        a.push(Value::Num(4.0));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_array_inserted_elements_observed() {
        let state = arr([]);
        observe_value(&state);
        let a = state.as_arr().unwrap().clone();

        let element = Obj::from_pairs([("x", Value::Num(1.0))]);
        a.push(Value::Obj(element.clone()));
        assert!(element.observer().is_some());
    }

    #[test]
    fn test_set_adds_reactive_key_and_notifies_structure() {
        let state = obj([("a", Value::Num(1.0))]);
        observe_value(&state);
        let o = state.as_obj().unwrap().clone();

        let fired = Rc::new(RefCell::new(0));
        let fired_clone = fired.clone();
        let state_clone = state.clone();
        let _w = Watcher::create(
            None,
            Box::new(move || {
                if let Some(ob) = state_clone.as_obj().and_then(|o| o.observer()) {
                    ob.dep.depend();
                }
                Value::Undefined
            }),
            Box::new(move |_, _| *fired_clone.borrow_mut() += 1),
            WatcherOptions {
                sync: true,
                ..Default::default()
            },
            None,
            false,
        );

        set(&state, "b", Value::Num(2.0));
        assert_eq!(*fired.borrow(), 1);
        assert!(o.has("b"));

        // The new key is itself reactive.
        let o2 = o.clone();
        let (_w2, count) = counting_watcher(move || o2.get("b"));
        o.set("b", Value::Num(3.0));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_set_on_primitive_warns() {
        warn::reset_warnings();
        set(&Value::Num(1.0), "x", Value::Num(2.0));
        assert_eq!(warn::warning_count_containing("primitive"), 1);
    }

    #[test]
    fn test_set_on_root_data_warns() {
        warn::reset_warnings();
        let state = obj([("a", Value::Num(1.0))]);
        observe_root(&state);
        set(&state, "b", Value::Num(2.0));
        assert_eq!(warn::warning_count_containing("root $data"), 1);
        assert!(!state.as_obj().unwrap().has("b"));
    }

    #[test]
    fn test_del_notifies_structure() {
        let state = obj([("a", Value::Num(1.0)), ("b", Value::Num(2.0))]);
        observe_value(&state);

        let fired = Rc::new(Cell::new(0));
        let fired_clone = fired.clone();
        let state_clone = state.clone();
        let _w = Watcher::create(
            None,
            Box::new(move || {
                if let Some(ob) = state_clone.as_obj().and_then(|o| o.observer()) {
                    ob.dep.depend();
                }
                Value::Undefined
            }),
            Box::new(move |_, _| fired_clone.set(fired_clone.get() + 1)),
            WatcherOptions {
                sync: true,
                ..Default::default()
            },
            None,
            false,
        );

        del(&state, "b");
        assert_eq!(fired.get(), 1);
        assert!(!state.as_obj().unwrap().has("b"));
    }
}
