//! Core value model for spark-dom.
//!
//! Component state is dynamically shaped: render functions and watchers read
//! and write keyed containers and sequences whose layout is only known at
//! runtime. `Value` is the uniform carrier for that state. Containers have
//! reference semantics (cloning a `Value` clones the handle, not the data),
//! which is what change detection relies on.
//!
//! The reactive machinery lives in [`crate::reactivity`]; this module only
//! defines the data itself plus the raw (untracked) accessors.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::reactivity::{Dep, Observer};

// =============================================================================
// Value
// =============================================================================

/// A dynamically typed state value.
///
/// Containers (`Arr`, `Obj`) are shared handles. Primitives are plain.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    Arr(Arr),
    Obj(Obj),
}

impl Value {
    /// Sameness for change detection.
    ///
    /// Containers compare by identity, primitives by value, and NaN is
    /// treated as equal to itself so a NaN write does not notify forever.
    pub fn same(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Num(x), Value::Num(y)) => x == y || (x.is_nan() && y.is_nan()),
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::Arr(x), Value::Arr(y)) => Arr::ptr_eq(x, y),
            (Value::Obj(x), Value::Obj(y)) => Obj::ptr_eq(x, y),
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// True for values that can carry an observer (arrays and objects).
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Arr(_) | Value::Obj(_))
    }

    pub fn as_obj(&self) -> Option<&Obj> {
        match self {
            Value::Obj(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_arr(&self) -> Option<&Arr> {
        match self {
            Value::Arr(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short type tag used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Arr(_) => "array",
            Value::Obj(_) => "object",
        }
    }

    /// Render a value as display text (for text vnodes).
    ///
    /// Undefined and null render empty, matching how render output treats
    /// missing interpolations.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Num(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::Str(s) => s.to_string(),
            Value::Arr(_) => "[array]".to_string(),
            Value::Obj(_) => "[object]".to_string(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Arr(a) => {
                let data = a.0.borrow();
                f.debug_list().entries(data.items.iter()).finish()
            }
            Value::Obj(o) => {
                let data = o.0.borrow();
                let mut map = f.debug_map();
                for (k, entry) in &data.entries {
                    map.entry(k, &entry.value);
                }
                map.finish()
            }
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Num(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Num(v as f64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Num(v as f64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Num(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Rc::from(v.as_str()))
    }
}

impl From<Arr> for Value {
    fn from(v: Arr) -> Self {
        Value::Arr(v)
    }
}

impl From<Obj> for Value {
    fn from(v: Obj) -> Self {
        Value::Obj(v)
    }
}

// =============================================================================
// Object
// =============================================================================

/// Dev-mode write guard attached to a reactive key.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Guard {
    None,
    /// Props warn when written outside a parent-driven update.
    Prop,
    /// Injected values warn on any direct write.
    Injection,
    /// Instance-level keys ($attrs, $listeners) are read-only outside a
    /// parent-driven update.
    InstanceReadonly,
}

/// One key of an object.
///
/// `dep` is allocated when the key is made reactive (see
/// `reactivity::observer::define_reactive`); plain objects carry none.
pub struct Entry {
    pub value: Value,
    pub dep: Option<Rc<Dep>>,
    /// Shallow keys never deep-observe their value (props, injections).
    pub shallow: bool,
    pub guard: Guard,
}

impl Entry {
    pub fn plain(value: Value) -> Self {
        Entry {
            value,
            dep: None,
            shallow: false,
            guard: Guard::None,
        }
    }
}

pub struct ObjData {
    pub entries: IndexMap<String, Entry>,
    /// The hidden back-reference installed by `observe`.
    pub ob: Option<Rc<Observer>>,
    /// Frozen containers are never observed.
    pub frozen: bool,
    /// Runtime-owned containers (`_props` and friends) reject key addition.
    pub runtime_internal: bool,
}

/// A keyed container with insertion-ordered keys and reference semantics.
#[derive(Clone)]
pub struct Obj(pub(crate) Rc<RefCell<ObjData>>);

impl Obj {
    pub fn new() -> Self {
        Obj(Rc::new(RefCell::new(ObjData {
            entries: IndexMap::new(),
            ob: None,
            frozen: false,
            runtime_internal: false,
        })))
    }

    /// Build from literal pairs. Keys keep insertion order.
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let obj = Obj::new();
        {
            let mut data = obj.0.borrow_mut();
            for (k, v) in pairs {
                data.entries.insert(k.into(), Entry::plain(v));
            }
        }
        obj
    }

    pub fn ptr_eq(a: &Obj, b: &Obj) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Untracked read. Reactive reads go through `Obj::get` in the observer
    /// module.
    pub fn raw_get(&self, key: &str) -> Value {
        self.0
            .borrow()
            .entries
            .get(key)
            .map(|e| e.value.clone())
            .unwrap_or(Value::Undefined)
    }

    /// Untracked write; creates the key as a plain entry if missing.
    pub fn raw_set(&self, key: &str, value: Value) {
        let mut data = self.0.borrow_mut();
        match data.entries.get_mut(key) {
            Some(entry) => entry.value = value,
            None => {
                data.entries.insert(key.to_string(), Entry::plain(value));
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.borrow().entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().entries.is_empty()
    }

    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.borrow().ob.clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    /// Freeze the container: no further observation.
    pub fn freeze(&self) -> &Self {
        self.0.borrow_mut().frozen = true;
        self
    }

    pub fn mark_runtime_internal(&self) {
        self.0.borrow_mut().runtime_internal = true;
    }

    pub fn is_runtime_internal(&self) -> bool {
        self.0.borrow().runtime_internal
    }
}

impl Default for Obj {
    fn default() -> Self {
        Obj::new()
    }
}

// =============================================================================
// Array
// =============================================================================

pub struct ArrData {
    pub items: Vec<Value>,
    pub ob: Option<Rc<Observer>>,
    pub frozen: bool,
}

/// An ordered sequence with reference semantics.
///
/// Index reads are untracked (element-of-array reads cannot be key-wise
/// tracked); structural mutations go through the interceptors in the
/// observer module and notify the array's observer dep.
#[derive(Clone)]
pub struct Arr(pub(crate) Rc<RefCell<ArrData>>);

impl Arr {
    pub fn new() -> Self {
        Arr(Rc::new(RefCell::new(ArrData {
            items: Vec::new(),
            ob: None,
            frozen: false,
        })))
    }

    pub fn from_values(items: impl IntoIterator<Item = Value>) -> Self {
        Arr(Rc::new(RefCell::new(ArrData {
            items: items.into_iter().collect(),
            ob: None,
            frozen: false,
        })))
    }

    pub fn ptr_eq(a: &Arr, b: &Arr) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    pub fn raw_get(&self, index: usize) -> Value {
        self.0
            .borrow()
            .items
            .get(index)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().items.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().items.clone()
    }

    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.borrow().ob.clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub fn freeze(&self) -> &Self {
        self.0.borrow_mut().frozen = true;
        self
    }
}

impl Default for Arr {
    fn default() -> Self {
        Arr::new()
    }
}

// =============================================================================
// Literal helpers
// =============================================================================

/// Build an object value from pairs: `obj([("a", 1.into())])`.
pub fn obj(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Value {
    Value::Obj(Obj::from_pairs(pairs.into_iter().map(|(k, v)| (k.to_string(), v))))
}

/// Build an array value from items.
pub fn arr(items: impl IntoIterator<Item = Value>) -> Value {
    Value::Arr(Arr::from_values(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_primitives() {
        assert!(Value::same(&Value::Num(1.0), &Value::Num(1.0)));
        assert!(!Value::same(&Value::Num(1.0), &Value::Num(2.0)));
        assert!(Value::same(&Value::from("a"), &Value::from("a")));
        assert!(!Value::same(&Value::Null, &Value::Undefined));
    }

    #[test]
    fn test_same_nan() {
        let nan = Value::Num(f64::NAN);
        assert!(Value::same(&nan, &Value::Num(f64::NAN)));
    }

    #[test]
    fn test_same_containers_by_identity() {
        let a = Arr::from_values([Value::Num(1.0)]);
        let b = Arr::from_values([Value::Num(1.0)]);
        assert!(Value::same(&Value::Arr(a.clone()), &Value::Arr(a.clone())));
        assert!(!Value::same(&Value::Arr(a), &Value::Arr(b)));
    }

    #[test]
    fn test_obj_key_order() {
        let o = Obj::from_pairs([("z", Value::Num(1.0)), ("a", Value::Num(2.0))]);
        assert_eq!(o.keys(), vec!["z".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_clone_is_handle() {
        let o = Obj::new();
        let v1 = Value::Obj(o.clone());
        let v2 = v1.clone();
        o.raw_set("x", Value::Num(5.0));
        assert!(matches!(v2.as_obj().unwrap().raw_get("x"), Value::Num(n) if n == 5.0));
        assert!(Value::same(&v1, &v2));
    }

    #[test]
    fn test_display_string() {
        assert_eq!(Value::Num(3.0).to_display_string(), "3");
        assert_eq!(Value::Num(3.5).to_display_string(), "3.5");
        assert_eq!(Value::Undefined.to_display_string(), "");
        assert_eq!(Value::from("hi").to_display_string(), "hi");
    }
}
