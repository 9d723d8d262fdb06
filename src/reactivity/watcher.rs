//! Watcher - a subscription from a getter expression to every dep it reads.
//!
//! Watchers come in three shapes built from the same machinery:
//! - render watchers: getter renders and patches, callback is a no-op
//! - user watchers: getter reads a path or user fn, callback is the handler
//! - computed watchers: `lazy`, cache their value behind a `dirty` flag
//!
//! Dependency bookkeeping is generational: each `get()` collects into the
//! next-generation set, then `cleanup_deps` unsubscribes from deps the
//! evaluation no longer touched and swaps generations. That is what lets a
//! render branch drop subscriptions it no longer needs.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use crate::instance::Component;
use crate::value::Value;

use super::dep::{pop_target, push_target, Dep};
use super::scheduler;

thread_local! {
    static WATCHER_UID: Cell<u64> = const { Cell::new(0) };
}

pub type WatcherGetter = Box<dyn Fn() -> Value>;
pub type WatcherCallback = Box<dyn Fn(&Value, &Value)>;

#[derive(Default, Clone, Copy)]
pub struct WatcherOptions {
    pub deep: bool,
    pub user: bool,
    pub lazy: bool,
    pub sync: bool,
}

pub struct Watcher {
    pub id: u64,
    vm: Weak<Component>,
    getter: WatcherGetter,
    cb: WatcherCallback,
    value: RefCell<Value>,
    deps: RefCell<Vec<Rc<Dep>>>,
    new_deps: RefCell<Vec<Rc<Dep>>>,
    dep_ids: RefCell<HashSet<u64>>,
    new_dep_ids: RefCell<HashSet<u64>>,
    pub deep: bool,
    pub user: bool,
    pub lazy: bool,
    pub sync: bool,
    /// Marks the owner's render watcher (drives `updated` hooks).
    pub is_render: bool,
    active: Cell<bool>,
    dirty: Cell<bool>,
    before: Option<Box<dyn Fn()>>,
}

impl Watcher {
    /// Create a watcher and, unless lazy, evaluate it once immediately.
    ///
    /// Render watchers are registered on the owner *before* the first
    /// evaluation: the initial render reaches back through the instance.
    pub fn create(
        vm: Option<&Rc<Component>>,
        getter: WatcherGetter,
        cb: WatcherCallback,
        options: WatcherOptions,
        before: Option<Box<dyn Fn()>>,
        is_render: bool,
    ) -> Rc<Watcher> {
        let id = WATCHER_UID.with(|uid| {
            let id = uid.get();
            uid.set(id + 1);
            id
        });
        let watcher = Rc::new(Watcher {
            id,
            vm: vm.map(Rc::downgrade).unwrap_or_default(),
            getter,
            cb,
            value: RefCell::new(Value::Undefined),
            deps: RefCell::new(Vec::new()),
            new_deps: RefCell::new(Vec::new()),
            dep_ids: RefCell::new(HashSet::new()),
            new_dep_ids: RefCell::new(HashSet::new()),
            deep: options.deep,
            user: options.user,
            lazy: options.lazy,
            sync: options.sync,
            is_render,
            active: Cell::new(true),
            dirty: Cell::new(options.lazy),
            before,
        });
        if let Some(vm) = vm {
            vm.add_watcher(watcher.clone());
            if is_render {
                vm.set_render_watcher(watcher.clone());
            }
        }
        if !watcher.lazy {
            let value = watcher.get();
            *watcher.value.borrow_mut() = value;
        }
        watcher
    }

    /// Evaluate the getter with this watcher as the capture target.
    pub fn get(self: &Rc<Self>) -> Value {
        push_target(Some(self.clone()));
        let value = (self.getter)();
        if self.deep {
            traverse(&value);
        }
        pop_target();
        self.cleanup_deps();
        value
    }

    /// Record a dep touched during the current evaluation.
    pub fn add_dep(self: &Rc<Self>, dep: Rc<Dep>) {
        let is_new = !self.new_dep_ids.borrow().contains(&dep.id);
        if is_new {
            self.new_dep_ids.borrow_mut().insert(dep.id);
            let already_subscribed = self.dep_ids.borrow().contains(&dep.id);
            if !already_subscribed {
                dep.add_sub(self);
            }
            self.new_deps.borrow_mut().push(dep);
        }
    }

    /// Unsubscribe from deps the latest evaluation did not touch, then
    /// promote the next generation and clear the scratch set.
    fn cleanup_deps(&self) {
        {
            let deps = self.deps.borrow();
            let new_ids = self.new_dep_ids.borrow();
            for dep in deps.iter() {
                if !new_ids.contains(&dep.id) {
                    dep.remove_sub(self.id);
                }
            }
        }
        std::mem::swap(
            &mut *self.deps.borrow_mut(),
            &mut *self.new_deps.borrow_mut(),
        );
        std::mem::swap(
            &mut *self.dep_ids.borrow_mut(),
            &mut *self.new_dep_ids.borrow_mut(),
        );
        self.new_deps.borrow_mut().clear();
        self.new_dep_ids.borrow_mut().clear();
    }

    /// Change notification from a dep.
    pub fn update(self: &Rc<Self>) {
        if self.lazy {
            self.dirty.set(true);
        } else if self.sync {
            self.run();
        } else {
            scheduler::queue_watcher(self.clone());
        }
    }

    /// Re-evaluate and fire the callback if the value changed.
    ///
    /// Containers and deep watchers always fire: the getter may return the
    /// same handle with mutated contents.
    pub fn run(self: &Rc<Self>) {
        if !self.active.get() {
            return;
        }
        let value = self.get();
        let old = self.value.borrow().clone();
        if !Value::same(&value, &old) || value.is_container() || self.deep {
            *self.value.borrow_mut() = value.clone();
            (self.cb)(&value, &old);
        }
    }

    /// For lazy watchers: evaluate once and clear `dirty`.
    pub fn evaluate(self: &Rc<Self>) {
        let value = self.get();
        *self.value.borrow_mut() = value;
        self.dirty.set(false);
    }

    /// For lazy watchers: forward `depend` to every dep this watcher
    /// subscribes to, so the enclosing watcher inherits them.
    pub fn depend(&self) {
        let deps = self.deps.borrow().clone();
        for dep in deps {
            dep.depend();
        }
    }

    /// Unsubscribe from all deps and from the owner's watcher list.
    pub fn teardown(self: &Rc<Self>) {
        if !self.active.get() {
            return;
        }
        if let Some(vm) = self.vm.upgrade() {
            if !vm.is_being_destroyed() {
                vm.remove_watcher(self.id);
            }
        }
        let deps = self.deps.borrow().clone();
        for dep in deps {
            dep.remove_sub(self.id);
        }
        self.active.set(false);
    }

    pub fn call_before(&self) {
        if let Some(before) = &self.before {
            before();
        }
    }

    pub fn vm(&self) -> Option<Rc<Component>> {
        self.vm.upgrade()
    }

    pub fn cached_value(&self) -> Value {
        self.value.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Dep count of the current generation (for testing).
    pub fn dep_count(&self) -> usize {
        self.deps.borrow().len()
    }

    /// Whether the current generation contains the dep (for testing).
    pub fn depends_on(&self, dep_id: u64) -> bool {
        self.dep_ids.borrow().contains(&dep_id)
    }

    /// Size of the next-generation scratch set (for testing).
    pub fn pending_dep_count(&self) -> usize {
        self.new_deps.borrow().len()
    }
}

/// Reset the watcher id counter (for testing).
pub fn reset_watcher_uid() {
    WATCHER_UID.with(|uid| uid.set(0));
}

// =============================================================================
// Deep traversal
// =============================================================================

/// Recursively read every nested key of a value so a deep watcher
/// registers on the whole subtree. Object keys are read through the
/// tracked getter; observer dep ids guard against cycles.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    traverse_inner(value, &mut seen);
}

fn traverse_inner(value: &Value, seen: &mut HashSet<u64>) {
    match value {
        Value::Arr(array) => {
            if array.is_frozen() {
                return;
            }
            if let Some(ob) = array.observer() {
                if !seen.insert(ob.dep.id) {
                    return;
                }
            }
            for item in array.to_vec() {
                traverse_inner(&item, seen);
            }
        }
        Value::Obj(object) => {
            if object.is_frozen() {
                return;
            }
            if let Some(ob) = object.observer() {
                if !seen.insert(ob.dep.id) {
                    return;
                }
            }
            for key in object.keys() {
                let child = object.get(&key);
                traverse_inner(&child, seen);
            }
        }
        _ => {}
    }
}
