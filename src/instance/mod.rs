//! Component instances.
//!
//! A [`Component`] carries its merged options, its position in the
//! component tree, the per-instance reactive containers (props, data,
//! computed watchers, injections), its render watcher, and the vnode pair
//! that links it into the enclosing component's tree.
//!
//! Ownership discipline: parents hold children strongly, instances hold
//! their parent weakly; a placeholder vnode holds its child instance
//! strongly and `$destroy` clears that edge so the pair can be collected.

pub mod inject;
pub mod lifecycle;
pub mod state;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::host::NodeId;
use crate::options::ComponentOptions;
use crate::reactivity::dep::target;
use crate::reactivity::Watcher;
use crate::value::{Obj, Value};
use crate::vdom::patch::Patcher;
use crate::vdom::VNodeRef;
use crate::warn::warn;

/// Disposer handle returned by `$watch` and friends.
pub type Cleanup = Box<dyn FnOnce()>;

pub struct Component {
    pub uid: u64,

    options: RefCell<Rc<ComponentOptions>>,
    patcher: RefCell<Option<Rc<Patcher>>>,

    parent: RefCell<Weak<Component>>,
    children: RefCell<Vec<Rc<Component>>>,

    // Reactive state containers.
    data: RefCell<Value>,
    props: RefCell<Option<Obj>>,
    prop_keys: RefCell<Vec<String>>,
    props_data: RefCell<IndexMap<String, Value>>,
    instance_holder: RefCell<Option<Obj>>,
    computed_watchers: RefCell<IndexMap<String, Rc<Watcher>>>,
    watchers: RefCell<Vec<Rc<Watcher>>>,
    render_watcher: RefCell<Option<Rc<Watcher>>>,
    provided: RefCell<Option<Value>>,
    injections: RefCell<Option<Obj>>,

    // VDOM links.
    vnode: RefCell<Option<VNodeRef>>,
    placeholder: RefCell<Option<VNodeRef>>,
    el: Cell<Option<NodeId>>,

    // Status flags.
    is_mounted: Cell<bool>,
    is_destroyed: Cell<bool>,
    being_destroyed: Cell<bool>,
}

impl Component {
    pub(crate) fn new_shell(
        uid: u64,
        options: Rc<ComponentOptions>,
        patcher: Rc<Patcher>,
        placeholder: Option<VNodeRef>,
        props_data: IndexMap<String, Value>,
    ) -> Rc<Component> {
        Rc::new(Component {
            uid,
            options: RefCell::new(options),
            patcher: RefCell::new(Some(patcher)),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            data: RefCell::new(Value::Undefined),
            props: RefCell::new(None),
            prop_keys: RefCell::new(Vec::new()),
            props_data: RefCell::new(props_data),
            instance_holder: RefCell::new(None),
            computed_watchers: RefCell::new(IndexMap::new()),
            watchers: RefCell::new(Vec::new()),
            render_watcher: RefCell::new(None),
            provided: RefCell::new(None),
            injections: RefCell::new(None),
            vnode: RefCell::new(None),
            placeholder: RefCell::new(placeholder),
            el: Cell::new(None),
            is_mounted: Cell::new(false),
            is_destroyed: Cell::new(false),
            being_destroyed: Cell::new(false),
        })
    }

    // =========================================================================
    // Option / tree accessors
    // =========================================================================

    pub fn options(&self) -> Rc<ComponentOptions> {
        self.options.borrow().clone()
    }

    pub(crate) fn patcher(&self) -> Rc<Patcher> {
        self.patcher
            .borrow()
            .clone()
            .expect("component has no patcher")
    }

    pub fn parent(&self) -> Option<Rc<Component>> {
        self.parent.borrow().upgrade()
    }

    pub(crate) fn set_parent(&self, parent: Option<&Rc<Component>>) {
        *self.parent.borrow_mut() = parent.map(Rc::downgrade).unwrap_or_default();
    }

    pub fn children(&self) -> Vec<Rc<Component>> {
        self.children.borrow().clone()
    }

    pub(crate) fn add_child(&self, child: Rc<Component>) {
        self.children.borrow_mut().push(child);
    }

    pub(crate) fn remove_child(&self, uid: u64) {
        self.children.borrow_mut().retain(|c| c.uid != uid);
    }

    /// Root of the component tree this instance belongs to.
    pub fn root(self: &Rc<Self>) -> Rc<Component> {
        match self.parent() {
            Some(parent) => parent.root(),
            None => self.clone(),
        }
    }

    // =========================================================================
    // Status flags
    // =========================================================================

    pub fn is_mounted(&self) -> bool {
        self.is_mounted.get()
    }

    pub(crate) fn set_mounted(&self, mounted: bool) {
        self.is_mounted.set(mounted);
    }

    pub fn is_destroyed(&self) -> bool {
        self.is_destroyed.get()
    }

    pub(crate) fn set_destroyed(&self, destroyed: bool) {
        self.is_destroyed.set(destroyed);
    }

    pub fn is_being_destroyed(&self) -> bool {
        self.being_destroyed.get()
    }

    pub(crate) fn set_being_destroyed(&self, value: bool) {
        self.being_destroyed.set(value);
    }

    // =========================================================================
    // Watcher bookkeeping
    // =========================================================================

    pub(crate) fn add_watcher(&self, watcher: Rc<Watcher>) {
        self.watchers.borrow_mut().push(watcher);
    }

    pub(crate) fn remove_watcher(&self, watcher_id: u64) {
        self.watchers.borrow_mut().retain(|w| w.id != watcher_id);
    }

    pub(crate) fn take_watchers(&self) -> Vec<Rc<Watcher>> {
        std::mem::take(&mut *self.watchers.borrow_mut())
    }

    pub(crate) fn set_render_watcher(&self, watcher: Rc<Watcher>) {
        *self.render_watcher.borrow_mut() = Some(watcher);
    }

    pub fn render_watcher(&self) -> Option<Rc<Watcher>> {
        self.render_watcher.borrow().clone()
    }

    pub(crate) fn clear_render_watcher(&self) {
        *self.render_watcher.borrow_mut() = None;
    }

    pub(crate) fn computed_watcher(&self, key: &str) -> Option<Rc<Watcher>> {
        self.computed_watchers.borrow().get(key).cloned()
    }

    pub(crate) fn insert_computed_watcher(&self, key: String, watcher: Rc<Watcher>) {
        self.computed_watchers.borrow_mut().insert(key, watcher);
    }

    // =========================================================================
    // State containers
    // =========================================================================

    pub fn data_value(&self) -> Value {
        self.data.borrow().clone()
    }

    pub(crate) fn set_data(&self, data: Value) {
        *self.data.borrow_mut() = data;
    }

    pub(crate) fn props_obj(&self) -> Option<Obj> {
        self.props.borrow().clone()
    }

    pub(crate) fn set_props(&self, props: Obj, keys: Vec<String>) {
        *self.props.borrow_mut() = Some(props);
        *self.prop_keys.borrow_mut() = keys;
    }

    pub(crate) fn prop_keys(&self) -> Vec<String> {
        self.prop_keys.borrow().clone()
    }

    pub(crate) fn props_data(&self) -> IndexMap<String, Value> {
        self.props_data.borrow().clone()
    }

    pub(crate) fn set_props_data(&self, props_data: IndexMap<String, Value>) {
        *self.props_data.borrow_mut() = props_data;
    }

    pub(crate) fn instance_holder(&self) -> Option<Obj> {
        self.instance_holder.borrow().clone()
    }

    pub(crate) fn set_instance_holder(&self, holder: Obj) {
        *self.instance_holder.borrow_mut() = Some(holder);
    }

    pub(crate) fn provided(&self) -> Option<Value> {
        self.provided.borrow().clone()
    }

    pub(crate) fn set_provided(&self, provided: Value) {
        *self.provided.borrow_mut() = Some(provided);
    }

    pub(crate) fn injections(&self) -> Option<Obj> {
        self.injections.borrow().clone()
    }

    pub(crate) fn set_injections(&self, injections: Obj) {
        *self.injections.borrow_mut() = Some(injections);
    }

    // =========================================================================
    // VDOM links
    // =========================================================================

    pub fn vnode(&self) -> Option<VNodeRef> {
        self.vnode.borrow().clone()
    }

    pub(crate) fn set_vnode(&self, vnode: Option<VNodeRef>) {
        *self.vnode.borrow_mut() = vnode;
    }

    pub(crate) fn take_vnode(&self) -> Option<VNodeRef> {
        self.vnode.borrow_mut().take()
    }

    pub fn placeholder(&self) -> Option<VNodeRef> {
        self.placeholder.borrow().clone()
    }

    pub(crate) fn set_placeholder(&self, placeholder: Option<VNodeRef>) {
        *self.placeholder.borrow_mut() = placeholder;
    }

    pub(crate) fn take_placeholder(&self) -> Option<VNodeRef> {
        self.placeholder.borrow_mut().take()
    }

    pub fn el(&self) -> Option<NodeId> {
        self.el.get()
    }

    pub(crate) fn set_el(&self, el: Option<NodeId>) {
        self.el.set(el);
    }

    // =========================================================================
    // State access (the `this.key` proxy)
    // =========================================================================

    /// Read a piece of instance state. Resolution order: instance-level
    /// reactive keys (`$attrs`, `$listeners`), props, data, computed,
    /// injections.
    pub fn get(&self, key: &str) -> Value {
        if key.starts_with('$') {
            if let Some(holder) = self.instance_holder() {
                if holder.has(key) {
                    return holder.get(key);
                }
            }
        }
        if let Some(props) = self.props_obj() {
            if props.has(key) {
                return props.get(key);
            }
        }
        if let Some(data) = self.data_value().as_obj() {
            if data.has(key) {
                return data.get(key);
            }
        }
        if let Some(watcher) = self.computed_watcher(key) {
            if watcher.is_dirty() {
                watcher.evaluate();
            }
            if target().is_some() {
                watcher.depend();
            }
            return watcher.cached_value();
        }
        if let Some(injections) = self.injections() {
            if injections.has(key) {
                return injections.get(key);
            }
        }
        Value::Undefined
    }

    /// Write a piece of instance state. Prop writes warn through the
    /// reactive guard; computed writes need a declared setter.
    pub fn set(self: &Rc<Self>, key: &str, value: Value) {
        if let Some(props) = self.props_obj() {
            if props.has(key) {
                props.set(key, value);
                return;
            }
        }
        if let Some(data) = self.data_value().as_obj() {
            if data.has(key) {
                data.set(key, value);
                return;
            }
        }
        if self.computed_watcher(key).is_some() {
            let setter = self.options().computed.get(key).and_then(|c| c.set.clone());
            match setter {
                Some(setter) => {
                    let _ = crate::error::invoke_with_error_handling(
                        Some(self),
                        &format!("setter for computed \"{key}\""),
                        || setter(self, &value),
                    );
                }
                None => warn(format!(
                    "Computed property \"{key}\" was assigned to but it has no setter"
                )),
            }
            return;
        }
        warn(format!(
            "Cannot set undeclared reactive property \"{key}\" - declare it in data, \
             props, or computed"
        ));
    }

    /// Invoke a declared method.
    pub fn call_method(self: &Rc<Self>, name: &str, args: &[Value]) -> Value {
        let method = self.options().methods.get(name).cloned();
        match method {
            Some(method) => crate::error::invoke_with_error_handling(
                Some(self),
                &format!("method \"{name}\""),
                || method(self, args),
            )
            .unwrap_or(Value::Undefined),
            None => {
                warn(format!("Method \"{name}\" is not defined"));
                Value::Undefined
            }
        }
    }

    /// Runtime reactive key addition on instance state (`$set`).
    pub fn set_key(&self, target_key: &str, key: &str, value: Value) -> Value {
        let container = self.get_untracked(target_key);
        crate::reactivity::set(&container, key, value)
    }

    /// Runtime reactive key removal (`$delete`).
    pub fn del_key(&self, target_key: &str, key: &str) {
        let container = self.get_untracked(target_key);
        crate::reactivity::del(&container, key);
    }

    /// Read without registering dependencies (raw data/prop lookup).
    pub fn get_untracked(&self, key: &str) -> Value {
        if let Some(props) = self.props_obj() {
            if props.has(key) {
                return props.raw_get(key);
            }
        }
        if let Some(data) = self.data_value().as_obj() {
            if data.has(key) {
                return data.raw_get(key);
            }
        }
        Value::Undefined
    }

    /// Replacing the root `$data` is not supported.
    pub fn replace_root_data(&self, _data: Value) {
        warn("Avoid replacing instance root $data - use nested data properties instead");
    }

    // =========================================================================
    // Public instance surface
    // =========================================================================

    /// Defer a callback past the next scheduler flush.
    pub fn next_tick(&self, cb: impl FnOnce() + 'static) {
        crate::reactivity::next_tick(Box::new(cb));
    }

    /// Re-render without a data change.
    pub fn force_update(self: &Rc<Self>) {
        lifecycle::force_update(self);
    }

    /// Tear this instance down.
    pub fn destroy(self: &Rc<Self>) {
        lifecycle::destroy_component(self);
    }

    /// Watch a dotted path into instance state. Returns a disposer.
    pub fn watch_path(
        self: &Rc<Self>,
        path: impl Into<String>,
        decl: crate::options::WatchDecl,
    ) -> Cleanup {
        state::watch(self, state::WatchSource::Path(path.into()), decl)
    }

    /// Watch a getter over instance state. Returns a disposer.
    pub fn watch_getter(
        self: &Rc<Self>,
        getter: crate::options::UserGetter,
        decl: crate::options::WatchDecl,
    ) -> Cleanup {
        state::watch(self, state::WatchSource::Getter(getter), decl)
    }
}
