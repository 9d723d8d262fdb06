//! Virtual nodes.
//!
//! A `VNode` describes a desired host-node state. The diff only ever
//! compares vnodes through [`same_vnode`]; everything else is patch
//! mechanics. Fields the patch binds late (the host node, the child
//! component instance, the placeholder backlink) use interior mutability;
//! the descriptive fields are immutable after construction.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::host::NodeId;
use crate::instance::Component;
use crate::options::ComponentOptions;
use crate::value::Value;

pub type VNodeRef = Rc<VNode>;

/// Diff key. Type matters: a string key never matches a numeric key.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Key {
    Str(Rc<str>),
    Num(i64),
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Num(value)
    }
}

impl Key {
    /// Keys authored as dynamic values: strings and numbers only.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Str(s) => Some(Key::Str(s.clone())),
            Value::Num(n) => Some(Key::Num(*n as i64)),
            _ => None,
        }
    }
}

/// Shared handle passed to remove hooks; call `done()` when your removal
/// work has finished.
pub type RemoveHandle = Rc<dyn Fn()>;

/// Per-vnode user hooks, run alongside module hooks.
#[derive(Clone, Default)]
pub struct VNodeHooks {
    pub init: Option<Rc<dyn Fn(&VNodeRef)>>,
    pub create: Option<Rc<dyn Fn(&VNodeRef, &VNodeRef)>>,
    pub prepatch: Option<Rc<dyn Fn(&VNodeRef, &VNodeRef)>>,
    pub insert: Option<Rc<dyn Fn(&VNodeRef)>>,
    pub update: Option<Rc<dyn Fn(&VNodeRef, &VNodeRef)>>,
    pub postpatch: Option<Rc<dyn Fn(&VNodeRef, &VNodeRef)>>,
    pub remove: Option<Rc<dyn Fn(&VNodeRef, RemoveHandle)>>,
    pub destroy: Option<Rc<dyn Fn(&VNodeRef)>>,
}

/// Authored vnode data: key, attributes, listener payload, hooks, `is`.
#[derive(Clone, Default)]
pub struct VNodeData {
    pub key: Option<Key>,
    pub attrs: IndexMap<String, Value>,
    /// Listener payload; the emitter consuming it is an external
    /// collaborator.
    pub on: IndexMap<String, Value>,
    pub hook: RefCell<Option<Rc<VNodeHooks>>>,
    /// Reroutes the tag at creation time.
    pub is: Option<String>,
    pub ref_name: Option<String>,
}

impl VNodeData {
    pub fn new() -> Self {
        VNodeData::default()
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn listener(mut self, name: impl Into<String>, payload: impl Into<Value>) -> Self {
        self.on.insert(name.into(), payload.into());
        self
    }

    pub fn is(mut self, tag: impl Into<String>) -> Self {
        self.is = Some(tag.into());
        self
    }

    pub fn hooks(self, hooks: VNodeHooks) -> Self {
        *self.hook.borrow_mut() = Some(Rc::new(hooks));
        self
    }
}

/// Payload of a component vnode: the resolved definition plus the inputs
/// the child will receive.
#[derive(Clone)]
pub struct ComponentVNodeOptions {
    pub options: Rc<ComponentOptions>,
    pub props_data: IndexMap<String, Value>,
    pub listeners: IndexMap<String, Value>,
    pub tag: String,
    /// Slot children (slot distribution itself is an external concern).
    pub children: Vec<VNodeRef>,
}

pub struct VNode {
    pub tag: Option<String>,
    pub data: Option<VNodeData>,
    pub children: RefCell<Vec<VNodeRef>>,
    pub text: Option<String>,
    pub elm: Cell<Option<NodeId>>,
    pub ns: Option<&'static str>,
    pub key: Option<Key>,
    pub component_options: Option<ComponentVNodeOptions>,
    pub component_instance: RefCell<Option<Rc<Component>>>,
    /// The placeholder vnode in the enclosing component, when this is a
    /// component's root.
    pub parent: RefCell<Option<Weak<VNode>>>,
    pub is_comment: Cell<bool>,
    pub is_static: bool,
    pub is_async_placeholder: Cell<bool>,
    /// Insert hooks deferred by a child component's initial patch, adopted
    /// by the enclosing patch when this placeholder is wired in.
    pub pending_insert: RefCell<Vec<VNodeRef>>,
}

impl VNode {
    fn bare() -> VNode {
        VNode {
            tag: None,
            data: None,
            children: RefCell::new(Vec::new()),
            text: None,
            elm: Cell::new(None),
            ns: None,
            key: None,
            component_options: None,
            component_instance: RefCell::new(None),
            parent: RefCell::new(None),
            is_comment: Cell::new(false),
            is_static: false,
            is_async_placeholder: Cell::new(false),
            pending_insert: RefCell::new(Vec::new()),
        }
    }

    pub fn element(
        tag: impl Into<String>,
        data: Option<VNodeData>,
        children: Vec<VNodeRef>,
        ns: Option<&'static str>,
    ) -> VNodeRef {
        let key = data.as_ref().and_then(|d| d.key.clone());
        Rc::new(VNode {
            tag: Some(tag.into()),
            data,
            children: RefCell::new(children),
            key,
            ns,
            ..VNode::bare()
        })
    }

    pub fn component(
        tag: impl Into<String>,
        data: VNodeData,
        component_options: ComponentVNodeOptions,
    ) -> VNodeRef {
        let key = data.key.clone();
        Rc::new(VNode {
            tag: Some(tag.into()),
            data: Some(data),
            key,
            component_options: Some(component_options),
            ..VNode::bare()
        })
    }
}

/// A text node.
pub fn create_text_vnode(text: impl Into<String>) -> VNodeRef {
    Rc::new(VNode {
        text: Some(text.into()),
        ..VNode::bare()
    })
}

/// An empty (comment) vnode.
pub fn create_empty_vnode() -> VNodeRef {
    create_comment_vnode("")
}

pub fn create_comment_vnode(text: impl Into<String>) -> VNodeRef {
    let vnode = VNode {
        text: Some(text.into()),
        ..VNode::bare()
    };
    vnode.is_comment.set(true);
    Rc::new(vnode)
}

/// Render output: a single root, or a list the runtime will validate.
pub enum Rendered {
    One(VNodeRef),
    Many(Vec<VNodeRef>),
}

impl From<VNodeRef> for Rendered {
    fn from(node: VNodeRef) -> Self {
        Rendered::One(node)
    }
}

impl From<Vec<VNodeRef>> for Rendered {
    fn from(nodes: Vec<VNodeRef>) -> Self {
        Rendered::Many(nodes)
    }
}

// =============================================================================
// same_vnode
// =============================================================================

/// Diff-level equivalence: matching key, tag, comment-ness, data
/// definedness, input type, and (for component vnodes) the same resolved
/// definition.
pub fn same_vnode(a: &VNodeRef, b: &VNodeRef) -> bool {
    a.key == b.key
        && a.tag == b.tag
        && a.is_comment.get() == b.is_comment.get()
        && a.data.is_some() == b.data.is_some()
        && a.is_async_placeholder.get() == b.is_async_placeholder.get()
        && same_component(a, b)
        && same_input_type(a, b)
}

fn same_component(a: &VNodeRef, b: &VNodeRef) -> bool {
    match (&a.component_options, &b.component_options) {
        (None, None) => true,
        (Some(ca), Some(cb)) => Rc::ptr_eq(&ca.options, &cb.options),
        _ => false,
    }
}

/// Inputs morph between kinds; a type change forces a replace.
fn same_input_type(a: &VNodeRef, b: &VNodeRef) -> bool {
    if a.tag.as_deref() != Some("input") {
        return true;
    }
    let type_of = |vnode: &VNodeRef| {
        vnode
            .data
            .as_ref()
            .and_then(|data| data.attrs.get("type"))
            .map(|value| value.to_display_string())
    };
    type_of(a) == type_of(b)
}
