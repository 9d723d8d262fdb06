//! The vnode factory.
//!
//! `create_element` dispatches on the tag: reserved host tags become plain
//! element vnodes, registered component ids (and inline option records)
//! become component vnodes, unknown strings stay plain elements. Children
//! arrive as raw material and are normalized either shallowly (known-flat
//! input) or fully (recursive flatten plus adjacent-text coalescing).

use std::rc::Rc;

use crate::instance::Component;
use crate::options::ComponentOptions;
use crate::value::Value;
use crate::warn::warn;

use super::create_component::create_component;
use super::vnode::{create_empty_vnode, create_text_vnode, Key, VNode, VNodeData, VNodeRef};
use super::{get_tag_namespace, is_reserved_tag};

/// What the factory accepts as a tag.
pub enum TagInput {
    Tag(String),
    Options(Rc<ComponentOptions>),
}

impl From<&str> for TagInput {
    fn from(tag: &str) -> Self {
        TagInput::Tag(tag.to_string())
    }
}

impl From<Rc<ComponentOptions>> for TagInput {
    fn from(options: Rc<ComponentOptions>) -> Self {
        TagInput::Options(options)
    }
}

/// Raw child material fed to normalization.
pub enum RawChild {
    Node(VNodeRef),
    Text(String),
    Value(Value),
    List(Vec<RawChild>),
}

impl From<VNodeRef> for RawChild {
    fn from(node: VNodeRef) -> Self {
        RawChild::Node(node)
    }
}

impl From<&str> for RawChild {
    fn from(text: &str) -> Self {
        RawChild::Text(text.to_string())
    }
}

impl From<String> for RawChild {
    fn from(text: String) -> Self {
        RawChild::Text(text)
    }
}

impl From<Value> for RawChild {
    fn from(value: Value) -> Self {
        RawChild::Value(value)
    }
}

impl From<Vec<RawChild>> for RawChild {
    fn from(list: Vec<RawChild>) -> Self {
        RawChild::List(list)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum NormalizationMode {
    /// Flatten one level: input known to be flat apart from list splices.
    Simple,
    /// Recursive flatten plus adjacent-text coalescing: user-authored
    /// render output.
    Full,
}

// =============================================================================
// createElement
// =============================================================================

/// User-facing factory with full normalization (hand-written render
/// functions).
pub fn h(
    vm: &Rc<Component>,
    tag: impl Into<TagInput>,
    data: Option<VNodeData>,
    children: Vec<RawChild>,
) -> VNodeRef {
    create_element(vm, tag.into(), data, children, NormalizationMode::Full)
}

/// Text child shorthand.
pub fn h_text(text: impl Into<String>) -> RawChild {
    RawChild::Text(text.into())
}

pub fn create_element(
    vm: &Rc<Component>,
    tag: TagInput,
    data: Option<VNodeData>,
    children: Vec<RawChild>,
    mode: NormalizationMode,
) -> VNodeRef {
    // `is` reroutes the tag.
    let tag = match (&data, tag) {
        (Some(d), TagInput::Tag(_)) if d.is.is_some() => {
            TagInput::Tag(d.is.clone().unwrap())
        }
        (_, tag) => tag,
    };

    let children = normalize_children(children, mode);

    match tag {
        TagInput::Options(options) => create_component(vm, options, data, children, None),
        TagInput::Tag(name) => {
            if name.is_empty() {
                return create_empty_vnode();
            }
            if is_reserved_tag(&name) {
                let ns = get_tag_namespace(&name);
                return VNode::element(name, data, children, ns);
            }
            if let Some(resolved) = vm.options().components.resolve(&name) {
                return create_component(vm, resolved, data, children, Some(name.as_str()));
            }
            // Unknown string: plain element (runtime-checked at the host).
            VNode::element(name, data, children, None)
        }
    }
}

// =============================================================================
// Dynamic vnode data
// =============================================================================

/// Build [`VNodeData`] from a dynamic value.
///
/// Reactive (observed) objects are rejected with a warning: vnode data
/// must stay inert, the render watcher already owns the subscription.
pub fn data_from_value(value: &Value) -> Option<VNodeData> {
    let obj = value.as_obj()?;
    if obj.observer().is_some() {
        warn(
            "Avoid using observed data object as vnode data - always create fresh \
             vnode data objects in each render",
        );
        return None;
    }
    let mut data = VNodeData::new();
    if let Some(key) = Key::from_value(&obj.raw_get("key")) {
        data.key = Some(key);
    }
    if let Some(attrs) = obj.raw_get("attrs").as_obj() {
        for key in attrs.keys() {
            data.attrs.insert(key.clone(), attrs.raw_get(&key));
        }
    }
    if let Some(on) = obj.raw_get("on").as_obj() {
        for key in on.keys() {
            data.on.insert(key.clone(), on.raw_get(&key));
        }
    }
    if let Some(is_tag) = obj.raw_get("is").as_str() {
        data.is = Some(is_tag.to_string());
    }
    if let Some(ref_name) = obj.raw_get("ref").as_str() {
        data.ref_name = Some(ref_name.to_string());
    }
    Some(data)
}

// =============================================================================
// Children normalization
// =============================================================================

pub fn normalize_children(children: Vec<RawChild>, mode: NormalizationMode) -> Vec<VNodeRef> {
    match mode {
        NormalizationMode::Simple => simple_normalize(children),
        NormalizationMode::Full => {
            let mut out = Vec::new();
            full_normalize(children, &mut out);
            out
        }
    }
}

fn simple_normalize(children: Vec<RawChild>) -> Vec<VNodeRef> {
    let mut out = Vec::new();
    for child in children {
        match child {
            RawChild::Node(node) => out.push(node),
            RawChild::Text(text) => out.push(create_text_vnode(text)),
            RawChild::Value(value) => out.push(create_text_vnode(value.to_display_string())),
            RawChild::List(list) => {
                for item in list {
                    match item {
                        RawChild::Node(node) => out.push(node),
                        RawChild::Text(text) => out.push(create_text_vnode(text)),
                        RawChild::Value(value) => {
                            out.push(create_text_vnode(value.to_display_string()))
                        }
                        // One level only.
                        RawChild::List(nested) => out.extend(simple_normalize(nested)),
                    }
                }
            }
        }
    }
    out
}

fn full_normalize(children: Vec<RawChild>, out: &mut Vec<VNodeRef>) {
    for child in children {
        match child {
            RawChild::List(list) => full_normalize(list, out),
            RawChild::Text(text) => push_text(out, text),
            RawChild::Value(value) => {
                if !value.is_undefined() && !matches!(value, Value::Null) {
                    push_text(out, value.to_display_string());
                }
            }
            RawChild::Node(node) => {
                // Coalesce adjacent text nodes.
                let is_plain_text = node.text.is_some() && !node.is_comment.get() && node.tag.is_none();
                if is_plain_text {
                    push_text(out, node.text.clone().unwrap_or_default());
                } else {
                    out.push(node);
                }
            }
        }
    }
}

fn push_text(out: &mut Vec<VNodeRef>, text: String) {
    if let Some(last) = out.last() {
        if last.text.is_some() && last.tag.is_none() && !last.is_comment.get() {
            let merged = format!("{}{}", last.text.clone().unwrap_or_default(), text);
            out.pop();
            out.push(create_text_vnode(merged));
            return;
        }
    }
    if !text.is_empty() {
        out.push(create_text_vnode(text));
    }
}
