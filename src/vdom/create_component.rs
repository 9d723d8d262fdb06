//! Component vnodes and their management hooks.
//!
//! A component vnode is a placeholder in the parent's tree. Its `init`
//! hook instantiates and mounts the child; `prepatch` forwards new props
//! through the child's reactivity; `insert` fires `mounted` bottom-up;
//! `destroy` tears the child down. User hooks on the same vnode run after
//! the component's own.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::instance::lifecycle::{
    active_instance, call_hook, destroy_component, mount_component, update_child_component,
};
use crate::instance::Component;
use crate::options::merge::normalize_props;
use crate::options::{hyphenate, ComponentOptions, HookKind};
use crate::value::Value;

use super::vnode::{
    create_comment_vnode, ComponentVNodeOptions, VNode, VNodeData, VNodeHooks, VNodeRef,
};

// =============================================================================
// Creation
// =============================================================================

pub fn create_component(
    _vm: &Rc<Component>,
    ctor: Rc<ComponentOptions>,
    data: Option<VNodeData>,
    children: Vec<VNodeRef>,
    tag: Option<&str>,
) -> VNodeRef {
    let mut data = data.unwrap_or_default();

    // Pull declared props out of attrs; what remains flows to `$attrs`.
    let props_data = extract_props_from_data(&ctor, &mut data);
    let listeners = std::mem::take(&mut data.on);

    install_component_hooks(&data);

    let name = ctor
        .name
        .clone()
        .or_else(|| tag.map(String::from))
        .unwrap_or_else(|| "anonymous".to_string());
    let vnode_tag = format!("component-{name}");

    VNode::component(
        vnode_tag,
        data,
        ComponentVNodeOptions {
            options: ctor,
            props_data,
            listeners,
            tag: name,
            children,
        },
    )
}

fn extract_props_from_data(
    ctor: &Rc<ComponentOptions>,
    data: &mut VNodeData,
) -> IndexMap<String, Value> {
    let declared = normalize_props(&ctor.props);
    let mut out = IndexMap::new();
    for key in declared.keys() {
        let alt_key = hyphenate(key);
        if let Some(value) = data.attrs.shift_remove(key) {
            out.insert(key.clone(), value);
        } else if let Some(value) = data.attrs.shift_remove(&alt_key) {
            out.insert(key.clone(), value);
        }
    }
    out
}

// =============================================================================
// Management hooks
// =============================================================================

/// Install the component management hooks, wrapping any user hooks so both
/// run (component first).
fn install_component_hooks(data: &VNodeData) {
    let user = data.hook.borrow().clone().unwrap_or_default();

    let merged = VNodeHooks {
        init: Some(merge_hook1(Rc::new(hook_init), user.init.clone())),
        prepatch: Some(merge_hook2(Rc::new(hook_prepatch), user.prepatch.clone())),
        insert: Some(merge_hook1(Rc::new(hook_insert), user.insert.clone())),
        destroy: Some(merge_hook1(Rc::new(hook_destroy), user.destroy.clone())),
        create: user.create.clone(),
        update: user.update.clone(),
        postpatch: user.postpatch.clone(),
        remove: user.remove.clone(),
    };
    *data.hook.borrow_mut() = Some(Rc::new(merged));
}

fn merge_hook1(
    ours: Rc<dyn Fn(&VNodeRef)>,
    user: Option<Rc<dyn Fn(&VNodeRef)>>,
) -> Rc<dyn Fn(&VNodeRef)> {
    match user {
        None => ours,
        Some(user) => Rc::new(move |vnode: &VNodeRef| {
            ours(vnode);
            user(vnode);
        }),
    }
}

fn merge_hook2(
    ours: Rc<dyn Fn(&VNodeRef, &VNodeRef)>,
    user: Option<Rc<dyn Fn(&VNodeRef, &VNodeRef)>>,
) -> Rc<dyn Fn(&VNodeRef, &VNodeRef)> {
    match user {
        None => ours,
        Some(user) => Rc::new(move |old: &VNodeRef, new: &VNodeRef| {
            ours(old, new);
            user(old, new);
        }),
    }
}

/// Instantiate the child and mount it (populating its `$el`).
fn hook_init(vnode: &VNodeRef) {
    let Some(component_options) = &vnode.component_options else {
        return;
    };
    let parent = active_instance();
    let Some(parent) = parent else {
        // A component vnode can only come to life inside a patch.
        return;
    };
    let child = crate::instance::lifecycle::init(
        &component_options.options,
        parent.patcher(),
        Some(parent),
        Some(vnode.clone()),
        component_options.props_data.clone(),
    );
    *vnode.component_instance.borrow_mut() = Some(child.clone());
    mount_component(&child, None);
}

/// Adopt the existing instance and push the new inputs through its
/// reactivity.
fn hook_prepatch(old: &VNodeRef, new: &VNodeRef) {
    let Some(instance) = old.component_instance.borrow().clone() else {
        return;
    };
    *new.component_instance.borrow_mut() = Some(instance.clone());
    let Some(component_options) = &new.component_options else {
        return;
    };
    update_child_component(
        &instance,
        component_options.props_data.clone(),
        component_options.listeners.clone(),
        new.clone(),
    );
}

/// First insertion into the live tree: `mounted`, bottom-up.
fn hook_insert(vnode: &VNodeRef) {
    let Some(instance) = vnode.component_instance.borrow().clone() else {
        return;
    };
    if !instance.is_mounted() {
        instance.set_mounted(true);
        call_hook(&instance, HookKind::Mounted);
    }
}

fn hook_destroy(vnode: &VNodeRef) {
    let Some(instance) = vnode.component_instance.borrow().clone() else {
        return;
    };
    if !instance.is_being_destroyed() {
        destroy_component(&instance);
    }
}

// =============================================================================
// Async placeholder
// =============================================================================

/// The minimum async-component surface: a comment placeholder flagged so
/// the diff treats the eventual placeholder -> resolved swap as a full
/// replace.
pub fn create_async_placeholder(text: impl Into<String>) -> VNodeRef {
    let vnode = create_comment_vnode(text);
    vnode.is_async_placeholder.set(true);
    vnode
}
