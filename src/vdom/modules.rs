//! Patch modules.
//!
//! A module declares any subset of create/activate/update/remove/destroy
//! hooks; the patch factory fans them out into per-stage arrays at
//! construction time, so there is no per-vnode dispatch at runtime.
//!
//! The `attrs` module ships as the reference implementation: it diffs the
//! attribute maps of old and new vnodes and drives the backend's attribute
//! surface.

use std::rc::Rc;

use crate::host::SharedBackend;
use crate::value::Value;

use super::vnode::{RemoveHandle, VNodeRef};

/// One injected module: any subset of the five stage hooks.
#[derive(Default, Clone)]
pub struct ModuleHooks {
    pub create: Option<Rc<dyn Fn(&VNodeRef, &VNodeRef)>>,
    pub activate: Option<Rc<dyn Fn(&VNodeRef, &VNodeRef)>>,
    pub update: Option<Rc<dyn Fn(&VNodeRef, &VNodeRef)>>,
    pub remove: Option<Rc<dyn Fn(&VNodeRef, RemoveHandle)>>,
    pub destroy: Option<Rc<dyn Fn(&VNodeRef)>>,
}

// =============================================================================
// attrs module
// =============================================================================

/// Attribute diffing against the backend's attribute surface.
///
/// Falsy values (undefined, null, false) remove the attribute; `true`
/// renders as an empty string, everything else via its display text.
pub fn attrs_module(backend: SharedBackend) -> ModuleHooks {
    let for_create = backend.clone();
    let create = Rc::new(move |old: &VNodeRef, new: &VNodeRef| {
        update_attrs(&for_create, old, new);
    });
    let for_update = backend;
    let update = Rc::new(move |old: &VNodeRef, new: &VNodeRef| {
        update_attrs(&for_update, old, new);
    });
    ModuleHooks {
        create: Some(create),
        update: Some(update),
        ..Default::default()
    }
}

fn is_falsy_attr(value: &Value) -> bool {
    matches!(value, Value::Undefined | Value::Null | Value::Bool(false))
}

fn attr_text(value: &Value) -> String {
    match value {
        Value::Bool(true) => String::new(),
        other => other.to_display_string(),
    }
}

fn update_attrs(backend: &SharedBackend, old: &VNodeRef, new: &VNodeRef) {
    // Component placeholders hand their attrs to the child as props and
    // $attrs; nothing lands on a host node here.
    if new.component_options.is_some() {
        return;
    }
    let Some(el) = new.elm.get() else { return };
    let empty = Default::default();
    let old_attrs = old.data.as_ref().map(|d| &d.attrs).unwrap_or(&empty);
    let new_attrs = new.data.as_ref().map(|d| &d.attrs).unwrap_or(&empty);

    for (name, value) in new_attrs {
        let old_value = old_attrs.get(name);
        let changed = old_value.map_or(true, |old_value| !Value::same(old_value, value));
        if is_falsy_attr(value) {
            if old_value.is_some_and(|old_value| !is_falsy_attr(old_value)) {
                backend.borrow_mut().remove_attribute(el, name);
            }
        } else if changed {
            backend
                .borrow_mut()
                .set_attribute(el, name, &attr_text(value));
        }
    }
    for name in old_attrs.keys() {
        if !new_attrs.contains_key(name) {
            backend.borrow_mut().remove_attribute(el, name);
        }
    }
}
