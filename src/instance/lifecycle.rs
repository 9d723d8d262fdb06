//! Instance lifecycle.
//!
//! Initialization order inside `init`: merge options -> lifecycle attach ->
//! events -> render links -> `beforeCreate` -> injections -> state ->
//! provide -> `created` -> optional auto-mount. Mount builds the render
//! watcher whose getter renders and patches; update swaps the active
//! instance while patching; destroy tears the whole thing down child-first
//! and breaks the instance <-> vnode cycles.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{handle_error, invoke_with_error_handling};
use crate::host::NodeId;
use crate::options::{merge_options, ComponentOptions, HookKind};
use crate::reactivity::dep::{pop_target, push_target};
use crate::reactivity::observer::define_reactive_with;
use crate::reactivity::{Watcher, WatcherOptions};
use crate::value::{Guard, Obj, Value};
use crate::vdom::patch::{PatchOld, Patcher};
use crate::vdom::{create_empty_vnode, Rendered, VNodeRef};
use crate::warn::warn;

use super::inject::{init_injections, init_provide};
use super::state::init_state;
use super::Component;

thread_local! {
    static COMPONENT_UID: Cell<u64> = const { Cell::new(0) };

    /// The instance currently patching; children created during its update
    /// discover their parent here.
    static ACTIVE_INSTANCE: RefCell<Vec<Rc<Component>>> = const { RefCell::new(Vec::new()) };

    /// True while a parent-driven props/attrs update is in flight;
    /// suppresses the prop mutation warning.
    static UPDATING_CHILD: Cell<bool> = const { Cell::new(false) };
}

pub fn active_instance() -> Option<Rc<Component>> {
    ACTIVE_INSTANCE.with(|stack| stack.borrow().last().cloned())
}

fn push_active_instance(vm: Rc<Component>) {
    ACTIVE_INSTANCE.with(|stack| stack.borrow_mut().push(vm));
}

fn pop_active_instance() {
    ACTIVE_INSTANCE.with(|stack| {
        stack.borrow_mut().pop();
    });
}

pub(crate) fn is_updating_child_component() -> bool {
    UPDATING_CHILD.with(|flag| flag.get())
}

fn set_updating_child_component(value: bool) {
    UPDATING_CHILD.with(|flag| flag.set(value));
}

/// Reset lifecycle globals (for testing).
pub fn reset_lifecycle_state() {
    COMPONENT_UID.with(|uid| uid.set(0));
    ACTIVE_INSTANCE.with(|stack| stack.borrow_mut().clear());
    UPDATING_CHILD.with(|flag| flag.set(false));
}

// =============================================================================
// Initialization
// =============================================================================

/// Create and initialize an instance.
///
/// `parent` is the owning instance for component children (the active
/// instance during the parent's patch); roots pass `None`.
pub(crate) fn init(
    options: &ComponentOptions,
    patcher: Rc<Patcher>,
    parent: Option<Rc<Component>>,
    placeholder: Option<VNodeRef>,
    props_data: IndexMap<String, Value>,
) -> Rc<Component> {
    let uid = COMPONENT_UID.with(|counter| {
        let uid = counter.get();
        counter.set(uid + 1);
        uid
    });

    let merged = Rc::new(merge_options(&ComponentOptions::default(), options, true));
    let auto_mount_el = merged.el;
    let vm = Component::new_shell(uid, merged, patcher, placeholder, props_data);

    init_lifecycle(&vm, parent);
    init_events(&vm);
    init_render(&vm);
    call_hook(&vm, HookKind::BeforeCreate);
    init_injections(&vm);
    init_state(&vm);
    init_provide(&vm);
    call_hook(&vm, HookKind::Created);

    if let Some(el) = auto_mount_el {
        mount_component(&vm, Some(el));
    }
    vm
}

/// Attach to the first non-abstract parent and take a slot in its children
/// list.
fn init_lifecycle(vm: &Rc<Component>, parent: Option<Rc<Component>>) {
    let mut parent = parent;
    if let Some(initial) = parent.clone() {
        if !vm.options().abstract_component {
            let mut anchor = initial;
            while anchor.options().abstract_component {
                match anchor.parent() {
                    Some(next) => anchor = next,
                    None => break,
                }
            }
            anchor.add_child(vm.clone());
            parent = Some(anchor);
        }
    }
    vm.set_parent(parent.as_ref());
}

/// The emitter itself is an external collaborator; here we only carry the
/// listener payload from the placeholder so `$listeners` has something to
/// expose.
fn init_events(_vm: &Rc<Component>) {}

/// Wire up the render-side instance surface: `$attrs` and `$listeners` as
/// shallow-reactive instance keys sourced from the placeholder vnode.
fn init_render(vm: &Rc<Component>) {
    let (attrs, listeners) = match vm.placeholder() {
        Some(placeholder) => {
            let attrs = placeholder
                .data
                .as_ref()
                .map(|data| Obj::from_pairs(data.attrs.clone()))
                .unwrap_or_default();
            let listeners = placeholder
                .component_options
                .as_ref()
                .map(|options| Obj::from_pairs(options.listeners.clone()))
                .unwrap_or_default();
            (attrs, listeners)
        }
        None => (Obj::new(), Obj::new()),
    };
    let holder = Obj::new();
    holder.mark_runtime_internal();
    define_reactive_with(
        &holder,
        "$attrs",
        Value::Obj(attrs),
        true,
        Guard::InstanceReadonly,
    );
    define_reactive_with(
        &holder,
        "$listeners",
        Value::Obj(listeners),
        true,
        Guard::InstanceReadonly,
    );
    vm.set_instance_holder(holder);
}

// =============================================================================
// Hooks
// =============================================================================

/// Fire a lifecycle hook list. Hooks bracket themselves with a suppressed
/// capture target so user code in hooks does not create subscriptions.
pub fn call_hook(vm: &Rc<Component>, kind: HookKind) {
    push_target(None);
    let hooks: Vec<_> = vm.options().hooks.get(kind).to_vec();
    let info = format!("{} hook", kind.as_str());
    for hook in hooks {
        let _ = invoke_with_error_handling(Some(vm), &info, || hook(vm));
    }
    pop_target();
}

/// Scheduler callback after a flush: render watchers of mounted, live
/// instances fire `updated`.
pub(crate) fn call_updated_hook(vm: &Rc<Component>) {
    if vm.is_mounted() && !vm.is_destroyed() {
        call_hook(vm, HookKind::Updated);
    }
}

pub(crate) fn call_activated_hook(vm: &Rc<Component>) {
    call_hook(vm, HookKind::Activated);
}

// =============================================================================
// Mount
// =============================================================================

/// Mount the instance: fire `beforeMount`, build the render watcher (its
/// getter renders and patches, its before-hook fires `beforeUpdate`), and
/// for roots fire `mounted`. Component children get `mounted` from the
/// patch insert hook instead, bottom-up.
pub fn mount_component(vm: &Rc<Component>, el: Option<NodeId>) {
    if vm.render_watcher().is_some() {
        warn("Component is already mounted");
        return;
    }
    vm.set_el(el);
    if vm.options().render.is_none() {
        warn("Failed to mount component: render function not defined");
    }
    call_hook(vm, HookKind::BeforeMount);

    let getter_vm = Rc::downgrade(vm);
    let getter = Box::new(move || {
        if let Some(vm) = getter_vm.upgrade() {
            let vnode = render_component(&vm);
            update_component(&vm, vnode);
        }
        Value::Undefined
    });
    let before_vm = Rc::downgrade(vm);
    let before: Box<dyn Fn()> = Box::new(move || {
        if let Some(vm) = before_vm.upgrade() {
            if vm.is_mounted() && !vm.is_destroyed() {
                call_hook(&vm, HookKind::BeforeUpdate);
            }
        }
    });
    Watcher::create(
        Some(vm),
        getter,
        Box::new(|_, _| {}),
        WatcherOptions::default(),
        Some(before),
        true,
    );

    if vm.placeholder().is_none() {
        vm.set_mounted(true);
        call_hook(vm, HookKind::Mounted);
    }
}

// =============================================================================
// Render
// =============================================================================

/// Produce the instance's vnode tree from its render function.
///
/// Render errors route through error handling and fall back to the
/// previous tree (or an empty vnode on first render). More than one root
/// warns and substitutes an empty vnode.
pub(crate) fn render_component(vm: &Rc<Component>) -> VNodeRef {
    let options = vm.options();
    let vnode = match &options.render {
        None => create_empty_vnode(),
        Some(render) => match render(vm) {
            Ok(rendered) => match rendered {
                Rendered::One(node) => node,
                Rendered::Many(mut nodes) => match nodes.len() {
                    0 => create_empty_vnode(),
                    1 => nodes.remove(0),
                    _ => {
                        warn(
                            "Multiple root nodes returned from render function. Render \
                             functions should return a single root node.",
                        );
                        create_empty_vnode()
                    }
                },
            },
            Err(err) => {
                handle_error(&err, Some(vm), "render");
                vm.vnode().unwrap_or_else(create_empty_vnode)
            }
        },
    };
    *vnode.parent.borrow_mut() = vm.placeholder().as_ref().map(Rc::downgrade);
    vnode
}

// =============================================================================
// Update
// =============================================================================

/// Patch the previous rendered tree against the new one. First render
/// patches `$el` (roots) or nothing (children) into a fresh tree.
pub(crate) fn update_component(vm: &Rc<Component>, vnode: VNodeRef) {
    let prev_vnode = vm.take_vnode();
    push_active_instance(vm.clone());
    vm.set_vnode(Some(vnode.clone()));
    let patcher = vm.patcher();
    let old = match prev_vnode {
        Some(prev) => PatchOld::VNode(prev),
        None => match vm.el() {
            Some(el) => PatchOld::Element(el),
            None => PatchOld::None,
        },
    };
    let new_el = patcher.patch(old, Some(&vnode), false, false);
    pop_active_instance();
    vm.set_el(new_el);
    // Keep the placeholder's bound node in sync with the new root.
    if let Some(placeholder) = vm.placeholder() {
        placeholder.elm.set(new_el);
    }
}

/// Re-render without a data change.
pub fn force_update(vm: &Rc<Component>) {
    if let Some(watcher) = vm.render_watcher() {
        watcher.update();
    }
}

// =============================================================================
// Parent-driven child update
// =============================================================================

/// Called from the patch `prepatch` hook: swap in new props, listeners,
/// and the new placeholder. The prop writes run through the child's
/// reactivity and queue its render watcher.
pub(crate) fn update_child_component(
    vm: &Rc<Component>,
    props_data: IndexMap<String, Value>,
    listeners: IndexMap<String, Value>,
    placeholder: VNodeRef,
) {
    set_updating_child_component(true);

    vm.set_placeholder(Some(placeholder.clone()));
    if let Some(vnode) = vm.vnode() {
        *vnode.parent.borrow_mut() = Some(Rc::downgrade(&placeholder));
    }

    // $attrs / $listeners are fresh objects per render: handle inequality
    // notifies their subscribers.
    if let Some(holder) = vm.instance_holder() {
        let attrs = placeholder
            .data
            .as_ref()
            .map(|data| Obj::from_pairs(data.attrs.clone()))
            .unwrap_or_default();
        holder.set("$attrs", Value::Obj(attrs));
        holder.set("$listeners", Value::Obj(Obj::from_pairs(listeners)));
    }

    if let Some(props) = vm.props_obj() {
        let declared = super::state::declared_props(vm);
        for key in vm.prop_keys() {
            if let Some(prop_options) = declared.get(&key) {
                let value = super::state::validate_prop(vm, &key, prop_options, &props_data);
                props.set(&key, value);
            }
        }
    }
    vm.set_props_data(props_data);

    set_updating_child_component(false);
}

// =============================================================================
// Destroy
// =============================================================================

/// Tear the instance down: `beforeDestroy`, detach from parent, tear down
/// watchers, drop the root-data refcount, destroy the rendered tree
/// (child-first via patch destroy hooks), `destroyed`, then break the
/// instance <-> vnode backlinks.
pub fn destroy_component(vm: &Rc<Component>) {
    if vm.is_being_destroyed() {
        return;
    }
    call_hook(vm, HookKind::BeforeDestroy);
    vm.set_being_destroyed(true);

    if let Some(parent) = vm.parent() {
        if !parent.is_being_destroyed() && !vm.options().abstract_component {
            parent.remove_child(vm.uid);
        }
    }

    if let Some(watcher) = vm.render_watcher() {
        watcher.teardown();
    }
    for watcher in vm.take_watchers() {
        watcher.teardown();
    }
    if let Some(ob) = vm.data_value().as_obj().and_then(|o| o.observer()) {
        ob.vm_count.set(ob.vm_count.get().saturating_sub(1));
    }

    vm.set_destroyed(true);

    if let Some(vnode) = vm.take_vnode() {
        vm.patcher().patch(PatchOld::VNode(vnode), None, false, false);
    }

    call_hook(vm, HookKind::Destroyed);

    if let Some(placeholder) = vm.take_placeholder() {
        *placeholder.component_instance.borrow_mut() = None;
    }
    vm.clear_render_watcher();
    vm.set_el(None);
}
