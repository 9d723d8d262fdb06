//! The patch (diff) engine.
//!
//! `create_patch_function` takes the host backend and the module set,
//! fans the module hooks out into per-stage arrays, and returns a
//! [`Patcher`]. A patch walks old and new vnode trees and issues primitive
//! node operations; elements build bottom-up (children enter their parent
//! before the parent enters the tree), removals run their module and user
//! remove hooks through a countdown gate, and keyed child lists reconcile
//! with the two-pointer algorithm.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::host::{NodeId, SharedBackend};
use crate::instance::Component;
use crate::warn::warn;

use super::modules::ModuleHooks;
use super::vnode::{same_vnode, Key, VNode, VNodeRef};

/// What the patch starts from.
pub enum PatchOld {
    /// Nothing mounted yet (component first render).
    None,
    /// A live host element to mount over (root first render).
    Element(NodeId),
    /// The previously rendered tree.
    VNode(VNodeRef),
}

// =============================================================================
// Remove gate
// =============================================================================

/// Countdown for deferred removal: every remove listener holds the node in
/// the tree until it reports done.
pub struct RemoveGate {
    backend: SharedBackend,
    node: Option<NodeId>,
    remaining: Cell<usize>,
}

impl RemoveGate {
    fn new(backend: SharedBackend, node: Option<NodeId>) -> Rc<RemoveGate> {
        Rc::new(RemoveGate {
            backend,
            node,
            remaining: Cell::new(1),
        })
    }

    fn add(&self, count: usize) {
        self.remaining.set(self.remaining.get() + count);
    }

    pub fn done(&self) {
        let remaining = self.remaining.get().saturating_sub(1);
        self.remaining.set(remaining);
        if remaining == 0 {
            if let Some(node) = self.node {
                remove_node(&self.backend, node);
            }
        }
    }

    fn handle(self: &Rc<Self>) -> super::vnode::RemoveHandle {
        let gate = self.clone();
        Rc::new(move || gate.done())
    }
}

fn remove_node(backend: &SharedBackend, node: NodeId) {
    let parent = backend.borrow().parent_node(node);
    if let Some(parent) = parent {
        backend.borrow_mut().remove_child(parent, node);
    }
}

// =============================================================================
// Patcher
// =============================================================================

pub struct Patcher {
    backend: SharedBackend,
    create_cbs: Vec<Rc<dyn Fn(&VNodeRef, &VNodeRef)>>,
    activate_cbs: Vec<Rc<dyn Fn(&VNodeRef, &VNodeRef)>>,
    update_cbs: Vec<Rc<dyn Fn(&VNodeRef, &VNodeRef)>>,
    remove_cbs: Vec<Rc<dyn Fn(&VNodeRef, super::vnode::RemoveHandle)>>,
    destroy_cbs: Vec<Rc<dyn Fn(&VNodeRef)>>,
}

/// Wire the module hooks into per-stage arrays and return the patcher.
pub fn create_patch_function(backend: SharedBackend, modules: Vec<ModuleHooks>) -> Rc<Patcher> {
    let mut patcher = Patcher {
        backend,
        create_cbs: Vec::new(),
        activate_cbs: Vec::new(),
        update_cbs: Vec::new(),
        remove_cbs: Vec::new(),
        destroy_cbs: Vec::new(),
    };
    for module in modules {
        if let Some(create) = module.create {
            patcher.create_cbs.push(create);
        }
        if let Some(activate) = module.activate {
            patcher.activate_cbs.push(activate);
        }
        if let Some(update) = module.update {
            patcher.update_cbs.push(update);
        }
        if let Some(remove) = module.remove {
            patcher.remove_cbs.push(remove);
        }
        if let Some(destroy) = module.destroy {
            patcher.destroy_cbs.push(destroy);
        }
    }
    Rc::new(patcher)
}

impl Patcher {
    pub fn backend(&self) -> SharedBackend {
        self.backend.clone()
    }

    /// The patch entry point. Returns the host node bound to `new`.
    ///
    /// `hydrating` is accepted for interface fidelity; server-rendered
    /// reuse is a non-goal and the flag is inert.
    pub fn patch(
        &self,
        old: PatchOld,
        new: Option<&VNodeRef>,
        hydrating: bool,
        remove_only: bool,
    ) -> Option<NodeId> {
        let _ = hydrating;

        let Some(new_vnode) = new else {
            // Unmount: run destroy hooks over the old tree.
            if let PatchOld::VNode(old_vnode) = old {
                self.invoke_destroy_hook(&old_vnode);
            }
            return None;
        };

        let mut inserted_queue: Vec<VNodeRef> = Vec::new();
        let mut is_initial_patch = false;

        match old {
            PatchOld::None => {
                // Fresh mount of a component subtree.
                is_initial_patch = true;
                self.create_elm(new_vnode, &mut inserted_queue, None, None);
            }
            PatchOld::Element(el) => {
                // A live host node: wrap it in a synthetic vnode, then
                // replace.
                let tag = self.backend.borrow().tag_name(el);
                let wrapper = VNode::element(tag, None, Vec::new(), None);
                wrapper.elm.set(Some(el));
                self.replace_vnode(&wrapper, new_vnode, &mut inserted_queue);
            }
            PatchOld::VNode(old_vnode) => {
                if same_vnode(&old_vnode, new_vnode) {
                    self.patch_vnode(&old_vnode, new_vnode, &mut inserted_queue, remove_only);
                } else {
                    self.replace_vnode(&old_vnode, new_vnode, &mut inserted_queue);
                }
            }
        }

        self.invoke_insert_hooks(new_vnode, inserted_queue, is_initial_patch);
        new_vnode.elm.get()
    }

    /// Case 5: build the new tree next to the old one, then remove the
    /// old.
    fn replace_vnode(
        &self,
        old_vnode: &VNodeRef,
        new_vnode: &VNodeRef,
        inserted_queue: &mut Vec<VNodeRef>,
    ) {
        let old_elm = old_vnode.elm.get();
        let parent_elm = old_elm.and_then(|el| self.backend.borrow().parent_node(el));
        let ref_elm = old_elm.and_then(|el| self.backend.borrow().next_sibling(el));

        self.create_elm(new_vnode, inserted_queue, parent_elm, ref_elm);

        // The component roots above us now point at a stale node; walk the
        // placeholder chain and rebind.
        let mut cursor = new_vnode.parent.borrow().as_ref().and_then(|w| w.upgrade());
        while let Some(placeholder) = cursor {
            placeholder.elm.set(new_vnode.elm.get());
            cursor = placeholder.parent.borrow().as_ref().and_then(|w| w.upgrade());
        }

        if parent_elm.is_some() {
            self.remove_vnodes(&[Some(old_vnode.clone())], 0, 0);
        } else if old_vnode.tag.is_some() {
            self.invoke_destroy_hook(old_vnode);
        }
    }

    // =========================================================================
    // createElm
    // =========================================================================

    fn create_elm(
        &self,
        vnode: &VNodeRef,
        inserted_queue: &mut Vec<VNodeRef>,
        parent_elm: Option<NodeId>,
        ref_elm: Option<NodeId>,
    ) {
        if self.create_component_node(vnode, inserted_queue, parent_elm, ref_elm) {
            return;
        }

        if let Some(tag) = &vnode.tag {
            let el = match vnode.ns {
                Some(ns) => self.backend.borrow_mut().create_element_ns(ns, tag),
                None => self.backend.borrow_mut().create_element(tag),
            };
            vnode.elm.set(Some(el));

            // Children first: they enter this element before it enters the
            // tree.
            let children = vnode.children.borrow().clone();
            if !children.is_empty() {
                check_duplicate_keys(&children);
                for child in &children {
                    self.create_elm(child, inserted_queue, Some(el), None);
                }
            } else if let Some(text) = &vnode.text {
                let text_node = self.backend.borrow_mut().create_text_node(text);
                self.backend.borrow_mut().append_child(el, text_node);
            }

            if vnode.data.is_some() {
                self.invoke_create_hooks(vnode, inserted_queue);
            }
            self.insert(parent_elm, el, ref_elm);
        } else if vnode.is_comment.get() {
            let el = self
                .backend
                .borrow_mut()
                .create_comment(vnode.text.as_deref().unwrap_or(""));
            vnode.elm.set(Some(el));
            self.insert(parent_elm, el, ref_elm);
        } else {
            let el = self
                .backend
                .borrow_mut()
                .create_text_node(vnode.text.as_deref().unwrap_or(""));
            vnode.elm.set(Some(el));
            self.insert(parent_elm, el, ref_elm);
        }
    }

    /// Component path of createElm: the init hook instantiates and mounts
    /// the child; we then adopt its root node and pending insert hooks.
    fn create_component_node(
        &self,
        vnode: &VNodeRef,
        inserted_queue: &mut Vec<VNodeRef>,
        parent_elm: Option<NodeId>,
        ref_elm: Option<NodeId>,
    ) -> bool {
        let init = vnode
            .data
            .as_ref()
            .and_then(|data| data.hook.borrow().clone())
            .and_then(|hooks| hooks.init.clone());
        // An instance already present means this subtree is re-entering
        // the live tree rather than being born.
        let is_reactivated = vnode.component_instance.borrow().is_some();
        if let Some(init) = init {
            init(vnode);
            if vnode.component_instance.borrow().is_some() {
                self.init_component(vnode, inserted_queue);
                if is_reactivated {
                    let empty = empty_ref();
                    for cb in &self.activate_cbs {
                        cb(&empty, vnode);
                    }
                }
                if let Some(el) = vnode.elm.get() {
                    self.insert(parent_elm, el, ref_elm);
                }
                return true;
            }
        }
        false
    }

    fn init_component(&self, vnode: &VNodeRef, inserted_queue: &mut Vec<VNodeRef>) {
        // Adopt insert hooks the child's initial patch deferred onto us.
        let pending = std::mem::take(&mut *vnode.pending_insert.borrow_mut());
        inserted_queue.extend(pending);

        let instance = vnode
            .component_instance
            .borrow()
            .clone()
            .expect("init_component without instance");
        vnode.elm.set(instance.el());

        if is_patchable(&instance) {
            self.invoke_create_hooks(vnode, inserted_queue);
        } else {
            // Nothing patchable below (comment root): still register for
            // the insert hook.
            inserted_queue.push(vnode.clone());
        }
    }

    fn invoke_create_hooks(&self, vnode: &VNodeRef, inserted_queue: &mut Vec<VNodeRef>) {
        let empty = empty_ref();
        for cb in &self.create_cbs {
            cb(&empty, vnode);
        }
        if let Some(hooks) = vnode.data.as_ref().and_then(|d| d.hook.borrow().clone()) {
            if let Some(create) = &hooks.create {
                create(&empty, vnode);
            }
            if hooks.insert.is_some() {
                inserted_queue.push(vnode.clone());
            }
        }
    }

    fn insert(&self, parent: Option<NodeId>, el: NodeId, ref_elm: Option<NodeId>) {
        let Some(parent) = parent else { return };
        match ref_elm {
            Some(reference) => {
                // Only meaningful if the reference still sits under parent.
                let still_there = self.backend.borrow().parent_node(reference) == Some(parent);
                if still_there {
                    self.backend
                        .borrow_mut()
                        .insert_before(parent, el, Some(reference));
                }
            }
            None => self.backend.borrow_mut().append_child(parent, el),
        }
    }

    // =========================================================================
    // patchVnode
    // =========================================================================

    fn patch_vnode(
        &self,
        old_vnode: &VNodeRef,
        new_vnode: &VNodeRef,
        inserted_queue: &mut Vec<VNodeRef>,
        remove_only: bool,
    ) {
        if Rc::ptr_eq(old_vnode, new_vnode) {
            return;
        }
        let elm = old_vnode.elm.get();
        new_vnode.elm.set(elm);

        if old_vnode.is_async_placeholder.get() && new_vnode.is_async_placeholder.get() {
            return;
        }

        // Static trees are reused wholesale.
        if new_vnode.is_static && old_vnode.is_static && new_vnode.key == old_vnode.key {
            *new_vnode.component_instance.borrow_mut() =
                old_vnode.component_instance.borrow().clone();
            return;
        }

        let hooks = new_vnode
            .data
            .as_ref()
            .and_then(|data| data.hook.borrow().clone());
        if let Some(hooks) = &hooks {
            if let Some(prepatch) = &hooks.prepatch {
                prepatch(old_vnode, new_vnode);
            }
        }

        let patchable = vnode_patchable(new_vnode);
        if new_vnode.data.is_some() && patchable {
            for cb in &self.update_cbs {
                cb(old_vnode, new_vnode);
            }
            if let Some(hooks) = &hooks {
                if let Some(update) = &hooks.update {
                    update(old_vnode, new_vnode);
                }
            }
        }

        if new_vnode.text.is_none() {
            let old_children = old_vnode.children.borrow().clone();
            let new_children = new_vnode.children.borrow().clone();
            let both = !old_children.is_empty() && !new_children.is_empty();
            if both {
                if !children_ptr_eq(&old_children, &new_children) {
                    if let Some(elm) = elm {
                        self.update_children(
                            elm,
                            old_children,
                            new_children,
                            inserted_queue,
                            remove_only,
                        );
                    }
                }
            } else if !new_children.is_empty() {
                check_duplicate_keys(&new_children);
                if old_vnode.text.is_some() {
                    if let Some(elm) = elm {
                        self.backend.borrow_mut().set_text_content(elm, "");
                    }
                }
                let end = new_children.len() - 1;
                self.add_vnodes(elm, None, &new_children, 0, end, inserted_queue);
            } else if !old_children.is_empty() {
                let slots: Vec<Option<VNodeRef>> =
                    old_children.into_iter().map(Some).collect();
                self.remove_vnodes(&slots, 0, slots.len() - 1);
            } else if old_vnode.text.is_some() {
                if let Some(elm) = elm {
                    self.backend.borrow_mut().set_text_content(elm, "");
                }
            }
        } else if new_vnode.text != old_vnode.text {
            if let Some(elm) = elm {
                self.backend
                    .borrow_mut()
                    .set_text_content(elm, new_vnode.text.as_deref().unwrap_or(""));
            }
        }

        if let Some(hooks) = &hooks {
            if let Some(postpatch) = &hooks.postpatch {
                postpatch(old_vnode, new_vnode);
            }
        }
    }

    // =========================================================================
    // updateChildren
    // =========================================================================

    fn update_children(
        &self,
        parent_elm: NodeId,
        old_children: Vec<VNodeRef>,
        new_children: Vec<VNodeRef>,
        inserted_queue: &mut Vec<VNodeRef>,
        remove_only: bool,
    ) {
        check_duplicate_keys(&new_children);

        let mut old: Vec<Option<VNodeRef>> = old_children.into_iter().map(Some).collect();
        let mut old_start: isize = 0;
        let mut old_end: isize = old.len() as isize - 1;
        let mut new_start: isize = 0;
        let mut new_end: isize = new_children.len() as isize - 1;
        let mut key_map: Option<HashMap<Key, isize>> = None;
        let can_move = !remove_only;

        while old_start <= old_end && new_start <= new_end {
            // Slots cleared by earlier key moves.
            if old[old_start as usize].is_none() {
                old_start += 1;
                continue;
            }
            if old[old_end as usize].is_none() {
                old_end -= 1;
                continue;
            }
            let old_start_vnode = old[old_start as usize].clone().unwrap();
            let old_end_vnode = old[old_end as usize].clone().unwrap();
            let new_start_vnode = new_children[new_start as usize].clone();
            let new_end_vnode = new_children[new_end as usize].clone();

            if same_vnode(&old_start_vnode, &new_start_vnode) {
                self.patch_vnode(&old_start_vnode, &new_start_vnode, inserted_queue, remove_only);
                old_start += 1;
                new_start += 1;
            } else if same_vnode(&old_end_vnode, &new_end_vnode) {
                self.patch_vnode(&old_end_vnode, &new_end_vnode, inserted_queue, remove_only);
                old_end -= 1;
                new_end -= 1;
            } else if same_vnode(&old_start_vnode, &new_end_vnode) {
                // Moved right.
                self.patch_vnode(&old_start_vnode, &new_end_vnode, inserted_queue, remove_only);
                if can_move {
                    if let (Some(node), Some(anchor)) =
                        (old_start_vnode.elm.get(), old_end_vnode.elm.get())
                    {
                        let after = self.backend.borrow().next_sibling(anchor);
                        self.backend
                            .borrow_mut()
                            .insert_before(parent_elm, node, after);
                    }
                }
                old_start += 1;
                new_end -= 1;
            } else if same_vnode(&old_end_vnode, &new_start_vnode) {
                // Moved left.
                self.patch_vnode(&old_end_vnode, &new_start_vnode, inserted_queue, remove_only);
                if can_move {
                    if let (Some(node), Some(anchor)) =
                        (old_end_vnode.elm.get(), old_start_vnode.elm.get())
                    {
                        self.backend
                            .borrow_mut()
                            .insert_before(parent_elm, node, Some(anchor));
                    }
                }
                old_end -= 1;
                new_start += 1;
            } else {
                // Key lookup over the remaining old range, built once.
                if key_map.is_none() {
                    let mut map = HashMap::new();
                    for index in old_start..=old_end {
                        if let Some(vnode) = &old[index as usize] {
                            if let Some(key) = &vnode.key {
                                map.insert(key.clone(), index);
                            }
                        }
                    }
                    key_map = Some(map);
                }
                let found = match &new_start_vnode.key {
                    Some(key) => key_map.as_ref().unwrap().get(key).copied(),
                    None => {
                        // Keyless: scan for a same-vnode match.
                        (old_start..=old_end).find(|index| {
                            old[*index as usize]
                                .as_ref()
                                .is_some_and(|o| same_vnode(o, &new_start_vnode))
                        })
                    }
                };
                match found {
                    None => {
                        self.create_elm(
                            &new_start_vnode,
                            inserted_queue,
                            Some(parent_elm),
                            old_start_vnode.elm.get(),
                        );
                    }
                    Some(index) => {
                        let matched = old[index as usize].clone().unwrap();
                        if same_vnode(&matched, &new_start_vnode) {
                            self.patch_vnode(
                                &matched,
                                &new_start_vnode,
                                inserted_queue,
                                remove_only,
                            );
                            old[index as usize] = None;
                            if can_move {
                                if let Some(node) = matched.elm.get() {
                                    self.backend.borrow_mut().insert_before(
                                        parent_elm,
                                        node,
                                        old_start_vnode.elm.get(),
                                    );
                                }
                            }
                        } else {
                            // Same key, different element: treat as new.
                            self.create_elm(
                                &new_start_vnode,
                                inserted_queue,
                                Some(parent_elm),
                                old_start_vnode.elm.get(),
                            );
                        }
                    }
                }
                new_start += 1;
            }
        }

        if old_start > old_end {
            // Old range exhausted: mount the remaining new range before
            // the node that follows it (or append).
            if new_start <= new_end {
                let ref_elm = new_children
                    .get((new_end + 1) as usize)
                    .and_then(|vnode| vnode.elm.get());
                self.add_vnodes(
                    Some(parent_elm),
                    ref_elm,
                    &new_children,
                    new_start as usize,
                    new_end as usize,
                    inserted_queue,
                );
            }
        } else if new_start > new_end {
            self.remove_vnodes(&old, old_start as usize, old_end as usize);
        }
    }

    fn add_vnodes(
        &self,
        parent_elm: Option<NodeId>,
        ref_elm: Option<NodeId>,
        vnodes: &[VNodeRef],
        start: usize,
        end: usize,
        inserted_queue: &mut Vec<VNodeRef>,
    ) {
        if start > end || vnodes.is_empty() {
            return;
        }
        for vnode in vnodes.iter().take(end + 1).skip(start) {
            self.create_elm(vnode, inserted_queue, parent_elm, ref_elm);
        }
    }

    fn remove_vnodes(&self, slots: &[Option<VNodeRef>], start: usize, end: usize) {
        for slot in slots.iter().take(end + 1).skip(start) {
            let Some(vnode) = slot else { continue };
            if vnode.tag.is_some() {
                self.remove_and_invoke_remove_hook(vnode);
                self.invoke_destroy_hook(vnode);
            } else if let Some(el) = vnode.elm.get() {
                remove_node(&self.backend, el);
            }
        }
    }

    // =========================================================================
    // Remove / destroy hooks
    // =========================================================================

    fn remove_and_invoke_remove_hook(&self, vnode: &VNodeRef) {
        if vnode.data.is_none() {
            if let Some(el) = vnode.elm.get() {
                remove_node(&self.backend, el);
            }
            return;
        }
        let gate = RemoveGate::new(self.backend.clone(), vnode.elm.get());
        self.run_remove_hooks(vnode, &gate);
        // Consume the baseline; if every listener already reported, the
        // node leaves the tree now.
        gate.done();
    }

    fn run_remove_hooks(&self, vnode: &VNodeRef, gate: &Rc<RemoveGate>) {
        // A component's root participates in the same removal.
        let inner = vnode
            .component_instance
            .borrow()
            .clone()
            .and_then(|instance| instance.vnode());
        if let Some(inner) = inner {
            if inner.data.is_some() {
                self.run_remove_hooks(&inner, gate);
            }
        }
        gate.add(self.remove_cbs.len());
        for cb in &self.remove_cbs {
            cb(vnode, gate.handle());
        }
        if let Some(remove) = vnode
            .data
            .as_ref()
            .and_then(|data| data.hook.borrow().clone())
            .and_then(|hooks| hooks.remove.clone())
        {
            gate.add(1);
            remove(vnode, gate.handle());
        }
    }

    pub(crate) fn invoke_destroy_hook(&self, vnode: &VNodeRef) {
        if let Some(data) = &vnode.data {
            let hooks = data.hook.borrow().clone();
            if let Some(destroy) = hooks.as_ref().and_then(|h| h.destroy.clone()) {
                destroy(vnode);
            }
            for cb in &self.destroy_cbs {
                cb(vnode);
            }
        }
        let children = vnode.children.borrow().clone();
        for child in &children {
            self.invoke_destroy_hook(child);
        }
    }

    // =========================================================================
    // Insert hooks
    // =========================================================================

    fn invoke_insert_hooks(
        &self,
        vnode: &VNodeRef,
        inserted_queue: Vec<VNodeRef>,
        is_initial_patch: bool,
    ) {
        let placeholder = vnode.parent.borrow().as_ref().and_then(|w| w.upgrade());
        if is_initial_patch {
            if let Some(placeholder) = placeholder {
                // Defer: the enclosing patch fires these once the subtree
                // is actually in the tree. Children before parents.
                *placeholder.pending_insert.borrow_mut() = inserted_queue;
                return;
            }
        }
        for queued in &inserted_queue {
            if let Some(insert) = queued
                .data
                .as_ref()
                .and_then(|data| data.hook.borrow().clone())
                .and_then(|hooks| hooks.insert.clone())
            {
                insert(queued);
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn empty_ref() -> VNodeRef {
    super::vnode::create_empty_vnode()
}

fn children_ptr_eq(a: &[VNodeRef], b: &[VNodeRef]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| Rc::ptr_eq(x, y))
}

/// Walk through component roots to the first real vnode: patchable means
/// it carries a tag.
fn is_patchable(instance: &Rc<Component>) -> bool {
    let mut vnode = instance.vnode();
    loop {
        let Some(current) = vnode else { return false };
        let inner_instance = current.component_instance.borrow().clone();
        match inner_instance {
            Some(inner) => vnode = inner.vnode(),
            None => return current.tag.is_some(),
        }
    }
}

fn vnode_patchable(vnode: &VNodeRef) -> bool {
    match vnode.component_instance.borrow().clone() {
        Some(instance) => is_patchable(&instance),
        None => vnode.tag.is_some(),
    }
}

/// Duplicate keys among siblings warn but do not fail.
fn check_duplicate_keys(children: &[VNodeRef]) {
    let mut seen: HashSet<&Key> = HashSet::new();
    for child in children {
        if let Some(key) = &child.key {
            if !seen.insert(key) {
                warn(format!(
                    "Duplicate keys detected: {key:?}. This may cause an update error."
                ));
            }
        }
    }
}
