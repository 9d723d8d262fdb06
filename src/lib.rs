//! # spark-dom
//!
//! Reactive component runtime for Rust.
//!
//! Components declare local state; writes to that state are tracked at the
//! key level, batched through a scheduler, and turned into minimal host
//! mutations by a virtual-node diff. The host itself is injected: any tree
//! store implementing [`host::HostBackend`] can sit underneath (an
//! in-memory arena ships as [`host::MemoryBackend`]).
//!
//! ## Architecture
//!
//! ```text
//! observed state -> dep notify -> scheduler queue -> watcher flush
//!                -> render() -> patch(old, new) -> host backend ops
//! ```
//!
//! ## Modules
//!
//! - [`value`] - the dynamic state value model
//! - [`reactivity`] - observers, deps, watchers, the scheduler
//! - [`options`] - component definitions, normalization, merge strategies
//! - [`instance`] - component lifecycle and state initialization
//! - [`vdom`] - vnodes, the element factory, the patch engine
//! - [`host`] - the injected backend facade

pub mod config;
pub mod error;
pub mod host;
pub mod instance;
pub mod options;
pub mod reactivity;
pub mod value;
pub mod vdom;
pub mod warn;

use std::rc::Rc;

// Re-export the working surface.
pub use config::{set_dev_warnings, set_error_handler, set_silent};
pub use error::{CoreError, Result};
pub use host::{HostBackend, MemoryBackend, NodeId, SharedBackend};
pub use instance::lifecycle::{destroy_component, force_update, mount_component};
pub use instance::state::{watch, WatchSource};
pub use instance::{Cleanup, Component};
pub use options::{ComponentOptions, HookKind, InjectOptions, PropOptions, PropType, WatchDecl};
pub use reactivity::{del, flush_microtasks, next_tick, observe_value, set};
pub use value::{arr, obj, Arr, Obj, Value};
pub use vdom::{
    attrs_module, create_patch_function, h, h_text, ModuleHooks, Patcher, RawChild, Rendered,
    VNodeData, VNodeHooks, VNodeRef,
};

// =============================================================================
// Runtime
// =============================================================================

/// A configured runtime: a backend plus the patch function built over it.
///
/// ```ignore
/// use spark_dom::{Runtime, MemoryBackend, ComponentOptions, HostBackend, obj, h};
/// use std::{cell::RefCell, rc::Rc};
///
/// let backend = Rc::new(RefCell::new(MemoryBackend::new()));
/// let runtime = Runtime::new(backend.clone());
/// let root = backend.borrow_mut().create_element("div");
///
/// let app = runtime.mount(
///     ComponentOptions::new()
///         .data(|_| Ok(obj([("count", 0.into())])))
///         .render(|vm| Ok(h(vm, "span", None, vec![vm.get("count").into()]).into())),
///     root,
/// );
///
/// app.set("count", 1.into());
/// spark_dom::flush_microtasks();
/// ```
pub struct Runtime {
    backend: SharedBackend,
    patcher: Rc<Patcher>,
}

impl Runtime {
    /// Build a runtime with the default module set (the `attrs` module).
    pub fn new(backend: SharedBackend) -> Runtime {
        let modules = vec![attrs_module(backend.clone())];
        Runtime::with_modules(backend, modules)
    }

    /// Build a runtime with a custom module set.
    pub fn with_modules(backend: SharedBackend, modules: Vec<ModuleHooks>) -> Runtime {
        Runtime {
            patcher: create_patch_function(backend.clone(), modules),
            backend,
        }
    }

    pub fn backend(&self) -> SharedBackend {
        self.backend.clone()
    }

    pub fn patcher(&self) -> Rc<Patcher> {
        self.patcher.clone()
    }

    /// Create and mount a root component onto a host element.
    pub fn mount(&self, options: ComponentOptions, el: NodeId) -> Rc<Component> {
        let props_data = options.props_data.clone().unwrap_or_default();
        let vm = instance::lifecycle::init(&options, self.patcher.clone(), None, None, props_data);
        if vm.render_watcher().is_none() {
            mount_component(&vm, Some(el));
        }
        vm
    }

    /// Create an instance without mounting it (initialization side effects
    /// only: state, hooks through `created`).
    pub fn create(&self, options: ComponentOptions) -> Rc<Component> {
        let props_data = options.props_data.clone().unwrap_or_default();
        instance::lifecycle::init(&options, self.patcher.clone(), None, None, props_data)
    }
}

/// Reset every thread-local engine registry (for testing).
pub fn reset_runtime_state() {
    reactivity::dep::reset_dep_uid();
    reactivity::dep::reset_target_stack();
    reactivity::watcher::reset_watcher_uid();
    reactivity::scheduler::reset_scheduler();
    instance::lifecycle::reset_lifecycle_state();
    warn::reset_warnings();
    config::reset_config();
}

#[cfg(test)]
pub(crate) fn test_component() -> Rc<Component> {
    use std::cell::RefCell;
    let backend: SharedBackend = Rc::new(RefCell::new(MemoryBackend::new()));
    let runtime = Runtime::new(backend);
    runtime.create(ComponentOptions::new())
}
