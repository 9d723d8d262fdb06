//! Component option records.
//!
//! A [`ComponentOptions`] is what a component definition looks like before
//! and after merging: data factory, prop declarations, computed and watch
//! entries, lifecycle hook lists, asset registrations, provide/inject, and
//! the render function. [`merge::merge_options`] folds a parent and child
//! record into a canonical merged record under per-key strategies.

pub mod assets;
pub mod merge;

pub use assets::{camelize, capitalize, hyphenate, Assets};
pub use merge::merge_options;

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{CoreError, Result};
use crate::host::NodeId;
use crate::instance::Component;
use crate::value::Value;
use crate::vdom::Rendered;

// =============================================================================
// Callback types
// =============================================================================

/// Data factory; its object result becomes the instance's reactive state.
pub type DataFn = Rc<dyn Fn(&Rc<Component>) -> Result<Value>>;

/// Render function: produces the vnode tree from reactive state.
pub type RenderFn = Rc<dyn Fn(&Rc<Component>) -> Result<Rendered>>;

/// Computed getter / user watch getter.
pub type UserGetter = Rc<dyn Fn(&Rc<Component>) -> Result<Value>>;

/// Computed setter.
pub type UserSetter = Rc<dyn Fn(&Rc<Component>, &Value) -> Result<()>>;

/// Watch handler, invoked with `(new, old)`.
pub type WatchHandlerFn = Rc<dyn Fn(&Rc<Component>, &Value, &Value) -> Result<()>>;

/// Component method.
pub type MethodFn = Rc<dyn Fn(&Rc<Component>, &[Value]) -> Result<Value>>;

/// Lifecycle hook.
pub type HookFn = Rc<dyn Fn(&Rc<Component>) -> Result<()>>;

/// `errorCaptured` hook. Returning `Ok(false)` claims the error and stops
/// propagation.
pub type ErrorCapturedFn = Rc<dyn Fn(&Rc<Component>, &CoreError, &str) -> Result<bool>>;

/// Directive hook (element node plus binding value).
pub type DirectiveFn = Rc<dyn Fn(NodeId, &Value)>;

/// Render filter.
pub type FilterFn = Rc<dyn Fn(&Value) -> Value>;

/// Prop default factory.
pub type PropDefaultFn = Rc<dyn Fn(&Rc<Component>) -> Value>;

/// Prop validator.
pub type PropValidatorFn = Rc<dyn Fn(&Value) -> bool>;

/// Provide factory; its object result is offered to descendants.
pub type ProvideFn = Rc<dyn Fn(&Rc<Component>) -> Result<Value>>;

/// Inject default factory.
pub type InjectDefaultFn = Rc<dyn Fn() -> Value>;

// =============================================================================
// Lifecycle hooks
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HookKind {
    BeforeCreate,
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeDestroy,
    Destroyed,
    Activated,
    Deactivated,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::BeforeCreate => "beforeCreate",
            HookKind::Created => "created",
            HookKind::BeforeMount => "beforeMount",
            HookKind::Mounted => "mounted",
            HookKind::BeforeUpdate => "beforeUpdate",
            HookKind::Updated => "updated",
            HookKind::BeforeDestroy => "beforeDestroy",
            HookKind::Destroyed => "destroyed",
            HookKind::Activated => "activated",
            HookKind::Deactivated => "deactivated",
        }
    }

    pub const ALL: [HookKind; 10] = [
        HookKind::BeforeCreate,
        HookKind::Created,
        HookKind::BeforeMount,
        HookKind::Mounted,
        HookKind::BeforeUpdate,
        HookKind::Updated,
        HookKind::BeforeDestroy,
        HookKind::Destroyed,
        HookKind::Activated,
        HookKind::Deactivated,
    ];
}

/// Per-kind hook arrays. Merging concatenates parent-then-child and
/// dedupes by function identity, preserving order.
#[derive(Clone, Default)]
pub struct HookLists {
    lists: [Vec<HookFn>; 10],
}

impl HookLists {
    fn index(kind: HookKind) -> usize {
        HookKind::ALL.iter().position(|k| *k == kind).unwrap()
    }

    pub fn get(&self, kind: HookKind) -> &[HookFn] {
        &self.lists[Self::index(kind)]
    }

    pub fn push(&mut self, kind: HookKind, hook: HookFn) {
        self.lists[Self::index(kind)].push(hook);
    }

    pub fn merged(parent: &HookLists, child: &HookLists) -> HookLists {
        let mut out = HookLists::default();
        for kind in HookKind::ALL {
            let idx = Self::index(kind);
            let mut combined: Vec<HookFn> = Vec::new();
            for hook in parent.lists[idx].iter().chain(child.lists[idx].iter()) {
                let fn_ptr = Rc::as_ptr(hook) as *const ();
                let duplicate = combined
                    .iter()
                    .any(|existing| Rc::as_ptr(existing) as *const () == fn_ptr);
                if !duplicate {
                    combined.push(hook.clone());
                }
            }
            out.lists[idx] = combined;
        }
        out
    }
}

// =============================================================================
// Prop declarations
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PropType {
    Bool,
    Num,
    Str,
    Arr,
    Obj,
}

impl PropType {
    pub fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PropType::Bool, Value::Bool(_))
                | (PropType::Num, Value::Num(_))
                | (PropType::Str, Value::Str(_))
                | (PropType::Arr, Value::Arr(_))
                | (PropType::Obj, Value::Obj(_))
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropType::Bool => "Boolean",
            PropType::Num => "Number",
            PropType::Str => "String",
            PropType::Arr => "Array",
            PropType::Obj => "Object",
        }
    }
}

#[derive(Clone, Default)]
pub struct PropOptions {
    /// Accepted types; empty means any.
    pub types: Vec<PropType>,
    pub required: bool,
    pub default: Option<PropDefaultFn>,
    pub validator: Option<PropValidatorFn>,
}

impl PropOptions {
    pub fn any() -> Self {
        PropOptions::default()
    }

    pub fn typed(ty: PropType) -> Self {
        PropOptions {
            types: vec![ty],
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: impl Fn(&Rc<Component>) -> Value + 'static) -> Self {
        self.default = Some(Rc::new(default));
        self
    }

    pub fn with_validator(mut self, validator: impl Fn(&Value) -> bool + 'static) -> Self {
        self.validator = Some(Rc::new(validator));
        self
    }
}

/// Props as authored: a bare list of names or a full map.
#[derive(Clone)]
pub enum PropsDecl {
    Names(Vec<String>),
    Map(IndexMap<String, PropOptions>),
}

impl Default for PropsDecl {
    fn default() -> Self {
        PropsDecl::Map(IndexMap::new())
    }
}

impl PropsDecl {
    pub fn is_empty(&self) -> bool {
        match self {
            PropsDecl::Names(names) => names.is_empty(),
            PropsDecl::Map(map) => map.is_empty(),
        }
    }
}

// =============================================================================
// Inject / directives / computed / watch declarations
// =============================================================================

#[derive(Clone)]
pub struct InjectOptions {
    pub from: String,
    pub default: Option<InjectDefaultFn>,
}

#[derive(Clone)]
pub enum InjectDecl {
    Names(Vec<String>),
    Map(IndexMap<String, InjectOptions>),
}

impl Default for InjectDecl {
    fn default() -> Self {
        InjectDecl::Map(IndexMap::new())
    }
}

#[derive(Clone, Default)]
pub struct DirectiveHooks {
    pub bind: Option<DirectiveFn>,
    pub update: Option<DirectiveFn>,
    pub unbind: Option<DirectiveFn>,
}

/// Directives as authored: a bare function means `{bind, update}`.
#[derive(Clone)]
pub enum DirectiveDecl {
    Fn(DirectiveFn),
    Hooks(DirectiveHooks),
}

#[derive(Clone)]
pub struct ComputedDecl {
    pub get: UserGetter,
    pub set: Option<UserSetter>,
}

#[derive(Clone)]
pub struct WatchDecl {
    pub handler: WatchHandlerFn,
    pub deep: bool,
    pub immediate: bool,
    pub sync: bool,
}

impl WatchDecl {
    pub fn new(handler: impl Fn(&Rc<Component>, &Value, &Value) -> Result<()> + 'static) -> Self {
        WatchDecl {
            handler: Rc::new(handler),
            deep: false,
            immediate: false,
            sync: false,
        }
    }

    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }
}

// =============================================================================
// ComponentOptions
// =============================================================================

/// A component definition, before or after merging.
#[derive(Clone, Default)]
pub struct ComponentOptions {
    pub name: Option<String>,
    /// Abstract components do not appear in the `$parent` chain.
    pub abstract_component: bool,

    pub props: PropsDecl,
    /// Only permitted during instance creation.
    pub props_data: Option<IndexMap<String, Value>>,
    pub data: Option<DataFn>,
    pub computed: IndexMap<String, ComputedDecl>,
    pub watch: IndexMap<String, Vec<WatchDecl>>,
    pub methods: IndexMap<String, MethodFn>,
    pub render: Option<RenderFn>,

    pub components: Assets<Rc<ComponentOptions>>,
    pub directives: Assets<DirectiveDecl>,
    pub filters: Assets<FilterFn>,

    pub hooks: HookLists,
    pub error_captured: Vec<ErrorCapturedFn>,

    pub provide: Option<ProvideFn>,
    pub inject: InjectDecl,

    pub mixins: Vec<Rc<ComponentOptions>>,
    pub extends: Option<Rc<ComponentOptions>>,

    /// Only permitted during instance creation.
    pub el: Option<NodeId>,

    /// Unrecognized option keys, carried under the default strategy.
    pub rest: IndexMap<String, Value>,
}

impl ComponentOptions {
    pub fn new() -> Self {
        ComponentOptions::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn abstract_component(mut self) -> Self {
        self.abstract_component = true;
        self
    }

    pub fn data(mut self, data: impl Fn(&Rc<Component>) -> Result<Value> + 'static) -> Self {
        self.data = Some(Rc::new(data));
        self
    }

    pub fn prop(mut self, key: impl Into<String>, options: PropOptions) -> Self {
        match &mut self.props {
            PropsDecl::Map(map) => {
                map.insert(key.into(), options);
            }
            PropsDecl::Names(_) => {
                let mut map = IndexMap::new();
                map.insert(key.into(), options);
                self.props = PropsDecl::Map(map);
            }
        }
        self
    }

    /// Declare props as a bare list of names (type: any).
    pub fn prop_names(mut self, names: impl IntoIterator<Item = &'static str>) -> Self {
        self.props = PropsDecl::Names(names.into_iter().map(String::from).collect());
        self
    }

    pub fn computed(
        mut self,
        key: impl Into<String>,
        get: impl Fn(&Rc<Component>) -> Result<Value> + 'static,
    ) -> Self {
        self.computed.insert(
            key.into(),
            ComputedDecl {
                get: Rc::new(get),
                set: None,
            },
        );
        self
    }

    pub fn computed_full(mut self, key: impl Into<String>, decl: ComputedDecl) -> Self {
        self.computed.insert(key.into(), decl);
        self
    }

    pub fn watch(mut self, key: impl Into<String>, decl: WatchDecl) -> Self {
        self.watch.entry(key.into()).or_default().push(decl);
        self
    }

    pub fn method(
        mut self,
        key: impl Into<String>,
        method: impl Fn(&Rc<Component>, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        self.methods.insert(key.into(), Rc::new(method));
        self
    }

    pub fn render(mut self, render: impl Fn(&Rc<Component>) -> Result<Rendered> + 'static) -> Self {
        self.render = Some(Rc::new(render));
        self
    }

    pub fn component(mut self, id: impl Into<String>, options: ComponentOptions) -> Self {
        self.components.insert(id, Rc::new(options));
        self
    }

    pub fn directive(mut self, id: impl Into<String>, decl: DirectiveDecl) -> Self {
        self.directives.insert(id, decl);
        self
    }

    pub fn filter(mut self, id: impl Into<String>, filter: impl Fn(&Value) -> Value + 'static) -> Self {
        self.filters.insert(id, Rc::new(filter));
        self
    }

    pub fn hook(mut self, kind: HookKind, hook: impl Fn(&Rc<Component>) -> Result<()> + 'static) -> Self {
        self.hooks.push(kind, Rc::new(hook));
        self
    }

    pub fn error_captured(
        mut self,
        hook: impl Fn(&Rc<Component>, &CoreError, &str) -> Result<bool> + 'static,
    ) -> Self {
        self.error_captured.push(Rc::new(hook));
        self
    }

    pub fn provide(mut self, provide: impl Fn(&Rc<Component>) -> Result<Value> + 'static) -> Self {
        self.provide = Some(Rc::new(provide));
        self
    }

    pub fn inject_names(mut self, names: impl IntoIterator<Item = &'static str>) -> Self {
        self.inject = InjectDecl::Names(names.into_iter().map(String::from).collect());
        self
    }

    pub fn inject_entry(mut self, key: impl Into<String>, options: InjectOptions) -> Self {
        match &mut self.inject {
            InjectDecl::Map(map) => {
                map.insert(key.into(), options);
            }
            InjectDecl::Names(_) => {
                let mut map = IndexMap::new();
                map.insert(key.into(), options);
                self.inject = InjectDecl::Map(map);
            }
        }
        self
    }

    pub fn mixin(mut self, options: ComponentOptions) -> Self {
        self.mixins.push(Rc::new(options));
        self
    }

    pub fn extends(mut self, options: ComponentOptions) -> Self {
        self.extends = Some(Rc::new(options));
        self
    }

    pub fn el(mut self, el: NodeId) -> Self {
        self.el = Some(el);
        self
    }

    pub fn props_data(mut self, props_data: IndexMap<String, Value>) -> Self {
        self.props_data = Some(props_data);
        self
    }

    pub fn rest_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.rest.insert(key.into(), value);
        self
    }
}
