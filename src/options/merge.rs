//! Option normalization and merging.
//!
//! Merging combines a parent and a child option record into a new record
//! under per-key strategies. [`merge_field`] is the dispatch table: each
//! recognized key maps to its strategy, everything else falls through to
//! the default (child wins when defined).
//!
//! Before merging, the child is normalized: prop name lists expand to full
//! declarations, inject shorthand expands to `{from}` records, and bare
//! function directives expand to `{bind, update}` hooks. `extends` and
//! `mixins` are folded into the parent first, recursively.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;
use crate::vdom::is_reserved_tag;
use crate::warn::warn;

use super::{
    Assets, ComponentOptions, DataFn, DirectiveDecl, DirectiveHooks, HookLists, InjectDecl,
    InjectOptions, PropOptions, PropsDecl, ProvideFn,
};

// =============================================================================
// Validation
// =============================================================================

fn is_builtin_tag(tag: &str) -> bool {
    matches!(tag, "slot" | "component")
}

/// Component ids must look like custom-element names and must not shadow
/// reserved tags.
pub fn validate_component_name(name: &str) {
    let starts_alpha = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic());
    let body_ok = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !starts_alpha || !body_ok {
        warn(format!(
            "Invalid component name: \"{name}\". Component names should conform to \
             valid custom element names."
        ));
    }
    if is_builtin_tag(name) || is_reserved_tag(name) {
        warn(format!(
            "Do not use built-in or reserved HTML elements as component id: {name}"
        ));
    }
}

fn check_components(options: &ComponentOptions) {
    for (id, _) in options.components.own_entries() {
        validate_component_name(id);
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// `props: ["size", "level"]` expands to full declarations with any type.
pub fn normalize_props(decl: &PropsDecl) -> IndexMap<String, PropOptions> {
    match decl {
        PropsDecl::Map(map) => map.clone(),
        PropsDecl::Names(names) => names
            .iter()
            .map(|name| (super::camelize(name), PropOptions::any()))
            .collect(),
    }
}

/// `inject: ["theme"]` expands to `{theme: {from: "theme"}}`.
pub fn normalize_inject(decl: &InjectDecl) -> IndexMap<String, InjectOptions> {
    match decl {
        InjectDecl::Map(map) => map.clone(),
        InjectDecl::Names(names) => names
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    InjectOptions {
                        from: name.clone(),
                        default: None,
                    },
                )
            })
            .collect(),
    }
}

/// A bare function directive acts on both bind and update.
pub fn normalize_directive(decl: &DirectiveDecl) -> DirectiveDecl {
    match decl {
        DirectiveDecl::Fn(f) => DirectiveDecl::Hooks(DirectiveHooks {
            bind: Some(f.clone()),
            update: Some(f.clone()),
            unbind: None,
        }),
        DirectiveDecl::Hooks(_) => decl.clone(),
    }
}

// =============================================================================
// Per-key strategies
// =============================================================================

fn merge_data_fns(parent: Option<DataFn>, child: Option<DataFn>) -> Option<DataFn> {
    match (parent, child) {
        (parent, None) => parent,
        (None, child) => child,
        (Some(parent_fn), Some(child_fn)) => Some(Rc::new(move |vm| {
            let child_value = child_fn(vm)?;
            let parent_value = parent_fn(vm)?;
            Ok(merge_data_values(child_value, parent_value))
        })),
    }
}

fn merge_provide_fns(parent: Option<ProvideFn>, child: Option<ProvideFn>) -> Option<ProvideFn> {
    match (parent, child) {
        (parent, None) => parent,
        (None, child) => child,
        (Some(parent_fn), Some(child_fn)) => Some(Rc::new(move |vm| {
            let child_value = child_fn(vm)?;
            let parent_value = parent_fn(vm)?;
            Ok(merge_data_values(child_value, parent_value))
        })),
    }
}

/// Deep merge of two data objects; on collision the `to` (child) side
/// wins, and nested objects merge recursively. Keys copied in go through
/// the reactive `set` so an already-observed target notifies structure
/// subscribers.
pub fn merge_data_values(to: Value, from: Value) -> Value {
    if matches!(to, Value::Undefined | Value::Null) {
        return from;
    }
    let (Value::Obj(to_obj), Value::Obj(from_obj)) = (&to, &from) else {
        return to;
    };
    for key in from_obj.keys() {
        let from_value = from_obj.raw_get(&key);
        if !to_obj.has(&key) {
            crate::reactivity::set(&to, &key, from_value);
        } else {
            let to_value = to_obj.raw_get(&key);
            let both_objects = matches!((&to_value, &from_value), (Value::Obj(_), Value::Obj(_)));
            if both_objects && !Value::same(&to_value, &from_value) {
                merge_data_values(to_value, from_value);
            }
        }
    }
    to
}

fn merge_maps<T: Clone>(
    parent: &IndexMap<String, T>,
    child: &IndexMap<String, T>,
) -> IndexMap<String, T> {
    let mut out = parent.clone();
    for (key, value) in child {
        out.insert(key.clone(), value.clone());
    }
    out
}

// =============================================================================
// merge_options
// =============================================================================

/// Merge a child option record into a parent record.
///
/// `has_vm` is true when merging for an instance being created; `el` and
/// `props_data` are only permitted then.
pub fn merge_options(
    parent: &ComponentOptions,
    child: &ComponentOptions,
    has_vm: bool,
) -> ComponentOptions {
    check_components(child);

    // Fold extends and mixins into the parent first.
    let mut base = parent.clone();
    if let Some(extends) = &child.extends {
        base = merge_options(&base, extends, has_vm);
    }
    for mixin in &child.mixins {
        base = merge_options(&base, mixin, has_vm);
    }
    let parent = &base;

    if !has_vm && (child.el.is_some() || child.props_data.is_some()) {
        warn("option \"el\" / \"propsData\" can only be used during instance creation");
    }

    ComponentOptions {
        name: child.name.clone().or_else(|| parent.name.clone()),
        abstract_component: child.abstract_component || parent.abstract_component,

        props: PropsDecl::Map(merge_maps(
            &normalize_props(&parent.props),
            &normalize_props(&child.props),
        )),
        props_data: child.props_data.clone().or_else(|| parent.props_data.clone()),
        data: merge_data_fns(parent.data.clone(), child.data.clone()),
        computed: merge_maps(&parent.computed, &child.computed),
        watch: {
            // Per-key concatenation: parent handlers run first.
            let mut out = parent.watch.clone();
            for (key, decls) in &child.watch {
                out.entry(key.clone()).or_default().extend(decls.clone());
            }
            out
        },
        methods: merge_maps(&parent.methods, &child.methods),
        render: child.render.clone().or_else(|| parent.render.clone()),

        components: Assets::layered(child.components.own_map(), parent.components.clone()),
        directives: Assets::layered(
            child.directives.map_own(normalize_directive).own_map(),
            parent.directives.clone(),
        ),
        filters: Assets::layered(child.filters.own_map(), parent.filters.clone()),

        hooks: HookLists::merged(&parent.hooks, &child.hooks),
        error_captured: {
            let mut out = parent.error_captured.clone();
            out.extend(child.error_captured.iter().cloned());
            out
        },

        provide: merge_provide_fns(parent.provide.clone(), child.provide.clone()),
        inject: InjectDecl::Map(merge_maps(
            &normalize_inject(&parent.inject),
            &normalize_inject(&child.inject),
        )),

        // Folded above; the merged record carries none.
        mixins: Vec::new(),
        extends: None,

        el: child.el.or(parent.el),
        rest: merge_maps(&parent.rest, &child.rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{HookKind, PropType, WatchDecl};
    use crate::value::obj;
    use crate::warn;

    #[test]
    fn test_props_names_normalize() {
        let decl = PropsDecl::Names(vec!["size".to_string(), "text-color".to_string()]);
        let normalized = normalize_props(&decl);
        assert!(normalized.contains_key("size"));
        assert!(normalized.contains_key("textColor"));
        assert!(normalized["size"].types.is_empty());
    }

    #[test]
    fn test_inject_names_normalize() {
        let decl = InjectDecl::Names(vec!["theme".to_string()]);
        let normalized = normalize_inject(&decl);
        assert_eq!(normalized["theme"].from, "theme");
    }

    #[test]
    fn test_data_merge_child_wins() {
        let parent = ComponentOptions::new()
            .data(|_| Ok(obj([("a", Value::Num(1.0)), ("shared", Value::Num(1.0))])));
        let child = ComponentOptions::new()
            .data(|_| Ok(obj([("b", Value::Num(2.0)), ("shared", Value::Num(2.0))])));
        let merged = merge_options(&parent, &child, true);

        // Merged data fn needs an instance context only for user closures;
        // these literals ignore it, so probe through a throwaway root.
        let data_fn = merged.data.unwrap();
        let vm = crate::test_component();
        let data = data_fn(&vm).unwrap();
        let data = data.as_obj().unwrap();
        assert!(Value::same(&data.raw_get("a"), &Value::Num(1.0)));
        assert!(Value::same(&data.raw_get("b"), &Value::Num(2.0)));
        assert!(Value::same(&data.raw_get("shared"), &Value::Num(2.0)));
    }

    #[test]
    fn test_hooks_concat_parent_first() {
        use std::cell::RefCell;
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let log_parent = log.clone();
        let log_child = log.clone();

        let parent =
            ComponentOptions::new().hook(HookKind::Created, move |_| {
                log_parent.borrow_mut().push("parent");
                Ok(())
            });
        let child = ComponentOptions::new().hook(HookKind::Created, move |_| {
            log_child.borrow_mut().push("child");
            Ok(())
        });

        let merged = merge_options(&parent, &child, true);
        let vm = crate::test_component();
        for hook in merged.hooks.get(HookKind::Created) {
            hook(&vm).unwrap();
        }
        assert_eq!(log.borrow().as_slice(), &["parent", "child"]);
    }

    #[test]
    fn test_hooks_dedupe() {
        let shared: crate::options::HookFn = Rc::new(|_| Ok(()));
        let mut parent = ComponentOptions::new();
        parent.hooks.push(HookKind::Mounted, shared.clone());
        let mut child = ComponentOptions::new();
        child.hooks.push(HookKind::Mounted, shared);

        let merged = merge_options(&parent, &child, true);
        assert_eq!(merged.hooks.get(HookKind::Mounted).len(), 1);
    }

    #[test]
    fn test_props_shallow_merge() {
        let parent = ComponentOptions::new().prop("size", PropOptions::typed(PropType::Num));
        let child = ComponentOptions::new().prop("size", PropOptions::typed(PropType::Str));
        let merged = merge_options(&parent, &child, true);
        let PropsDecl::Map(props) = merged.props else {
            panic!("props should be normalized to a map")
        };
        assert_eq!(props["size"].types, vec![PropType::Str]);
    }

    #[test]
    fn test_watch_concat() {
        let parent = ComponentOptions::new().watch("a", WatchDecl::new(|_, _, _| Ok(())));
        let child = ComponentOptions::new().watch("a", WatchDecl::new(|_, _, _| Ok(())));
        let merged = merge_options(&parent, &child, true);
        assert_eq!(merged.watch["a"].len(), 2);
    }

    #[test]
    fn test_mixin_hooks_fold_in() {
        use std::cell::RefCell;
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let log_mixin = log.clone();
        let log_self = log.clone();

        let mixin = ComponentOptions::new().hook(HookKind::Created, move |_| {
            log_mixin.borrow_mut().push("mixin");
            Ok(())
        });
        let child = ComponentOptions::new()
            .mixin(mixin)
            .hook(HookKind::Created, move |_| {
                log_self.borrow_mut().push("self");
                Ok(())
            });

        let merged = merge_options(&ComponentOptions::new(), &child, true);
        let vm = crate::test_component();
        for hook in merged.hooks.get(HookKind::Created) {
            hook(&vm).unwrap();
        }
        assert_eq!(log.borrow().as_slice(), &["mixin", "self"]);
    }

    #[test]
    fn test_el_outside_instance_creation_warns() {
        warn::reset_warnings();
        let child = ComponentOptions::new().el(crate::host::NodeId(1));
        let _ = merge_options(&ComponentOptions::new(), &child, false);
        assert_eq!(warn::warning_count_containing("instance creation"), 1);
    }

    #[test]
    fn test_invalid_component_name_warns() {
        warn::reset_warnings();
        let child = ComponentOptions::new().component("1bad", ComponentOptions::new());
        let _ = merge_options(&ComponentOptions::new(), &child, true);
        assert_eq!(warn::warning_count_containing("Invalid component name"), 1);

        warn::reset_warnings();
        let child = ComponentOptions::new().component("div", ComponentOptions::new());
        let _ = merge_options(&ComponentOptions::new(), &child, true);
        assert_eq!(warn::warning_count_containing("reserved"), 1);
    }
}
