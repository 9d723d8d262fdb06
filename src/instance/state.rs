//! Instance state initialization: props, methods, data, computed, watch.
//!
//! Order matters and is fixed: props first (children receive before they
//! produce), then method collision checks, then the data factory (with
//! dependency capture suppressed), then computed watchers, then user
//! watchers.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::invoke_with_error_handling;
use crate::options::{PropOptions, PropsDecl, UserGetter, WatchDecl};
use crate::reactivity::dep::{pop_target, push_target};
use crate::reactivity::observer::{define_reactive_with, observe_root, observe_value};
use crate::reactivity::{Watcher, WatcherOptions};
use crate::value::{Guard, Obj, Value};
use crate::warn::warn;

use super::{Cleanup, Component};

fn is_reserved_attribute(key: &str) -> bool {
    matches!(key, "key" | "ref" | "slot" | "slot-scope" | "is")
}

/// The merged, normalized prop declarations.
pub(crate) fn declared_props(vm: &Rc<Component>) -> IndexMap<String, PropOptions> {
    match &vm.options().props {
        PropsDecl::Map(map) => map.clone(),
        PropsDecl::Names(names) => names
            .iter()
            .map(|name| (name.clone(), PropOptions::any()))
            .collect(),
    }
}

// =============================================================================
// init_state
// =============================================================================

pub(crate) fn init_state(vm: &Rc<Component>) {
    let options = vm.options();

    let declared = declared_props(vm);
    if !declared.is_empty() {
        init_props(vm, &declared);
    }

    // Methods live on the options record; here we only reject collisions.
    for key in options.methods.keys() {
        if declared.contains_key(key) {
            warn(format!(
                "Method \"{key}\" has already been defined as a prop"
            ));
        }
    }

    if options.data.is_some() {
        init_data(vm, &declared);
    } else {
        let empty = Value::Obj(Obj::new());
        observe_root(&empty);
        vm.set_data(empty);
    }

    if !options.computed.is_empty() {
        init_computed(vm, &declared);
    }

    for (key, decls) in options.watch.clone() {
        for decl in decls {
            // Option-declared watchers live for the instance lifetime and
            // are torn down with _watchers; the disposer is not kept.
            let _ = watch(vm, WatchSource::Path(key.clone()), decl);
        }
    }
}

// =============================================================================
// Props
// =============================================================================

fn init_props(vm: &Rc<Component>, declared: &IndexMap<String, PropOptions>) {
    let props_data = vm.props_data();
    let props_obj = Obj::new();
    props_obj.mark_runtime_internal();
    let is_root = vm.placeholder().is_none();
    let mut keys = Vec::with_capacity(declared.len());

    for (key, prop_options) in declared {
        keys.push(key.clone());
        if is_reserved_attribute(key) {
            warn(format!(
                "\"{key}\" is a reserved attribute and cannot be used as component prop"
            ));
        }
        let value = validate_prop(vm, key, prop_options, &props_data);
        // Child props stay shallow: the value belongs to the parent's
        // reactive graph already. Root props (propsData) convert deeply.
        define_reactive_with(&props_obj, key, value, !is_root, Guard::Prop);
    }
    vm.set_props(props_obj, keys);
}

/// Resolve and check one prop value against its declaration.
pub(crate) fn validate_prop(
    vm: &Rc<Component>,
    key: &str,
    prop: &PropOptions,
    props_data: &IndexMap<String, Value>,
) -> Value {
    let mut provided = props_data.get(key).cloned();
    if provided.is_none() {
        provided = props_data.get(&crate::options::hyphenate(key)).cloned();
    }
    let absent = provided.is_none();

    // Absent Boolean-typed props without a default resolve to false.
    if absent && prop.types.contains(&crate::options::PropType::Bool) && prop.default.is_none() {
        provided = Some(Value::Bool(false));
    }

    let value = match provided {
        Some(value) => value,
        None => {
            if prop.required {
                warn(format!("Missing required prop: \"{key}\""));
                Value::Undefined
            } else if let Some(default) = &prop.default {
                let value = default(vm);
                // Defaults are fresh values owned by this instance; convert
                // them so they participate in reactivity.
                observe_value(&value);
                value
            } else {
                Value::Undefined
            }
        }
    };

    if !prop.types.is_empty()
        && !value.is_undefined()
        && !prop.types.iter().any(|ty| ty.matches(&value))
    {
        let expected: Vec<&str> = prop.types.iter().map(|ty| ty.as_str()).collect();
        warn(format!(
            "Invalid prop: type check failed for prop \"{key}\". Expected {}, got {}",
            expected.join(" or "),
            value.type_name()
        ));
    }
    if let Some(validator) = &prop.validator {
        if !validator(&value) {
            warn(format!(
                "Invalid prop: custom validator check failed for prop \"{key}\""
            ));
        }
    }
    value
}

// =============================================================================
// Data
// =============================================================================

fn init_data(vm: &Rc<Component>, declared: &IndexMap<String, PropOptions>) {
    let data_fn = vm.options().data.clone().expect("init_data without data fn");

    // Data creation must not subscribe: suppress the capture target while
    // the factory runs.
    push_target(None);
    let data = invoke_with_error_handling(Some(vm), "data()", || data_fn(vm))
        .unwrap_or(Value::Undefined);
    pop_target();

    let data = match &data {
        Value::Obj(_) => data,
        _ => {
            warn("data functions should return an object");
            Value::Obj(Obj::new())
        }
    };

    let options = vm.options();
    if let Some(obj) = data.as_obj() {
        for key in obj.keys() {
            if options.methods.contains_key(&key) {
                warn(format!(
                    "Method \"{key}\" has already been defined as a data property"
                ));
            }
            if declared.contains_key(&key) {
                warn(format!(
                    "The data property \"{key}\" is already declared as a prop. \
                     Use prop default value instead."
                ));
            }
        }
    }

    observe_root(&data);
    vm.set_data(data);
}

// =============================================================================
// Computed
// =============================================================================

fn init_computed(vm: &Rc<Component>, declared: &IndexMap<String, PropOptions>) {
    let options = vm.options();
    for (key, decl) in options.computed.clone() {
        let collides_data = vm
            .data_value()
            .as_obj()
            .is_some_and(|data| data.has(&key));
        if collides_data {
            warn(format!(
                "The computed property \"{key}\" is already defined in data"
            ));
        } else if declared.contains_key(&key) {
            warn(format!(
                "The computed property \"{key}\" is already defined as a prop"
            ));
        }

        let getter_vm = Rc::downgrade(vm);
        let user_get = decl.get.clone();
        let info = format!("getter for computed \"{key}\"");
        let getter = Box::new(move || match getter_vm.upgrade() {
            Some(vm) => invoke_with_error_handling(Some(&vm), &info, || user_get(&vm))
                .unwrap_or(Value::Undefined),
            None => Value::Undefined,
        });
        let watcher = Watcher::create(
            Some(vm),
            getter,
            Box::new(|_, _| {}),
            WatcherOptions {
                lazy: true,
                ..Default::default()
            },
            None,
            false,
        );
        vm.insert_computed_watcher(key, watcher);
    }
}

// =============================================================================
// $watch
// =============================================================================

/// What a watcher observes: a dotted path into instance state, or a
/// getter function.
pub enum WatchSource {
    Path(String),
    Getter(UserGetter),
}

/// Create a user watcher. Returns a disposer; `immediate` fires the
/// handler once, synchronously, with capture suppressed.
pub fn watch(vm: &Rc<Component>, source: WatchSource, decl: WatchDecl) -> Cleanup {
    let getter: Box<dyn Fn() -> Value> = match source {
        WatchSource::Path(path) => match parse_path(&path) {
            Some(segments) => {
                let vm_weak = Rc::downgrade(vm);
                Box::new(move || match vm_weak.upgrade() {
                    Some(vm) => get_path(&vm, &segments),
                    None => Value::Undefined,
                })
            }
            None => {
                warn(format!(
                    "Failed watching path: \"{path}\". Watcher only accepts simple \
                     dot-delimited paths - bracket syntax is not supported."
                ));
                Box::new(|| Value::Undefined)
            }
        },
        WatchSource::Getter(user_getter) => {
            let vm_weak = Rc::downgrade(vm);
            Box::new(move || match vm_weak.upgrade() {
                Some(vm) => {
                    invoke_with_error_handling(Some(&vm), "watcher getter", || user_getter(&vm))
                        .unwrap_or(Value::Undefined)
                }
                None => Value::Undefined,
            })
        }
    };

    let handler = decl.handler.clone();
    let cb_vm = Rc::downgrade(vm);
    let cb = Box::new(move |new: &Value, old: &Value| {
        if let Some(vm) = cb_vm.upgrade() {
            let _ =
                invoke_with_error_handling(Some(&vm), "watcher callback", || handler(&vm, new, old));
        }
    });

    let watcher = Watcher::create(
        Some(vm),
        getter,
        cb,
        WatcherOptions {
            deep: decl.deep,
            sync: decl.sync,
            user: true,
            lazy: false,
        },
        None,
        false,
    );

    if decl.immediate {
        push_target(None);
        let value = watcher.cached_value();
        let handler = decl.handler.clone();
        let _ = invoke_with_error_handling(Some(vm), "watcher callback (immediate)", || {
            handler(vm, &value, &Value::Undefined)
        });
        pop_target();
    }

    let handle = watcher.clone();
    Box::new(move || handle.teardown())
}

/// Parse a dotted path. Bracket syntax (or any other punctuation) is
/// rejected; the caller warns.
pub fn parse_path(path: &str) -> Option<Vec<String>> {
    let valid = !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.');
    if !valid {
        return None;
    }
    Some(path.split('.').map(String::from).collect())
}

fn get_path(vm: &Rc<Component>, segments: &[String]) -> Value {
    let mut current = match segments.first() {
        Some(first) => vm.get(first),
        None => return Value::Undefined,
    };
    for segment in &segments[1..] {
        current = match current.as_obj() {
            Some(obj) => obj.get(segment),
            None => return Value::Undefined,
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("a.b.c"),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(parse_path("single"), Some(vec!["single".to_string()]));
        assert!(parse_path("items[0]").is_none());
        assert!(parse_path("").is_none());
    }
}
