//! Provide / inject resolution.
//!
//! Providers expose an object of values; descendants resolve injections by
//! walking the parent chain. Resolved values are defined shallow-reactive
//! on the instance with a write guard - injection is a one-way channel.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::invoke_with_error_handling;
use crate::options::{InjectDecl, InjectOptions};
use crate::reactivity::observer::define_reactive_with;
use crate::value::{Guard, Obj, Value};
use crate::warn::warn;

use super::Component;

pub(crate) fn init_provide(vm: &Rc<Component>) {
    if let Some(provide) = vm.options().provide.clone() {
        let provided = invoke_with_error_handling(Some(vm), "provide()", || provide(vm))
            .unwrap_or(Value::Undefined);
        vm.set_provided(provided);
    }
}

pub(crate) fn init_injections(vm: &Rc<Component>) {
    let inject = match &vm.options().inject {
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
    };
    if inject.is_empty() {
        return;
    }

    let resolved = resolve_inject(vm, &inject);
    let holder = Obj::new();
    holder.mark_runtime_internal();
    for (key, value) in resolved {
        // Injected values belong to the provider's reactive graph; define
        // them shallow so they are not converted a second time.
        define_reactive_with(&holder, &key, value, true, Guard::Injection);
    }
    vm.set_injections(holder);
}

fn resolve_inject(
    vm: &Rc<Component>,
    inject: &IndexMap<String, InjectOptions>,
) -> IndexMap<String, Value> {
    let mut out = IndexMap::new();
    for (key, options) in inject {
        let mut source = vm.parent();
        let mut found = None;
        while let Some(ancestor) = source {
            if let Some(provided) = ancestor.provided() {
                if let Some(obj) = provided.as_obj() {
                    if obj.has(&options.from) {
                        found = Some(obj.raw_get(&options.from));
                        break;
                    }
                }
            }
            source = ancestor.parent();
        }
        match found {
            Some(value) => {
                out.insert(key.clone(), value);
            }
            None => match &options.default {
                Some(default) => {
                    out.insert(key.clone(), default());
                }
                None => warn(format!("Injection \"{key}\" not found")),
            },
        }
    }
    out
}
