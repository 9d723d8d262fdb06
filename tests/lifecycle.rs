//! Component lifecycle: init order, parent/child update ordering, destroy,
//! props, provide/inject, and error routing.

use std::cell::RefCell;
use std::rc::Rc;

use spark_dom::{
    destroy_component, flush_microtasks, h, obj, ComponentOptions, CoreError, HookKind,
    MemoryBackend, NodeId, PropOptions, PropType, Runtime, SharedBackend, Value, VNodeData,
};

fn runtime() -> (Rc<RefCell<MemoryBackend>>, Runtime) {
    spark_dom::reset_runtime_state();
    let mem = Rc::new(RefCell::new(MemoryBackend::new()));
    let shared: SharedBackend = mem.clone();
    (mem, Runtime::new(shared))
}

fn root_el(mem: &Rc<RefCell<MemoryBackend>>) -> NodeId {
    use spark_dom::HostBackend;
    mem.borrow_mut().create_element("div")
}

type Log = Rc<RefCell<Vec<String>>>;

fn log_hook(log: &Log, label: &'static str) -> impl Fn(&Rc<spark_dom::Component>) -> spark_dom::Result<()> {
    let log = log.clone();
    move |_| {
        log.borrow_mut().push(label.to_string());
        Ok(())
    }
}

#[test]
fn init_and_mount_hook_order() {
    let (mem, runtime) = runtime();
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    let options = ComponentOptions::new()
        .data(|_| Ok(obj([("x", 1.into())])))
        .hook(HookKind::BeforeCreate, log_hook(&log, "beforeCreate"))
        .hook(HookKind::Created, log_hook(&log, "created"))
        .hook(HookKind::BeforeMount, log_hook(&log, "beforeMount"))
        .hook(HookKind::Mounted, log_hook(&log, "mounted"))
        .render(|vm| Ok(h(vm, "p", None, vec![vm.get("x").into()]).into()));

    let _app = runtime.mount(options, root_el(&mem));
    assert_eq!(
        log.borrow().as_slice(),
        &["beforeCreate", "created", "beforeMount", "mounted"]
    );
}

fn parent_child_options(log: &Log) -> ComponentOptions {
    let child = ComponentOptions::new()
        .name("child")
        .prop("n", PropOptions::typed(PropType::Num))
        .hook(HookKind::BeforeUpdate, log_hook(log, "child.beforeUpdate"))
        .hook(HookKind::Updated, log_hook(log, "child.updated"))
        .hook(HookKind::Mounted, log_hook(log, "child.mounted"))
        .hook(HookKind::BeforeDestroy, log_hook(log, "child.beforeDestroy"))
        .hook(HookKind::Destroyed, log_hook(log, "child.destroyed"))
        .render(|vm| Ok(h(vm, "span", None, vec![vm.get("n").into()]).into()));

    ComponentOptions::new()
        .data(|_| Ok(obj([("n", 1.into())])))
        .component("child", child)
        .hook(HookKind::BeforeUpdate, log_hook(log, "parent.beforeUpdate"))
        .hook(HookKind::Updated, log_hook(log, "parent.updated"))
        .hook(HookKind::Mounted, log_hook(log, "parent.mounted"))
        .hook(HookKind::BeforeDestroy, log_hook(log, "parent.beforeDestroy"))
        .hook(HookKind::Destroyed, log_hook(log, "parent.destroyed"))
        .render(|vm| {
            let child = h(
                vm,
                "child",
                Some(VNodeData::new().attr("n", vm.get("n"))),
                vec![],
            );
            Ok(h(vm, "div", None, vec![child.into()]).into())
        })
}

#[test]
fn child_mounts_before_parent() {
    let (mem, runtime) = runtime();
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let _app = runtime.mount(parent_child_options(&log), root_el(&mem));
    assert_eq!(
        log.borrow().as_slice(),
        &["child.mounted", "parent.mounted"]
    );
}

#[test]
fn parent_updates_before_child_hooks_nest() {
    let (mem, runtime) = runtime();
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let app = runtime.mount(parent_child_options(&log), root_el(&mem));
    log.borrow_mut().clear();

    app.set("n", 2.into());
    flush_microtasks();
    assert_eq!(
        log.borrow().as_slice(),
        &[
            "parent.beforeUpdate",
            "child.beforeUpdate",
            "child.updated",
            "parent.updated",
        ]
    );

    // The prop actually flowed through.
    let child = app.children()[0].clone();
    assert_eq!(child.get("n").as_num(), Some(2.0));
}

#[test]
fn destroy_runs_child_first() {
    let (mem, runtime) = runtime();
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let app = runtime.mount(parent_child_options(&log), root_el(&mem));
    log.borrow_mut().clear();

    destroy_component(&app);
    assert_eq!(
        log.borrow().as_slice(),
        &[
            "parent.beforeDestroy",
            "child.beforeDestroy",
            "child.destroyed",
            "parent.destroyed",
        ]
    );
    assert!(app.is_destroyed());
    assert!(app.children().is_empty() || app.children()[0].is_destroyed());
}

#[test]
fn prop_validation_warnings() {
    let (mem, runtime) = runtime();
    let child = ComponentOptions::new()
        .name("strict-child")
        .prop("count", PropOptions::typed(PropType::Num))
        .prop("label", PropOptions::any().required())
        .prop(
            "mode",
            PropOptions::typed(PropType::Str).with_default(|_| Value::from("standard")),
        )
        .render(|vm| Ok(h(vm, "span", None, vec![vm.get("mode").into()]).into()));

    let parent = ComponentOptions::new()
        .component("strict-child", child)
        .render(|vm| {
            // Wrong type for `count`, `label` missing, `mode` defaulted.
            let child = h(
                vm,
                "strict-child",
                Some(VNodeData::new().attr("count", "not-a-number")),
                vec![],
            );
            Ok(h(vm, "div", None, vec![child.into()]).into())
        });

    let app = runtime.mount(parent, root_el(&mem));
    assert_eq!(
        spark_dom::warn::warning_count_containing("type check failed for prop \"count\""),
        1
    );
    assert_eq!(
        spark_dom::warn::warning_count_containing("Missing required prop: \"label\""),
        1
    );
    let child = app.children()[0].clone();
    assert_eq!(child.get("mode").as_str(), Some("standard"));
}

#[test]
fn mutating_prop_directly_warns() {
    let (mem, runtime) = runtime();
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let app = runtime.mount(parent_child_options(&log), root_el(&mem));
    let child = app.children()[0].clone();

    child.set("n", 99.into());
    assert_eq!(
        spark_dom::warn::warning_count_containing("Avoid mutating a prop directly"),
        1
    );
}

#[test]
fn provide_inject_resolution() {
    let (mem, runtime) = runtime();
    let grandchild = ComponentOptions::new()
        .name("leaf")
        .inject_names(["theme"])
        .render(|vm| Ok(h(vm, "em", None, vec![vm.get("theme").into()]).into()));

    let middle = ComponentOptions::new()
        .name("middle")
        .component("leaf", grandchild)
        .render(|vm| Ok(h(vm, "div", None, vec![h(vm, "leaf", None, vec![]).into()]).into()));

    let root = ComponentOptions::new()
        .component("middle", middle)
        .provide(|_| Ok(obj([("theme", "dark".into())])))
        .render(|vm| Ok(h(vm, "main", None, vec![h(vm, "middle", None, vec![]).into()]).into()));

    let app = runtime.mount(root, root_el(&mem));
    let leaf = app.children()[0].children()[0].clone();
    assert_eq!(leaf.get("theme").as_str(), Some("dark"));

    // Injected values are guarded.
    leaf.set("theme", "light".into());
    assert_eq!(
        spark_dom::warn::warning_count_containing("Cannot set undeclared"),
        1
    );
}

#[test]
fn missing_injection_warns_and_default_applies() {
    let (_mem, runtime) = runtime();
    let vm = runtime.create(
        ComponentOptions::new()
            .inject_entry(
                "spacing",
                spark_dom::InjectOptions {
                    from: "spacing".to_string(),
                    default: Some(Rc::new(|| Value::Num(8.0))),
                },
            )
            .inject_entry(
                "missing",
                spark_dom::InjectOptions {
                    from: "missing".to_string(),
                    default: None,
                },
            ),
    );

    assert_eq!(vm.get("spacing").as_num(), Some(8.0));
    assert_eq!(
        spark_dom::warn::warning_count_containing("Injection \"missing\" not found"),
        1
    );
}

#[test]
fn error_captured_claims_child_error() {
    let (mem, runtime) = runtime();
    let captured: Log = Rc::new(RefCell::new(Vec::new()));
    let captured_hook = captured.clone();

    let global_hits = Rc::new(RefCell::new(0usize));
    let global_hits_handler = global_hits.clone();
    spark_dom::set_error_handler(Some(Rc::new(move |_, _| {
        *global_hits_handler.borrow_mut() += 1;
    })));

    let child = ComponentOptions::new()
        .name("broken")
        .hook(HookKind::Created, |_| {
            Err(CoreError::msg("exploded in created"))
        })
        .render(|vm| Ok(h(vm, "span", None, vec![]).into()));

    let parent = ComponentOptions::new()
        .component("broken", child)
        .error_captured(move |_, err, info| {
            captured_hook.borrow_mut().push(format!("{info}: {err}"));
            Ok(false)
        })
        .render(|vm| Ok(h(vm, "div", None, vec![h(vm, "broken", None, vec![]).into()]).into()));

    let _app = runtime.mount(parent, root_el(&mem));
    assert_eq!(
        captured.borrow().as_slice(),
        &["created hook: exploded in created".to_string()]
    );
    assert_eq!(*global_hits.borrow(), 0, "claimed errors stay claimed");

    spark_dom::set_error_handler(None);
}

#[test]
fn leftover_attrs_flow_to_attrs_surface() {
    let (mem, runtime) = runtime();
    let child = ComponentOptions::new()
        .name("titled")
        .prop("n", PropOptions::typed(PropType::Num))
        .render(|vm| {
            let title = vm
                .get("$attrs")
                .as_obj()
                .map(|attrs| attrs.get("title"))
                .unwrap_or(Value::Undefined);
            Ok(h(vm, "span", None, vec![title.into()]).into())
        });

    let parent = ComponentOptions::new()
        .data(|_| Ok(obj([("title", "first".into())])))
        .component("titled", child)
        .render(|vm| {
            let child = h(
                vm,
                "titled",
                Some(
                    VNodeData::new()
                        .attr("n", 1)
                        .attr("title", vm.get("title")),
                ),
                vec![],
            );
            Ok(h(vm, "div", None, vec![child.into()]).into())
        });

    let app = runtime.mount(parent, root_el(&mem));
    let app_root = app.el().unwrap();
    assert_eq!(mem.borrow().text_content(app_root), "first");

    // A parent-driven update rewrites $attrs and the child re-renders.
    app.set("title", "second".into());
    flush_microtasks();
    assert_eq!(mem.borrow().text_content(app_root), "second");
}

#[test]
fn methods_and_collisions() {
    let (_mem, runtime) = runtime();
    let vm = runtime.create(
        ComponentOptions::new()
            .data(|_| Ok(obj([("count", 1.into())])))
            .method("bump", |vm, args| {
                let by = args
                    .first()
                    .and_then(|v| v.as_num())
                    .unwrap_or(1.0);
                let next = vm.get_untracked("count").as_num().unwrap_or(0.0) + by;
                vm.set("count", Value::Num(next));
                Ok(Value::Num(next))
            }),
    );

    let result = vm.call_method("bump", &[Value::Num(4.0)]);
    assert_eq!(result.as_num(), Some(5.0));
    assert_eq!(vm.get_untracked("count").as_num(), Some(5.0));

    vm.call_method("nope", &[]);
    assert_eq!(
        spark_dom::warn::warning_count_containing("\"nope\" is not defined"),
        1
    );
}

#[test]
fn data_must_be_object() {
    let (_mem, runtime) = runtime();
    let vm = runtime.create(ComponentOptions::new().data(|_| Ok(Value::Num(3.0))));
    assert_eq!(
        spark_dom::warn::warning_count_containing("should return an object"),
        1
    );
    // Safe default: an empty object.
    assert!(vm.data_value().as_obj().is_some());
}
