//! Patch engine behavior against the in-memory backend: tree isomorphism,
//! idempotence, keyed reconciliation, replacement, and hook wiring.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_dom::{
    arr, flush_microtasks, force_update, h, obj, ComponentOptions, HookKind, MemoryBackend,
    NodeId, PropOptions, PropType, RawChild, Runtime, SharedBackend, VNodeData, VNodeHooks,
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

fn keyed_list_options() -> ComponentOptions {
    ComponentOptions::new()
        .data(|_| {
            Ok(obj([(
                "keys",
                arr(["A".into(), "B".into(), "C".into(), "D".into()]),
            )]))
        })
        .render(|vm| {
            let keys = vm.get("keys");
            let items: Vec<RawChild> = keys
                .as_arr()
                .map(|a| a.to_vec())
                .unwrap_or_default()
                .into_iter()
                .map(|key| {
                    let label = key.to_display_string();
                    RawChild::Node(h(
                        vm,
                        "li",
                        Some(VNodeData::new().key(label.as_str())),
                        vec![RawChild::Text(label.clone())],
                    ))
                })
                .collect();
            Ok(h(vm, "ul", None, items).into())
        })
}

#[test]
fn mount_builds_isomorphic_tree() {
    let (mem, runtime) = runtime();
    let options = ComponentOptions::new()
        .data(|_| Ok(obj([("title", "hello".into())])))
        .render(|vm| {
            let heading = h(
                vm,
                "h1",
                Some(VNodeData::new().attr("id", "top")),
                vec![vm.get("title").into()],
            );
            let body = h(vm, "p", None, vec!["body text".into()]);
            Ok(h(vm, "section", None, vec![heading.into(), body.into()]).into())
        });

    let app = runtime.mount(options, root_el(&mem));
    assert_eq!(
        mem.borrow().to_html(app.el().unwrap()),
        "<section><h1 id=\"top\">hello</h1><p>body text</p></section>"
    );
}

#[test]
fn patch_same_tree_is_noop() {
    let (mem, runtime) = runtime();
    let app = runtime.mount(keyed_list_options(), root_el(&mem));
    let before = mem.borrow().to_html(app.el().unwrap());

    mem.borrow_mut().reset_counters();
    force_update(&app);
    flush_microtasks();

    assert_eq!(mem.borrow().to_html(app.el().unwrap()), before);
    assert_eq!(mem.borrow().create_count, 0);
    assert_eq!(mem.borrow().move_count, 0);
    assert_eq!(mem.borrow().remove_count, 0);
}

#[test]
fn keyed_reorder_preserves_identity_with_one_move() {
    let (mem, runtime) = runtime();
    let app = runtime.mount(keyed_list_options(), root_el(&mem));
    let ul = app.el().unwrap();
    let before: Vec<NodeId> = mem.borrow().children_of(ul);
    assert_eq!(before.len(), 4);
    let label_of = |id: NodeId| mem.borrow().text_content(id);
    assert_eq!(label_of(before[0]), "A");

    mem.borrow_mut().reset_counters();
    app.set("keys", arr(["D".into(), "A".into(), "B".into(), "C".into()]));
    flush_microtasks();

    let after: Vec<NodeId> = mem.borrow().children_of(ul);
    let labels: Vec<String> = after.iter().map(|id| label_of(*id)).collect();
    assert_eq!(labels, vec!["D", "A", "B", "C"]);

    // All four element identities preserved, exactly one move, nothing
    // recreated.
    assert_eq!(after[0], before[3]);
    assert_eq!(after[1], before[0]);
    assert_eq!(after[2], before[1]);
    assert_eq!(after[3], before[2]);
    assert_eq!(mem.borrow().move_count, 1);
    assert_eq!(mem.borrow().create_count, 0);
    assert_eq!(mem.borrow().remove_count, 0);
}

#[test]
fn text_updates_in_place() {
    let (mem, runtime) = runtime();
    let options = ComponentOptions::new()
        .data(|_| Ok(obj([("msg", "one".into())])))
        .render(|vm| Ok(h(vm, "p", None, vec![vm.get("msg").into()]).into()));

    let app = runtime.mount(options, root_el(&mem));
    let p = app.el().unwrap();
    assert_eq!(mem.borrow().text_content(p), "one");

    app.set("msg", "two".into());
    flush_microtasks();
    assert_eq!(mem.borrow().text_content(p), "two");
    assert_eq!(app.el().unwrap(), p, "the element itself is reused");
}

#[test]
fn children_grow_and_shrink() {
    let (mem, runtime) = runtime();
    let app = runtime.mount(keyed_list_options(), root_el(&mem));
    let ul = app.el().unwrap();

    app.set("keys", arr(["A".into(), "B".into()]));
    flush_microtasks();
    assert_eq!(mem.borrow().children_of(ul).len(), 2);

    app.set(
        "keys",
        arr(["A".into(), "B".into(), "E".into(), "F".into(), "G".into()]),
    );
    flush_microtasks();
    let labels: Vec<String> = mem
        .borrow()
        .children_of(ul)
        .into_iter()
        .map(|id| mem.borrow().text_content(id))
        .collect();
    assert_eq!(labels, vec!["A", "B", "E", "F", "G"]);
}

#[test]
fn tag_change_replaces_element() {
    let (mem, runtime) = runtime();
    let options = ComponentOptions::new()
        .data(|_| Ok(obj([("fancy", false.into())])))
        .render(|vm| {
            let tag = if vm.get("fancy").as_bool() == Some(true) {
                "strong"
            } else {
                "span"
            };
            Ok(h(vm, tag, None, vec!["content".into()]).into())
        });

    let app = runtime.mount(options, root_el(&mem));
    let span = app.el().unwrap();
    assert_eq!(mem.borrow().tag_of(span), Some("span"));

    app.set("fancy", true.into());
    flush_microtasks();
    let strong = app.el().unwrap();
    assert_ne!(strong, span);
    assert_eq!(mem.borrow().tag_of(strong), Some("strong"));
    assert_eq!(mem.borrow().text_content(strong), "content");
}

#[test]
fn input_type_change_replaces_element() {
    let (mem, runtime) = runtime();
    let options = ComponentOptions::new()
        .data(|_| Ok(obj([("kind", "text".into())])))
        .render(|vm| {
            Ok(h(
                vm,
                "input",
                Some(VNodeData::new().attr("type", vm.get("kind"))),
                vec![],
            )
            .into())
        });

    let app = runtime.mount(options, root_el(&mem));
    let first = app.el().unwrap();

    app.set("kind", "checkbox".into());
    flush_microtasks();
    let second = app.el().unwrap();
    assert_ne!(first, second);
    assert_eq!(mem.borrow().attr(second, "type"), Some("checkbox".to_string()));
}

#[test]
fn component_toggled_out_is_destroyed_and_removed() {
    let (mem, runtime) = runtime();
    let destroyed = Rc::new(Cell::new(false));
    let destroyed_hook = destroyed.clone();

    let child = ComponentOptions::new()
        .name("widget")
        .hook(HookKind::Destroyed, move |_| {
            destroyed_hook.set(true);
            Ok(())
        })
        .render(|vm| Ok(h(vm, "span", None, vec!["widget".into()]).into()));

    let parent = ComponentOptions::new()
        .data(|_| Ok(obj([("show", true.into())])))
        .component("widget", child)
        .render(|vm| {
            let inner: RawChild = if vm.get("show").as_bool() == Some(true) {
                h(vm, "widget", None, vec![]).into()
            } else {
                h(vm, "p", None, vec!["empty".into()]).into()
            };
            Ok(h(vm, "div", None, vec![inner]).into())
        });

    let app = runtime.mount(parent, root_el(&mem));
    let root = app.el().unwrap();
    assert_eq!(mem.borrow().text_content(root), "widget");
    assert_eq!(app.children().len(), 1);

    app.set("show", false.into());
    flush_microtasks();
    assert!(destroyed.get());
    assert_eq!(mem.borrow().text_content(root), "empty");
    assert!(app.children().is_empty());
}

#[test]
fn component_updates_through_props() {
    let (mem, runtime) = runtime();
    let child = ComponentOptions::new()
        .name("counter")
        .prop("value", PropOptions::typed(PropType::Num))
        .render(|vm| Ok(h(vm, "b", None, vec![vm.get("value").into()]).into()));

    let parent = ComponentOptions::new()
        .data(|_| Ok(obj([("count", 1.into())])))
        .component("counter", child)
        .render(|vm| {
            let child = h(
                vm,
                "counter",
                Some(VNodeData::new().attr("value", vm.get("count"))),
                vec![],
            );
            Ok(h(vm, "div", None, vec![child.into()]).into())
        });

    let app = runtime.mount(parent, root_el(&mem));
    let root = app.el().unwrap();
    assert_eq!(mem.borrow().text_content(root), "1");

    // Same child instance across updates.
    let child_before = app.children()[0].clone();
    app.set("count", 2.into());
    flush_microtasks();
    assert_eq!(mem.borrow().text_content(root), "2");
    let child_after = app.children()[0].clone();
    assert_eq!(child_before.uid, child_after.uid);
}

#[test]
fn async_placeholder_swap_is_full_replace() {
    let (mem, runtime) = runtime();
    let options = ComponentOptions::new()
        .data(|_| Ok(obj([("ready", false.into())])))
        .render(|vm| {
            if vm.get("ready").as_bool() == Some(true) {
                Ok(h(vm, "article", None, vec!["loaded".into()]).into())
            } else {
                Ok(spark_dom::vdom::create_async_placeholder("loading").into())
            }
        });

    let app = runtime.mount(options, root_el(&mem));
    let placeholder = app.el().unwrap();
    assert!(mem.borrow().is_comment(placeholder));

    app.set("ready", true.into());
    flush_microtasks();
    let resolved = app.el().unwrap();
    assert_ne!(resolved, placeholder);
    assert_eq!(mem.borrow().tag_of(resolved), Some("article"));
}

#[test]
fn attrs_update_through_module() {
    let (mem, runtime) = runtime();
    let options = ComponentOptions::new()
        .data(|_| Ok(obj([("active", true.into()), ("label", "go".into())])))
        .render(|vm| {
            Ok(h(
                vm,
                "button",
                Some(
                    VNodeData::new()
                        .attr("disabled", vm.get("active"))
                        .attr("title", vm.get("label")),
                ),
                vec![],
            )
            .into())
        });

    let app = runtime.mount(options, root_el(&mem));
    let button = app.el().unwrap();
    assert_eq!(mem.borrow().attr(button, "disabled"), Some(String::new()));
    assert_eq!(mem.borrow().attr(button, "title"), Some("go".to_string()));

    app.set("active", false.into());
    app.set("label", "stop".into());
    flush_microtasks();
    assert_eq!(mem.borrow().attr(button, "disabled"), None);
    assert_eq!(mem.borrow().attr(button, "title"), Some("stop".to_string()));
}

#[test]
fn duplicate_keys_warn_but_render() {
    let (mem, runtime) = runtime();
    let options = ComponentOptions::new().render(|vm| {
        let a = h(vm, "li", Some(VNodeData::new().key("dup")), vec!["a".into()]);
        let b = h(vm, "li", Some(VNodeData::new().key("dup")), vec!["b".into()]);
        Ok(h(vm, "ul", None, vec![a.into(), b.into()]).into())
    });

    let app = runtime.mount(options, root_el(&mem));
    assert!(spark_dom::warn::warning_count_containing("Duplicate keys") >= 1);
    assert_eq!(mem.borrow().children_of(app.el().unwrap()).len(), 2);
}

#[test]
fn user_vnode_hooks_fire() {
    let (mem, runtime) = runtime();
    let inserted = Rc::new(Cell::new(0usize));
    let destroyed = Rc::new(Cell::new(0usize));
    let inserted_hook = inserted.clone();
    let destroyed_hook = destroyed.clone();

    let options = ComponentOptions::new()
        .data(|_| Ok(obj([("show", true.into())])))
        .render(move |vm| {
            let inserted_hook = inserted_hook.clone();
            let destroyed_hook = destroyed_hook.clone();
            let inner: RawChild = if vm.get("show").as_bool() == Some(true) {
                h(
                    vm,
                    "span",
                    Some(VNodeData::new().hooks(VNodeHooks {
                        insert: Some(Rc::new(move |_| {
                            inserted_hook.set(inserted_hook.get() + 1);
                        })),
                        destroy: Some(Rc::new(move |_| {
                            destroyed_hook.set(destroyed_hook.get() + 1);
                        })),
                        ..Default::default()
                    })),
                    vec!["x".into()],
                )
                .into()
            } else {
                RawChild::Text("gone".to_string())
            };
            Ok(h(vm, "div", None, vec![inner]).into())
        });

    let app = runtime.mount(options, root_el(&mem));
    assert_eq!(inserted.get(), 1);
    assert_eq!(destroyed.get(), 0);

    app.set("show", false.into());
    flush_microtasks();
    assert_eq!(destroyed.get(), 1);
}

#[test]
fn svg_children_get_namespace() {
    let (mem, runtime) = runtime();
    let options = ComponentOptions::new().render(|vm| {
        let circle = h(vm, "circle", Some(VNodeData::new().attr("r", 5)), vec![]);
        Ok(h(vm, "svg", None, vec![circle.into()]).into())
    });

    let app = runtime.mount(options, root_el(&mem));
    let svg = app.el().unwrap();
    assert_eq!(mem.borrow().tag_of(svg), Some("svg"));
    let children = mem.borrow().children_of(svg);
    assert_eq!(mem.borrow().tag_of(children[0]), Some("circle"));
}
