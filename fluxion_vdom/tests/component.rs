mod common;

use common::{TestHost, TestNode};
use fluxion_reactive::{create_signal, ReadSignal};
use fluxion_vdom::*;
use std::{cell::RefCell, rc::Rc};

fn setup() -> (Rc<Renderer<TestHost>>, TestNode) {
    let renderer = create_renderer(TestHost::new());
    let container = renderer.host().container();
    (renderer, container)
}

struct Counter {
    count: ReadSignal<i32>,
    renders: Rc<RefCell<usize>>,
}

impl Component<TestNode> for Counter {
    fn name(&self) -> &str {
        "Counter"
    }

    fn setup(&self, _cx: &SetupContext<TestNode>) -> SetupResult<TestNode> {
        let count = self.count;
        let renders = self.renders.clone();
        SetupResult::render(move || {
            *renders.borrow_mut() += 1;
            VNode::element_text(
                "span",
                props! {},
                format!("count: {}", count.get()),
            )
        })
    }
}

#[test]
fn component_rerenders_when_its_signal_changes() {
    let (renderer, container) = setup();
    let (count, set_count) = create_signal(0);
    let renders = Rc::new(RefCell::new(0));

    renderer.render(
        Some(VNode::component(
            Rc::new(Counter {
                count,
                renders: renders.clone(),
            }),
            props! {},
        )),
        &container,
    );
    assert_eq!(renderer.host().html(&container), "<span>count: 0</span>");
    assert_eq!(*renders.borrow(), 1);

    set_count.set(5);
    assert_eq!(renderer.host().html(&container), "<span>count: 5</span>");
    assert_eq!(*renders.borrow(), 2);

    // an equal write still notifies, a diff with no changes emits nothing
    renderer.host().take_ops();
    set_count.set(5);
    assert!(renderer
        .host()
        .ops()
        .iter()
        .all(|op| !op.starts_with("set_")));
}

struct Greeter;

impl Component<TestNode> for Greeter {
    fn setup(&self, cx: &SetupContext<TestNode>) -> SetupResult<TestNode> {
        let props = cx.props();
        SetupResult::render(move || {
            let name = props.with(|p| {
                p.get("name")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default()
            });
            VNode::element_text("p", props! {}, format!("hello {name}"))
        })
    }
}

#[test]
fn parent_driven_prop_updates_rerender() {
    let (renderer, container) = setup();
    let greeter: Rc<dyn Component<TestNode>> = Rc::new(Greeter);

    renderer.render(
        Some(VNode::component(
            greeter.clone(),
            props! { "name" => "ada" },
        )),
        &container,
    );
    assert_eq!(renderer.host().html(&container), "<p>hello ada</p>");

    renderer.render(
        Some(VNode::component(
            greeter.clone(),
            props! { "name" => "grace" },
        )),
        &container,
    );
    assert_eq!(renderer.host().html(&container), "<p>hello grace</p>");
}

#[test]
fn equal_props_skip_the_re_render() {
    let (renderer, container) = setup();
    let greeter: Rc<dyn Component<TestNode>> = Rc::new(Greeter);

    renderer.render(
        Some(VNode::component(greeter.clone(), props! { "name" => "ada" })),
        &container,
    );
    renderer.host().take_ops();

    renderer.render(
        Some(VNode::component(greeter.clone(), props! { "name" => "ada" })),
        &container,
    );
    // the should-update predicate rejected the update outright
    assert!(renderer.host().ops().is_empty());
}

struct Hooked {
    log: Rc<RefCell<Vec<String>>>,
}

impl Component<TestNode> for Hooked {
    fn setup(&self, cx: &SetupContext<TestNode>) -> SetupResult<TestNode> {
        let log = self.log.clone();
        log.borrow_mut().push("setup".to_string());
        for (name, register) in [
            ("before_mount", HookReg::BeforeMount),
            ("mounted", HookReg::Mounted),
            ("before_update", HookReg::BeforeUpdate),
            ("updated", HookReg::Updated),
            ("before_unmount", HookReg::BeforeUnmount),
            ("unmounted", HookReg::Unmounted),
        ] {
            let log = log.clone();
            let hook = move || log.borrow_mut().push(name.to_string());
            match register {
                HookReg::BeforeMount => cx.on_before_mount(hook),
                HookReg::Mounted => cx.on_mounted(hook),
                HookReg::BeforeUpdate => cx.on_before_update(hook),
                HookReg::Updated => cx.on_updated(hook),
                HookReg::BeforeUnmount => cx.on_before_unmount(hook),
                HookReg::Unmounted => cx.on_unmounted(hook),
            }
        }
        let props = cx.props();
        let log = self.log.clone();
        SetupResult::render(move || {
            log.borrow_mut().push("render".to_string());
            let tick = props.with(|p| {
                p.get("tick").and_then(|v| v.as_str().map(str::to_string))
            });
            VNode::element_text(
                "p",
                props! {},
                tick.unwrap_or_default(),
            )
        })
    }
}

enum HookReg {
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
}

#[test]
fn lifecycle_hooks_fire_in_phase_order() {
    let (renderer, container) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));
    let hooked: Rc<dyn Component<TestNode>> =
        Rc::new(Hooked { log: log.clone() });

    renderer.render(
        Some(VNode::component(hooked.clone(), props! { "tick" => "1" })),
        &container,
    );
    assert_eq!(
        *log.borrow(),
        vec!["setup", "before_mount", "render", "mounted"]
    );

    log.borrow_mut().clear();
    renderer.render(
        Some(VNode::component(hooked.clone(), props! { "tick" => "2" })),
        &container,
    );
    assert_eq!(*log.borrow(), vec!["before_update", "render", "updated"]);

    log.borrow_mut().clear();
    renderer.render(None, &container);
    assert_eq!(*log.borrow(), vec!["before_unmount", "unmounted"]);
}

#[test]
fn unmounted_component_ignores_later_writes() {
    let (renderer, container) = setup();
    let (count, set_count) = create_signal(0);
    let renders = Rc::new(RefCell::new(0));

    let vnode = VNode::component(
        Rc::new(Counter {
            count,
            renders: renders.clone(),
        }),
        props! {},
    );
    renderer.render(Some(vnode.clone()), &container);
    let instance = vnode.instance().unwrap();
    assert!(instance.is_mounted());

    renderer.render(None, &container);
    assert!(instance.is_unmounted());
    assert_eq!(renderer.host().html(&container), "");

    set_count.set(10);
    assert_eq!(*renders.borrow(), 1);
}

struct Panel;

impl Component<TestNode> for Panel {
    fn setup(&self, cx: &SetupContext<TestNode>) -> SetupResult<TestNode> {
        let slots = cx.slots();
        SetupResult::render(move || {
            VNode::element("section", props! {}, slots.get())
        })
    }
}

#[test]
fn slot_content_renders_inside_the_component() {
    let (renderer, container) = setup();
    let panel: Rc<dyn Component<TestNode>> = Rc::new(Panel);

    renderer.render(
        Some(VNode::component_with_slot(
            panel.clone(),
            props! {},
            vec![VNode::element_text("em", props! {}, "inside")],
        )),
        &container,
    );

    assert_eq!(
        renderer.host().html(&container),
        "<section><em>inside</em></section>"
    );

    renderer.render(
        Some(VNode::component_with_slot(
            panel.clone(),
            props! {},
            vec![VNode::element_text("em", props! {}, "replaced")],
        )),
        &container,
    );
    assert_eq!(
        renderer.host().html(&container),
        "<section><em>replaced</em></section>"
    );
}

struct Faulty {
    explode: ReadSignal<bool>,
}

impl Component<TestNode> for Faulty {
    fn setup(&self, _cx: &SetupContext<TestNode>) -> SetupResult<TestNode> {
        let explode = self.explode;
        SetupResult::render(move || {
            if explode.get() {
                panic!("render failed");
            }
            VNode::element_text("p", props! {}, "fine")
        })
    }
}

struct Guardian {
    child: Rc<dyn Component<TestNode>>,
    captured: Rc<RefCell<Vec<String>>>,
}

impl Component<TestNode> for Guardian {
    fn setup(&self, cx: &SetupContext<TestNode>) -> SetupResult<TestNode> {
        let captured = self.captured.clone();
        cx.on_error_captured(move |phase, message| {
            captured.borrow_mut().push(format!("{phase}: {message}"));
            true
        });
        let child = self.child.clone();
        SetupResult::render(move || {
            VNode::element(
                "div",
                props! {},
                vec![VNode::component(child.clone(), props! {})],
            )
        })
    }
}

#[test]
fn render_errors_propagate_to_error_captured_hooks() {
    let (renderer, container) = setup();
    let (explode, set_explode) = create_signal(false);
    let captured = Rc::new(RefCell::new(Vec::new()));

    renderer.render(
        Some(VNode::component(
            Rc::new(Guardian {
                child: Rc::new(Faulty { explode }),
                captured: captured.clone(),
            }),
            props! {},
        )),
        &container,
    );
    assert_eq!(
        renderer.host().html(&container),
        "<div><p>fine</p></div>"
    );

    set_explode.set(true);
    assert_eq!(
        *captured.borrow(),
        vec!["render function: render failed"]
    );
    // the faulty subtree degraded to a placeholder; the app survived
    assert_eq!(
        renderer.host().html(&container),
        "<div><!--render error--></div>"
    );
}

struct Sibling {
    label: &'static str,
    tick: ReadSignal<i32>,
    order: Rc<RefCell<Vec<&'static str>>>,
}

impl Component<TestNode> for Sibling {
    fn setup(&self, _cx: &SetupContext<TestNode>) -> SetupResult<TestNode> {
        let label = self.label;
        let tick = self.tick;
        let order = self.order.clone();
        SetupResult::render(move || {
            order.borrow_mut().push(label);
            VNode::element_text(
                "i",
                props! {},
                format!("{label}{}", tick.get()),
            )
        })
    }
}

#[test]
fn sibling_components_update_in_creation_order() {
    let (renderer, container) = setup();
    let (tick, set_tick) = create_signal(0);
    let order = Rc::new(RefCell::new(Vec::new()));

    renderer.render(
        Some(VNode::fragment(vec![
            VNode::component(
                Rc::new(Sibling {
                    label: "first",
                    tick,
                    order: order.clone(),
                }),
                props! {},
            ),
            VNode::component(
                Rc::new(Sibling {
                    label: "second",
                    tick,
                    order: order.clone(),
                }),
                props! {},
            ),
        ])),
        &container,
    );
    order.borrow_mut().clear();

    set_tick.set(1);
    assert_eq!(*order.borrow(), vec!["first", "second"]);
    assert_eq!(
        renderer.host().html(&container),
        "<i>first1</i><i>second1</i>"
    );
}

struct QueuesDuringRender {
    renderer: Rc<Renderer<TestHost>>,
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl Component<TestNode> for QueuesDuringRender {
    fn setup(&self, _cx: &SetupContext<TestNode>) -> SetupResult<TestNode> {
        let renderer = self.renderer.clone();
        let log = self.log.clone();
        SetupResult::render(move || {
            log.borrow_mut().push("render");
            renderer.queue_post_flush({
                let log = log.clone();
                move || log.borrow_mut().push("post")
            });
            renderer.queue_pre_flush({
                let log = log.clone();
                move || log.borrow_mut().push("pre")
            });
            VNode::text("x")
        })
    }
}

#[test]
fn flush_phases_drain_in_pre_render_post_order() {
    let (renderer, container) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));

    renderer.render(
        Some(VNode::component(
            Rc::new(QueuesDuringRender {
                renderer: renderer.clone(),
                log: log.clone(),
            }),
            props! {},
        )),
        &container,
    );

    // queued in post-then-pre order during render, delivered pre first
    assert_eq!(*log.borrow(), vec!["render", "pre", "post"]);
}

#[test]
fn post_flush_callbacks_run_after_patching() {
    let (renderer, container) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));

    renderer.queue_post_flush({
        let log = log.clone();
        move || log.borrow_mut().push("post")
    });
    // queued outside a render: delivered immediately
    assert_eq!(*log.borrow(), vec!["post"]);
}
