use crate::{
    errors::ErrorPhase,
    node::{Children, ShapeFlags, VNode},
    props::{PropValue, Props},
};
use fluxion_reactive::{create_rw_signal, Effect, RwSignal, Scope};
use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

/// A component definition: `setup` runs once per instance and returns the
/// render closure its render effect will re-invoke on every update.
pub trait Component<N: 'static>: 'static {
    fn name(&self) -> &str {
        "Anonymous"
    }

    fn setup(&self, cx: &SetupContext<N>) -> SetupResult<N>;

    /// Decides whether a parent-driven update needs a re-render. The
    /// default is a shallow prop diff plus slot presence.
    fn should_update(
        &self,
        prev_props: &Props,
        next_props: &Props,
        slots_changed: bool,
    ) -> bool {
        slots_changed || prev_props != next_props
    }
}

pub type RenderFn<N> = Rc<dyn Fn() -> VNode<N>>;

pub enum SetupResult<N: 'static> {
    Render(RenderFn<N>),
    /// A cooperative async dependency. The component's effect is not
    /// scheduled until the dep resolves through an owning suspense
    /// boundary; without one, the component stays a placeholder.
    Pending(Rc<dyn AsyncDep<N>>),
}

impl<N> SetupResult<N> {
    /// Wraps a plain render closure.
    pub fn render(f: impl Fn() -> VNode<N> + 'static) -> Self {
        SetupResult::Render(Rc::new(f))
    }
}

/// The interface an async setup exposes to its suspense boundary. The
/// core only registers the dep; resolution policy lives in the boundary.
pub trait AsyncDep<N: 'static> {
    /// Installs the continuation to run (with the real render closure)
    /// when the dependency settles.
    fn subscribe(&self, on_ready: Box<dyn FnOnce(RenderFn<N>)>);
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookKind {
    BeforeMount = 0,
    Mounted = 1,
    BeforeUpdate = 2,
    Updated = 3,
    BeforeUnmount = 4,
    Unmounted = 5,
    Activated = 6,
    Deactivated = 7,
}

#[derive(Default)]
pub(crate) struct HookQueues {
    queues: RefCell<[Vec<Rc<dyn Fn()>>; 8]>,
}

impl HookQueues {
    fn push(&self, kind: HookKind, hook: Rc<dyn Fn()>) {
        self.queues.borrow_mut()[kind as usize].push(hook);
    }

    pub fn get(&self, kind: HookKind) -> Vec<Rc<dyn Fn()>> {
        self.queues.borrow()[kind as usize].clone()
    }

    pub fn is_empty(&self, kind: HookKind) -> bool {
        self.queues.borrow()[kind as usize].is_empty()
    }
}

/// Per-mount state of a component: the effect driving its render, the
/// last rendered subtree, the pending parent-supplied node, reactive
/// props and slots, lifecycle hook queues, and its own scope.
pub struct ComponentInstance<N: 'static> {
    pub(crate) uid: u64,
    pub(crate) definition: Rc<dyn Component<N>>,
    pub(crate) props: RwSignal<Props>,
    pub(crate) slots: RwSignal<Vec<VNode<N>>>,
    pub(crate) scope: Scope,
    pub(crate) render_fn: RefCell<Option<RenderFn<N>>>,
    /// The component vnode currently representing this instance in its
    /// parent's tree.
    pub(crate) vnode: RefCell<Option<VNode<N>>>,
    pub(crate) subtree: RefCell<Option<VNode<N>>>,
    /// The incoming vnode when the parent wants this instance updated;
    /// picked up at the start of the next render.
    pub(crate) next: RefCell<Option<VNode<N>>>,
    pub(crate) render_effect: Cell<Option<Effect>>,
    /// Re-runs the render effect synchronously; installed by the
    /// renderer when the effect is set up.
    pub(crate) update: RefCell<Option<Rc<dyn Fn()>>>,
    pub(crate) parent: RefCell<Weak<ComponentInstance<N>>>,
    pub(crate) hooks: HookQueues,
    pub(crate) error_captured:
        RefCell<Vec<Rc<dyn Fn(ErrorPhase, &str) -> bool>>>,
    pub(crate) is_mounted: Cell<bool>,
    pub(crate) is_unmounted: Cell<bool>,
    pub(crate) async_dep: RefCell<Option<Rc<dyn AsyncDep<N>>>>,
    pub(crate) async_resolved: Cell<bool>,
}

impl<N> ComponentInstance<N> {
    pub(crate) fn new(
        uid: u64,
        definition: Rc<dyn Component<N>>,
        vnode: &VNode<N>,
        parent: Option<&Rc<ComponentInstance<N>>>,
    ) -> Rc<Self> {
        Rc::new(ComponentInstance {
            uid,
            definition,
            props: create_rw_signal(vnode.props().clone()),
            slots: create_rw_signal(slot_children(vnode)),
            scope: Scope::detached(),
            render_fn: RefCell::new(None),
            vnode: RefCell::new(None),
            subtree: RefCell::new(None),
            next: RefCell::new(None),
            render_effect: Cell::new(None),
            update: RefCell::new(None),
            parent: RefCell::new(
                parent.map(Rc::downgrade).unwrap_or_default(),
            ),
            hooks: HookQueues::default(),
            error_captured: RefCell::new(Vec::new()),
            is_mounted: Cell::new(false),
            is_unmounted: Cell::new(false),
            async_dep: RefCell::new(None),
            async_resolved: Cell::new(false),
        })
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn is_mounted(&self) -> bool {
        self.is_mounted.get()
    }

    pub fn is_unmounted(&self) -> bool {
        self.is_unmounted.get()
    }

    /// Absorbs the parent-supplied vnode: new props and slots become
    /// visible to the next render.
    pub(crate) fn update_from_vnode(&self, vnode: &VNode<N>) {
        self.props.set(vnode.props().clone());
        if vnode.shape().contains(ShapeFlags::SLOT_CHILDREN) {
            self.slots.set(slot_children(vnode));
        }
    }

    pub(crate) fn invoke_hooks(&self, kind: HookKind) {
        for hook in self.hooks.get(kind) {
            hook();
        }
    }

    pub(crate) fn parent(&self) -> Option<Rc<ComponentInstance<N>>> {
        self.parent.borrow().upgrade()
    }
}

fn slot_children<N>(vnode: &VNode<N>) -> Vec<VNode<N>> {
    match vnode.children() {
        Children::Nodes(nodes) => nodes.clone(),
        _ => Vec::new(),
    }
}

/// Handed to [`Component::setup`]: reactive access to props and slots,
/// plus lifecycle hook registration for this instance.
pub struct SetupContext<N: 'static> {
    pub(crate) instance: Rc<ComponentInstance<N>>,
}

impl<N> SetupContext<N> {
    /// The instance's reactive props; reading them inside the render
    /// closure subscribes it to parent-driven updates.
    pub fn props(&self) -> RwSignal<Props> {
        self.instance.props
    }

    /// One prop, tracked.
    pub fn prop(&self, key: &str) -> Option<PropValue> {
        self.instance.props.with(|props| props.get(key).cloned())
    }

    /// The instance's reactive default-slot content; like
    /// [`props`](SetupContext::props), the handle is `Copy` and can move
    /// into the render closure.
    pub fn slots(&self) -> RwSignal<Vec<VNode<N>>> {
        self.instance.slots
    }

    /// The default slot content, tracked.
    pub fn slot(&self) -> Vec<VNode<N>> {
        self.instance.slots.get()
    }

    pub fn on_before_mount(&self, f: impl Fn() + 'static) {
        self.instance.hooks.push(HookKind::BeforeMount, Rc::new(f));
    }

    pub fn on_mounted(&self, f: impl Fn() + 'static) {
        self.instance.hooks.push(HookKind::Mounted, Rc::new(f));
    }

    pub fn on_before_update(&self, f: impl Fn() + 'static) {
        self.instance.hooks.push(HookKind::BeforeUpdate, Rc::new(f));
    }

    pub fn on_updated(&self, f: impl Fn() + 'static) {
        self.instance.hooks.push(HookKind::Updated, Rc::new(f));
    }

    pub fn on_before_unmount(&self, f: impl Fn() + 'static) {
        self.instance.hooks.push(HookKind::BeforeUnmount, Rc::new(f));
    }

    pub fn on_unmounted(&self, f: impl Fn() + 'static) {
        self.instance.hooks.push(HookKind::Unmounted, Rc::new(f));
    }

    pub fn on_activated(&self, f: impl Fn() + 'static) {
        self.instance.hooks.push(HookKind::Activated, Rc::new(f));
    }

    pub fn on_deactivated(&self, f: impl Fn() + 'static) {
        self.instance.hooks.push(HookKind::Deactivated, Rc::new(f));
    }

    /// Claims errors rising from this instance's subtree. Return `true`
    /// to stop propagation toward the root.
    pub fn on_error_captured(
        &self,
        f: impl Fn(ErrorPhase, &str) -> bool + 'static,
    ) {
        self.instance.error_captured.borrow_mut().push(Rc::new(f));
    }
}
