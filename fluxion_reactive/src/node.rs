use std::{any::Any, cell::RefCell, rc::Rc};

slotmap::new_key_type! {
    /// Unique ID assigned to a dep (one observable cell).
    pub struct DepId;

    /// Unique ID assigned to a subscriber (effect or derived value).
    pub struct SubscriberId;

    /// Unique ID assigned to a link (one dep ↔ subscriber edge).
    pub struct LinkId;

    /// Unique ID assigned to an observed-collection cell.
    pub struct CellId;
}

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub(crate) struct SubscriberFlags: u8 {
        const ACTIVE = 1 << 0;
        const RUNNING = 1 << 1;
        const TRACKING = 1 << 2;
        const NOTIFIED = 1 << 3;
        const DIRTY = 1 << 4;
        const ALLOW_RECURSE = 1 << 5;
        const PAUSED = 1 << 6;
        const EVALUATED = 1 << 7;
    }
}

/// One observable cell. Signals store their value here; triggers and the
/// output deps of derived values carry no value of their own.
pub(crate) struct Dep {
    /// Bumped on every change; subscribers compare their link's snapshot
    /// against this to decide staleness.
    pub version: u64,
    pub subs_head: Option<LinkId>,
    pub subs_tail: Option<LinkId>,
    pub sub_count: usize,
    /// The derived value whose output this dep is, if any. Used to refresh
    /// the derived value on demand and to ignore self-reads.
    pub owner: Option<SubscriberId>,
    /// Deps owned by a collection's key→dep table are disposed as soon as
    /// their subscriber count reaches zero.
    pub map_owned: bool,
    /// Cache of the link belonging to the currently-running subscriber.
    /// Maintained by the prepare/cleanup sweeps around each run.
    pub active_link: Option<LinkId>,
    pub value: Option<Rc<RefCell<dyn Any>>>,
}

impl Dep {
    pub fn value(&self) -> Rc<RefCell<dyn Any>> {
        self.value.clone().expect("Dep.value to have a value")
    }
}

/// The edge between one dep and one subscriber: a node in two doubly-linked
/// lists at once (the subscriber's dep list and the dep's subscriber list).
pub(crate) struct Link {
    pub dep: DepId,
    pub sub: SubscriberId,
    /// The dep's version the last time this link was used. `None` marks
    /// "not used during the current run"; links still `None` after a run
    /// are reclaimed by the cleanup sweep.
    pub version: Option<u64>,
    pub prev_dep: Option<LinkId>,
    pub next_dep: Option<LinkId>,
    pub prev_sub: Option<LinkId>,
    pub next_sub: Option<LinkId>,
    /// The dep's previous `active_link`, saved during the prepare sweep and
    /// restored by the cleanup sweep, so nested runs see their own links.
    pub prev_active: Option<LinkId>,
}

/// Anything that tracks deps and can be notified: a plain effect or a
/// derived value.
pub(crate) struct SubscriberNode {
    pub flags: SubscriberFlags,
    pub deps_head: Option<LinkId>,
    pub deps_tail: Option<LinkId>,
    /// Intrusive pointer for the batch queues.
    pub next_batched: Option<SubscriberId>,
    pub kind: SubscriberKind,
}

pub(crate) enum SubscriberKind {
    Effect(EffectState),
    Derived(DerivedState),
}

pub(crate) struct EffectState {
    pub f: Rc<dyn AnyComputation>,
    pub value: Rc<RefCell<dyn Any>>,
    /// Custom delivery hook; when set, notifications call this instead of
    /// re-running directly.
    pub scheduler: Option<Rc<dyn Fn()>>,
    /// Per-run cleanup registered by the user during the previous run.
    pub cleanup: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
    pub on_stop: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

pub(crate) struct DerivedState {
    pub f: Rc<dyn AnyComputation>,
    pub value: Rc<RefCell<dyn Any>>,
    /// The dep this derived value publishes through.
    pub dep: DepId,
    /// Snapshot of the process-wide version at the last refresh; if nothing
    /// anywhere has changed since, reads bypass revalidation entirely.
    pub global_version: u64,
    /// Optional setter for writable derived values. The boxed argument is
    /// the new value, type-erased.
    pub setter: Option<Rc<dyn Fn(Box<dyn Any>)>>,
}

impl SubscriberNode {
    pub fn effect_state(&self) -> &EffectState {
        match &self.kind {
            SubscriberKind::Effect(state) => state,
            SubscriberKind::Derived(_) => {
                panic!("subscriber to be an effect")
            }
        }
    }
}

/// Type-erased body of an effect or derived value. `run` is handed the
/// subscriber's value slot and reports whether the stored value changed.
pub(crate) trait AnyComputation {
    fn run(&self, value: Rc<RefCell<dyn Any>>) -> bool;
}
