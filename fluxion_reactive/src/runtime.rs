use crate::{
    node::{
        AnyComputation, CellId, Dep, DepId, DerivedState, EffectState, Link,
        LinkId, SubscriberFlags, SubscriberId, SubscriberKind, SubscriberNode,
    },
    scope::{ScopeId, ScopeNode, ScopeProperty},
};
use core::hash::BuildHasherDefault;
use indexmap::IndexSet;
use rustc_hash::FxHasher;
use slotmap::SlotMap;
use std::{
    any::Any,
    cell::{Cell, RefCell},
    panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
    rc::Rc,
};

pub(crate) type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

/// An observed collection's backing storage plus the deps its key→dep
/// table has handed out.
pub(crate) struct CellEntry {
    pub value: Rc<RefCell<dyn Any>>,
    pub owned_deps: Vec<DepId>,
}

thread_local! {
    pub(crate) static RUNTIME: Runtime = Runtime::new();
}

/// Runs a closure against the reactive runtime for the current thread.
///
/// There is exactly one reactive world per thread (the engine is
/// single-threaded and cooperative); all shared state lives here.
#[inline(always)]
pub(crate) fn with_runtime<T>(f: impl FnOnce(&Runtime) -> T) -> T {
    RUNTIME.with(f)
}

// The data structure that owns every dep, link, subscriber, scope, and
// observed cell in the reactive system, plus the cursor state that the
// track/trigger protocol threads through it.
#[derive(Default)]
pub(crate) struct Runtime {
    pub deps: RefCell<SlotMap<DepId, Dep>>,
    pub subscribers: RefCell<SlotMap<SubscriberId, SubscriberNode>>,
    pub links: RefCell<SlotMap<LinkId, Link>>,
    pub scopes: RefCell<SlotMap<ScopeId, ScopeNode>>,
    pub cells: RefCell<SlotMap<CellId, CellEntry>>,
    /// The currently-running subscriber, if any. Reads of reactive data
    /// subscribe this to the dep they touch.
    pub observer: Cell<Option<SubscriberId>>,
    /// Cleared while tracking is globally paused.
    pub tracking: Cell<bool>,
    pub active_scope: Cell<Option<ScopeId>>,
    /// Bumped on every trigger anywhere; lets derived values skip
    /// revalidation entirely when nothing in the world has changed.
    pub global_version: Cell<u64>,
    pub batch_depth: Cell<u32>,
    /// Intrusive batch queues, threaded through `SubscriberNode.next_batched`.
    /// Notification prepends, so by the reverse-walk rule in `notify_dep`
    /// the queues drain in subscription order.
    pub batched_effects: Cell<Option<SubscriberId>>,
    pub batched_derived: Cell<Option<SubscriberId>>,
    /// Effects whose trigger arrived while they were paused; replayed in
    /// first-arrival order on resume. An effect appears at most once.
    pub paused_effects: RefCell<FxIndexSet<SubscriberId>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            tracking: Cell::new(true),
            ..Default::default()
        }
    }
}

// Node creation and disposal.
impl Runtime {
    pub(crate) fn create_value_dep(
        &self,
        value: Option<Rc<RefCell<dyn Any>>>,
    ) -> DepId {
        let id = self.deps.borrow_mut().insert(Dep {
            version: 0,
            subs_head: None,
            subs_tail: None,
            sub_count: 0,
            owner: None,
            map_owned: false,
            active_link: None,
            value,
        });
        self.register_scope_property(ScopeProperty::Dep(id));
        id
    }

    /// Creates a dep owned by a collection's key→dep table. Map-owned deps
    /// are not scope properties; they are reclaimed as soon as their last
    /// subscriber unlinks, or when the owning cell is disposed.
    pub(crate) fn create_map_dep(&self) -> DepId {
        self.deps.borrow_mut().insert(Dep {
            version: 0,
            subs_head: None,
            subs_tail: None,
            sub_count: 0,
            owner: None,
            map_owned: true,
            active_link: None,
            value: None,
        })
    }

    pub(crate) fn create_effect_node(
        &self,
        f: Rc<dyn AnyComputation>,
        value: Rc<RefCell<dyn Any>>,
        scheduler: Option<Rc<dyn Fn()>>,
    ) -> SubscriberId {
        let mut flags = SubscriberFlags::ACTIVE | SubscriberFlags::TRACKING;
        if self.active_scope_paused() {
            flags.insert(SubscriberFlags::PAUSED);
        }
        let id = self.subscribers.borrow_mut().insert(SubscriberNode {
            flags,
            deps_head: None,
            deps_tail: None,
            next_batched: None,
            kind: SubscriberKind::Effect(EffectState {
                f,
                value,
                scheduler,
                cleanup: Rc::new(RefCell::new(None)),
                on_stop: Rc::new(RefCell::new(None)),
            }),
        });
        self.register_scope_property(ScopeProperty::Subscriber(id));
        id
    }

    pub(crate) fn create_derived_node(
        &self,
        f: Rc<dyn AnyComputation>,
        value: Rc<RefCell<dyn Any>>,
        setter: Option<Rc<dyn Fn(Box<dyn Any>)>>,
    ) -> (SubscriberId, DepId) {
        let dep_id = self.deps.borrow_mut().insert(Dep {
            version: 0,
            subs_head: None,
            subs_tail: None,
            sub_count: 0,
            owner: None,
            map_owned: false,
            active_link: None,
            value: None,
        });
        let sub_id = self.subscribers.borrow_mut().insert(SubscriberNode {
            // derived values are lazy: dirty from birth, evaluated on the
            // first read by a consumer
            flags: SubscriberFlags::ACTIVE
                | SubscriberFlags::TRACKING
                | SubscriberFlags::DIRTY,
            deps_head: None,
            deps_tail: None,
            next_batched: None,
            kind: SubscriberKind::Derived(DerivedState {
                f,
                value,
                dep: dep_id,
                global_version: u64::MAX,
                setter,
            }),
        });
        self.deps.borrow_mut()[dep_id].owner = Some(sub_id);
        self.register_scope_property(ScopeProperty::Subscriber(sub_id));
        (sub_id, dep_id)
    }

    pub(crate) fn create_cell(&self, value: Rc<RefCell<dyn Any>>) -> CellId {
        let id = self.cells.borrow_mut().insert(CellEntry {
            value,
            owned_deps: Vec::new(),
        });
        self.register_scope_property(ScopeProperty::Cell(id));
        id
    }

    pub(crate) fn cell_value(
        &self,
        id: CellId,
    ) -> Option<Rc<RefCell<dyn Any>>> {
        self.cells.borrow().get(id).map(|entry| Rc::clone(&entry.value))
    }

    /// Records that a collection cell created a key dep, so the dep can be
    /// reclaimed with the cell even if it never loses its last subscriber.
    pub(crate) fn cell_register_dep(&self, id: CellId, dep: DepId) {
        if let Some(entry) = self.cells.borrow_mut().get_mut(id) {
            entry.owned_deps.push(dep);
        }
    }

    pub(crate) fn dispose_cell(&self, id: CellId) {
        let Some(entry) = self.cells.borrow_mut().remove(id) else {
            return;
        };
        for dep in entry.owned_deps {
            // deps already reclaimed by the zero-subscriber rule simply
            // miss here
            self.dispose_dep(dep);
        }
    }

    /// Removes a dep and every link that references it, repairing each
    /// subscriber's dep list around the removed edge.
    pub(crate) fn dispose_dep(&self, dep_id: DepId) {
        let mut cur = self.deps.borrow().get(dep_id).and_then(|d| d.subs_head);
        while let Some(id) = cur {
            let (next, sub_id, prev_dep, next_dep) = {
                let links = self.links.borrow();
                let link = &links[id];
                (link.next_sub, link.sub, link.prev_dep, link.next_dep)
            };
            {
                let mut links = self.links.borrow_mut();
                if let Some(p) = prev_dep {
                    links[p].next_dep = next_dep;
                }
                if let Some(n) = next_dep {
                    links[n].prev_dep = prev_dep;
                }
            }
            if let Some(sub) = self.subscribers.borrow_mut().get_mut(sub_id) {
                if sub.deps_head == Some(id) {
                    sub.deps_head = next_dep;
                }
                if sub.deps_tail == Some(id) {
                    sub.deps_tail = prev_dep;
                }
            }
            self.links.borrow_mut().remove(id);
            cur = next;
        }
        self.deps.borrow_mut().remove(dep_id);
    }

    pub(crate) fn dispose_subscriber(&self, sub_id: SubscriberId) {
        self.stop_subscriber(sub_id);
        let own_dep = {
            let subs = self.subscribers.borrow();
            match subs.get(sub_id).map(|s| &s.kind) {
                Some(SubscriberKind::Derived(state)) => Some(state.dep),
                _ => None,
            }
        };
        if let Some(dep) = own_dep {
            self.dispose_dep(dep);
        }
        self.subscribers.borrow_mut().remove(sub_id);
    }

    pub(crate) fn register_scope_property(&self, property: ScopeProperty) {
        if let Some(scope_id) = self.active_scope.get() {
            if let Some(scope) = self.scopes.borrow_mut().get_mut(scope_id) {
                scope.properties.push(property);
            }
        }
    }

    fn active_scope_paused(&self) -> bool {
        self.active_scope
            .get()
            .and_then(|id| self.scopes.borrow().get(id).map(|s| s.paused))
            .unwrap_or(false)
    }
}

// The track half of the protocol: recording that the current subscriber
// read a dep, with link reuse across runs.
impl Runtime {
    /// Records a read of `dep_id` by the currently-running subscriber and
    /// returns the link between them, if one applies.
    ///
    /// No-ops when nothing is observing, when tracking is paused, or when a
    /// derived value reads its own output.
    pub(crate) fn track_dep(&self, dep_id: DepId) -> Option<LinkId> {
        if !self.tracking.get() {
            return None;
        }
        let sub_id = self.observer.get()?;
        let (owner, active_link, dep_version) = {
            let deps = self.deps.borrow();
            let dep = deps.get(dep_id)?;
            (dep.owner, dep.active_link, dep.version)
        };
        if owner == Some(sub_id) {
            return None;
        }
        let reused = active_link.filter(|l| {
            self.links
                .borrow()
                .get(*l)
                .map(|link| link.sub == sub_id)
                .unwrap_or(false)
        });
        if let Some(link_id) = reused {
            let needs_move = {
                let mut links = self.links.borrow_mut();
                let link = &mut links[link_id];
                if link.version.is_some() {
                    // already used during this run; track is idempotent
                    false
                } else {
                    link.version = Some(dep_version);
                    link.next_dep.is_some()
                }
            };
            if needs_move {
                // keep the dep list in most-recently-read order at the
                // tail while preserving first-read order for fresh deps
                self.move_link_to_deps_tail(link_id, sub_id);
            }
            Some(link_id)
        } else {
            Some(self.create_link(dep_id, sub_id, dep_version))
        }
    }

    fn create_link(
        &self,
        dep_id: DepId,
        sub_id: SubscriberId,
        dep_version: u64,
    ) -> LinkId {
        let sub_tail = self.subscribers.borrow()[sub_id].deps_tail;
        let dep_tail = self.deps.borrow()[dep_id].subs_tail;
        let link_id = self.links.borrow_mut().insert(Link {
            dep: dep_id,
            sub: sub_id,
            version: Some(dep_version),
            prev_dep: sub_tail,
            next_dep: None,
            prev_sub: dep_tail,
            next_sub: None,
            prev_active: None,
        });
        {
            let mut links = self.links.borrow_mut();
            if let Some(tail) = sub_tail {
                links[tail].next_dep = Some(link_id);
            }
            if let Some(tail) = dep_tail {
                links[tail].next_sub = Some(link_id);
            }
        }
        {
            let mut subscribers = self.subscribers.borrow_mut();
            let sub = &mut subscribers[sub_id];
            if sub.deps_head.is_none() {
                sub.deps_head = Some(link_id);
            }
            sub.deps_tail = Some(link_id);
        }
        {
            let mut deps = self.deps.borrow_mut();
            let dep = &mut deps[dep_id];
            if dep.subs_head.is_none() {
                dep.subs_head = Some(link_id);
            }
            dep.subs_tail = Some(link_id);
            dep.sub_count += 1;
            dep.active_link = Some(link_id);
        }
        link_id
    }

    fn move_link_to_deps_tail(&self, link_id: LinkId, sub_id: SubscriberId) {
        let mut links = self.links.borrow_mut();
        let prev = links[link_id].prev_dep;
        let next = match links[link_id].next_dep {
            Some(next) => next,
            None => return,
        };
        links[next].prev_dep = prev;
        if let Some(prev) = prev {
            links[prev].next_dep = Some(next);
        }
        let mut subscribers = self.subscribers.borrow_mut();
        let sub = &mut subscribers[sub_id];
        if sub.deps_head == Some(link_id) {
            sub.deps_head = Some(next);
        }
        let old_tail = sub.deps_tail.expect("non-empty dep list to have a tail");
        links[old_tail].next_dep = Some(link_id);
        links[link_id].prev_dep = Some(old_tail);
        links[link_id].next_dep = None;
        sub.deps_tail = Some(link_id);
    }

    /// Syncs a link's version snapshot with its dep. Used after refreshing
    /// a derived value, whose version may have advanced past the snapshot
    /// the reader took when it first tracked the dep.
    pub(crate) fn sync_link_version(&self, link_id: LinkId) {
        let dep_id = match self.links.borrow().get(link_id) {
            Some(link) => link.dep,
            None => return,
        };
        let version = match self.deps.borrow().get(dep_id) {
            Some(dep) => dep.version,
            None => return,
        };
        if let Some(link) = self.links.borrow_mut().get_mut(link_id) {
            link.version = Some(version);
        }
    }
}

// The prepare/cleanup sweeps that bracket every run of a subscriber.
impl Runtime {
    /// Marks every link in the subscriber's dep list as unused and points
    /// each dep's `active_link` at this subscriber's link, saving the
    /// previous pointer so nested runs can restore it.
    pub(crate) fn prepare_deps(&self, sub_id: SubscriberId) {
        let mut cur = self
            .subscribers
            .borrow()
            .get(sub_id)
            .and_then(|s| s.deps_head);
        let mut links = self.links.borrow_mut();
        let mut deps = self.deps.borrow_mut();
        while let Some(id) = cur {
            let dep_id = links[id].dep;
            links[id].version = None;
            if let Some(dep) = deps.get_mut(dep_id) {
                links[id].prev_active = dep.active_link;
                dep.active_link = Some(id);
            }
            cur = links[id].next_dep;
        }
    }

    /// Walks the dep list tail-to-head after a run, reclaiming every link
    /// that was not re-read and restoring each dep's saved `active_link`.
    /// O(|accessed deps|); surviving links keep their identity.
    pub(crate) fn cleanup_deps(&self, sub_id: SubscriberId) {
        let mut head = None;
        let mut tail = self
            .subscribers
            .borrow()
            .get(sub_id)
            .and_then(|s| s.deps_tail);
        let mut cur = tail;
        while let Some(id) = cur {
            let (prev, version, dep_id, prev_active) = {
                let mut links = self.links.borrow_mut();
                let link = &mut links[id];
                (link.prev_dep, link.version, link.dep, link.prev_active.take())
            };
            if let Some(dep) = self.deps.borrow_mut().get_mut(dep_id) {
                dep.active_link = prev_active;
            }
            if version.is_none() {
                if Some(id) == tail {
                    tail = prev;
                }
                self.unlink_from_sub_list(id);
                self.remove_link_from_dep(id);
                self.links.borrow_mut().remove(id);
            } else {
                head = Some(id);
            }
            cur = prev;
        }
        if let Some(sub) = self.subscribers.borrow_mut().get_mut(sub_id) {
            sub.deps_head = head;
            sub.deps_tail = tail;
        }
    }

    /// Splices a link out of its subscriber's dep list.
    fn unlink_from_sub_list(&self, id: LinkId) {
        let mut links = self.links.borrow_mut();
        let (prev, next) = {
            let link = &links[id];
            (link.prev_dep, link.next_dep)
        };
        if let Some(p) = prev {
            links[p].next_dep = next;
        }
        if let Some(n) = next {
            links[n].prev_dep = prev;
        }
        links[id].prev_dep = None;
        links[id].next_dep = None;
    }

    /// Splices a link out of its dep's subscriber list, decrementing the
    /// subscriber count and reclaiming map-owned deps that hit zero.
    fn remove_link_from_dep(&self, id: LinkId) {
        let (dep_id, prev, next) = {
            let links = self.links.borrow();
            let link = &links[id];
            (link.dep, link.prev_sub, link.next_sub)
        };
        {
            let mut links = self.links.borrow_mut();
            if let Some(p) = prev {
                links[p].next_sub = next;
            }
            if let Some(n) = next {
                links[n].prev_sub = prev;
            }
            links[id].prev_sub = None;
            links[id].next_sub = None;
        }
        let dispose = {
            let mut deps = self.deps.borrow_mut();
            match deps.get_mut(dep_id) {
                Some(dep) => {
                    if dep.subs_head == Some(id) {
                        dep.subs_head = next;
                    }
                    if dep.subs_tail == Some(id) {
                        dep.subs_tail = prev;
                    }
                    dep.sub_count = dep.sub_count.saturating_sub(1);
                    dep.sub_count == 0 && dep.map_owned
                }
                None => false,
            }
        };
        if dispose {
            self.deps.borrow_mut().remove(dep_id);
        }
    }
}

// The trigger half of the protocol, plus the batch scheduler.
impl Runtime {
    /// Bumps the dep's version (and the process-wide version) and notifies
    /// its subscribers inside a batch.
    pub(crate) fn trigger_dep(&self, dep_id: DepId) {
        {
            let mut deps = self.deps.borrow_mut();
            match deps.get_mut(dep_id) {
                Some(dep) => dep.version = dep.version.wrapping_add(1),
                None => return,
            }
        }
        self.global_version
            .set(self.global_version.get().wrapping_add(1));
        self.notify_dep(dep_id);
    }

    /// Walks the dep's subscriber list in reverse insertion order, so the
    /// prepending batch queue drains in forward insertion order at flush.
    pub(crate) fn notify_dep(&self, dep_id: DepId) {
        self.start_batch();
        let mut cur = self.deps.borrow().get(dep_id).and_then(|d| d.subs_tail);
        while let Some(link_id) = cur {
            let (sub_id, prev) = {
                let links = self.links.borrow();
                match links.get(link_id) {
                    Some(link) => (link.sub, link.prev_sub),
                    None => break,
                }
            };
            if self.notify_subscriber(sub_id) {
                // a derived value consumed the notification: propagate
                // through its own output dep
                let own_dep = {
                    let subscribers = self.subscribers.borrow();
                    match subscribers.get(sub_id).map(|s| &s.kind) {
                        Some(SubscriberKind::Derived(state)) => Some(state.dep),
                        _ => None,
                    }
                };
                if let Some(own_dep) = own_dep {
                    self.notify_dep(own_dep);
                }
            }
            cur = prev;
        }
        self.end_batch();
    }

    /// Returns `true` if the subscriber is a derived value whose own dep
    /// should be notified in turn.
    fn notify_subscriber(&self, sub_id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let Some(sub) = subscribers.get_mut(sub_id) else {
            return false;
        };
        match sub.kind {
            SubscriberKind::Effect(_) => {
                if sub.flags.contains(SubscriberFlags::RUNNING)
                    && !sub.flags.contains(SubscriberFlags::ALLOW_RECURSE)
                {
                    return false;
                }
                if !sub.flags.contains(SubscriberFlags::NOTIFIED) {
                    sub.flags.insert(SubscriberFlags::NOTIFIED);
                    sub.next_batched = self.batched_effects.get();
                    self.batched_effects.set(Some(sub_id));
                }
                false
            }
            SubscriberKind::Derived(_) => {
                sub.flags.insert(SubscriberFlags::DIRTY);
                if !sub.flags.contains(SubscriberFlags::NOTIFIED)
                    && self.observer.get() != Some(sub_id)
                {
                    sub.flags.insert(SubscriberFlags::NOTIFIED);
                    sub.next_batched = self.batched_derived.get();
                    self.batched_derived.set(Some(sub_id));
                    return true;
                }
                false
            }
        }
    }

    pub(crate) fn start_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    /// Closes a batch region. When the depth falls to zero, the derived
    /// queue is drained first (clearing NOTIFIED; recomputation stays
    /// lazy), then the effect queue runs. Nested triggers during the flush
    /// re-enter the queues and drain in the same outer loop. At most the
    /// first panic survives the flush and is re-raised at the end.
    pub(crate) fn end_batch(&self) {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        if depth > 0 {
            return;
        }

        self.drain_batched_derived();

        let mut first_error: Option<Box<dyn Any + Send>> = None;
        loop {
            let Some(head) = self.batched_effects.take() else {
                break;
            };
            let mut cur = Some(head);
            while let Some(sub_id) = cur {
                let (next, active) = {
                    let mut subscribers = self.subscribers.borrow_mut();
                    match subscribers.get_mut(sub_id) {
                        Some(sub) => {
                            let next = sub.next_batched.take();
                            sub.flags.remove(SubscriberFlags::NOTIFIED);
                            (next, sub.flags.contains(SubscriberFlags::ACTIVE))
                        }
                        None => (None, false),
                    }
                };
                if active {
                    let result = catch_unwind(AssertUnwindSafe(|| {
                        self.trigger_effect(sub_id)
                    }));
                    if let Err(error) = result {
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                }
                cur = next;
            }
        }

        if let Some(error) = first_error {
            resume_unwind(error);
        }
    }

    fn drain_batched_derived(&self) {
        let mut cur = self.batched_derived.take();
        while let Some(sub_id) = cur {
            let mut subscribers = self.subscribers.borrow_mut();
            cur = match subscribers.get_mut(sub_id) {
                Some(sub) => {
                    let next = sub.next_batched.take();
                    sub.flags.remove(SubscriberFlags::NOTIFIED);
                    next
                }
                None => None,
            };
        }
    }

    /// Unwinds an in-progress batch without delivering anything; used when
    /// a panic escapes the batched closure itself.
    pub(crate) fn abort_batch(&self) {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        if depth > 0 {
            return;
        }
        self.drain_batched_derived();
        let mut cur = self.batched_effects.take();
        while let Some(sub_id) = cur {
            let mut subscribers = self.subscribers.borrow_mut();
            cur = match subscribers.get_mut(sub_id) {
                Some(sub) => {
                    let next = sub.next_batched.take();
                    sub.flags.remove(SubscriberFlags::NOTIFIED);
                    next
                }
                None => None,
            };
        }
    }
}

// Delivering notifications to effects, and re-running them.
impl Runtime {
    /// Delivers a batched notification to an effect: parks it if paused,
    /// defers to its scheduler if one is installed, and otherwise re-runs
    /// it if any of its deps actually diverged.
    pub(crate) fn trigger_effect(&self, sub_id: SubscriberId) {
        let (paused, scheduler) = {
            let subscribers = self.subscribers.borrow();
            let Some(sub) = subscribers.get(sub_id) else {
                return;
            };
            match &sub.kind {
                SubscriberKind::Effect(state) => (
                    sub.flags.contains(SubscriberFlags::PAUSED),
                    state.scheduler.clone(),
                ),
                SubscriberKind::Derived(_) => return,
            }
        };
        if paused {
            self.paused_effects.borrow_mut().insert(sub_id);
            return;
        }
        if let Some(scheduler) = scheduler {
            scheduler();
            return;
        }
        self.run_effect_if_dirty(sub_id);
    }

    pub(crate) fn run_effect_if_dirty(&self, sub_id: SubscriberId) {
        if self.check_dirty(sub_id) {
            self.run_effect(sub_id);
        }
    }

    /// Walks the subscriber's dep list looking for any link whose dep
    /// version diverged from the snapshot, refreshing derived deps on the
    /// fly before comparing.
    pub(crate) fn check_dirty(&self, sub_id: SubscriberId) -> bool {
        let mut cur = self
            .subscribers
            .borrow()
            .get(sub_id)
            .and_then(|s| s.deps_head);
        while let Some(link_id) = cur {
            let (dep_id, link_version, next) = {
                let links = self.links.borrow();
                let link = &links[link_id];
                (link.dep, link.version, link.next_dep)
            };
            let (dep_version, owner) = {
                let deps = self.deps.borrow();
                match deps.get(dep_id) {
                    Some(dep) => (dep.version, dep.owner),
                    None => {
                        cur = next;
                        continue;
                    }
                }
            };
            if link_version != Some(dep_version) {
                return true;
            }
            if let Some(owner) = owner {
                self.refresh_derived(owner);
                let refreshed =
                    self.deps.borrow().get(dep_id).map(|dep| dep.version);
                if link_version != refreshed {
                    return true;
                }
            }
            cur = next;
        }
        false
    }

    /// Runs an effect: per-run cleanup, the unused-link sweep, the body
    /// under this subscriber as observer, then the reclaim sweep. All of
    /// the finalization runs on unwind paths too.
    pub(crate) fn run_effect(&self, sub_id: SubscriberId) {
        let (active, f, value, cleanup) = {
            let subscribers = self.subscribers.borrow();
            let Some(sub) = subscribers.get(sub_id) else {
                return;
            };
            let state = sub.effect_state();
            (
                sub.flags.contains(SubscriberFlags::ACTIVE),
                Rc::clone(&state.f),
                Rc::clone(&state.value),
                Rc::clone(&state.cleanup),
            )
        };
        if !active {
            // stopped effects run their body without any bookkeeping
            f.run(value);
            return;
        }
        if let Some(sub) = self.subscribers.borrow_mut().get_mut(sub_id) {
            sub.flags.insert(SubscriberFlags::RUNNING);
        }
        self.run_cleanup(&cleanup);
        self.prepare_deps(sub_id);
        let _guard = RunGuard {
            runtime: self,
            sub: sub_id,
            prev_observer: self.observer.replace(Some(sub_id)),
            prev_tracking: self.tracking.replace(true),
        };
        f.run(value);
    }

    /// Runs a registered per-run cleanup with tracking suspended.
    pub(crate) fn run_cleanup(
        &self,
        cleanup: &Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
    ) {
        if let Some(f) = cleanup.borrow_mut().take() {
            let _guard = UntrackGuard {
                runtime: self,
                prev_observer: self.observer.take(),
                prev_tracking: self.tracking.replace(false),
            };
            f();
        }
    }

    /// Detaches every link, runs user cleanup and the on-stop hook, and
    /// clears ACTIVE. Idempotent; pending notifications become no-ops.
    pub(crate) fn stop_subscriber(&self, sub_id: SubscriberId) {
        let (active, cleanup, on_stop) = {
            let subscribers = self.subscribers.borrow();
            let Some(sub) = subscribers.get(sub_id) else {
                return;
            };
            let hooks = match &sub.kind {
                SubscriberKind::Effect(state) => Some((
                    Rc::clone(&state.cleanup),
                    Rc::clone(&state.on_stop),
                )),
                SubscriberKind::Derived(_) => None,
            };
            (sub.flags.contains(SubscriberFlags::ACTIVE), hooks.clone().map(|h| h.0), hooks.map(|h| h.1))
        };
        if !active {
            return;
        }
        let mut cur = self
            .subscribers
            .borrow()
            .get(sub_id)
            .and_then(|s| s.deps_head);
        while let Some(link_id) = cur {
            let (next, dep_id, prev_active) = {
                let links = self.links.borrow();
                let link = &links[link_id];
                (link.next_dep, link.dep, link.prev_active)
            };
            if let Some(dep) = self.deps.borrow_mut().get_mut(dep_id) {
                // a mid-run stop leaves the active-link chain intact for
                // any outer subscriber still running
                if dep.active_link == Some(link_id) {
                    dep.active_link = prev_active;
                }
            }
            self.remove_link_from_dep(link_id);
            self.links.borrow_mut().remove(link_id);
            cur = next;
        }
        if let Some(sub) = self.subscribers.borrow_mut().get_mut(sub_id) {
            sub.deps_head = None;
            sub.deps_tail = None;
            sub.flags.remove(SubscriberFlags::ACTIVE);
        }
        self.paused_effects.borrow_mut().shift_remove(&sub_id);
        if let Some(cleanup) = cleanup {
            self.run_cleanup(&cleanup);
        }
        if let Some(on_stop) = on_stop {
            if let Some(f) = on_stop.borrow_mut().take() {
                f();
            }
        }
    }

    pub(crate) fn pause_subscriber(&self, sub_id: SubscriberId) {
        if let Some(sub) = self.subscribers.borrow_mut().get_mut(sub_id) {
            sub.flags.insert(SubscriberFlags::PAUSED);
        }
    }

    pub(crate) fn resume_subscriber(&self, sub_id: SubscriberId) {
        let was_paused = {
            let mut subscribers = self.subscribers.borrow_mut();
            match subscribers.get_mut(sub_id) {
                Some(sub) if sub.flags.contains(SubscriberFlags::PAUSED) => {
                    sub.flags.remove(SubscriberFlags::PAUSED);
                    true
                }
                _ => false,
            }
        };
        if was_paused && self.paused_effects.borrow_mut().shift_remove(&sub_id)
        {
            self.trigger_effect(sub_id);
        }
    }
}

// Derived-value refresh: pull-based revalidation with the fast bypasses.
impl Runtime {
    /// Re-evaluates a derived value if (and only if) it may have changed:
    /// 1. tracked and not dirty → a prior read already validated;
    /// 2. nothing anywhere has changed since the last refresh;
    /// 3. evaluated once, and either a pure constant or its sources all
    ///    compare clean.
    /// Otherwise runs the body and bumps its output dep's version only if
    /// the new value compares unequal to the cache.
    pub(crate) fn refresh_derived(&self, sub_id: SubscriberId) {
        let (flags, stored_global, dep_id, has_deps, f, value) = {
            let subscribers = self.subscribers.borrow();
            let Some(sub) = subscribers.get(sub_id) else {
                return;
            };
            let state = match &sub.kind {
                SubscriberKind::Derived(state) => state,
                SubscriberKind::Effect(_) => return,
            };
            (
                sub.flags,
                state.global_version,
                state.dep,
                sub.deps_head.is_some(),
                Rc::clone(&state.f),
                Rc::clone(&state.value),
            )
        };
        if flags.contains(SubscriberFlags::RUNNING) {
            // a derived value reading itself mid-evaluation sees the cache
            return;
        }
        if flags.contains(SubscriberFlags::TRACKING)
            && !flags.contains(SubscriberFlags::DIRTY)
        {
            return;
        }
        if let Some(sub) = self.subscribers.borrow_mut().get_mut(sub_id) {
            sub.flags.remove(SubscriberFlags::DIRTY);
        }
        let current_global = self.global_version.get();
        if stored_global == current_global {
            return;
        }
        {
            let mut subscribers = self.subscribers.borrow_mut();
            if let Some(sub) = subscribers.get_mut(sub_id) {
                if let SubscriberKind::Derived(state) = &mut sub.kind {
                    state.global_version = current_global;
                }
            }
        }
        if flags.contains(SubscriberFlags::EVALUATED)
            && (!has_deps || !self.check_dirty(sub_id))
        {
            return;
        }

        if let Some(sub) = self.subscribers.borrow_mut().get_mut(sub_id) {
            sub.flags.insert(SubscriberFlags::RUNNING);
        }
        self.prepare_deps(sub_id);
        let _guard = RunGuard {
            runtime: self,
            sub: sub_id,
            prev_observer: self.observer.replace(Some(sub_id)),
            prev_tracking: self.tracking.replace(true),
        };
        // if the body unwinds, publish the change anyway so downstream
        // readers revalidate rather than trusting a stale cache
        let mut bump_guard = BumpVersionOnPanic {
            runtime: self,
            dep: dep_id,
            armed: true,
        };
        let changed = f.run(value);
        bump_guard.armed = false;
        drop(bump_guard);
        if let Some(sub) = self.subscribers.borrow_mut().get_mut(sub_id) {
            sub.flags.insert(SubscriberFlags::EVALUATED);
        }
        if changed {
            if let Some(dep) = self.deps.borrow_mut().get_mut(dep_id) {
                dep.version = dep.version.wrapping_add(1);
            }
        }
    }

    pub(crate) fn derived_value(
        &self,
        sub_id: SubscriberId,
    ) -> Option<Rc<RefCell<dyn Any>>> {
        let subscribers = self.subscribers.borrow();
        match subscribers.get(sub_id).map(|s| &s.kind) {
            Some(SubscriberKind::Derived(state)) => {
                Some(Rc::clone(&state.value))
            }
            _ => None,
        }
    }
}

// Tracking suspension.
impl Runtime {
    pub(crate) fn untracked<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = UntrackGuard {
            runtime: self,
            prev_observer: self.observer.take(),
            prev_tracking: self.tracking.replace(false),
        };
        f()
    }

    /// Pauses tracking without clearing the observer; used by collection
    /// mutators whose internal reads must not self-subscribe.
    pub(crate) fn with_tracking_paused<T>(&self, f: impl FnOnce() -> T) -> T {
        let prev = self.tracking.replace(false);
        let result = f();
        self.tracking.set(prev);
        result
    }
}

/// Restores observer/tracking state, reclaims unused links, and clears
/// RUNNING when a subscriber's run ends — on every exit path.
struct RunGuard<'a> {
    runtime: &'a Runtime,
    sub: SubscriberId,
    prev_observer: Option<SubscriberId>,
    prev_tracking: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.runtime.observer.set(self.prev_observer);
        self.runtime.tracking.set(self.prev_tracking);
        let active = self
            .runtime
            .subscribers
            .borrow()
            .get(self.sub)
            .map(|s| s.flags.contains(SubscriberFlags::ACTIVE))
            .unwrap_or(false);
        if active {
            // an effect that stopped itself mid-run already detached its
            // links; the sweep must not touch them again
            self.runtime.cleanup_deps(self.sub);
        }
        if let Some(sub) =
            self.runtime.subscribers.borrow_mut().get_mut(self.sub)
        {
            sub.flags.remove(SubscriberFlags::RUNNING);
        }
    }
}

struct UntrackGuard<'a> {
    runtime: &'a Runtime,
    prev_observer: Option<SubscriberId>,
    prev_tracking: bool,
}

impl Drop for UntrackGuard<'_> {
    fn drop(&mut self) {
        self.runtime.observer.set(self.prev_observer);
        self.runtime.tracking.set(self.prev_tracking);
    }
}

struct BumpVersionOnPanic<'a> {
    runtime: &'a Runtime,
    dep: DepId,
    armed: bool,
}

impl Drop for BumpVersionOnPanic<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Some(dep) =
                self.runtime.deps.borrow_mut().get_mut(self.dep)
            {
                dep.version = dep.version.wrapping_add(1);
            }
        }
    }
}

/// Suspends reactive tracking while running the given function.
///
/// Reads made inside the closure do not subscribe the currently-running
/// effect or derived value to anything.
#[inline(always)]
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    with_runtime(|runtime| runtime.untracked(f))
}

/// Opens a batch region: triggers fired inside `f` are queued and
/// delivered once, in subscription order, when the region closes.
///
/// ```
/// # use fluxion_reactive::*;
/// let (a, set_a) = create_signal(1);
/// let (b, set_b) = create_signal(2);
/// let mut runs = 0;
/// // an effect reading both signals runs once per batch, not per write
/// batch(|| {
///     set_a.set(10);
///     set_b.set(20);
/// });
/// # let _ = (a, b, runs);
/// ```
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    with_runtime(|runtime| {
        runtime.start_batch();
        let guard = BatchGuard { runtime };
        let value = f();
        std::mem::forget(guard);
        runtime.end_batch();
        value
    })
}

/// Increments the batch depth. Prefer [`batch`]; this exists for callers
/// that need to hold a batch open across non-lexical regions.
pub fn start_batch() {
    with_runtime(|runtime| runtime.start_batch());
}

/// Decrements the batch depth, flushing queued notifications when it
/// reaches zero.
pub fn end_batch() {
    with_runtime(|runtime| runtime.end_batch());
}

struct BatchGuard<'a> {
    runtime: &'a Runtime,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        // only reached when the batched closure unwinds: close the region
        // without delivering, so the graph is left consistent
        self.runtime.abort_batch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_effect, create_signal};

    fn sub_dep_links(runtime: &Runtime, sub: SubscriberId) -> Vec<LinkId> {
        let mut out = Vec::new();
        let mut cur =
            runtime.subscribers.borrow().get(sub).and_then(|s| s.deps_head);
        while let Some(id) = cur {
            out.push(id);
            cur = runtime.links.borrow()[id].next_dep;
        }
        out
    }

    fn dep_sub_links(runtime: &Runtime, dep: DepId) -> Vec<LinkId> {
        let mut out = Vec::new();
        let mut cur =
            runtime.deps.borrow().get(dep).and_then(|d| d.subs_head);
        while let Some(id) = cur {
            out.push(id);
            cur = runtime.links.borrow()[id].next_sub;
        }
        out
    }

    #[test]
    fn link_bijection_holds_after_repeated_reads() {
        let (a, set_a) = create_signal(0);
        let (b, _) = create_signal(0);

        let effect = create_effect(move |_| {
            let _ = a.get() + a.get() + b.get() + a.get();
        });
        set_a.set(1);

        with_runtime(|runtime| {
            for dep in [a.id, b.id] {
                let from_dep = dep_sub_links(runtime, dep)
                    .into_iter()
                    .filter(|l| runtime.links.borrow()[*l].sub == effect.id)
                    .count();
                let from_sub = sub_dep_links(runtime, effect.id)
                    .into_iter()
                    .filter(|l| runtime.links.borrow()[*l].dep == dep)
                    .count();
                assert_eq!(from_dep, from_sub);
                assert_eq!(from_dep, 1);
            }
        });
    }

    #[test]
    fn deps_appear_in_first_read_order() {
        let (a, _) = create_signal(0);
        let (b, _) = create_signal(0);
        let (c, _) = create_signal(0);

        let effect = create_effect(move |_| {
            let _ = b.get();
            let _ = a.get();
            let _ = c.get();
            // repeat reads must not reorder the first-read sequence
            let _ = b.get();
        });

        with_runtime(|runtime| {
            let order: Vec<DepId> = sub_dep_links(runtime, effect.id)
                .into_iter()
                .map(|l| runtime.links.borrow()[l].dep)
                .collect();
            assert_eq!(order, vec![b.id, a.id, c.id]);
        });
    }

    #[test]
    fn unused_links_are_reclaimed_by_the_sweep() {
        let (flag, set_flag) = create_signal(true);
        let (a, _) = create_signal(0);
        let (b, _) = create_signal(0);

        let effect = create_effect(move |_| {
            if flag.get() {
                let _ = a.get();
            } else {
                let _ = b.get();
            }
        });

        with_runtime(|runtime| {
            let deps: Vec<DepId> = sub_dep_links(runtime, effect.id)
                .into_iter()
                .map(|l| runtime.links.borrow()[l].dep)
                .collect();
            assert_eq!(deps, vec![flag.id, a.id]);
        });

        set_flag.set(false);

        with_runtime(|runtime| {
            let deps: Vec<DepId> = sub_dep_links(runtime, effect.id)
                .into_iter()
                .map(|l| runtime.links.borrow()[l].dep)
                .collect();
            assert_eq!(deps, vec![flag.id, b.id]);
            assert!(dep_sub_links(runtime, a.id).is_empty());
            assert_eq!(runtime.deps.borrow()[a.id].sub_count, 0);
        });
    }

    #[test]
    fn every_surviving_link_has_a_version_after_a_run() {
        let (a, set_a) = create_signal(0);
        let (b, _) = create_signal(0);

        let effect = create_effect(move |_| {
            let _ = (a.get(), b.get());
        });
        set_a.set(1);

        with_runtime(|runtime| {
            for link in sub_dep_links(runtime, effect.id) {
                assert!(runtime.links.borrow()[link].version.is_some());
            }
        });
    }

    #[test]
    fn stopping_an_effect_detaches_every_link() {
        let (a, _) = create_signal(0);
        let (b, _) = create_signal(0);

        let effect = create_effect(move |_| {
            let _ = (a.get(), b.get());
        });
        effect.stop();

        with_runtime(|runtime| {
            assert!(sub_dep_links(runtime, effect.id).is_empty());
            assert!(dep_sub_links(runtime, a.id).is_empty());
            assert!(dep_sub_links(runtime, b.id).is_empty());
            assert!(runtime.links.borrow().is_empty());
        });
    }
}
