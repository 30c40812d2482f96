use crate::{
    effect::Effect,
    node::{CellId, DepId},
    runtime::with_runtime,
    untrack, Memo, ReadSignal, RwSignal, Trigger,
};
use rustc_hash::FxHashSet;
use slotmap::Key;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

/// How far [`watch`] traverses the value produced by its getter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WatchDepth {
    /// No traversal beyond the getter's own reads. An observed collection
    /// returned directly from the getter is still tracked one level, so
    /// membership changes are observed.
    #[default]
    Off,
    /// Traverse nested reactive values to the given depth.
    Levels(usize),
    /// Traverse without a depth bound (cycles are still detected).
    Unbounded,
}

/// Scheduler hook for [`watch_with_options`]: receives the delivery job
/// and whether this is the first delivery.
pub type WatchScheduler = Rc<dyn Fn(Box<dyn FnOnce()>, bool)>;

/// Options for [`watch_with_options`].
#[derive(Clone, Default)]
pub struct WatchOptions {
    /// Fire the callback once at registration, with no previous value.
    pub immediate: bool,
    pub deep: WatchDepth,
    /// Detach after the first delivery.
    pub once: bool,
    /// Custom delivery; when unset, callbacks run synchronously when the
    /// batch containing the write flushes.
    pub scheduler: Option<WatchScheduler>,
    /// Introspection hook invoked after each tracked evaluation of the
    /// getter. Debug builds only.
    pub on_track: Option<Rc<dyn Fn()>>,
    /// Introspection hook invoked when a delivery fires. Debug builds
    /// only.
    pub on_trigger: Option<Rc<dyn Fn()>>,
}

impl WatchOptions {
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn deep(mut self, depth: WatchDepth) -> Self {
        self.deep = depth;
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn scheduler(
        mut self,
        scheduler: impl Fn(Box<dyn FnOnce()>, bool) + 'static,
    ) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn on_track(mut self, f: impl Fn() + 'static) -> Self {
        self.on_track = Some(Rc::new(f));
        self
    }

    pub fn on_trigger(mut self, f: impl Fn() + 'static) -> Self {
        self.on_trigger = Some(Rc::new(f));
        self
    }
}

/// A handle to a running watcher.
#[derive(Clone)]
pub struct WatchHandle {
    effect: Effect,
    cleanups: Rc<RefCell<Vec<Box<dyn FnOnce()>>>>,
    stopped: Rc<Cell<bool>>,
}

impl WatchHandle {
    /// Parks incoming triggers (at most one) until [`resume`].
    ///
    /// [`resume`]: WatchHandle::resume
    pub fn pause(&self) {
        self.effect.pause();
    }

    pub fn resume(&self) {
        self.effect.resume();
    }

    /// Stops watching and runs any cleanup registered by the last
    /// callback. Idempotent.
    pub fn stop(&self) {
        if !self.stopped.replace(true) {
            self.effect.stop();
            run_cleanups(&self.cleanups);
        }
    }
}

/// Watches a reactive getter and calls `callback` with (current, previous,
/// previous callback return) whenever the getter's value changes.
///
/// The callback itself runs untracked: signals it reads do not become
/// sources. With `immediate`, the callback also fires at registration with
/// no previous value.
///
/// ```
/// # use fluxion_reactive::*;
/// # use std::{cell::RefCell, rc::Rc};
/// let (num, set_num) = create_signal(0);
/// let log = Rc::new(RefCell::new(String::new()));
///
/// let handle = watch(
///     move || num.get(),
///     {
///         let log = log.clone();
///         move |num, prev, _: Option<()>| {
///             *log.borrow_mut() = format!("{num}, prev {prev:?}");
///         }
///     },
///     false,
/// );
///
/// set_num.set(1);
/// assert_eq!(log.borrow().as_str(), "1, prev Some(0)");
///
/// handle.stop();
/// set_num.set(2); // nothing happens
/// # drop(log);
/// ```
#[track_caller]
pub fn watch<W, T>(
    deps: impl Fn() -> W + 'static,
    callback: impl Fn(&W, Option<&W>, Option<T>) -> T + Clone + 'static,
    immediate: bool,
) -> WatchHandle
where
    W: Clone + PartialEq + DeepTrack + 'static,
    T: 'static,
{
    let options = if immediate {
        WatchOptions::default().immediate()
    } else {
        WatchOptions::default()
    };
    watch_with_options(deps, callback, options)
}

/// [`watch`] with the full option set: `immediate`, `deep`, `once`, and a
/// custom `scheduler`.
#[track_caller]
pub fn watch_with_options<W, T>(
    deps: impl Fn() -> W + 'static,
    callback: impl Fn(&W, Option<&W>, Option<T>) -> T + Clone + 'static,
    options: WatchOptions,
) -> WatchHandle
where
    W: Clone + PartialEq + DeepTrack + 'static,
    T: 'static,
{
    let cur_deps_value = Rc::new(RefCell::new(None::<W>));
    let prev_deps_value = Rc::new(RefCell::new(None::<W>));
    let prev_callback_value = Rc::new(RefCell::new(None::<T>));
    let cleanups: Rc<RefCell<Vec<Box<dyn FnOnce()>>>> =
        Rc::new(RefCell::new(Vec::new()));
    let effect_slot = Rc::new(Cell::new(None::<Effect>));
    let stopped = Rc::new(Cell::new(false));

    let WatchOptions {
        immediate,
        deep,
        once,
        scheduler,
        on_track,
        on_trigger,
    } = options;
    let deep_on = !matches!(deep, WatchDepth::Off);
    let depth = match deep {
        WatchDepth::Off => 0,
        WatchDepth::Levels(levels) => levels,
        WatchDepth::Unbounded => usize::MAX,
    };

    let wrapped_callback = {
        let cur_deps_value = Rc::clone(&cur_deps_value);
        let prev_deps_value = Rc::clone(&prev_deps_value);
        let prev_callback_value = Rc::clone(&prev_callback_value);
        let cleanups = Rc::clone(&cleanups);

        move || {
            run_cleanups(&cleanups);
            let _guard = WatchCleanupGuard::enter(Rc::clone(&cleanups));
            callback(
                cur_deps_value.borrow().as_ref().expect(
                    "watch callback to run only after a deps value exists",
                ),
                prev_deps_value.borrow().as_ref(),
                prev_callback_value.borrow_mut().take(),
            )
        }
    };

    let effect_fn = {
        let cur_deps_value = Rc::clone(&cur_deps_value);
        let prev_deps_value = Rc::clone(&prev_deps_value);
        let prev_callback_value = Rc::clone(&prev_callback_value);
        let cleanups = Rc::clone(&cleanups);
        let effect_slot = Rc::clone(&effect_slot);
        let stopped = Rc::clone(&stopped);

        move |did_run_before: Option<()>| {
            if stopped.get() {
                return;
            }
            let deps_value = deps();
            deps_value.deep_track(depth, &mut DeepSeen::new());
            if cfg!(debug_assertions) {
                if let Some(on_track) = &on_track {
                    on_track();
                }
            }

            let first_run = did_run_before.is_none();
            if first_run && !immediate {
                prev_deps_value.replace(Some(deps_value));
                return;
            }
            let changed = deep_on
                || first_run
                || deps_value.is_reactive_source()
                || prev_deps_value.borrow().as_ref() != Some(&deps_value);
            if !changed {
                return;
            }

            if cfg!(debug_assertions) {
                if let Some(on_trigger) = &on_trigger {
                    on_trigger();
                }
            }
            cur_deps_value.replace(Some(deps_value.clone()));
            let callback_value = untrack(wrapped_callback.clone());
            prev_callback_value.replace(Some(callback_value));
            prev_deps_value.replace(Some(deps_value));

            if once {
                stopped.set(true);
                if let Some(effect) = effect_slot.get() {
                    effect.stop();
                }
                run_cleanups(&cleanups);
            }
        }
    };

    let effect = match scheduler {
        None => Effect::new(effect_fn),
        Some(scheduler) => {
            let effect_slot = Rc::clone(&effect_slot);
            Effect::new_with_scheduler(effect_fn, move || {
                let effect_slot = Rc::clone(&effect_slot);
                let job: Box<dyn FnOnce()> = Box::new(move || {
                    if let Some(effect) = effect_slot.get() {
                        effect.run_if_dirty();
                    }
                });
                scheduler(job, false);
            })
        }
    };
    effect_slot.set(Some(effect));
    effect.run();

    let untracked_getter = with_runtime(|runtime| {
        runtime
            .subscribers
            .borrow()
            .get(effect.id)
            .map(|sub| sub.deps_head.is_none())
            .unwrap_or(false)
    });
    if untracked_getter {
        crate::debug_warn!(
            "watch getter tracked no reactive sources; the watcher will \
             never fire"
        );
    }

    WatchHandle {
        effect,
        cleanups,
        stopped,
    }
}

thread_local! {
    static ACTIVE_WATCH_CLEANUPS: RefCell<
        Vec<Rc<RefCell<Vec<Box<dyn FnOnce()>>>>>,
    > = const { RefCell::new(Vec::new()) };
}

/// Registers a cleanup from inside a watch callback. It runs before the
/// next delivery, or when the watcher stops.
pub fn on_watch_cleanup(f: impl FnOnce() + 'static) {
    ACTIVE_WATCH_CLEANUPS.with(|stack| {
        match stack.borrow().last() {
            Some(cleanups) => cleanups.borrow_mut().push(Box::new(f)),
            None => crate::debug_warn!(
                "on_watch_cleanup called outside a watch callback; the \
                 cleanup will never run"
            ),
        }
    });
}

struct WatchCleanupGuard;

impl WatchCleanupGuard {
    fn enter(cleanups: Rc<RefCell<Vec<Box<dyn FnOnce()>>>>) -> Self {
        ACTIVE_WATCH_CLEANUPS.with(|stack| stack.borrow_mut().push(cleanups));
        WatchCleanupGuard
    }
}

impl Drop for WatchCleanupGuard {
    fn drop(&mut self) {
        ACTIVE_WATCH_CLEANUPS.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn run_cleanups(cleanups: &Rc<RefCell<Vec<Box<dyn FnOnce()>>>>) {
    let pending = std::mem::take(&mut *cleanups.borrow_mut());
    for cleanup in pending {
        cleanup();
    }
}

/// Cycle detection for deep traversal: reactive identities already
/// visited during one top-level walk.
#[derive(Default)]
pub struct DeepSeen {
    visited: FxHashSet<(u8, u64)>,
}

impl DeepSeen {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_dep(&mut self, dep: DepId) -> bool {
        self.visited.insert((0, dep.data().as_ffi()))
    }

    pub(crate) fn insert_cell(&mut self, cell: CellId) -> bool {
        self.visited.insert((1, cell.data().as_ffi()))
    }
}

/// Deep-traversal support for [`watch`]: visiting a value subscribes the
/// running watcher to every reactive identity reachable from it, down to
/// the requested depth.
///
/// Plain data is a leaf; reactive handles track themselves and descend
/// into their contents. Implementations for user types should delegate to
/// their fields. Wrap a field in [`Skip`] to keep traversal out of it.
pub trait DeepTrack {
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen);

    /// Whether this value *is* a reactive source (a handle), rather than
    /// plain data read out of one. Watchers always fire for reactive
    /// sources, whose handle identity never changes even as their
    /// contents do.
    fn is_reactive_source(&self) -> bool {
        false
    }
}

/// Opts a value out of deep traversal entirely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Skip<T>(pub T);

impl<T> DeepTrack for Skip<T> {
    fn deep_track(&self, _depth: usize, _seen: &mut DeepSeen) {}
}

macro_rules! impl_deep_track_leaf {
    ($($ty:ty),* $(,)?) => {
        $(
            impl DeepTrack for $ty {
                fn deep_track(&self, _depth: usize, _seen: &mut DeepSeen) {}
            }
        )*
    };
}

impl_deep_track_leaf!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    String,
    &'static str,
);

impl<T: DeepTrack> DeepTrack for Option<T> {
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
        if let Some(value) = self {
            value.deep_track(depth, seen);
        }
    }

    fn is_reactive_source(&self) -> bool {
        self.as_ref()
            .map(DeepTrack::is_reactive_source)
            .unwrap_or(false)
    }
}

impl<T: DeepTrack> DeepTrack for Vec<T> {
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
        for value in self {
            value.deep_track(depth, seen);
        }
    }

    fn is_reactive_source(&self) -> bool {
        self.iter().any(DeepTrack::is_reactive_source)
    }
}

impl<T: DeepTrack> DeepTrack for Box<T> {
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
        (**self).deep_track(depth, seen);
    }
}

impl<T: DeepTrack> DeepTrack for Rc<T> {
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
        (**self).deep_track(depth, seen);
    }
}

macro_rules! impl_deep_track_tuple {
    ($($name:ident),+) => {
        impl<$($name: DeepTrack),+> DeepTrack for ($($name,)+) {
            fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
                #[allow(non_snake_case)]
                let ($($name,)+) = self;
                $($name.deep_track(depth, seen);)+
            }

            fn is_reactive_source(&self) -> bool {
                #[allow(non_snake_case)]
                let ($($name,)+) = self;
                $($name.is_reactive_source() ||)+ false
            }
        }
    };
}

impl_deep_track_tuple!(A);
impl_deep_track_tuple!(A, B);
impl_deep_track_tuple!(A, B, C);
impl_deep_track_tuple!(A, B, C, D);

impl<T> DeepTrack for ReadSignal<T>
where
    T: DeepTrack + 'static,
{
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
        if !seen.insert_dep(self.id) {
            return;
        }
        // unwrapping a ref-cell does not consume a level
        self.with(|value| value.deep_track(depth, seen));
    }

    fn is_reactive_source(&self) -> bool {
        true
    }
}

impl<T> DeepTrack for RwSignal<T>
where
    T: DeepTrack + 'static,
{
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
        self.read_only().deep_track(depth, seen);
    }

    fn is_reactive_source(&self) -> bool {
        true
    }
}

impl<T> DeepTrack for Memo<T>
where
    T: DeepTrack + PartialEq + 'static,
{
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
        if !seen.insert_dep(self.dep) {
            return;
        }
        self.with(|value| value.deep_track(depth, seen));
    }

    fn is_reactive_source(&self) -> bool {
        true
    }
}

impl DeepTrack for Trigger {
    fn deep_track(&self, _depth: usize, _seen: &mut DeepSeen) {
        self.track();
    }

    fn is_reactive_source(&self) -> bool {
        true
    }
}

impl<K, V> DeepTrack for crate::ReadOnlyMap<K, V>
where
    K: Clone + Eq + std::hash::Hash + 'static,
    V: Clone + DeepTrack + 'static,
{
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
        self.inner().deep_track(depth, seen);
    }

    fn is_reactive_source(&self) -> bool {
        true
    }
}

impl<T> DeepTrack for crate::ReadOnlyList<T>
where
    T: Clone + DeepTrack + 'static,
{
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
        self.inner().deep_track(depth, seen);
    }

    fn is_reactive_source(&self) -> bool {
        true
    }
}
