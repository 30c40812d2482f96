use crate::{
    node::{AnyComputation, SubscriberFlags, SubscriberId, SubscriberKind},
    runtime::with_runtime,
};
use std::{any::Any, cell::RefCell, marker::PhantomData, rc::Rc};

/// Creates an effect: a computation that runs once immediately, tracks
/// every signal, memo, trigger, or observed key it reads, and re-runs
/// whenever any of them changes.
///
/// The closure receives whatever it returned on its previous run (`None`
/// the first time), which is useful for diffing against prior state.
///
/// ```
/// # use fluxion_reactive::*;
/// # use std::{cell::RefCell, rc::Rc};
/// let (a, set_a) = create_signal(1);
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// create_effect({
///     let seen = seen.clone();
///     move |_| seen.borrow_mut().push(a.get())
/// });
/// assert_eq!(*seen.borrow(), vec![1]);
///
/// set_a.set(7);
/// assert_eq!(*seen.borrow(), vec![1, 7]);
/// ```
#[track_caller]
pub fn create_effect<T>(f: impl Fn(Option<T>) -> T + 'static) -> Effect
where
    T: 'static,
{
    let effect = Effect::new(f);
    effect.run();
    effect
}

/// A handle to a running effect.
///
/// The handle is `Copy`; dropping it does not stop the effect. Stopping is
/// explicit (or happens when the owning [`Scope`](crate::Scope) stops) and
/// idempotent: a stopped effect never runs again, and pending
/// notifications for it are no-ops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Effect {
    pub(crate) id: SubscriberId,
    #[cfg(debug_assertions)]
    pub(crate) defined_at: &'static std::panic::Location<'static>,
}

impl Effect {
    /// Creates the effect without running it. Most callers want
    /// [`create_effect`], which runs immediately.
    #[track_caller]
    pub fn new<T>(f: impl Fn(Option<T>) -> T + 'static) -> Self
    where
        T: 'static,
    {
        Self::build(f, None)
    }

    /// Creates an effect whose notifications are delivered through
    /// `scheduler` instead of re-running directly. The scheduler decides
    /// when (and whether) to call [`run_if_dirty`](Effect::run_if_dirty).
    ///
    /// The effect is not run on creation.
    #[track_caller]
    pub fn new_with_scheduler<T>(
        f: impl Fn(Option<T>) -> T + 'static,
        scheduler: impl Fn() + 'static,
    ) -> Self
    where
        T: 'static,
    {
        Self::build(f, Some(Rc::new(scheduler)))
    }

    #[track_caller]
    fn build<T>(
        f: impl Fn(Option<T>) -> T + 'static,
        scheduler: Option<Rc<dyn Fn()>>,
    ) -> Self
    where
        T: 'static,
    {
        let id = with_runtime(|runtime| {
            runtime.create_effect_node(
                Rc::new(EffectComputation {
                    f,
                    ty: PhantomData,
                }),
                Rc::new(RefCell::new(None::<T>)),
                scheduler,
            )
        });
        Effect {
            id,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        }
    }

    /// Runs the effect unconditionally, re-tracking its dependencies.
    pub fn run(&self) {
        with_runtime(|runtime| runtime.run_effect(self.id));
    }

    /// Runs the effect only if one of its deps has a version diverging
    /// from the link's snapshot (refreshing derived deps along the way).
    pub fn run_if_dirty(&self) {
        with_runtime(|runtime| runtime.run_effect_if_dirty(self.id));
    }

    /// Stops the effect: detaches every dep link, runs any registered
    /// cleanup and the on-stop hook, and clears the active flag.
    pub fn stop(&self) {
        with_runtime(|runtime| runtime.stop_subscriber(self.id));
    }

    /// Pauses the effect. While paused, at most one trigger is parked;
    /// [`resume`](Effect::resume) replays it.
    pub fn pause(&self) {
        with_runtime(|runtime| runtime.pause_subscriber(self.id));
    }

    pub fn resume(&self) {
        with_runtime(|runtime| runtime.resume_subscriber(self.id));
    }

    pub fn is_active(&self) -> bool {
        with_runtime(|runtime| {
            runtime
                .subscribers
                .borrow()
                .get(self.id)
                .map(|sub| sub.flags.contains(SubscriberFlags::ACTIVE))
                .unwrap_or(false)
        })
    }

    /// Allows the effect to be re-notified by writes it performs during
    /// its own run. Off by default to keep self-triggering loops inert.
    pub fn set_allow_recurse(&self, allow: bool) {
        with_runtime(|runtime| {
            if let Some(sub) =
                runtime.subscribers.borrow_mut().get_mut(self.id)
            {
                if allow {
                    sub.flags.insert(SubscriberFlags::ALLOW_RECURSE);
                } else {
                    sub.flags.remove(SubscriberFlags::ALLOW_RECURSE);
                }
            }
        });
    }

    /// Installs a hook that runs once when the effect stops.
    pub fn on_stop(&self, f: impl FnOnce() + 'static) {
        with_runtime(|runtime| {
            let subscribers = runtime.subscribers.borrow();
            if let Some(SubscriberKind::Effect(state)) =
                subscribers.get(self.id).map(|sub| &sub.kind)
            {
                *state.on_stop.borrow_mut() = Some(Box::new(f));
            }
        });
    }
}

/// Registers a cleanup callback for the currently-running effect.
///
/// The callback runs before the effect's next run, or when the effect
/// stops, whichever comes first. Registering several callbacks during one
/// run chains them in registration order.
pub fn on_effect_cleanup(f: impl FnOnce() + 'static) {
    with_runtime(|runtime| {
        let Some(sub_id) = runtime.observer.get() else {
            crate::debug_warn!(
                "on_effect_cleanup called outside a running effect; the \
                 callback will never run"
            );
            return;
        };
        let subscribers = runtime.subscribers.borrow();
        match subscribers.get(sub_id).map(|sub| &sub.kind) {
            Some(SubscriberKind::Effect(state)) => {
                let mut slot = state.cleanup.borrow_mut();
                *slot = match slot.take() {
                    Some(prev) => Some(Box::new(move || {
                        prev();
                        f();
                    })),
                    None => Some(Box::new(f)),
                };
            }
            _ => {
                crate::debug_warn!(
                    "on_effect_cleanup called inside a derived value; the \
                     callback will never run"
                );
            }
        }
    });
}

pub(crate) struct EffectComputation<T, F>
where
    T: 'static,
    F: Fn(Option<T>) -> T,
{
    pub(crate) f: F,
    pub(crate) ty: PhantomData<T>,
}

impl<T, F> AnyComputation for EffectComputation<T, F>
where
    T: 'static,
    F: Fn(Option<T>) -> T,
{
    fn run(&self, value: Rc<RefCell<dyn Any>>) -> bool {
        // take and release the borrow around the user closure, in case the
        // body reaches back into this effect
        let curr_value = {
            let mut value = value.borrow_mut();
            let value = value
                .downcast_mut::<Option<T>>()
                .expect("to downcast effect value");
            value.take()
        };

        let new_value = (self.f)(curr_value);

        let mut value = value.borrow_mut();
        let value = value
            .downcast_mut::<Option<T>>()
            .expect("to downcast effect value");
        *value = Some(new_value);

        true
    }
}
