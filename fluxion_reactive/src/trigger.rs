use crate::{node::DepId, runtime::with_runtime};

/// A data-less dep whose sole purpose is notifying reactive code of a
/// change. Useful for external state that is not stored in signals, and
/// the building block the observed collections hand out per key.
///
/// ```
/// # use fluxion_reactive::*;
/// # use std::{cell::RefCell, rc::Rc};
/// let rerun = create_trigger();
/// let runs = Rc::new(RefCell::new(0));
///
/// create_effect({
///     let runs = runs.clone();
///     move |_| {
///         rerun.track();
///         *runs.borrow_mut() += 1;
///     }
/// });
/// assert_eq!(*runs.borrow(), 1);
///
/// rerun.notify();
/// assert_eq!(*runs.borrow(), 2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trigger {
    pub(crate) id: DepId,
    #[cfg(debug_assertions)]
    pub(crate) defined_at: &'static std::panic::Location<'static>,
}

#[track_caller]
pub fn create_trigger() -> Trigger {
    let id = with_runtime(|runtime| runtime.create_value_dep(None));
    Trigger {
        id,
        #[cfg(debug_assertions)]
        defined_at: std::panic::Location::caller(),
    }
}

impl Trigger {
    /// Subscribes the running subscriber to this trigger.
    pub fn track(&self) {
        with_runtime(|runtime| {
            runtime.track_dep(self.id);
        });
    }

    /// Notifies every subscriber tracking this trigger.
    pub fn notify(&self) {
        with_runtime(|runtime| runtime.trigger_dep(self.id));
    }
}
