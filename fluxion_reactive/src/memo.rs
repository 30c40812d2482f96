use crate::{
    node::{AnyComputation, DepId, SubscriberId, SubscriberKind},
    runtime::with_runtime,
};
use std::{any::Any, cell::RefCell, marker::PhantomData, rc::Rc};

/// Creates a memo: a cached derived value.
///
/// Unlike a plain derived closure, a memo re-runs its body at most once
/// per change no matter how many readers it has, and only notifies its
/// own subscribers when the computed value actually changes (per
/// `PartialEq`). Recomputation is lazy: a notification merely marks the
/// memo dirty, and the next read revalidates.
///
/// As with [`create_effect`](crate::create_effect), the body receives its
/// previous value (`None` on the first evaluation).
///
/// ```
/// # use fluxion_reactive::*;
/// let (count, set_count) = create_signal(1);
/// let double = create_memo(move |_| count.get() * 2);
///
/// assert_eq!(double.get(), 2);
/// set_count.set(10);
/// assert_eq!(double.get(), 20);
/// ```
#[track_caller]
pub fn create_memo<T>(f: impl Fn(Option<&T>) -> T + 'static) -> Memo<T>
where
    T: PartialEq + 'static,
{
    Memo::build(f, None)
}

/// A cached derived reactive value. See [`create_memo`].
#[derive(Debug, PartialEq, Eq)]
pub struct Memo<T>
where
    T: 'static,
{
    pub(crate) id: SubscriberId,
    pub(crate) dep: DepId,
    pub(crate) ty: PhantomData<T>,
    #[cfg(debug_assertions)]
    pub(crate) defined_at: &'static std::panic::Location<'static>,
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Memo<T> {}

impl<T> Memo<T>
where
    T: PartialEq + 'static,
{
    #[track_caller]
    fn build(
        f: impl Fn(Option<&T>) -> T + 'static,
        setter: Option<Rc<dyn Fn(Box<dyn Any>)>>,
    ) -> Self {
        let (id, dep) = with_runtime(|runtime| {
            runtime.create_derived_node(
                Rc::new(MemoComputation {
                    f,
                    ty: PhantomData,
                }),
                Rc::new(RefCell::new(None::<T>)),
                setter,
            )
        });
        Memo {
            id,
            dep,
            ty: PhantomData,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        }
    }

    /// Clones and returns the current value, refreshing it first if any
    /// source changed, and subscribes the running subscriber.
    #[track_caller]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    pub fn try_get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.try_with(T::clone)
    }

    #[track_caller]
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        self.try_with(f)
            .expect("tried to access a memo that has been disposed")
    }

    /// Returns `None` if the memo has been disposed, or when read from
    /// inside its own first evaluation (no cached value exists yet).
    pub fn try_with<U>(&self, f: impl FnOnce(&T) -> U) -> Option<U> {
        with_runtime(|runtime| {
            // subscribe the reader to our output dep before refreshing, so
            // the link exists to have its version synced afterwards
            let link = runtime.track_dep(self.dep);
            runtime.refresh_derived(self.id);
            if let Some(link) = link {
                runtime.sync_link_version(link);
            }
            let value = runtime.derived_value(self.id)?;
            let value = value.borrow();
            let value = value
                .downcast_ref::<Option<T>>()
                .expect("to downcast memo value");
            value.as_ref().map(f)
        })
    }

    /// Reads the current value without subscribing anything. Still
    /// refreshes first, so the value is consistent with the present state
    /// of the graph.
    #[track_caller]
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.with_untracked(T::clone)
    }

    #[track_caller]
    pub fn with_untracked<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        with_runtime(|runtime| {
            runtime.refresh_derived(self.id);
            let value = runtime
                .derived_value(self.id)
                .expect("tried to access a memo that has been disposed");
            let value = value.borrow();
            let value = value
                .downcast_ref::<Option<T>>()
                .expect("to downcast memo value");
            f(value.as_ref().expect("memo value to be evaluated"))
        })
    }
}

/// Creates a memo with a setter: reads behave exactly like
/// [`create_memo`]; writes run the setter untracked, which typically
/// writes back through the memo's sources.
///
/// ```
/// # use fluxion_reactive::*;
/// let (celsius, set_celsius) = create_signal(0.0_f64);
/// let fahrenheit = create_writable_memo(
///     move |_| celsius.get() * 9.0 / 5.0 + 32.0,
///     move |f| set_celsius.set((f - 32.0) * 5.0 / 9.0),
/// );
///
/// assert_eq!(fahrenheit.get(), 32.0);
/// fahrenheit.set(212.0);
/// assert_eq!(celsius.get(), 100.0);
/// ```
#[track_caller]
pub fn create_writable_memo<T>(
    f: impl Fn(Option<&T>) -> T + 'static,
    set: impl Fn(T) + 'static,
) -> WritableMemo<T>
where
    T: PartialEq + 'static,
{
    let setter: Rc<dyn Fn(Box<dyn Any>)> = Rc::new(move |boxed| {
        match boxed.downcast::<T>() {
            Ok(value) => set(*value),
            Err(_) => crate::debug_warn!(
                "writable memo setter received a value of the wrong type"
            ),
        }
    });
    WritableMemo {
        memo: Memo::build(f, Some(setter)),
    }
}

/// A [`Memo`] with write-through support. See [`create_writable_memo`].
#[derive(Debug, PartialEq, Eq)]
pub struct WritableMemo<T>
where
    T: 'static,
{
    memo: Memo<T>,
}

impl<T> Clone for WritableMemo<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for WritableMemo<T> {}

impl<T> WritableMemo<T>
where
    T: PartialEq + 'static,
{
    #[track_caller]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.memo.get()
    }

    #[track_caller]
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        self.memo.with(f)
    }

    pub fn set(&self, value: T) {
        with_runtime(|runtime| {
            let setter = {
                let subscribers = runtime.subscribers.borrow();
                match subscribers.get(self.memo.id).map(|sub| &sub.kind) {
                    Some(SubscriberKind::Derived(state)) => {
                        state.setter.clone()
                    }
                    _ => None,
                }
            };
            match setter {
                Some(setter) => {
                    runtime.untracked(|| setter(Box::new(value)))
                }
                None => crate::debug_warn!(
                    "tried to write to a memo without a setter"
                ),
            }
        });
    }

    pub fn read_only(&self) -> Memo<T> {
        self.memo
    }
}

struct MemoComputation<T, F>
where
    T: 'static,
    F: Fn(Option<&T>) -> T,
{
    f: F,
    ty: PhantomData<T>,
}

impl<T, F> AnyComputation for MemoComputation<T, F>
where
    T: PartialEq + 'static,
    F: Fn(Option<&T>) -> T,
{
    fn run(&self, value: Rc<RefCell<dyn Any>>) -> bool {
        let (new_value, changed) = {
            let value = value.borrow();
            let current = value
                .downcast_ref::<Option<T>>()
                .expect("to downcast memo value");
            let new_value = (self.f)(current.as_ref());
            let changed = current.as_ref() != Some(&new_value);
            (new_value, changed)
        };
        let mut value = value.borrow_mut();
        let value = value
            .downcast_mut::<Option<T>>()
            .expect("to downcast memo value");
        *value = Some(new_value);
        changed
    }
}
