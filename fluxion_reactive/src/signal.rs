use crate::{
    node::DepId,
    runtime::{with_runtime, Runtime},
};
use std::{any::Any, cell::RefCell, marker::PhantomData, rc::Rc};
use thiserror::Error;

/// Creates a signal, the basic reactive primitive: a single observable
/// value, returned as a (getter, setter) pair.
///
/// Reading the value inside an effect or derived value subscribes it;
/// writing re-runs every subscriber.
///
/// ```
/// # use fluxion_reactive::*;
/// let (count, set_count) = create_signal(0);
///
/// assert_eq!(count.get(), 0);
/// set_count.set(1);
/// assert_eq!(count.get(), 1);
/// set_count.update(|n| *n += 1);
/// assert_eq!(count.get(), 2);
/// ```
#[track_caller]
pub fn create_signal<T>(value: T) -> (ReadSignal<T>, WriteSignal<T>)
where
    T: 'static,
{
    let id = with_runtime(|runtime| {
        runtime.create_value_dep(Some(
            Rc::new(RefCell::new(value)) as Rc<RefCell<dyn Any>>
        ))
    });
    (
        ReadSignal {
            id,
            ty: PhantomData,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        },
        WriteSignal {
            id,
            ty: PhantomData,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        },
    )
}

/// Creates a signal without read/write segregation.
#[track_caller]
pub fn create_rw_signal<T>(value: T) -> RwSignal<T>
where
    T: 'static,
{
    let (read, _) = create_signal(value);
    RwSignal {
        id: read.id,
        ty: PhantomData,
        #[cfg(debug_assertions)]
        defined_at: std::panic::Location::caller(),
    }
}

/// The getter half of a signal.
#[derive(Debug, PartialEq, Eq)]
pub struct ReadSignal<T>
where
    T: 'static,
{
    pub(crate) id: DepId,
    pub(crate) ty: PhantomData<T>,
    #[cfg(debug_assertions)]
    pub(crate) defined_at: &'static std::panic::Location<'static>,
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReadSignal<T> {}

impl<T> ReadSignal<T>
where
    T: 'static,
{
    /// Clones and returns the current value, subscribing the running
    /// subscriber.
    #[track_caller]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Like [`get`](Self::get), but returns `None` rather than panicking
    /// if the signal has been disposed.
    pub fn try_get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.try_with(T::clone).ok()
    }

    /// Applies a closure to the current value, subscribing the running
    /// subscriber.
    #[track_caller]
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        self.try_with(f)
            .expect("tried to access a signal that has been disposed")
    }

    pub fn try_with<U>(
        &self,
        f: impl FnOnce(&T) -> U,
    ) -> Result<U, SignalError> {
        with_runtime(|runtime| self.id.try_with(runtime, f))
    }

    /// Clones and returns the current value without subscribing anything.
    #[track_caller]
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.with_untracked(T::clone)
    }

    #[track_caller]
    pub fn with_untracked<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        with_runtime(|runtime| self.id.try_with_no_subscription(runtime, f))
            .expect("tried to access a signal that has been disposed")
    }
}

/// The setter half of a signal.
#[derive(Debug, PartialEq, Eq)]
pub struct WriteSignal<T>
where
    T: 'static,
{
    pub(crate) id: DepId,
    pub(crate) ty: PhantomData<T>,
    #[cfg(debug_assertions)]
    pub(crate) defined_at: &'static std::panic::Location<'static>,
}

impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for WriteSignal<T> {}

impl<T> WriteSignal<T>
where
    T: 'static,
{
    /// Replaces the value and notifies subscribers.
    #[track_caller]
    pub fn set(&self, value: T) {
        self.update(|v| *v = value);
    }

    pub fn try_set(&self, value: T) -> Option<()> {
        self.try_update(|v| *v = value)
    }

    /// Mutates the value in place and notifies subscribers.
    #[track_caller]
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.try_update(f)
            .expect("tried to update a signal that has been disposed");
    }

    pub fn try_update<U>(&self, f: impl FnOnce(&mut T) -> U) -> Option<U> {
        with_runtime(|runtime| self.id.update(runtime, f))
    }

    /// Mutates the value without notifying anyone.
    pub fn update_untracked(&self, f: impl FnOnce(&mut T)) {
        with_runtime(|runtime| self.id.update_with_no_effect(runtime, f));
    }
}

/// A signal that can be both read and written through one handle.
///
/// ```
/// # use fluxion_reactive::*;
/// let count = create_rw_signal(0);
/// count.set(1);
/// assert_eq!(count.get(), 1);
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct RwSignal<T>
where
    T: 'static,
{
    pub(crate) id: DepId,
    pub(crate) ty: PhantomData<T>,
    #[cfg(debug_assertions)]
    pub(crate) defined_at: &'static std::panic::Location<'static>,
}

impl<T> Clone for RwSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RwSignal<T> {}

impl<T> RwSignal<T>
where
    T: 'static,
{
    #[track_caller]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.read_only().get()
    }

    pub fn try_get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.read_only().try_get()
    }

    #[track_caller]
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        self.read_only().with(f)
    }

    #[track_caller]
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.read_only().get_untracked()
    }

    #[track_caller]
    pub fn with_untracked<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        self.read_only().with_untracked(f)
    }

    #[track_caller]
    pub fn set(&self, value: T) {
        self.write_only().set(value);
    }

    #[track_caller]
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.write_only().update(f);
    }

    pub fn update_untracked(&self, f: impl FnOnce(&mut T)) {
        self.write_only().update_untracked(f);
    }

    /// Returns a read-only handle to the signal.
    #[track_caller]
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            id: self.id,
            ty: PhantomData,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        }
    }

    /// Returns a write-only handle to the signal.
    #[track_caller]
    pub fn write_only(&self) -> WriteSignal<T> {
        WriteSignal {
            id: self.id,
            ty: PhantomData,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        }
    }

    /// Splits the signal into its getter and setter halves.
    #[track_caller]
    pub fn split(&self) -> (ReadSignal<T>, WriteSignal<T>) {
        (self.read_only(), self.write_only())
    }
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("tried to access a signal that has been disposed")]
    Disposed,
    #[error("error casting signal to type {0}")]
    Type(&'static str),
}

impl DepId {
    pub(crate) fn subscribe(&self, runtime: &Runtime) {
        runtime.track_dep(*self);
    }

    pub(crate) fn try_with_no_subscription<T, U>(
        &self,
        runtime: &Runtime,
        f: impl FnOnce(&T) -> U,
    ) -> Result<U, SignalError>
    where
        T: 'static,
    {
        let value = {
            let deps = runtime.deps.borrow();
            let dep = deps.get(*self).ok_or(SignalError::Disposed)?;
            dep.value()
        };
        let value = value.borrow();
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| SignalError::Type(std::any::type_name::<T>()))?;
        Ok(f(value))
    }

    pub(crate) fn try_with<T, U>(
        &self,
        runtime: &Runtime,
        f: impl FnOnce(&T) -> U,
    ) -> Result<U, SignalError>
    where
        T: 'static,
    {
        self.subscribe(runtime);
        self.try_with_no_subscription(runtime, f)
    }

    /// Updates the stored value, then bumps the dep's version and notifies
    /// subscribers.
    pub(crate) fn update<T, U>(
        &self,
        runtime: &Runtime,
        f: impl FnOnce(&mut T) -> U,
    ) -> Option<U>
    where
        T: 'static,
    {
        let updated = self.update_with_no_effect(runtime, f);
        if updated.is_some() {
            runtime.trigger_dep(*self);
        }
        updated
    }

    pub(crate) fn update_with_no_effect<T, U>(
        &self,
        runtime: &Runtime,
        f: impl FnOnce(&mut T) -> U,
    ) -> Option<U>
    where
        T: 'static,
    {
        let value = {
            let deps = runtime.deps.borrow();
            deps.get(*self).map(|dep| dep.value())
        };
        match value {
            Some(value) => {
                let mut value = value.borrow_mut();
                match value.downcast_mut::<T>() {
                    Some(value) => Some(f(value)),
                    None => {
                        crate::debug_warn!(
                            "[Signal::update] failed when downcasting to \
                             Signal<{}>",
                            std::any::type_name::<T>()
                        );
                        None
                    }
                }
            }
            None => {
                crate::debug_warn!(
                    "[Signal::update] tried to update a Signal<{}> that has \
                     already been disposed",
                    std::any::type_name::<T>()
                );
                None
            }
        }
    }
}
