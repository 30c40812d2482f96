use super::{keyed_dep, marker_dep, push_live, trigger_deps};
use crate::{
    node::{CellId, DepId},
    runtime::{with_runtime, Runtime},
    watch::{DeepSeen, DeepTrack},
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::{cell::RefCell, hash::Hash, marker::PhantomData, rc::Rc};

/// An observed set. Membership reads track a dep per value; `add`,
/// `remove`, and `clear` trigger, classified the same way as map writes.
///
/// ```
/// # use fluxion_reactive::*;
/// let tags = ReactiveSet::new();
/// let has_urgent = create_memo(move |_| tags.contains(&"urgent"));
///
/// assert!(!has_urgent.get());
/// tags.add("urgent");
/// assert!(has_urgent.get());
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct ReactiveSet<T>
where
    T: 'static,
{
    pub(crate) id: CellId,
    ty: PhantomData<T>,
    #[cfg(debug_assertions)]
    defined_at: &'static std::panic::Location<'static>,
}

impl<T> Clone for ReactiveSet<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReactiveSet<T> {}

pub(crate) struct SetCell<T> {
    data: FxHashSet<T>,
    value_deps: FxHashMap<T, DepId>,
    iterate: Option<DepId>,
}

impl<T> ReactiveSet<T>
where
    T: Clone + Eq + Hash + 'static,
{
    #[track_caller]
    pub fn new() -> Self {
        Self::with_data(FxHashSet::default())
    }

    #[track_caller]
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        Self::with_data(values.into_iter().collect())
    }

    #[track_caller]
    fn with_data(data: FxHashSet<T>) -> Self {
        let id = with_runtime(|runtime| {
            runtime.create_cell(Rc::new(RefCell::new(SetCell {
                data,
                value_deps: FxHashMap::default(),
                iterate: None,
            })))
        });
        ReactiveSet {
            id,
            ty: PhantomData,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        }
    }

    fn with_cell<U>(
        &self,
        f: impl FnOnce(&Runtime, &mut SetCell<T>) -> U,
    ) -> U {
        with_runtime(|runtime| {
            let value = runtime.cell_value(self.id).expect(
                "tried to access an observed set that has been disposed",
            );
            let mut value = value.borrow_mut();
            let cell = value
                .downcast_mut::<SetCell<T>>()
                .expect("to downcast observed set cell");
            f(runtime, cell)
        })
    }

    /// Membership test, subscribing to this particular value.
    #[track_caller]
    pub fn contains(&self, value: &T) -> bool {
        self.with_cell(|runtime, cell| {
            let dep =
                keyed_dep(runtime, self.id, &mut cell.value_deps, value);
            runtime.track_dep(dep);
            cell.data.contains(value)
        })
    }

    #[track_caller]
    pub fn len(&self) -> usize {
        self.with_cell(|runtime, cell| {
            let dep = marker_dep(runtime, self.id, &mut cell.iterate);
            runtime.track_dep(dep);
            cell.data.len()
        })
    }

    #[track_caller]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the members; tracks iteration.
    #[track_caller]
    pub fn values(&self) -> Vec<T> {
        self.with_cell(|runtime, cell| {
            let dep = marker_dep(runtime, self.id, &mut cell.iterate);
            runtime.track_dep(dep);
            cell.data.iter().cloned().collect()
        })
    }

    #[track_caller]
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        for value in self.values() {
            f(&value);
        }
    }

    /// Adds a value; a genuinely new member notifies its dep and
    /// iteration.
    #[track_caller]
    pub fn add(&self, value: T) -> bool {
        let (added, to_trigger) = self.with_cell(|runtime, cell| {
            let mut to_trigger = Vec::new();
            let added = cell.data.insert(value.clone());
            if added {
                push_live(
                    runtime,
                    &mut to_trigger,
                    cell.value_deps.get(&value).copied(),
                );
                push_live(runtime, &mut to_trigger, cell.iterate);
            }
            (added, to_trigger)
        });
        trigger_deps(to_trigger);
        added
    }

    /// Removes a value; a removed member notifies its dep and iteration.
    #[track_caller]
    pub fn remove(&self, value: &T) -> bool {
        let (removed, to_trigger) = self.with_cell(|runtime, cell| {
            let mut to_trigger = Vec::new();
            let removed = cell.data.remove(value);
            if removed {
                push_live(
                    runtime,
                    &mut to_trigger,
                    cell.value_deps.get(value).copied(),
                );
                push_live(runtime, &mut to_trigger, cell.iterate);
            }
            (removed, to_trigger)
        });
        trigger_deps(to_trigger);
        removed
    }

    /// Empties the set, notifying every tracked value at once.
    #[track_caller]
    pub fn clear(&self) {
        let to_trigger = self.with_cell(|runtime, cell| {
            let mut to_trigger = Vec::new();
            if cell.data.is_empty() {
                return to_trigger;
            }
            cell.data.clear();
            for dep in cell.value_deps.values() {
                push_live(runtime, &mut to_trigger, Some(*dep));
            }
            push_live(runtime, &mut to_trigger, cell.iterate);
            to_trigger
        });
        trigger_deps(to_trigger);
    }

    /// Raw, untracked access to the underlying storage.
    pub fn with_raw<U>(&self, f: impl FnOnce(&FxHashSet<T>) -> U) -> U {
        self.with_cell(|_, cell| f(&cell.data))
    }

    pub fn read_only(&self) -> ReadOnlySet<T> {
        ReadOnlySet { inner: *self }
    }
}

impl<T> Default for ReactiveSet<T>
where
    T: Clone + Eq + Hash + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DeepTrack for ReactiveSet<T>
where
    T: Clone + Eq + Hash + 'static,
{
    fn deep_track(&self, _depth: usize, seen: &mut DeepSeen) {
        if !seen.insert_cell(self.id) {
            return;
        }
        // set members are leaves; membership changes surface through the
        // iteration marker
        self.with_cell(|runtime, cell| {
            let dep = marker_dep(runtime, self.id, &mut cell.iterate);
            runtime.track_dep(dep);
        });
    }

    fn is_reactive_source(&self) -> bool {
        true
    }
}

/// A read-only view over a [`ReactiveSet`]; writes are debug-warned
/// no-ops.
#[derive(Debug, PartialEq, Eq)]
pub struct ReadOnlySet<T>
where
    T: 'static,
{
    inner: ReactiveSet<T>,
}

impl<T> Clone for ReadOnlySet<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReadOnlySet<T> {}

impl<T> ReadOnlySet<T>
where
    T: Clone + Eq + Hash + 'static,
{
    #[track_caller]
    pub fn contains(&self, value: &T) -> bool {
        self.inner.contains(value)
    }

    #[track_caller]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[track_caller]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[track_caller]
    pub fn values(&self) -> Vec<T> {
        self.inner.values()
    }

    /// Warns and does nothing: the view is read-only.
    pub fn add(&self, _value: T) -> bool {
        crate::debug_warn!("add on a read-only set view is a no-op");
        false
    }

    /// Warns and does nothing: the view is read-only.
    pub fn remove(&self, _value: &T) -> bool {
        crate::debug_warn!("remove on a read-only set view is a no-op");
        false
    }

    /// Warns and does nothing: the view is read-only.
    pub fn clear(&self) {
        crate::debug_warn!("clear on a read-only set view is a no-op");
    }

    pub fn is_read_only(&self) -> bool {
        true
    }

    pub fn inner(&self) -> ReactiveSet<T> {
        self.inner
    }
}
