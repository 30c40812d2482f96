use super::{keyed_dep, marker_dep, push_live, trigger_deps};
use crate::{
    node::{CellId, DepId},
    runtime::{with_runtime, Runtime},
    watch::{DeepSeen, DeepTrack},
};
use rustc_hash::FxHashMap;
use std::{cell::RefCell, marker::PhantomData, rc::Rc};

/// An observed sequence: the reactive-accessor rendering of an array.
///
/// Indexed reads track a dep per position; traversals track a single
/// iteration marker; `len` tracks a length marker. Length-altering
/// operations run with tracking paused inside a batch, so a subscriber
/// that both reads and grows the list does not re-trigger itself through
/// the length dep.
///
/// ```
/// # use fluxion_reactive::*;
/// let items = ReactiveList::from_items([1, 2, 3]);
/// let total = create_memo(move |_| items.to_vec().into_iter().sum::<i32>());
///
/// assert_eq!(total.get(), 6);
/// items.push(4);
/// assert_eq!(total.get(), 10);
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct ReactiveList<T>
where
    T: 'static,
{
    pub(crate) id: CellId,
    ty: PhantomData<T>,
    #[cfg(debug_assertions)]
    defined_at: &'static std::panic::Location<'static>,
}

impl<T> Clone for ReactiveList<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReactiveList<T> {}

pub(crate) struct ListCell<T> {
    data: Vec<T>,
    index_deps: FxHashMap<usize, DepId>,
    length: Option<DepId>,
    iterate: Option<DepId>,
    shallow: bool,
}

impl<T> ReactiveList<T>
where
    T: Clone + 'static,
{
    #[track_caller]
    pub fn new() -> Self {
        Self::with_data(Vec::new(), false)
    }

    #[track_caller]
    pub fn new_shallow() -> Self {
        Self::with_data(Vec::new(), true)
    }

    #[track_caller]
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        Self::with_data(items.into_iter().collect(), false)
    }

    #[track_caller]
    fn with_data(data: Vec<T>, shallow: bool) -> Self {
        let id = with_runtime(|runtime| {
            runtime.create_cell(Rc::new(RefCell::new(ListCell {
                data,
                index_deps: FxHashMap::default(),
                length: None,
                iterate: None,
                shallow,
            })))
        });
        ReactiveList {
            id,
            ty: PhantomData,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        }
    }

    fn with_cell<U>(
        &self,
        f: impl FnOnce(&Runtime, &mut ListCell<T>) -> U,
    ) -> U {
        with_runtime(|runtime| {
            let value = runtime.cell_value(self.id).expect(
                "tried to access an observed list that has been disposed",
            );
            let mut value = value.borrow_mut();
            let cell = value
                .downcast_mut::<ListCell<T>>()
                .expect("to downcast observed list cell");
            f(runtime, cell)
        })
    }

    /// Clones the item at `index`, subscribing to that position (whether
    /// or not it is currently in bounds).
    #[track_caller]
    pub fn get(&self, index: usize) -> Option<T> {
        self.with_cell(|runtime, cell| {
            let dep =
                keyed_dep(runtime, self.id, &mut cell.index_deps, &index);
            runtime.track_dep(dep);
            cell.data.get(index).cloned()
        })
    }

    /// Tracks the length marker only.
    #[track_caller]
    pub fn len(&self) -> usize {
        self.with_cell(|runtime, cell| {
            let dep = marker_dep(runtime, self.id, &mut cell.length);
            runtime.track_dep(dep);
            cell.data.len()
        })
    }

    #[track_caller]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the whole list; tracks the iteration marker once.
    #[track_caller]
    pub fn to_vec(&self) -> Vec<T> {
        self.with_cell(|runtime, cell| {
            let dep = marker_dep(runtime, self.id, &mut cell.iterate);
            runtime.track_dep(dep);
            cell.data.clone()
        })
    }

    /// Runs `f` over a snapshot, so the callback may freely read or
    /// mutate this list.
    #[track_caller]
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        for item in self.to_vec() {
            f(&item);
        }
    }

    /// First position matching the predicate; tracks iteration.
    #[track_caller]
    pub fn position(&self, mut pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.to_vec().iter().position(|item| pred(item))
    }

    #[track_caller]
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.to_vec().contains(item)
    }

    /// Overwrites the item at `index`, notifying that position's dep only
    /// if the value changed. Appending at `index == len` is an add and
    /// also notifies length and iteration. Panics out of bounds, like
    /// `Vec` indexing.
    #[track_caller]
    pub fn set(&self, index: usize, value: T)
    where
        T: PartialEq,
    {
        let to_trigger = self.with_cell(|runtime, cell| {
            let mut to_trigger = Vec::new();
            if index < cell.data.len() {
                if cell.data[index] != value {
                    cell.data[index] = value;
                    push_live(
                        runtime,
                        &mut to_trigger,
                        cell.index_deps.get(&index).copied(),
                    );
                    push_live(runtime, &mut to_trigger, cell.iterate);
                }
            } else if index == cell.data.len() {
                cell.data.push(value);
                push_live(
                    runtime,
                    &mut to_trigger,
                    cell.index_deps.get(&index).copied(),
                );
                push_live(runtime, &mut to_trigger, cell.length);
                push_live(runtime, &mut to_trigger, cell.iterate);
            } else {
                panic!(
                    "index out of bounds: the len is {} but the index is \
                     {index}",
                    cell.data.len()
                );
            }
            to_trigger
        });
        trigger_deps(to_trigger);
    }

    /// Mutates the item in place, notifying that position's dep.
    #[track_caller]
    pub fn update<U>(
        &self,
        index: usize,
        f: impl FnOnce(&mut T) -> U,
    ) -> Option<U> {
        let (result, to_trigger) = self.with_cell(|runtime, cell| {
            let mut to_trigger = Vec::new();
            let result = cell.data.get_mut(index).map(f);
            if result.is_some() {
                push_live(
                    runtime,
                    &mut to_trigger,
                    cell.index_deps.get(&index).copied(),
                );
                push_live(runtime, &mut to_trigger, cell.iterate);
            }
            (result, to_trigger)
        });
        trigger_deps(to_trigger);
        result
    }

    #[track_caller]
    pub fn push(&self, value: T) {
        let to_trigger = self.with_cell(|runtime, cell| {
            runtime.with_tracking_paused(|| {
                let mut to_trigger = Vec::new();
                let index = cell.data.len();
                cell.data.push(value);
                push_live(
                    runtime,
                    &mut to_trigger,
                    cell.index_deps.get(&index).copied(),
                );
                push_live(runtime, &mut to_trigger, cell.length);
                push_live(runtime, &mut to_trigger, cell.iterate);
                to_trigger
            })
        });
        trigger_deps(to_trigger);
    }

    #[track_caller]
    pub fn pop(&self) -> Option<T> {
        let (popped, to_trigger) = self.with_cell(|runtime, cell| {
            runtime.with_tracking_paused(|| {
                let mut to_trigger = Vec::new();
                let popped = cell.data.pop();
                if popped.is_some() {
                    let index = cell.data.len();
                    push_live(
                        runtime,
                        &mut to_trigger,
                        cell.index_deps.get(&index).copied(),
                    );
                    push_live(runtime, &mut to_trigger, cell.length);
                    push_live(runtime, &mut to_trigger, cell.iterate);
                }
                (popped, to_trigger)
            })
        });
        trigger_deps(to_trigger);
        popped
    }

    /// Inserts at `index`, shifting the tail. Every shifted position's
    /// dep is notified, plus length and iteration.
    #[track_caller]
    pub fn insert(&self, index: usize, value: T) {
        let to_trigger = self.with_cell(|runtime, cell| {
            runtime.with_tracking_paused(|| {
                let mut to_trigger = Vec::new();
                cell.data.insert(index, value);
                for (&i, &dep) in &cell.index_deps {
                    if i >= index {
                        push_live(runtime, &mut to_trigger, Some(dep));
                    }
                }
                push_live(runtime, &mut to_trigger, cell.length);
                push_live(runtime, &mut to_trigger, cell.iterate);
                to_trigger
            })
        });
        trigger_deps(to_trigger);
    }

    /// Removes the item at `index`, shifting the tail; notifies every
    /// shifted position, length, and iteration.
    #[track_caller]
    pub fn remove(&self, index: usize) -> T {
        let (removed, to_trigger) = self.with_cell(|runtime, cell| {
            runtime.with_tracking_paused(|| {
                let mut to_trigger = Vec::new();
                let removed = cell.data.remove(index);
                for (&i, &dep) in &cell.index_deps {
                    if i >= index {
                        push_live(runtime, &mut to_trigger, Some(dep));
                    }
                }
                push_live(runtime, &mut to_trigger, cell.length);
                push_live(runtime, &mut to_trigger, cell.iterate);
                (removed, to_trigger)
            })
        });
        trigger_deps(to_trigger);
        removed
    }

    #[track_caller]
    pub fn clear(&self) {
        self.truncate(0);
    }

    #[track_caller]
    pub fn truncate(&self, len: usize) {
        let to_trigger = self.with_cell(|runtime, cell| {
            runtime.with_tracking_paused(|| {
                let mut to_trigger = Vec::new();
                if len >= cell.data.len() {
                    return to_trigger;
                }
                cell.data.truncate(len);
                for (&i, &dep) in &cell.index_deps {
                    if i >= len {
                        push_live(runtime, &mut to_trigger, Some(dep));
                    }
                }
                push_live(runtime, &mut to_trigger, cell.length);
                push_live(runtime, &mut to_trigger, cell.iterate);
                to_trigger
            })
        });
        trigger_deps(to_trigger);
    }

    /// Replaces `range_len` items starting at `start` with `items`,
    /// notifying every position from `start` onward plus length and
    /// iteration.
    #[track_caller]
    pub fn splice(
        &self,
        start: usize,
        range_len: usize,
        items: impl IntoIterator<Item = T>,
    ) -> Vec<T> {
        let (removed, to_trigger) = self.with_cell(|runtime, cell| {
            runtime.with_tracking_paused(|| {
                let mut to_trigger = Vec::new();
                let end = (start + range_len).min(cell.data.len());
                let removed: Vec<T> =
                    cell.data.splice(start..end, items).collect();
                for (&i, &dep) in &cell.index_deps {
                    if i >= start {
                        push_live(runtime, &mut to_trigger, Some(dep));
                    }
                }
                push_live(runtime, &mut to_trigger, cell.length);
                push_live(runtime, &mut to_trigger, cell.iterate);
                (removed, to_trigger)
            })
        });
        trigger_deps(to_trigger);
        removed
    }

    /// Raw, untracked access to the underlying storage.
    pub fn with_raw<U>(&self, f: impl FnOnce(&Vec<T>) -> U) -> U {
        self.with_cell(|_, cell| f(&cell.data))
    }

    pub fn is_shallow(&self) -> bool {
        self.with_cell(|_, cell| cell.shallow)
    }

    pub fn read_only(&self) -> ReadOnlyList<T> {
        ReadOnlyList { inner: *self }
    }

    pub(crate) fn deep_track_cell(&self, depth: usize, seen: &mut DeepSeen)
    where
        T: DeepTrack,
    {
        if !seen.insert_cell(self.id) {
            return;
        }
        let items = self.with_cell(|runtime, cell| {
            let iterate = marker_dep(runtime, self.id, &mut cell.iterate);
            runtime.track_dep(iterate);
            let length = marker_dep(runtime, self.id, &mut cell.length);
            runtime.track_dep(length);
            if cell.shallow || depth == 0 {
                Vec::new()
            } else {
                cell.data.clone()
            }
        });
        for item in &items {
            item.deep_track(depth - 1, seen);
        }
    }
}

impl<T> Default for ReactiveList<T>
where
    T: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DeepTrack for ReactiveList<T>
where
    T: Clone + DeepTrack + 'static,
{
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
        self.deep_track_cell(depth, seen);
    }

    fn is_reactive_source(&self) -> bool {
        true
    }
}

/// A read-only view over a [`ReactiveList`]; writes are debug-warned
/// no-ops.
#[derive(Debug, PartialEq, Eq)]
pub struct ReadOnlyList<T>
where
    T: 'static,
{
    inner: ReactiveList<T>,
}

impl<T> Clone for ReadOnlyList<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReadOnlyList<T> {}

impl<T> ReadOnlyList<T>
where
    T: Clone + 'static,
{
    #[track_caller]
    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.get(index)
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
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.to_vec()
    }

    /// Warns and does nothing: the view is read-only.
    pub fn push(&self, _value: T) {
        crate::debug_warn!("push on a read-only list view is a no-op");
    }

    /// Warns and does nothing: the view is read-only.
    pub fn pop(&self) -> Option<T> {
        crate::debug_warn!("pop on a read-only list view is a no-op");
        None
    }

    /// Warns and does nothing: the view is read-only.
    pub fn clear(&self) {
        crate::debug_warn!("clear on a read-only list view is a no-op");
    }

    pub fn is_read_only(&self) -> bool {
        true
    }

    pub fn inner(&self) -> ReactiveList<T> {
        self.inner
    }
}
