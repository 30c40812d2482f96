use super::{keyed_dep, marker_dep, push_live, trigger_deps};
use crate::{
    node::{CellId, DepId},
    runtime::{with_runtime, Runtime},
    watch::{DeepSeen, DeepTrack},
};
use rustc_hash::FxHashMap;
use std::{cell::RefCell, hash::Hash, marker::PhantomData, rc::Rc};

/// An observed keyed collection: the reactive-accessor rendering of a
/// record or map.
///
/// Reads track a dep per key (plus iteration and key-set markers); writes
/// classify themselves and notify only what they disturbed. Adding or
/// removing a key invalidates iteration; overwriting an existing key with
/// an equal value notifies nobody.
///
/// ```
/// # use fluxion_reactive::*;
/// let scores = ReactiveMap::new();
/// scores.insert("alice".to_string(), 1);
///
/// let alice = create_memo(move |_| scores.get(&"alice".to_string()));
/// assert_eq!(alice.get(), Some(1));
///
/// scores.insert("alice".to_string(), 5);
/// assert_eq!(alice.get(), Some(5));
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct ReactiveMap<K, V>
where
    K: 'static,
    V: 'static,
{
    pub(crate) id: CellId,
    ty: PhantomData<(K, V)>,
    #[cfg(debug_assertions)]
    defined_at: &'static std::panic::Location<'static>,
}

impl<K, V> Clone for ReactiveMap<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for ReactiveMap<K, V> {}

pub(crate) struct MapCell<K, V> {
    data: FxHashMap<K, V>,
    key_deps: FxHashMap<K, DepId>,
    iterate: Option<DepId>,
    keys_iterate: Option<DepId>,
    shallow: bool,
}

impl<K, V> ReactiveMap<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + 'static,
{
    #[track_caller]
    pub fn new() -> Self {
        Self::with_data(FxHashMap::default(), false)
    }

    /// A map whose values are left out of deep watch traversal.
    #[track_caller]
    pub fn new_shallow() -> Self {
        Self::with_data(FxHashMap::default(), true)
    }

    #[track_caller]
    pub fn from_entries(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::with_data(entries.into_iter().collect(), false)
    }

    #[track_caller]
    fn with_data(data: FxHashMap<K, V>, shallow: bool) -> Self {
        let id = with_runtime(|runtime| {
            runtime.create_cell(Rc::new(RefCell::new(MapCell {
                data,
                key_deps: FxHashMap::default(),
                iterate: None,
                keys_iterate: None,
                shallow,
            })))
        });
        ReactiveMap {
            id,
            ty: PhantomData,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        }
    }

    fn with_cell<U>(
        &self,
        f: impl FnOnce(&Runtime, &mut MapCell<K, V>) -> U,
    ) -> U {
        with_runtime(|runtime| {
            let value = runtime
                .cell_value(self.id)
                .expect("tried to access an observed map that has been disposed");
            let mut value = value.borrow_mut();
            let cell = value
                .downcast_mut::<MapCell<K, V>>()
                .expect("to downcast observed map cell");
            f(runtime, cell)
        })
    }

    /// Clones the value for `key`, subscribing the running subscriber to
    /// that key (whether or not it is present).
    #[track_caller]
    pub fn get(&self, key: &K) -> Option<V> {
        self.with_cell(|runtime, cell| {
            let dep = keyed_dep(runtime, self.id, &mut cell.key_deps, key);
            runtime.track_dep(dep);
            cell.data.get(key).cloned()
        })
    }

    #[track_caller]
    pub fn contains_key(&self, key: &K) -> bool {
        self.with_cell(|runtime, cell| {
            let dep = keyed_dep(runtime, self.id, &mut cell.key_deps, key);
            runtime.track_dep(dep);
            cell.data.contains_key(key)
        })
    }

    /// Tracks iteration: any add, delete, or clear re-runs the subscriber.
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

    /// Snapshot of the keys; tracks the key-set marker, which changes only
    /// when keys are added or removed (not when values are overwritten).
    #[track_caller]
    pub fn keys(&self) -> Vec<K> {
        self.with_cell(|runtime, cell| {
            let dep = marker_dep(runtime, self.id, &mut cell.keys_iterate);
            runtime.track_dep(dep);
            cell.data.keys().cloned().collect()
        })
    }

    /// Snapshot of the values; tracks iteration.
    #[track_caller]
    pub fn values(&self) -> Vec<V> {
        self.with_cell(|runtime, cell| {
            let dep = marker_dep(runtime, self.id, &mut cell.iterate);
            runtime.track_dep(dep);
            cell.data.values().cloned().collect()
        })
    }

    /// Snapshot of the entries; tracks iteration.
    #[track_caller]
    pub fn entries(&self) -> Vec<(K, V)> {
        self.with_cell(|runtime, cell| {
            let dep = marker_dep(runtime, self.id, &mut cell.iterate);
            runtime.track_dep(dep);
            cell.data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    /// Runs `f` on a snapshot of every entry, so the callback may freely
    /// read or mutate this map.
    #[track_caller]
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        for (key, value) in self.entries() {
            f(&key, &value);
        }
    }

    /// Inserts a value. A brand-new key notifies the key's dep plus the
    /// iteration and key-set markers; overwriting notifies the key's dep
    /// only if the value changed.
    #[track_caller]
    pub fn insert(&self, key: K, value: V) -> Option<V>
    where
        V: PartialEq,
    {
        let (prev, to_trigger) = self.with_cell(|runtime, cell| {
            let mut to_trigger = Vec::new();
            enum Kind {
                Add,
                Set,
                Unchanged,
            }
            let kind = match cell.data.get(&key) {
                None => Kind::Add,
                Some(old) if *old != value => Kind::Set,
                Some(_) => Kind::Unchanged,
            };
            let prev = cell.data.insert(key.clone(), value);
            match kind {
                Kind::Add => {
                    push_live(
                        runtime,
                        &mut to_trigger,
                        cell.key_deps.get(&key).copied(),
                    );
                    push_live(runtime, &mut to_trigger, cell.iterate);
                    push_live(runtime, &mut to_trigger, cell.keys_iterate);
                }
                Kind::Set => {
                    push_live(
                        runtime,
                        &mut to_trigger,
                        cell.key_deps.get(&key).copied(),
                    );
                    // value overwrites are visible to iteration, though not
                    // to the key set
                    push_live(runtime, &mut to_trigger, cell.iterate);
                }
                Kind::Unchanged => {}
            }
            (prev, to_trigger)
        });
        trigger_deps(to_trigger);
        prev
    }

    /// Mutates a value in place, notifying the key's dep.
    #[track_caller]
    pub fn update<U>(
        &self,
        key: &K,
        f: impl FnOnce(&mut V) -> U,
    ) -> Option<U> {
        let (result, to_trigger) = self.with_cell(|runtime, cell| {
            let mut to_trigger = Vec::new();
            let result = cell.data.get_mut(key).map(f);
            if result.is_some() {
                push_live(
                    runtime,
                    &mut to_trigger,
                    cell.key_deps.get(key).copied(),
                );
                push_live(runtime, &mut to_trigger, cell.iterate);
            }
            (result, to_trigger)
        });
        trigger_deps(to_trigger);
        result
    }

    /// Removes a key, notifying its dep plus the iteration and key-set
    /// markers.
    #[track_caller]
    pub fn remove(&self, key: &K) -> Option<V> {
        let (prev, to_trigger) = self.with_cell(|runtime, cell| {
            let mut to_trigger = Vec::new();
            let prev = cell.data.remove(key);
            if prev.is_some() {
                push_live(
                    runtime,
                    &mut to_trigger,
                    cell.key_deps.get(key).copied(),
                );
                push_live(runtime, &mut to_trigger, cell.iterate);
                push_live(runtime, &mut to_trigger, cell.keys_iterate);
            }
            (prev, to_trigger)
        });
        trigger_deps(to_trigger);
        prev
    }

    /// Empties the map, notifying every tracked key at once.
    #[track_caller]
    pub fn clear(&self) {
        let to_trigger = self.with_cell(|runtime, cell| {
            let mut to_trigger = Vec::new();
            if cell.data.is_empty() {
                return to_trigger;
            }
            cell.data.clear();
            for dep in cell.key_deps.values() {
                push_live(runtime, &mut to_trigger, Some(*dep));
            }
            push_live(runtime, &mut to_trigger, cell.iterate);
            push_live(runtime, &mut to_trigger, cell.keys_iterate);
            to_trigger
        });
        trigger_deps(to_trigger);
    }

    /// Raw, untracked access to the underlying storage.
    pub fn with_raw<U>(&self, f: impl FnOnce(&FxHashMap<K, V>) -> U) -> U {
        self.with_cell(|_, cell| f(&cell.data))
    }

    pub fn is_shallow(&self) -> bool {
        self.with_cell(|_, cell| cell.shallow)
    }

    /// A read-only view sharing this map's identity.
    pub fn read_only(&self) -> ReadOnlyMap<K, V> {
        ReadOnlyMap { inner: *self }
    }

    pub(crate) fn deep_track_cell(&self, depth: usize, seen: &mut DeepSeen)
    where
        V: DeepTrack,
    {
        if !seen.insert_cell(self.id) {
            return;
        }
        let values = self.with_cell(|runtime, cell| {
            let iterate = marker_dep(runtime, self.id, &mut cell.iterate);
            runtime.track_dep(iterate);
            let keys_iterate =
                marker_dep(runtime, self.id, &mut cell.keys_iterate);
            runtime.track_dep(keys_iterate);
            let keys: Vec<K> = cell.data.keys().cloned().collect();
            for key in &keys {
                let dep =
                    keyed_dep(runtime, self.id, &mut cell.key_deps, key);
                runtime.track_dep(dep);
            }
            if cell.shallow || depth == 0 {
                Vec::new()
            } else {
                cell.data.values().cloned().collect::<Vec<V>>()
            }
        });
        for value in &values {
            value.deep_track(depth - 1, seen);
        }
    }
}

impl<K, V> Default for ReactiveMap<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> DeepTrack for ReactiveMap<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + DeepTrack + 'static,
{
    fn deep_track(&self, depth: usize, seen: &mut DeepSeen) {
        self.deep_track_cell(depth, seen);
    }

    fn is_reactive_source(&self) -> bool {
        true
    }
}

/// A read-only view over a [`ReactiveMap`]. Reads track exactly like the
/// underlying map; writes are debug-warned no-ops.
#[derive(Debug, PartialEq, Eq)]
pub struct ReadOnlyMap<K, V>
where
    K: 'static,
    V: 'static,
{
    inner: ReactiveMap<K, V>,
}

impl<K, V> Clone for ReadOnlyMap<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for ReadOnlyMap<K, V> {}

impl<K, V> ReadOnlyMap<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + 'static,
{
    #[track_caller]
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    #[track_caller]
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
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
    pub fn keys(&self) -> Vec<K> {
        self.inner.keys()
    }

    #[track_caller]
    pub fn values(&self) -> Vec<V> {
        self.inner.values()
    }

    #[track_caller]
    pub fn entries(&self) -> Vec<(K, V)> {
        self.inner.entries()
    }

    /// Warns and does nothing: the view is read-only.
    pub fn insert(&self, _key: K, _value: V) -> Option<V> {
        crate::debug_warn!("insert on a read-only map view is a no-op");
        None
    }

    /// Warns and does nothing: the view is read-only.
    pub fn remove(&self, _key: &K) -> Option<V> {
        crate::debug_warn!("remove on a read-only map view is a no-op");
        None
    }

    /// Warns and does nothing: the view is read-only.
    pub fn clear(&self) {
        crate::debug_warn!("clear on a read-only map view is a no-op");
    }

    pub fn is_read_only(&self) -> bool {
        true
    }

    /// The underlying map: `view.inner()` is identical to the map the view
    /// was made from.
    pub fn inner(&self) -> ReactiveMap<K, V> {
        self.inner
    }
}
