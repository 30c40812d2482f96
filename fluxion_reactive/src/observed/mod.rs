//! Observation layers over the host collection shapes.
//!
//! Rust has no general proxy facility, so the interception layer is an
//! explicit reactive-accessor API: every read routes through a per-key dep
//! (created lazily on first track, reclaimed when its last subscriber
//! unlinks), and every write classifies itself as an add, set, delete, or
//! clear and triggers the affected deps inside one batch. Iteration and
//! length reads track dedicated marker deps so length-agnostic traversals
//! rebuild cleanly.

mod list;
mod map;
mod set;

pub use list::{ReactiveList, ReadOnlyList};
pub use map::{ReactiveMap, ReadOnlyMap};
pub use set::{ReactiveSet, ReadOnlySet};

use crate::{
    node::{CellId, DepId},
    runtime::{with_runtime, Runtime},
};
use rustc_hash::FxHashMap;
use std::hash::Hash;

/// Returns the live dep for `key`, lazily creating one owned by the
/// cell's key→dep table. Entries whose dep was reclaimed by the
/// zero-subscriber rule are re-created in place.
pub(crate) fn keyed_dep<K>(
    runtime: &Runtime,
    cell: CellId,
    deps: &mut FxHashMap<K, DepId>,
    key: &K,
) -> DepId
where
    K: Clone + Eq + Hash,
{
    match deps.get(key) {
        Some(&dep) if runtime.deps.borrow().contains_key(dep) => dep,
        _ => {
            let dep = runtime.create_map_dep();
            runtime.cell_register_dep(cell, dep);
            deps.insert(key.clone(), dep);
            dep
        }
    }
}

/// Returns the live marker dep in `slot` (iteration, key-set, or length),
/// creating it on first use.
pub(crate) fn marker_dep(
    runtime: &Runtime,
    cell: CellId,
    slot: &mut Option<DepId>,
) -> DepId {
    match *slot {
        Some(dep) if runtime.deps.borrow().contains_key(dep) => dep,
        _ => {
            let dep = runtime.create_map_dep();
            runtime.cell_register_dep(cell, dep);
            *slot = Some(dep);
            dep
        }
    }
}

/// Pushes a dep onto the trigger list only if it exists and is alive;
/// deps nobody ever tracked have nothing to notify.
pub(crate) fn push_live(
    runtime: &Runtime,
    list: &mut Vec<DepId>,
    dep: Option<DepId>,
) {
    if let Some(dep) = dep {
        if runtime.deps.borrow().contains_key(dep) {
            list.push(dep);
        }
    }
}

/// Delivers a write's collected notifications in one batch.
pub(crate) fn trigger_deps(deps: Vec<DepId>) {
    if deps.is_empty() {
        return;
    }
    with_runtime(|runtime| {
        runtime.start_batch();
        for dep in deps {
            runtime.trigger_dep(dep);
        }
        runtime.end_batch();
    });
}
