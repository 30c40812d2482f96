use crate::{
    node::{CellId, DepId, SubscriberId},
    runtime::{with_runtime, Runtime},
};

slotmap::new_key_type! {
    /// Unique ID assigned to a scope.
    pub struct ScopeId;
}

/// Everything a scope owns and must dispose of with itself.
pub(crate) enum ScopeProperty {
    Dep(DepId),
    Subscriber(SubscriberId),
    Cell(CellId),
}

pub(crate) struct ScopeNode {
    pub parent: Option<ScopeId>,
    /// Position in the parent's child list, kept in sync across
    /// swap-removals so detaching is O(1).
    pub index_in_parent: usize,
    pub paused: bool,
    pub properties: Vec<ScopeProperty>,
    pub children: Vec<ScopeId>,
    pub cleanups: Vec<Box<dyn FnOnce()>>,
}

/// A hierarchical container that owns effects, derived values, signals, and
/// child scopes, and disposes of all of them together.
///
/// Scopes form a tree rooted at whichever scope is active when a new one is
/// created. Reactive primitives created while a scope is [running](Scope::run)
/// are owned by it: stopping the scope stops its effects, runs its cleanup
/// callbacks, stops its child scopes, and removes it from its parent.
///
/// ```
/// # use fluxion_reactive::*;
/// let scope = Scope::new();
/// let count = scope.run(|| {
///     let (count, set_count) = create_signal(0);
///     create_effect(move |_| {
///         let _ = count.get();
///     });
///     set_count.set(1);
///     count
/// });
/// assert_eq!(count.get(), 1);
/// scope.stop();
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scope {
    pub(crate) id: ScopeId,
}

impl Scope {
    /// Creates a scope attached to the currently-active scope, if any.
    #[track_caller]
    pub fn new() -> Self {
        Self::create(false)
    }

    /// Creates a scope with no parent; it must be stopped explicitly.
    #[track_caller]
    pub fn detached() -> Self {
        Self::create(true)
    }

    fn create(detached: bool) -> Self {
        with_runtime(|runtime| {
            let parent = if detached {
                None
            } else {
                runtime.active_scope.get()
            };
            let mut scopes = runtime.scopes.borrow_mut();
            let paused = parent
                .and_then(|p| scopes.get(p).map(|s| s.paused))
                .unwrap_or(false);
            let id = scopes.insert(ScopeNode {
                parent,
                index_in_parent: 0,
                paused,
                properties: Vec::new(),
                children: Vec::new(),
                cleanups: Vec::new(),
            });
            if let Some(parent) = parent {
                let index = scopes[parent].children.len();
                scopes[parent].children.push(id);
                scopes[id].index_in_parent = index;
            }
            Scope { id }
        })
    }

    /// Runs the closure with this scope active, then restores the
    /// previously-active scope.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        with_runtime(|runtime| {
            let _guard = ActiveScopeGuard {
                runtime,
                prev: runtime.active_scope.replace(Some(self.id)),
            };
            f()
        })
    }

    /// Whether the scope has not yet been stopped.
    pub fn is_alive(&self) -> bool {
        with_runtime(|runtime| runtime.scopes.borrow().contains_key(self.id))
    }

    pub fn is_paused(&self) -> bool {
        with_runtime(|runtime| {
            runtime
                .scopes
                .borrow()
                .get(self.id)
                .map(|s| s.paused)
                .unwrap_or(false)
        })
    }

    /// Pauses every effect owned by this scope and its descendants.
    /// Triggers arriving while paused are parked (at most one per effect)
    /// and replayed on [`resume`](Scope::resume).
    pub fn pause(&self) {
        with_runtime(|runtime| runtime.pause_scope(self.id));
    }

    pub fn resume(&self) {
        with_runtime(|runtime| runtime.resume_scope(self.id));
    }

    /// Stops every owned effect, runs cleanup callbacks, stops child
    /// scopes, and detaches from the parent in O(1) via the saved index.
    pub fn stop(self) {
        with_runtime(|runtime| runtime.stop_scope(self.id, true));
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers a callback to run when the active scope is stopped.
///
/// Does nothing (with a debug warning) outside any scope.
pub fn on_scope_cleanup(f: impl FnOnce() + 'static) {
    with_runtime(|runtime| {
        let Some(scope_id) = runtime.active_scope.get() else {
            crate::debug_warn!(
                "on_scope_cleanup called outside a scope; the callback will \
                 never run"
            );
            return;
        };
        if let Some(scope) = runtime.scopes.borrow_mut().get_mut(scope_id) {
            scope.cleanups.push(Box::new(f));
        }
    });
}

struct ActiveScopeGuard<'a> {
    runtime: &'a Runtime,
    prev: Option<ScopeId>,
}

impl Drop for ActiveScopeGuard<'_> {
    fn drop(&mut self) {
        self.runtime.active_scope.set(self.prev);
    }
}

impl Runtime {
    pub(crate) fn pause_scope(&self, id: ScopeId) {
        let (subs, children) = {
            let mut scopes = self.scopes.borrow_mut();
            let Some(scope) = scopes.get_mut(id) else {
                return;
            };
            scope.paused = true;
            (
                scope_subscribers(scope),
                scope.children.clone(),
            )
        };
        for sub in subs {
            self.pause_subscriber(sub);
        }
        for child in children {
            self.pause_scope(child);
        }
    }

    pub(crate) fn resume_scope(&self, id: ScopeId) {
        let (subs, children) = {
            let mut scopes = self.scopes.borrow_mut();
            let Some(scope) = scopes.get_mut(id) else {
                return;
            };
            scope.paused = false;
            (
                scope_subscribers(scope),
                scope.children.clone(),
            )
        };
        for sub in subs {
            self.resume_subscriber(sub);
        }
        for child in children {
            self.resume_scope(child);
        }
    }

    pub(crate) fn stop_scope(&self, id: ScopeId, detach: bool) {
        let (children, properties, cleanups, parent, index) = {
            let mut scopes = self.scopes.borrow_mut();
            let Some(scope) = scopes.get_mut(id) else {
                return;
            };
            (
                std::mem::take(&mut scope.children),
                std::mem::take(&mut scope.properties),
                std::mem::take(&mut scope.cleanups),
                scope.parent,
                scope.index_in_parent,
            )
        };
        for sub in properties.iter().filter_map(|p| match p {
            ScopeProperty::Subscriber(sub) => Some(*sub),
            _ => None,
        }) {
            self.stop_subscriber(sub);
        }
        for cleanup in cleanups {
            cleanup();
        }
        for child in children {
            // children skip the parent-detach step; this scope's child
            // list has already been taken
            self.stop_scope(child, false);
        }
        for property in properties {
            match property {
                ScopeProperty::Dep(dep) => self.dispose_dep(dep),
                ScopeProperty::Subscriber(sub) => {
                    self.dispose_subscriber(sub)
                }
                ScopeProperty::Cell(cell) => self.dispose_cell(cell),
            }
        }
        if self.active_scope.get() == Some(id) {
            self.active_scope.set(parent);
        }
        self.scopes.borrow_mut().remove(id);
        if detach {
            if let Some(parent) = parent {
                let mut scopes = self.scopes.borrow_mut();
                let moved = match scopes.get_mut(parent) {
                    Some(parent_scope)
                        if parent_scope.children.get(index) == Some(&id) =>
                    {
                        parent_scope.children.swap_remove(index);
                        parent_scope.children.get(index).copied()
                    }
                    _ => None,
                };
                if let Some(moved) = moved {
                    if let Some(scope) = scopes.get_mut(moved) {
                        scope.index_in_parent = index;
                    }
                }
            }
        }
    }
}

fn scope_subscribers(scope: &ScopeNode) -> Vec<SubscriberId> {
    scope
        .properties
        .iter()
        .filter_map(|p| match p {
            ScopeProperty::Subscriber(sub) => Some(*sub),
            _ => None,
        })
        .collect()
}
