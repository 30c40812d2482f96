#![forbid(unsafe_code)]

//! The fine-grained reactive graph for the Fluxion UI framework.
//!
//! Individual reactive values ("signals") trigger the code that reacts to
//! them ("effects") to re-run, and cached derivations ("memos") propagate
//! change lazily through the graph. The two halves are connected by the
//! track/trigger protocol: while a computation runs, every reactive read
//! links the value's dep to the running subscriber; a later write bumps
//! the dep's version and notifies the linked subscribers through a
//! batching scheduler that delivers each notification once, in
//! subscription order.
//!
//! The most commonly used pieces:
//!
//! 1. *Signals*: [`create_signal`], returning a ([`ReadSignal`],
//!    [`WriteSignal`]) pair, or [`create_rw_signal`] for an unsplit
//!    [`RwSignal`].
//! 2. *Memos*: [`create_memo`], a cached derived value that recomputes at
//!    most once per change and notifies only when its value changes.
//! 3. *Effects*: [`create_effect`], for synchronizing the reactive system
//!    with the outside world.
//! 4. *Observed collections*: [`ReactiveMap`], [`ReactiveList`],
//!    [`ReactiveSet`], which track reads per key and classify writes.
//! 5. *Watch*: [`watch`] and [`watch_with_options`], a declarative
//!    source→callback bridge with `immediate` / `deep` / `once` /
//!    `scheduler` options.
//! 6. *Scopes and batches*: [`Scope`] ties lifetimes together;
//!    [`batch`] coalesces a group of writes into one delivery.
//!
//! ```
//! use fluxion_reactive::*;
//!
//! let (count, set_count) = create_signal(1);
//! let double = create_memo(move |_| count.get() * 2);
//!
//! assert_eq!(double.get(), 2);
//!
//! set_count.set(10);
//! assert_eq!(double.get(), 20);
//! ```
//!
//! The engine is single-threaded and cooperative: one reactive world per
//! thread, with at most one running subscriber at any instant. Nothing
//! here is `Send`.

mod effect;
mod memo;
mod node;
mod observed;
mod runtime;
mod scope;
mod signal;
mod trigger;
mod watch;

pub use effect::*;
pub use memo::*;
pub use observed::*;
pub use runtime::{batch, end_batch, start_batch, untrack};
pub use scope::{on_scope_cleanup, Scope};
pub use signal::*;
pub use trigger::*;
pub use watch::*;

#[doc(hidden)]
#[macro_export]
macro_rules! debug_warn {
    ($($x:tt)*) => {
        {
            #[cfg(debug_assertions)]
            {
                tracing::warn!($($x)*)
            }
            #[cfg(not(debug_assertions))]
            { }
        }
    }
}
