#![forbid(unsafe_code)]

//! The virtual-tree reconciler for the Fluxion UI framework.
//!
//! A tree of typed [`VNode`]s describes what a host tree should be; the
//! renderer diffs consecutive descriptions and emits minimal mutations
//! through an injected [`HostOps`] capability set. Each component's
//! render is a [`fluxion_reactive`] effect, so reading reactive state
//! inside a render closure subscribes the component, and writes
//! re-render exactly the components that depended on them.
//!
//! The pieces:
//!
//! 1. [`VNode`]: typed node records with [`ShapeFlags`] classifying
//!    their content and [`PatchFlags`] advertising what can change.
//! 2. [`create_renderer`] / [`Renderer::render`]: the shell that owns
//!    the patch engine and the pre/render/post flush queues.
//! 3. [`Component`] and [`SetupContext`]: stateful nodes whose `setup`
//!    returns the render closure driven by a render effect.
//! 4. [`HostOps`]: the host capability set; the same engine drives DOM,
//!    native, or test backends.
//! 5. The keyed child diff: two-ended trim plus a longest-increasing-
//!    subsequence reorder that minimizes host moves.
//!
//! Teleport, suspense, and keep-alive are seams, not implementations:
//! see [`builtins`].

pub mod builtins;
mod component;
mod diff;
mod directive;
mod errors;
mod host;
mod node;
mod patch;
mod props;
mod renderer;
mod scheduler;

pub use component::{
    AsyncDep, Component, ComponentInstance, RenderFn, SetupContext,
    SetupResult,
};
pub use directive::Directive;
pub use errors::{AppErrorHandler, ErrorPhase};
pub use host::{HostOps, Namespace};
pub use node::{
    Children, Key, PatchFlags, ShapeFlags, VNode, VNodeInner, VNodeType,
};
pub use props::{PropValue, Props};
pub use renderer::{create_renderer, Renderer};

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
