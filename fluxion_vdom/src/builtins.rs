//! Interfaces for the built-in higher-level wrappers.
//!
//! Teleport, suspense, and keep-alive are not implemented by the core;
//! the patch engine only defines the seams it calls into. A host or
//! framework layer installs concrete handlers on the renderer; without
//! one, teleport and suspense nodes degrade to fragments with a debug
//! warning, and keep-alive shapes mount and unmount normally.

use crate::{
    component::ComponentInstance,
    host::{HostOps, Namespace},
    node::VNode,
    renderer::Renderer,
};
use std::rc::Rc;

/// The slice of renderer internals module-level handlers drive patching
/// through.
pub struct RendererInternals<'a, H: HostOps> {
    pub(crate) renderer: &'a Rc<Renderer<H>>,
}

impl<H: HostOps> RendererInternals<'_, H> {
    pub fn host(&self) -> &H {
        self.renderer.host()
    }

    pub fn patch(
        &self,
        old: Option<&VNode<H::Node>>,
        new: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
    ) {
        self.renderer
            .patch(old, new, container, anchor, parent, namespace, false);
    }

    pub fn unmount(
        &self,
        vnode: &VNode<H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        do_remove: bool,
    ) {
        self.renderer.unmount(vnode, parent, do_remove);
    }

    pub fn move_node(
        &self,
        vnode: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) {
        self.renderer.move_node(vnode, container, anchor);
    }
}

/// Handles nodes carrying the TELEPORT shape.
pub trait TeleportHandler<H: HostOps> {
    fn process(
        &self,
        internals: &RendererInternals<'_, H>,
        old: Option<&VNode<H::Node>>,
        new: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
        namespace: Namespace,
    );

    fn unmount(
        &self,
        internals: &RendererInternals<'_, H>,
        vnode: &VNode<H::Node>,
        do_remove: bool,
    );

    fn move_node(
        &self,
        internals: &RendererInternals<'_, H>,
        vnode: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    );
}

/// Handles nodes carrying the SUSPENSE shape, and owns async component
/// dependencies.
pub trait SuspenseHandler<H: HostOps> {
    fn process(
        &self,
        internals: &RendererInternals<'_, H>,
        old: Option<&VNode<H::Node>>,
        new: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
        namespace: Namespace,
    );

    /// A component inside the boundary produced a pending async dep.
    fn register_dep(&self, instance: &Rc<ComponentInstance<H::Node>>);

    /// A registered dep resolved; the boundary resolves itself when its
    /// dep count reaches zero.
    fn resolve_dep(&self, instance: &Rc<ComponentInstance<H::Node>>);

    /// A registered dep unmounted before resolving.
    fn dep_unmounted(&self, instance: &Rc<ComponentInstance<H::Node>>);
}

/// Handles activation and deactivation of SHOULD_KEEP_ALIVE / KEPT_ALIVE
/// component shapes.
pub trait KeepAliveContext<N: 'static> {
    /// Re-inserts a cached subtree instead of mounting fresh.
    fn activate(&self, vnode: &VNode<N>, container: &N, anchor: Option<&N>);

    /// Stashes the subtree instead of destroying it.
    fn deactivate(&self, vnode: &VNode<N>);
}
