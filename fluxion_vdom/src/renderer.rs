use crate::{
    builtins::{KeepAliveContext, SuspenseHandler, TeleportHandler},
    component::ComponentInstance,
    errors::{AppErrorHandler, ErrorPhase},
    host::{HostOps, Namespace},
    node::VNode,
    scheduler::{Job, Scheduler},
};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

/// Creates a renderer over the given host capability set.
///
/// The same core drives any host: rendering into a container diffs the
/// new tree against whatever was rendered there before and emits the
/// minimal host mutations.
///
/// ```no_run
/// # use fluxion_vdom::*;
/// # fn demo<H: HostOps>(host: H, container: H::Node) {
/// let renderer = create_renderer(host);
/// renderer.render(Some(VNode::element_text("p", props! {}, "hi")), &container);
/// renderer.render(None, &container); // unmounts
/// # }
/// ```
pub fn create_renderer<H: HostOps>(host: H) -> Rc<Renderer<H>> {
    Rc::new(Renderer {
        host,
        scheduler: Scheduler::new(),
        uid: Cell::new(0),
        roots: RefCell::new(Vec::new()),
        error_handler: RefCell::new(None),
        teleport: RefCell::new(None),
        suspense: RefCell::new(None),
        keep_alive: RefCell::new(None),
    })
}

/// Orchestrates render-effect creation, patching, and the flush queues
/// for one host.
pub struct Renderer<H: HostOps> {
    pub(crate) host: H,
    pub(crate) scheduler: Scheduler,
    uid: Cell<u64>,
    roots: RefCell<Vec<(H::Node, VNode<H::Node>)>>,
    error_handler: RefCell<Option<AppErrorHandler>>,
    pub(crate) teleport: RefCell<Option<Rc<dyn TeleportHandler<H>>>>,
    pub(crate) suspense: RefCell<Option<Rc<dyn SuspenseHandler<H>>>>,
    pub(crate) keep_alive: RefCell<Option<Rc<dyn KeepAliveContext<H::Node>>>>,
}

impl<H: HostOps> Renderer<H> {
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Renders a tree into the container, diffing against the previous
    /// render; `None` unmounts. The whole operation runs inside a flush
    /// guard, so post-render callbacks (and any nested renders they
    /// cause) deliver exactly once, after patching settles.
    pub fn render(
        self: &Rc<Self>,
        vnode: Option<VNode<H::Node>>,
        container: &H::Node,
    ) {
        self.scheduler.with_guard(|| {
            let previous = self.take_root(container);
            match vnode {
                Some(vnode) => {
                    self.patch(
                        previous.as_ref(),
                        &vnode,
                        container,
                        None,
                        None,
                        Namespace::Html,
                        false,
                    );
                    self.roots
                        .borrow_mut()
                        .push((container.clone(), vnode));
                }
                None => {
                    if let Some(previous) = previous {
                        self.unmount(&previous, None, true);
                    }
                }
            }
        });
    }

    /// Runs a callback ahead of the current (or next) flush's render
    /// phase.
    pub fn queue_pre_flush(self: &Rc<Self>, f: impl Fn() + 'static) {
        self.scheduler.queue_pre(Job::new(None, f));
    }

    /// Runs a callback after the current (or next) flush's render phase.
    pub fn queue_post_flush(self: &Rc<Self>, f: impl Fn() + 'static) {
        self.scheduler.queue_post(Job::new(None, f));
    }

    /// Installs the application-level error sink.
    pub fn set_error_handler(&self, handler: AppErrorHandler) {
        *self.error_handler.borrow_mut() = Some(handler);
    }

    pub fn set_teleport_handler(&self, handler: Rc<dyn TeleportHandler<H>>) {
        *self.teleport.borrow_mut() = Some(handler);
    }

    pub fn set_suspense_handler(&self, handler: Rc<dyn SuspenseHandler<H>>) {
        *self.suspense.borrow_mut() = Some(handler);
    }

    pub fn set_keep_alive_context(
        &self,
        context: Rc<dyn KeepAliveContext<H::Node>>,
    ) {
        *self.keep_alive.borrow_mut() = Some(context);
    }

    pub(crate) fn next_uid(&self) -> u64 {
        let uid = self.uid.get();
        self.uid.set(uid + 1);
        uid
    }

    fn take_root(&self, container: &H::Node) -> Option<VNode<H::Node>> {
        let mut roots = self.roots.borrow_mut();
        let at = roots.iter().position(|(node, _)| node == container)?;
        Some(roots.swap_remove(at).1)
    }

    /// Routes an error up the component chain: the first error-captured
    /// hook to claim it wins; unclaimed errors reach the app-level
    /// handler, or are logged.
    pub(crate) fn handle_error(
        &self,
        instance: Option<&Rc<ComponentInstance<H::Node>>>,
        phase: ErrorPhase,
        message: &str,
    ) {
        let mut cursor = instance.cloned();
        while let Some(current) = cursor {
            for hook in current.error_captured.borrow().iter() {
                if hook(phase, message) {
                    return;
                }
            }
            cursor = current.parent();
        }
        if let Some(handler) = self.error_handler.borrow().clone() {
            handler(phase, message);
            return;
        }
        tracing::error!("unhandled error in {phase}: {message}");
    }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
