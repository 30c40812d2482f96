use crate::{
    builtins::RendererInternals,
    component::{
        ComponentInstance, HookKind, SetupContext, SetupResult,
    },
    errors::ErrorPhase,
    host::{HostOps, Namespace},
    node::{Children, PatchFlags, ShapeFlags, VNode, VNodeType},
    props::Props,
    renderer::{panic_message, Renderer},
    scheduler::Job,
};
use fluxion_reactive::Effect;
use std::{
    cell::Cell,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
};

impl<H: HostOps> Renderer<H> {
    /// Reconciles `n1` (what the host currently shows) against `n2` (what
    /// it should show), emitting host mutations.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn patch(
        self: &Rc<Self>,
        n1: Option<&VNode<H::Node>>,
        n2: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
        optimized: bool,
    ) {
        let mut n1 = n1;
        let mut anchor = anchor.cloned();
        if let Some(old) = n1 {
            if old.ptr_eq(n2) {
                return;
            }
            // a different kind of node replaces rather than patches; the
            // replacement mounts where the old content ended
            if !old.same_node_type(n2) {
                anchor = self.next_host_node(old);
                self.unmount(old, parent, true);
                n1 = None;
            }
        }
        let anchor = anchor.as_ref();

        // a BAIL flag opts the subtree out of every fast path
        let optimized = optimized && !n2.patch_flags().contains(PatchFlags::BAIL);

        let shape = n2.shape();
        if shape.contains(ShapeFlags::TELEPORT) {
            let handler = self.teleport.borrow().clone();
            match handler {
                Some(handler) => {
                    handler.process(
                        &RendererInternals { renderer: self },
                        n1,
                        n2,
                        container,
                        anchor,
                        namespace,
                    );
                    return;
                }
                None => crate::debug_warn!(
                    "no teleport handler installed; treating the node as \
                     in-place content"
                ),
            }
        }
        if shape.contains(ShapeFlags::SUSPENSE) {
            let handler = self.suspense.borrow().clone();
            match handler {
                Some(handler) => {
                    handler.process(
                        &RendererInternals { renderer: self },
                        n1,
                        n2,
                        container,
                        anchor,
                        namespace,
                    );
                    return;
                }
                None => crate::debug_warn!(
                    "no suspense handler installed; rendering the content \
                     directly"
                ),
            }
        }

        match n2.node_type() {
            VNodeType::Text => {
                self.process_text(n1, n2, container, anchor);
            }
            VNodeType::Comment => {
                self.process_comment(n1, n2, container, anchor);
            }
            VNodeType::Static => {
                self.process_static(n1, n2, container, anchor);
            }
            VNodeType::Fragment => {
                self.process_fragment(
                    n1, n2, container, anchor, parent, namespace, optimized,
                );
            }
            VNodeType::Element(_) => {
                self.process_element(
                    n1, n2, container, anchor, parent, namespace, optimized,
                );
            }
            VNodeType::Component(_) => {
                self.process_component(
                    n1, n2, container, anchor, parent, namespace, optimized,
                );
            }
        }
    }

    fn process_text(
        &self,
        n1: Option<&VNode<H::Node>>,
        n2: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) {
        let text = n2.children().as_text().unwrap_or_default();
        match n1 {
            None => {
                let node = self.host.create_text(text);
                n2.set_el(Some(node.clone()));
                self.host.insert(&node, container, anchor);
            }
            Some(n1) => {
                let el = n1.el().expect("mounted text node to have an el");
                n2.set_el(Some(el.clone()));
                if n1.children().as_text() != n2.children().as_text() {
                    self.host.set_text(&el, text);
                }
            }
        }
    }

    fn process_comment(
        &self,
        n1: Option<&VNode<H::Node>>,
        n2: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) {
        match n1 {
            None => {
                let node = self
                    .host
                    .create_comment(n2.children().as_text().unwrap_or_default());
                n2.set_el(Some(node.clone()));
                self.host.insert(&node, container, anchor);
            }
            Some(n1) => {
                // comments are not diffed after mount
                n2.set_el(n1.el());
            }
        }
    }

    fn process_static(
        self: &Rc<Self>,
        n1: Option<&VNode<H::Node>>,
        n2: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) {
        match n1 {
            None => self.mount_static(n2, container, anchor),
            Some(n1) => {
                // only reached on dev hot-reload with changed content
                if n1.children().as_text() != n2.children().as_text() {
                    let next = self.next_host_node(n1);
                    self.remove_static(n1);
                    self.mount_static(n2, container, next.as_ref());
                } else {
                    n2.set_el(n1.el());
                    n2.set_anchor(n1.anchor());
                }
            }
        }
    }

    fn mount_static(
        &self,
        vnode: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) {
        let content = vnode.children().as_text().unwrap_or_default();
        let (first, last) =
            self.host.insert_static_content(content, container, anchor);
        vnode.set_el(Some(first));
        vnode.set_anchor(Some(last));
    }

    fn remove_static(&self, vnode: &VNode<H::Node>) {
        for node in self.static_range(vnode) {
            self.host.remove(&node);
        }
    }

    fn move_static(
        &self,
        vnode: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) {
        for node in self.static_range(vnode) {
            self.host.insert(&node, container, anchor);
        }
    }

    /// The host nodes of a static block, `[el ..= anchor]` inclusive.
    fn static_range(&self, vnode: &VNode<H::Node>) -> Vec<H::Node> {
        let mut range = Vec::new();
        let end = vnode.anchor();
        let mut cursor = vnode.el();
        while let Some(node) = cursor {
            let at_end = Some(&node) == end.as_ref();
            cursor = self.host.next_sibling(&node);
            range.push(node);
            if at_end {
                break;
            }
        }
        range
    }

    #[allow(clippy::too_many_arguments)]
    fn process_fragment(
        self: &Rc<Self>,
        n1: Option<&VNode<H::Node>>,
        n2: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
        optimized: bool,
    ) {
        match n1 {
            None => {
                // start/end anchors bracket the children so descendants
                // can be relocated as a unit
                let start = self.host.create_text("");
                let end = self.host.create_text("");
                n2.set_el(Some(start.clone()));
                n2.set_anchor(Some(end.clone()));
                self.host.insert(&start, container, anchor);
                self.host.insert(&end, container, anchor);
                if let Children::Nodes(children) = n2.children() {
                    self.mount_children(
                        children,
                        container,
                        Some(&end),
                        parent,
                        namespace,
                        optimized,
                    );
                }
            }
            Some(n1) => {
                n2.set_el(n1.el());
                n2.set_anchor(n1.anchor());
                let end = n2.anchor().expect("fragment to carry an anchor");
                let stable = n2.patch_flags().is_optimizable()
                    && n2
                        .patch_flags()
                        .contains(PatchFlags::STABLE_FRAGMENT);
                match (n1.dynamic_children(), n2.dynamic_children()) {
                    (Some(old_dyn), Some(new_dyn)) if stable => {
                        self.patch_block_children(
                            old_dyn, new_dyn, container, parent, namespace,
                        );
                    }
                    _ => {
                        self.patch_children(
                            n1,
                            n2,
                            container,
                            Some(&end),
                            parent,
                            namespace,
                            optimized,
                        );
                    }
                }
            }
        }
    }

    /// Patches only the block's possibly-changing descendants, pairwise,
    /// skipping the stable structure entirely.
    pub(crate) fn patch_block_children(
        self: &Rc<Self>,
        old_children: &[VNode<H::Node>],
        new_children: &[VNode<H::Node>],
        fallback_container: &H::Node,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
    ) {
        for (old, new) in old_children.iter().zip(new_children.iter()) {
            // nodes that may be replaced or relocated need their real
            // host parent; in-place patches never use the container
            let container = if matches!(
                old.node_type(),
                VNodeType::Fragment | VNodeType::Component(_)
            ) || !old.same_node_type(new)
            {
                old.el()
                    .and_then(|el| self.host.parent_node(&el))
                    .unwrap_or_else(|| fallback_container.clone())
            } else {
                fallback_container.clone()
            };
            self.patch(
                Some(old),
                new,
                &container,
                None,
                parent,
                namespace,
                true,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_element(
        self: &Rc<Self>,
        n1: Option<&VNode<H::Node>>,
        n2: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
        optimized: bool,
    ) {
        match n1 {
            None => self.mount_element(
                n2, container, anchor, parent, namespace, optimized,
            ),
            Some(n1) => {
                self.patch_element(n1, n2, parent, namespace, optimized)
            }
        }
    }

    fn mount_element(
        self: &Rc<Self>,
        vnode: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
        optimized: bool,
    ) {
        let tag = match vnode.node_type() {
            VNodeType::Element(tag) => Rc::clone(tag),
            _ => unreachable!("mount_element called on a non-element"),
        };
        let el =
            self.host
                .create_element(&tag, namespace, Some(vnode.props()));
        vnode.set_el(Some(el.clone()));

        let child_namespace = match &*tag {
            "svg" => Namespace::Svg,
            "math" => Namespace::MathMl,
            _ => namespace,
        };
        match vnode.children() {
            Children::Text(text) => self.host.set_element_text(&el, text),
            Children::Nodes(children) => self.mount_children(
                children,
                &el,
                None,
                parent,
                child_namespace,
                optimized,
            ),
            Children::None => {}
        }

        for directive in vnode.directives() {
            directive.created(&el, vnode);
        }
        self.mount_props(&el, vnode.props(), namespace);
        for directive in vnode.directives() {
            directive.before_mount(&el, vnode);
        }
        self.host.insert(&el, container, anchor);

        if !vnode.directives().is_empty() {
            let el = el.clone();
            let vnode = vnode.clone();
            self.scheduler.queue_post(Job::new(None, move || {
                for directive in vnode.directives() {
                    directive.mounted(&el, &vnode);
                }
            }));
        }
    }

    fn patch_element(
        self: &Rc<Self>,
        n1: &VNode<H::Node>,
        n2: &VNode<H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
        optimized: bool,
    ) {
        let el = n1.el().expect("patched element to be mounted");
        n2.set_el(Some(el.clone()));
        let flags = n2.patch_flags();

        for directive in n2.directives() {
            directive.before_update(&el, n2, n1);
        }

        // children first, so props depending on content (e.g. selected
        // options) see the final tree
        match (n1.dynamic_children(), n2.dynamic_children()) {
            (Some(old_dyn), Some(new_dyn))
                if !flags.contains(PatchFlags::BAIL) =>
            {
                self.patch_block_children(
                    old_dyn, new_dyn, &el, parent, namespace,
                );
            }
            _ => {
                if !optimized {
                    self.patch_children(
                        n1, n2, &el, None, parent, namespace, false,
                    );
                }
            }
        }

        let old_props = n1.props();
        let new_props = n2.props();
        if flags.is_optimizable() {
            if flags.contains(PatchFlags::FULL_PROPS) {
                self.patch_props(&el, old_props, new_props, namespace);
            } else {
                if flags.contains(PatchFlags::CLASS)
                    && old_props.get("class") != new_props.get("class")
                {
                    self.host.patch_prop(
                        &el,
                        "class",
                        old_props.get("class"),
                        new_props.get("class"),
                        namespace,
                    );
                }
                if flags.contains(PatchFlags::STYLE) {
                    // the host diffs style at a finer grain
                    self.host.patch_prop(
                        &el,
                        "style",
                        old_props.get("style"),
                        new_props.get("style"),
                        namespace,
                    );
                }
                if flags.contains(PatchFlags::PROPS) {
                    for key in n2.dynamic_props().unwrap_or_default() {
                        let prev = old_props.get(key);
                        let next = new_props.get(key);
                        if prev != next || key == "value" {
                            self.host.patch_prop(
                                &el, key, prev, next, namespace,
                            );
                        }
                    }
                }
            }
            if flags.contains(PatchFlags::TEXT)
                && n1.children().as_text() != n2.children().as_text()
            {
                self.host.set_element_text(
                    &el,
                    n2.children().as_text().unwrap_or_default(),
                );
            }
        } else if !optimized && n2.dynamic_children().is_none() {
            self.patch_props(&el, old_props, new_props, namespace);
        }

        if !n2.directives().is_empty() {
            let el = el.clone();
            let n1 = n1.clone();
            let n2 = n2.clone();
            self.scheduler.queue_post(Job::new(None, move || {
                for directive in n2.directives() {
                    directive.updated(&el, &n2, &n1);
                }
            }));
        }
    }

    /// Applies props in declared order; `value` always lands last so
    /// hosts with ordering constraints (min/max before value) are safe.
    fn mount_props(&self, el: &H::Node, props: &Props, namespace: Namespace) {
        let mut value = None;
        for (key, next) in props {
            if key == "value" {
                value = Some(next);
                continue;
            }
            self.host.patch_prop(el, key, None, Some(next), namespace);
        }
        if let Some(next) = value {
            self.host.patch_prop(el, "value", None, Some(next), namespace);
        }
    }

    /// The full prop diff: removed keys patch to nothing, added or
    /// changed keys patch over, `value` deferred to the end.
    fn patch_props(
        &self,
        el: &H::Node,
        old_props: &Props,
        new_props: &Props,
        namespace: Namespace,
    ) {
        if old_props == new_props {
            return;
        }
        for (key, prev) in old_props {
            if !new_props.contains_key(key) {
                self.host.patch_prop(el, key, Some(prev), None, namespace);
            }
        }
        let mut value = None;
        for (key, next) in new_props {
            if key == "value" {
                value = Some(next);
                continue;
            }
            let prev = old_props.get(key);
            if prev != Some(next) {
                self.host.patch_prop(el, key, prev, Some(next), namespace);
            }
        }
        if let Some(next) = value {
            self.host.patch_prop(
                el,
                "value",
                old_props.get("value"),
                Some(next),
                namespace,
            );
        }
    }

    pub(crate) fn mount_children(
        self: &Rc<Self>,
        children: &[VNode<H::Node>],
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
        optimized: bool,
    ) {
        for child in children {
            self.patch(
                None, child, container, anchor, parent, namespace, optimized,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_component(
        self: &Rc<Self>,
        n1: Option<&VNode<H::Node>>,
        n2: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
        optimized: bool,
    ) {
        match n1 {
            None => {
                if n2.shape().contains(ShapeFlags::KEPT_ALIVE) {
                    if let Some(keep_alive) = self.keep_alive.borrow().clone()
                    {
                        keep_alive.activate(n2, container, anchor);
                        return;
                    }
                    crate::debug_warn!(
                        "KEPT_ALIVE node without a keep-alive context; \
                         mounting fresh"
                    );
                }
                self.mount_component(
                    n2, container, anchor, parent, namespace, optimized,
                );
            }
            Some(n1) => self.update_component(n1, n2),
        }
    }

    fn mount_component(
        self: &Rc<Self>,
        vnode: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        namespace: Namespace,
        _optimized: bool,
    ) {
        let definition = match vnode.node_type() {
            VNodeType::Component(definition) => Rc::clone(definition),
            _ => unreachable!("mount_component called on a non-component"),
        };
        let instance = ComponentInstance::new(
            self.next_uid(),
            definition,
            vnode,
            parent,
        );
        vnode.set_instance(Some(instance.clone()));
        *instance.vnode.borrow_mut() = Some(vnode.clone());

        let cx = SetupContext {
            instance: instance.clone(),
        };
        let setup = {
            let instance = instance.clone();
            instance.scope.run(|| {
                catch_unwind(AssertUnwindSafe(|| {
                    instance.definition.setup(&cx)
                }))
            })
        };
        match setup {
            Err(payload) => {
                self.handle_error(
                    Some(&instance),
                    ErrorPhase::Setup,
                    &panic_message(&*payload),
                );
                // keep the tree consistent with a placeholder
                let placeholder = VNode::comment("setup error");
                self.patch(
                    None,
                    &placeholder,
                    container,
                    anchor,
                    parent,
                    namespace,
                    false,
                );
                vnode.set_el(placeholder.el());
                *instance.subtree.borrow_mut() = Some(placeholder);
            }
            Ok(SetupResult::Render(render_fn)) => {
                *instance.render_fn.borrow_mut() = Some(render_fn);
                self.setup_render_effect(
                    &instance, container, anchor, namespace,
                );
            }
            Ok(SetupResult::Pending(dep)) => {
                *instance.async_dep.borrow_mut() = Some(dep.clone());
                let placeholder = VNode::comment("async pending");
                self.patch(
                    None,
                    &placeholder,
                    container,
                    anchor,
                    parent,
                    namespace,
                    false,
                );
                vnode.set_el(placeholder.el());
                *instance.subtree.borrow_mut() = Some(placeholder);

                if let Some(suspense) = self.suspense.borrow().clone() {
                    suspense.register_dep(&instance);
                } else {
                    crate::debug_warn!(
                        "async setup outside a suspense boundary; the \
                         component mounts when its dependency resolves"
                    );
                }
                let renderer = Rc::clone(self);
                let resume_instance = instance.clone();
                let container = container.clone();
                let anchor = anchor.cloned();
                dep.subscribe(Box::new(move |render_fn| {
                    if resume_instance.is_unmounted.get() {
                        return;
                    }
                    resume_instance.async_resolved.set(true);
                    *resume_instance.render_fn.borrow_mut() =
                        Some(render_fn);
                    // replace the placeholder with the real tree
                    let placeholder =
                        resume_instance.subtree.borrow_mut().take();
                    let anchor = placeholder
                        .as_ref()
                        .map(|p| renderer.next_host_node(p))
                        .unwrap_or(anchor.clone());
                    if let Some(placeholder) = placeholder {
                        renderer.unmount(&placeholder, None, true);
                    }
                    renderer.setup_render_effect(
                        &resume_instance,
                        &container,
                        anchor.as_ref(),
                        namespace,
                    );
                    if let Some(suspense) =
                        renderer.suspense.borrow().clone()
                    {
                        suspense.resolve_dep(&resume_instance);
                    }
                }));
            }
        }
    }

    /// Creates the reactive effect whose body renders the component and
    /// patches its subtree, scheduled as a render job keyed by the
    /// instance id so components update in creation order.
    fn setup_render_effect(
        self: &Rc<Self>,
        instance: &Rc<ComponentInstance<H::Node>>,
        container: &H::Node,
        anchor: Option<&H::Node>,
        namespace: Namespace,
    ) {
        let renderer = Rc::clone(self);
        let update_instance = instance.clone();
        let container = container.clone();
        let anchor = anchor.cloned();
        let update_fn = move |_: Option<()>| {
            let instance = &update_instance;
            if instance.is_unmounted.get() {
                return;
            }
            if !instance.is_mounted.get() {
                instance.invoke_hooks(HookKind::BeforeMount);
                let subtree = renderer.render_component(instance);
                renderer.patch(
                    None,
                    &subtree,
                    &container,
                    anchor.as_ref(),
                    Some(instance),
                    namespace,
                    false,
                );
                if let Some(vnode) = instance.vnode.borrow().as_ref() {
                    vnode.set_el(subtree.el());
                }
                *instance.subtree.borrow_mut() = Some(subtree);
                instance.is_mounted.set(true);
                renderer.queue_instance_hooks(instance, HookKind::Mounted);
            } else {
                let next = instance.next.borrow_mut().take();
                if let Some(next) = &next {
                    next.set_instance(Some(instance.clone()));
                    instance.update_from_vnode(next);
                    *instance.vnode.borrow_mut() = Some(next.clone());
                }
                instance.invoke_hooks(HookKind::BeforeUpdate);
                let prev = instance
                    .subtree
                    .borrow()
                    .clone()
                    .expect("mounted component to have a subtree");
                let subtree = renderer.render_component(instance);
                let parent_node = prev
                    .el()
                    .and_then(|el| renderer.host.parent_node(&el))
                    .unwrap_or_else(|| container.clone());
                let next_node = renderer.next_host_node(&prev);
                renderer.patch(
                    Some(&prev),
                    &subtree,
                    &parent_node,
                    next_node.as_ref(),
                    Some(instance),
                    namespace,
                    false,
                );
                if let Some(vnode) = instance.vnode.borrow().as_ref() {
                    vnode.set_el(subtree.el());
                }
                *instance.subtree.borrow_mut() = Some(subtree);
                renderer.queue_instance_hooks(instance, HookKind::Updated);
            }
        };

        let scheduler_renderer = Rc::clone(self);
        let job_instance = instance.clone();
        let effect_slot = Rc::new(Cell::new(None::<Effect>));
        let scheduler_slot = Rc::clone(&effect_slot);
        let effect = instance.scope.run(|| {
            Effect::new_with_scheduler(update_fn, move || {
                let renderer = Rc::clone(&scheduler_renderer);
                let error_renderer = Rc::clone(&scheduler_renderer);
                let instance = job_instance.clone();
                let slot = Rc::clone(&scheduler_slot);
                renderer.scheduler.queue_job(Job::new(
                    Some(job_instance.uid),
                    move || {
                        let result =
                            catch_unwind(AssertUnwindSafe(|| {
                                if let Some(effect) = slot.get() {
                                    effect.run_if_dirty();
                                }
                            }));
                        if let Err(payload) = result {
                            error_renderer.handle_error(
                                Some(&instance),
                                ErrorPhase::Render,
                                &panic_message(&*payload),
                            );
                        }
                    },
                ));
            })
        });
        effect_slot.set(Some(effect));
        instance.render_effect.set(Some(effect));
        *instance.update.borrow_mut() =
            Some(Rc::new(move || effect.run()));
        effect.run();
    }

    fn render_component(
        self: &Rc<Self>,
        instance: &Rc<ComponentInstance<H::Node>>,
    ) -> VNode<H::Node> {
        let render_fn = instance
            .render_fn
            .borrow()
            .clone()
            .expect("component to have a render function");
        match catch_unwind(AssertUnwindSafe(|| render_fn())) {
            Ok(subtree) => subtree,
            Err(payload) => {
                self.handle_error(
                    Some(instance),
                    ErrorPhase::Render,
                    &panic_message(&*payload),
                );
                VNode::comment("render error")
            }
        }
    }

    fn update_component(
        self: &Rc<Self>,
        n1: &VNode<H::Node>,
        n2: &VNode<H::Node>,
    ) {
        let instance = n1
            .instance()
            .expect("updated component vnode to carry its instance");
        n2.set_instance(Some(instance.clone()));
        let slots_changed = n2.shape().contains(ShapeFlags::SLOT_CHILDREN);
        let needs_update = instance.definition.should_update(
            n1.props(),
            n2.props(),
            slots_changed,
        );
        if needs_update {
            *instance.next.borrow_mut() = Some(n2.clone());
            // a queued async update is superseded by this sync one
            self.scheduler.invalidate(instance.uid);
            let update = instance.update.borrow().clone();
            if let Some(update) = update {
                update();
            }
        } else {
            n2.set_el(n1.el());
            *instance.vnode.borrow_mut() = Some(n2.clone());
        }
    }

    pub(crate) fn queue_instance_hooks(
        &self,
        instance: &Rc<ComponentInstance<H::Node>>,
        kind: HookKind,
    ) {
        if instance.hooks.is_empty(kind) {
            return;
        }
        let instance = instance.clone();
        self.scheduler.queue_post(Job::new(None, move || {
            instance.invoke_hooks(kind);
        }));
    }

    /// Unmounts a node: components stop their scope and recurse into
    /// their subtree, fragments strip their children and anchors,
    /// elements run directive teardown.
    pub(crate) fn unmount(
        self: &Rc<Self>,
        vnode: &VNode<H::Node>,
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        do_remove: bool,
    ) {
        match vnode.node_type() {
            VNodeType::Component(_) => {
                self.unmount_component(vnode, do_remove);
            }
            VNodeType::Fragment => {
                if let Children::Nodes(children) = vnode.children() {
                    self.unmount_children(children, parent, do_remove);
                }
                if do_remove {
                    if let Some(start) = vnode.el() {
                        self.host.remove(&start);
                    }
                    if let Some(end) = vnode.anchor() {
                        self.host.remove(&end);
                    }
                }
            }
            VNodeType::Static => {
                if do_remove {
                    self.remove_static(vnode);
                }
            }
            VNodeType::Element(_) => {
                let el = vnode.el();
                if let Some(el) = &el {
                    for directive in vnode.directives() {
                        directive.before_unmount(el, vnode);
                    }
                }
                if let Children::Nodes(children) = vnode.children() {
                    // host removal of the subtree is wholesale; children
                    // still need their component/directive teardown
                    self.unmount_children(children, parent, false);
                }
                if let Some(el) = &el {
                    if do_remove {
                        self.host.remove(el);
                    }
                    if !vnode.directives().is_empty() {
                        let el = el.clone();
                        let vnode = vnode.clone();
                        self.scheduler.queue_post(Job::new(None, move || {
                            for directive in vnode.directives() {
                                directive.unmounted(&el, &vnode);
                            }
                        }));
                    }
                }
            }
            VNodeType::Text | VNodeType::Comment => {
                if do_remove {
                    if let Some(el) = vnode.el() {
                        self.host.remove(&el);
                    }
                }
            }
        }
    }

    pub(crate) fn unmount_children(
        self: &Rc<Self>,
        children: &[VNode<H::Node>],
        parent: Option<&Rc<ComponentInstance<H::Node>>>,
        do_remove: bool,
    ) {
        for child in children {
            self.unmount(child, parent, do_remove);
        }
    }

    fn unmount_component(
        self: &Rc<Self>,
        vnode: &VNode<H::Node>,
        do_remove: bool,
    ) {
        if vnode.shape().contains(ShapeFlags::SHOULD_KEEP_ALIVE) {
            if let Some(keep_alive) = self.keep_alive.borrow().clone() {
                keep_alive.deactivate(vnode);
                return;
            }
        }
        let Some(instance) = vnode.instance() else {
            return;
        };
        // a queued mount or update for this instance must never fire now
        self.scheduler.invalidate(instance.uid);
        instance.invoke_hooks(HookKind::BeforeUnmount);
        instance.scope.stop();
        if let Some(subtree) = instance.subtree.borrow_mut().take() {
            self.unmount(&subtree, Some(&instance), do_remove);
        }
        instance.is_unmounted.set(true);
        self.queue_instance_hooks(&instance, HookKind::Unmounted);

        let pending_async = instance.async_dep.borrow().is_some()
            && !instance.async_resolved.get();
        if pending_async {
            if let Some(suspense) = self.suspense.borrow().clone() {
                suspense.dep_unmounted(&instance);
            }
        }
    }

    /// Relocates a mounted node (and everything it brackets) before
    /// `anchor`.
    pub(crate) fn move_node(
        self: &Rc<Self>,
        vnode: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) {
        match vnode.node_type() {
            VNodeType::Component(_) => {
                if let Some(instance) = vnode.instance() {
                    let subtree = instance.subtree.borrow().clone();
                    if let Some(subtree) = subtree {
                        self.move_node(&subtree, container, anchor);
                    }
                }
            }
            VNodeType::Fragment => {
                if let Some(start) = vnode.el() {
                    self.host.insert(&start, container, anchor);
                }
                if let Children::Nodes(children) = vnode.children() {
                    for child in children {
                        self.move_node(child, container, anchor);
                    }
                }
                if let Some(end) = vnode.anchor() {
                    self.host.insert(&end, container, anchor);
                }
            }
            VNodeType::Static => {
                self.move_static(vnode, container, anchor);
            }
            _ => {
                if let Some(el) = vnode.el() {
                    self.host.insert(&el, container, anchor);
                }
            }
        }
    }

    /// The host node immediately after this vnode's rendered content.
    pub(crate) fn next_host_node(
        self: &Rc<Self>,
        vnode: &VNode<H::Node>,
    ) -> Option<H::Node> {
        match vnode.node_type() {
            VNodeType::Component(_) => {
                let subtree = vnode
                    .instance()
                    .and_then(|i| i.subtree.borrow().clone());
                subtree.and_then(|s| self.next_host_node(&s))
            }
            VNodeType::Fragment | VNodeType::Static => vnode
                .anchor()
                .and_then(|anchor| self.host.next_sibling(&anchor)),
            _ => vnode.el().and_then(|el| self.host.next_sibling(&el)),
        }
    }
}
