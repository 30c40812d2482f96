use crate::{
    component::{Component, ComponentInstance},
    directive::Directive,
    props::Props,
};
use std::{cell::RefCell, fmt, rc::Rc};

bitflags::bitflags! {
    /// Classifies a node's content kind and role.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct ShapeFlags: u16 {
        const ELEMENT = 1;
        const FUNCTIONAL_COMPONENT = 1 << 1;
        const STATEFUL_COMPONENT = 1 << 2;
        const TEXT_CHILDREN = 1 << 3;
        const ARRAY_CHILDREN = 1 << 4;
        const SLOT_CHILDREN = 1 << 5;
        const TELEPORT = 1 << 6;
        const SUSPENSE = 1 << 7;
        const SHOULD_KEEP_ALIVE = 1 << 8;
        const KEPT_ALIVE = 1 << 9;
        const COMPONENT = Self::FUNCTIONAL_COMPONENT.bits()
            | Self::STATEFUL_COMPONENT.bits();
    }

    /// Advertises what may have changed since the node's previous
    /// rendering, so updates can take the cheapest valid path. `BAIL`
    /// opts the subtree out of every optimization.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct PatchFlags: u16 {
        const TEXT = 1;
        const CLASS = 1 << 1;
        const STYLE = 1 << 2;
        const PROPS = 1 << 3;
        const FULL_PROPS = 1 << 4;
        const NEED_HYDRATION = 1 << 5;
        const STABLE_FRAGMENT = 1 << 6;
        const KEYED_FRAGMENT = 1 << 7;
        const UNKEYED_FRAGMENT = 1 << 8;
        const DEV_ROOT_FRAGMENT = 1 << 9;
        const BAIL = 1 << 10;
    }
}

impl PatchFlags {
    /// Whether the flags license an optimized update path. Empty flags
    /// and `BAIL` both force the full diff.
    pub fn is_optimizable(&self) -> bool {
        !self.is_empty() && !self.contains(PatchFlags::BAIL)
    }
}

/// Identity for list diffing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Num(i64),
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(Rc::from(value.as_str()))
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Num(value)
    }
}

/// What a node *is*: a host element, a component, or one of the sentinel
/// kinds.
pub enum VNodeType<N: 'static> {
    Element(Rc<str>),
    Component(Rc<dyn Component<N>>),
    Text,
    Comment,
    Static,
    Fragment,
}

impl<N> Clone for VNodeType<N> {
    fn clone(&self) -> Self {
        match self {
            VNodeType::Element(tag) => VNodeType::Element(Rc::clone(tag)),
            VNodeType::Component(component) => {
                VNodeType::Component(Rc::clone(component))
            }
            VNodeType::Text => VNodeType::Text,
            VNodeType::Comment => VNodeType::Comment,
            VNodeType::Static => VNodeType::Static,
            VNodeType::Fragment => VNodeType::Fragment,
        }
    }
}

impl<N> fmt::Debug for VNodeType<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "Element({tag})"),
            VNodeType::Component(component) => {
                write!(f, "Component({})", component.name())
            }
            VNodeType::Text => write!(f, "Text"),
            VNodeType::Comment => write!(f, "Comment"),
            VNodeType::Static => write!(f, "Static"),
            VNodeType::Fragment => write!(f, "Fragment"),
        }
    }
}

pub enum Children<N: 'static> {
    None,
    Text(String),
    Nodes(Vec<VNode<N>>),
}

impl<N> Children<N> {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&[VNode<N>]> {
        match self {
            Children::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }
}

/// One node of the virtual tree: an immutable-by-convention description
/// of what the host tree should be, plus the resolved host references
/// filled in at mount time.
///
/// Nodes are cheaply cloneable handles; a node aliased into a parent's
/// `dynamic_children` block is the same node, not a copy.
pub struct VNode<N: 'static>(Rc<VNodeInner<N>>);

impl<N> Clone for VNode<N> {
    fn clone(&self) -> Self {
        VNode(Rc::clone(&self.0))
    }
}

pub struct VNodeInner<N: 'static> {
    pub node_type: VNodeType<N>,
    pub key: Option<Key>,
    pub props: Props,
    pub children: Children<N>,
    pub shape: ShapeFlags,
    pub patch_flags: PatchFlags,
    /// The prop keys the compiler knows may change, for the `PROPS` fast
    /// path.
    pub dynamic_props: Option<Vec<String>>,
    /// The possibly-changing descendants of this block, in source order.
    pub dynamic_children: Option<Vec<VNode<N>>>,
    pub directives: Vec<Rc<dyn Directive<N>>>,
    /// The resolved host node once mounted.
    pub el: RefCell<Option<N>>,
    /// For fragments and static content: the host node ending the range.
    pub anchor: RefCell<Option<N>>,
    pub instance: RefCell<Option<Rc<ComponentInstance<N>>>>,
}

impl<N> VNode<N> {
    fn new(
        node_type: VNodeType<N>,
        props: Props,
        children: Children<N>,
        shape: ShapeFlags,
    ) -> Self {
        let shape = match &children {
            Children::None => shape,
            Children::Text(_) => shape | ShapeFlags::TEXT_CHILDREN,
            Children::Nodes(_) => shape | ShapeFlags::ARRAY_CHILDREN,
        };
        VNode(Rc::new(VNodeInner {
            node_type,
            key: None,
            props,
            children,
            shape,
            patch_flags: PatchFlags::empty(),
            dynamic_props: None,
            dynamic_children: None,
            directives: Vec::new(),
            el: RefCell::new(None),
            anchor: RefCell::new(None),
            instance: RefCell::new(None),
        }))
    }

    /// An element with child nodes.
    pub fn element(
        tag: impl Into<Rc<str>>,
        props: Props,
        children: Vec<VNode<N>>,
    ) -> Self {
        let children = if children.is_empty() {
            Children::None
        } else {
            Children::Nodes(children)
        };
        Self::new(
            VNodeType::Element(tag.into()),
            props,
            children,
            ShapeFlags::ELEMENT,
        )
    }

    /// An element whose children are a single run of text.
    pub fn element_text(
        tag: impl Into<Rc<str>>,
        props: Props,
        text: impl Into<String>,
    ) -> Self {
        Self::new(
            VNodeType::Element(tag.into()),
            props,
            Children::Text(text.into()),
            ShapeFlags::ELEMENT,
        )
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(
            VNodeType::Text,
            Props::default(),
            Children::Text(text.into()),
            ShapeFlags::empty(),
        )
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self::new(
            VNodeType::Comment,
            Props::default(),
            Children::Text(text.into()),
            ShapeFlags::empty(),
        )
    }

    /// Pre-rendered content emitted verbatim through the host capability.
    pub fn static_content(content: impl Into<String>) -> Self {
        Self::new(
            VNodeType::Static,
            Props::default(),
            Children::Text(content.into()),
            ShapeFlags::empty(),
        )
    }

    pub fn fragment(children: Vec<VNode<N>>) -> Self {
        Self::new(
            VNodeType::Fragment,
            Props::default(),
            Children::Nodes(children),
            ShapeFlags::empty(),
        )
    }

    pub fn component(component: Rc<dyn Component<N>>, props: Props) -> Self {
        Self::new(
            VNodeType::Component(component),
            props,
            Children::None,
            ShapeFlags::STATEFUL_COMPONENT,
        )
    }

    /// A component node carrying default slot content.
    pub fn component_with_slot(
        component: Rc<dyn Component<N>>,
        props: Props,
        slot: Vec<VNode<N>>,
    ) -> Self {
        let node = Self::new(
            VNodeType::Component(component),
            props,
            Children::Nodes(slot),
            ShapeFlags::STATEFUL_COMPONENT | ShapeFlags::SLOT_CHILDREN,
        );
        // slot content is owned by the component, not diffed as children
        node.with_shape_removed(ShapeFlags::ARRAY_CHILDREN)
    }

    pub fn with_key(self, key: impl Into<Key>) -> Self {
        self.update_inner(|inner| inner.key = Some(key.into()))
    }

    pub fn with_patch_flags(self, flags: PatchFlags) -> Self {
        self.update_inner(|inner| inner.patch_flags |= flags)
    }

    pub fn with_dynamic_props(
        self,
        keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.update_inner(|inner| {
            inner.dynamic_props =
                Some(keys.into_iter().map(Into::into).collect());
            inner.patch_flags |= PatchFlags::PROPS;
        })
    }

    /// Marks this node as a block root whose listed descendants are the
    /// only ones that can change.
    pub fn with_dynamic_children(self, children: Vec<VNode<N>>) -> Self {
        self.update_inner(|inner| inner.dynamic_children = Some(children))
    }

    pub fn with_directive(self, directive: Rc<dyn Directive<N>>) -> Self {
        self.update_inner(|inner| inner.directives.push(directive))
    }

    pub fn with_shape(self, shape: ShapeFlags) -> Self {
        self.update_inner(|inner| inner.shape |= shape)
    }

    fn with_shape_removed(self, shape: ShapeFlags) -> Self {
        self.update_inner(|inner| inner.shape.remove(shape))
    }

    fn update_inner(self, f: impl FnOnce(&mut VNodeInner<N>)) -> Self {
        let mut inner = match Rc::try_unwrap(self.0) {
            Ok(inner) => inner,
            Err(_) => panic!(
                "vnode builders may only be used before the node is shared"
            ),
        };
        f(&mut inner);
        VNode(Rc::new(inner))
    }

    pub fn node_type(&self) -> &VNodeType<N> {
        &self.0.node_type
    }

    pub fn key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.0.props
    }

    pub fn children(&self) -> &Children<N> {
        &self.0.children
    }

    pub fn shape(&self) -> ShapeFlags {
        self.0.shape
    }

    pub fn patch_flags(&self) -> PatchFlags {
        self.0.patch_flags
    }

    pub fn dynamic_props(&self) -> Option<&[String]> {
        self.0.dynamic_props.as_deref()
    }

    pub fn dynamic_children(&self) -> Option<&[VNode<N>]> {
        self.0.dynamic_children.as_deref()
    }

    pub fn directives(&self) -> &[Rc<dyn Directive<N>>] {
        &self.0.directives
    }

    pub fn el(&self) -> Option<N>
    where
        N: Clone,
    {
        self.0.el.borrow().clone()
    }

    pub(crate) fn set_el(&self, el: Option<N>) {
        *self.0.el.borrow_mut() = el;
    }

    pub fn anchor(&self) -> Option<N>
    where
        N: Clone,
    {
        self.0.anchor.borrow().clone()
    }

    pub(crate) fn set_anchor(&self, anchor: Option<N>) {
        *self.0.anchor.borrow_mut() = anchor;
    }

    pub fn instance(&self) -> Option<Rc<ComponentInstance<N>>> {
        self.0.instance.borrow().clone()
    }

    pub(crate) fn set_instance(
        &self,
        instance: Option<Rc<ComponentInstance<N>>>,
    ) {
        *self.0.instance.borrow_mut() = instance;
    }

    /// Whether two handles are literally the same node.
    pub fn ptr_eq(&self, other: &VNode<N>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Two nodes are the same (patch in place rather than replace) when
    /// their type and key both match.
    pub fn same_node_type(&self, other: &VNode<N>) -> bool {
        if self.0.key != other.0.key {
            return false;
        }
        match (&self.0.node_type, &other.0.node_type) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Component(a), VNodeType::Component(b)) => {
                Rc::ptr_eq(a, b)
            }
            (VNodeType::Text, VNodeType::Text) => true,
            (VNodeType::Comment, VNodeType::Comment) => true,
            (VNodeType::Static, VNodeType::Static) => true,
            (VNodeType::Fragment, VNodeType::Fragment) => true,
            _ => false,
        }
    }
}

impl<N> fmt::Debug for VNode<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("type", &self.0.node_type)
            .field("key", &self.0.key)
            .field("shape", &self.0.shape)
            .field("patch_flags", &self.0.patch_flags)
            .finish_non_exhaustive()
    }
}
