use crate::props::{PropValue, Props};
use std::fmt::Debug;

/// The element namespace a subtree is created in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
    MathMl,
}

/// The capability set the patch engine is injected with.
///
/// The core makes no other assumptions about the host: the same engine
/// drives a browser DOM, a native toolkit, or an in-memory test backend,
/// differing only in this implementation. Methods with default bodies are
/// optional capabilities. (`'static` because render effects hold on to
/// the renderer, and with it the host.)
pub trait HostOps: 'static {
    type Node: Clone + PartialEq + Debug + 'static;

    fn create_element(
        &self,
        tag: &str,
        namespace: Namespace,
        props: Option<&Props>,
    ) -> Self::Node;

    fn create_text(&self, text: &str) -> Self::Node;

    fn create_comment(&self, text: &str) -> Self::Node;

    /// Updates the character data of a text or comment node.
    fn set_text(&self, node: &Self::Node, text: &str);

    /// Replaces an element's children with a single run of text.
    fn set_element_text(&self, el: &Self::Node, text: &str);

    /// Inserts `node` into `parent` before `anchor`, or appends when no
    /// anchor is given. Inserting a node that is already in a tree moves
    /// it.
    fn insert(
        &self,
        node: &Self::Node,
        parent: &Self::Node,
        anchor: Option<&Self::Node>,
    );

    fn remove(&self, node: &Self::Node);

    fn parent_node(&self, node: &Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Applies one property change. `prev`/`next` of `None` mean the prop
    /// is being introduced or removed.
    fn patch_prop(
        &self,
        el: &Self::Node,
        key: &str,
        prev: Option<&PropValue>,
        next: Option<&PropValue>,
        namespace: Namespace,
    );

    fn query_selector(&self, _selector: &str) -> Option<Self::Node> {
        None
    }

    fn set_scope_id(&self, _el: &Self::Node, _scope_id: &str) {}

    fn clone_node(&self, _node: &Self::Node) -> Option<Self::Node> {
        None
    }

    /// Emits pre-rendered content into the host, returning the first and
    /// last nodes of the emitted range. Hosts without raw-content support
    /// fall back to a single text node.
    fn insert_static_content(
        &self,
        content: &str,
        parent: &Self::Node,
        anchor: Option<&Self::Node>,
    ) -> (Self::Node, Self::Node) {
        let node = self.create_text(content);
        self.insert(&node, parent, anchor);
        (node.clone(), node)
    }
}
