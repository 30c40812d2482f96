//! An in-memory host backend: applies mutations to a node arena and logs
//! every operation, so tests can assert both the resulting tree and the
//! exact mutation sequence the patch engine emitted.

use fluxion_vdom::{HostOps, Namespace, PropValue, Props};
use std::cell::RefCell;

#[derive(Clone, PartialEq, Debug)]
pub struct TestNode(pub usize);

enum NodeKind {
    Element { tag: String, props: Props },
    Text(String),
    Comment(String),
}

struct NodeData {
    kind: NodeKind,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Default)]
pub struct TestHost {
    nodes: RefCell<Vec<NodeData>>,
    ops: RefCell<Vec<String>>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh root element to render into.
    pub fn container(&self) -> TestNode {
        self.alloc(NodeKind::Element {
            tag: "root".to_string(),
            props: Props::default(),
        })
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.borrow().clone()
    }

    pub fn take_ops(&self) -> Vec<String> {
        std::mem::take(&mut *self.ops.borrow_mut())
    }

    pub fn html(&self, node: &TestNode) -> String {
        let nodes = self.nodes.borrow();
        nodes[node.0]
            .children
            .iter()
            .map(|&child| self.render_node(&nodes, child))
            .collect()
    }

    fn render_node(&self, nodes: &[NodeData], id: usize) -> String {
        match &nodes[id].kind {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Comment(text) => format!("<!--{text}-->"),
            NodeKind::Element { tag, props } => {
                let attrs: String = props
                    .iter()
                    .map(|(key, value)| {
                        format!(" {key}=\"{}\"", render_value(value))
                    })
                    .collect();
                let children: String = nodes[id]
                    .children
                    .iter()
                    .map(|&child| self.render_node(nodes, child))
                    .collect();
                format!("<{tag}{attrs}>{children}</{tag}>")
            }
        }
    }

    fn alloc(&self, kind: NodeKind) -> TestNode {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        TestNode(nodes.len() - 1)
    }

    fn log(&self, op: String) {
        self.ops.borrow_mut().push(op);
    }

    fn detach(&self, id: usize) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[id].parent.take() {
            nodes[parent].children.retain(|&child| child != id);
        }
    }

    fn describe(&self, id: usize) -> String {
        let nodes = self.nodes.borrow();
        match &nodes[id].kind {
            NodeKind::Element { tag, .. } => format!("{tag}#{id}"),
            NodeKind::Text(text) => format!("text({text})#{id}"),
            NodeKind::Comment(_) => format!("comment#{id}"),
        }
    }
}

fn render_value(value: &PropValue) -> String {
    match value {
        PropValue::Str(s) => s.clone(),
        PropValue::Bool(b) => b.to_string(),
        PropValue::Num(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
    }
}

impl HostOps for TestHost {
    type Node = TestNode;

    fn create_element(
        &self,
        tag: &str,
        _namespace: Namespace,
        _props: Option<&Props>,
    ) -> TestNode {
        let node = self.alloc(NodeKind::Element {
            tag: tag.to_string(),
            props: Props::default(),
        });
        self.log(format!("create_element({tag})"));
        node
    }

    fn create_text(&self, text: &str) -> TestNode {
        let node = self.alloc(NodeKind::Text(text.to_string()));
        self.log(format!("create_text({text})"));
        node
    }

    fn create_comment(&self, text: &str) -> TestNode {
        let node = self.alloc(NodeKind::Comment(text.to_string()));
        self.log(format!("create_comment({text})"));
        node
    }

    fn set_text(&self, node: &TestNode, text: &str) {
        {
            let mut nodes = self.nodes.borrow_mut();
            match &mut nodes[node.0].kind {
                NodeKind::Text(current) | NodeKind::Comment(current) => {
                    *current = text.to_string();
                }
                NodeKind::Element { .. } => {
                    panic!("set_text on an element")
                }
            }
        }
        self.log(format!("set_text({text})"));
    }

    fn set_element_text(&self, el: &TestNode, text: &str) {
        let detached: Vec<usize> = {
            let nodes = self.nodes.borrow();
            nodes[el.0].children.clone()
        };
        for child in detached {
            self.detach(child);
        }
        if !text.is_empty() {
            let child = self.alloc(NodeKind::Text(text.to_string()));
            let mut nodes = self.nodes.borrow_mut();
            nodes[child.0].parent = Some(el.0);
            nodes[el.0].children.push(child.0);
        }
        self.log(format!("set_element_text({text})"));
    }

    fn insert(
        &self,
        node: &TestNode,
        parent: &TestNode,
        anchor: Option<&TestNode>,
    ) {
        let was_attached =
            self.nodes.borrow()[node.0].parent.is_some();
        self.detach(node.0);
        {
            let mut nodes = self.nodes.borrow_mut();
            let at = match anchor {
                Some(anchor) => nodes[parent.0]
                    .children
                    .iter()
                    .position(|&child| child == anchor.0)
                    .unwrap_or(nodes[parent.0].children.len()),
                None => nodes[parent.0].children.len(),
            };
            nodes[parent.0].children.insert(at, node.0);
            nodes[node.0].parent = Some(parent.0);
        }
        if was_attached {
            self.log(format!("move({})", self.describe(node.0)));
        } else {
            self.log(format!("insert({})", self.describe(node.0)));
        }
    }

    fn remove(&self, node: &TestNode) {
        self.detach(node.0);
        self.log(format!("remove({})", self.describe(node.0)));
    }

    fn parent_node(&self, node: &TestNode) -> Option<TestNode> {
        self.nodes.borrow()[node.0].parent.map(TestNode)
    }

    fn next_sibling(&self, node: &TestNode) -> Option<TestNode> {
        let nodes = self.nodes.borrow();
        let parent = nodes[node.0].parent?;
        let siblings = &nodes[parent].children;
        let at = siblings.iter().position(|&child| child == node.0)?;
        siblings.get(at + 1).map(|&id| TestNode(id))
    }

    fn patch_prop(
        &self,
        el: &TestNode,
        key: &str,
        _prev: Option<&PropValue>,
        next: Option<&PropValue>,
        _namespace: Namespace,
    ) {
        {
            let mut nodes = self.nodes.borrow_mut();
            if let NodeKind::Element { props, .. } = &mut nodes[el.0].kind {
                match next {
                    Some(value) => {
                        props.insert(key.to_string(), value.clone());
                    }
                    None => {
                        props.shift_remove(key);
                    }
                }
            }
        }
        self.log(format!("patch_prop({key})"));
    }
}
