use tracetree_core::model::span::SpanRecord;

use crate::node::{NodeId, SpanNode};

/// The reconstructed hierarchy of one trace.
///
/// Nodes live in a single arena. Every node but the root has exactly one
/// parent, and children are kept sorted by `(start_time, span_id)`.
#[derive(Debug, Clone)]
pub struct SpanTree {
    nodes: Vec<SpanNode>,
    root: NodeId,
}

impl SpanTree {
    pub(crate) fn from_parts(nodes: Vec<SpanNode>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.node(self.root)
    }

    pub fn trace_id(&self) -> &str {
        &self.root().span().trace_id
    }

    /// Number of spans placed in the tree.
    pub fn span_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn find(&self, span_id: &str) -> Option<NodeRef<'_>> {
        self.nodes
            .iter()
            .position(|n| n.span().span_id == span_id)
            .map(|i| self.node(NodeId::new(i)))
    }

    /// Depth-first pre-order walk starting at the root.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// Number of levels; a lone root has depth 1.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self.root, 1usize)];
        while let Some((id, depth)) = stack.pop() {
            max = max.max(depth);
            stack.extend(self.raw(id).children.iter().map(|c| (*c, depth + 1)));
        }
        max
    }

    pub fn into_root_span(mut self) -> SpanRecord {
        self.nodes.swap_remove(self.root.index()).into_span()
    }

    fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    fn raw(&self, id: NodeId) -> &SpanNode {
        &self.nodes[id.index()]
    }
}

impl<'a> IntoIterator for &'a SpanTree {
    type Item = NodeRef<'a>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowed handle to one node, able to walk to its parent and children.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a SpanTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &'a SpanNode {
        self.tree.raw(self.id)
    }

    pub fn span(&self) -> &'a SpanRecord {
        self.node().span()
    }

    pub fn is_root(&self) -> bool {
        self.id == self.tree.root
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node().parent().map(|id| self.tree.node(id))
    }

    pub fn children(&self) -> impl ExactSizeIterator<Item = NodeRef<'a>> + use<'a> {
        let tree = self.tree;
        self.node().children().iter().map(move |id| tree.node(*id))
    }

    /// Distance from the root; the root itself is at depth 0.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = self.parent();
        while let Some(node) = cur {
            depth += 1;
            cur = node.parent();
        }
        depth
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("span_id", &self.span().span_id)
            .field("children", &self.node().children().len())
            .finish()
    }
}

pub struct Iter<'a> {
    tree: &'a SpanTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.raw(id).children.iter().rev().copied());
        Some(self.tree.node(id))
    }
}
