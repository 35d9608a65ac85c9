use tracetree_core::model::span::SpanRecord;

/// Index of a node inside the tree that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// A span plus its resolved position in one tree.
///
/// The parent link is a plain index, so the tree is the only owner of every
/// node and no reference cycle can exist.
#[derive(Debug, Clone)]
pub struct SpanNode {
    span: SpanRecord,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl SpanNode {
    pub(crate) fn new(span: SpanRecord) -> Self {
        Self {
            span,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn span(&self) -> &SpanRecord {
        &self.span
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn into_span(self) -> SpanRecord {
        self.span
    }
}
