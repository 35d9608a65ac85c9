use serde::Deserialize;
use tracetree_core::error::{Result, TraceTreeError};
use tracetree_core::model::span::SpanRecord;

use crate::tree::SpanTree;

impl SpanTree {
    /// Canonical JSON form of the whole tree.
    ///
    /// Each node carries its span fields in declaration order followed by a
    /// `children` array in sibling order, so equal trees encode to equal bytes.
    pub fn serialize(&self) -> Result<String> {
        encode_nested(
            self.root(),
            |node| node.span(),
            |node| node.children().collect(),
        )
    }
}

/// Owned form of a serialized tree, as read back from a `root_span` column.
#[derive(Debug, Deserialize, PartialEq)]
pub struct SerializedSpan {
    #[serde(flatten)]
    pub span: SpanRecord,
    pub children: Vec<SerializedSpan>,
}

impl SerializedSpan {
    /// Total number of spans in this subtree.
    pub fn span_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Subtree in pre-order, paired with the depth below this node.
    pub fn walk(&self) -> Vec<(&SerializedSpan, usize)> {
        let mut out = Vec::new();
        let mut stack = vec![(self, 0)];
        while let Some((node, depth)) = stack.pop() {
            out.push((node, depth));
            stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
        }
        out
    }

    pub fn encode(&self) -> Result<String> {
        encode_nested(
            self,
            |node| &node.span,
            |node| node.children.iter().collect(),
        )
    }
}

// Unlinks children before they drop so deep chains never recurse.
impl Drop for SerializedSpan {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// Parses a `root_span` payload of any depth.
pub fn decode_root_span(raw: &str) -> Result<SerializedSpan> {
    let mut json = serde_json::Deserializer::from_str(raw);
    json.disable_recursion_limit();
    let span = SerializedSpan::deserialize(serde_stacker::Deserializer::new(&mut json))
        .map_err(|e| TraceTreeError::Parse(format!("invalid root_span payload: {e}")))?;
    json.end()
        .map_err(|e| TraceTreeError::Parse(format!("invalid root_span payload: {e}")))?;
    Ok(span)
}

enum Step<N> {
    Open { node: N, first: bool },
    Close,
}

/// Writes the nested form with an explicit stack instead of one call per level.
fn encode_nested<'a, N: Copy>(
    root: N,
    record: impl Fn(N) -> &'a SpanRecord,
    children: impl Fn(N) -> Vec<N>,
) -> Result<String> {
    let mut out = Vec::new();
    let mut stack = vec![Step::Open {
        node: root,
        first: true,
    }];
    while let Some(step) = stack.pop() {
        match step {
            Step::Open { node, first } => {
                if !first {
                    out.push(b',');
                }
                serde_json::to_writer(&mut out, record(node))
                    .map_err(|e| TraceTreeError::Encode(format!("failed to encode span: {e}")))?;
                // reopen the span object to append its children
                out.pop();
                out.extend_from_slice(br#","children":["#);
                stack.push(Step::Close);
                let kids = children(node);
                stack.extend(
                    kids.into_iter()
                        .enumerate()
                        .rev()
                        .map(|(i, node)| Step::Open { node, first: i == 0 }),
                );
            }
            Step::Close => out.extend_from_slice(b"]}"),
        }
    }
    String::from_utf8(out)
        .map_err(|e| TraceTreeError::Encode(format!("span tree is not utf-8: {e}")))
}
