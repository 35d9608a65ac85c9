use std::cmp::Ordering;
use std::collections::HashMap;

use tracetree_core::error::{Result, TraceTreeError};
use tracetree_core::model::span::SpanRecord;

use crate::anomaly::Anomaly;
use crate::node::{NodeId, SpanNode};
use crate::tree::SpanTree;

/// Resolves one trace group into a single rooted tree.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    trace_id: String,
}

/// A tree plus the anomalies normalized while building it.
#[derive(Debug)]
pub struct BuiltTree {
    pub tree: SpanTree,
    pub anomalies: Vec<Anomaly>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Pending,
    OnPath,
    Done,
}

impl TreeBuilder {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
        }
    }

    /// Builds the tree for `records`, which may arrive in any order.
    ///
    /// Fails with [`TraceTreeError::MalformedTrace`] only when no record can
    /// be elected root. Duplicate ids, dangling parents, extra roots and
    /// partial cycles are repaired and reported in [`BuiltTree::anomalies`].
    pub fn build(&self, records: impl IntoIterator<Item = SpanRecord>) -> Result<BuiltTree> {
        let mut anomalies = Vec::new();
        let (mut nodes, index) = self.index_records(records, &mut anomalies);

        let declared = nodes
            .iter()
            .map(|n| {
                n.span()
                    .parent_id
                    .as_deref()
                    .and_then(|p| index.get(p).copied())
            })
            .collect::<Vec<_>>();

        let candidates = declared
            .iter()
            .enumerate()
            .filter(|(_, parent)| parent.is_none())
            .map(|(i, _)| NodeId::new(i))
            .collect::<Vec<_>>();

        let Some(root) = candidates
            .iter()
            .copied()
            .min_by(|a, b| by_order(&nodes, *a, *b))
        else {
            return Err(TraceTreeError::MalformedTrace {
                trace_id: self.trace_id.clone(),
                spans: nodes.len(),
            });
        };

        let mut parents = declared;
        for candidate in candidates {
            let span = nodes[candidate.index()].span();
            if let Some(parent_id) = &span.parent_id {
                anomalies.push(Anomaly::DanglingParent {
                    span_id: span.span_id.clone(),
                    parent_id: parent_id.clone(),
                });
            } else if candidate != root {
                anomalies.push(Anomaly::ExtraRoot {
                    span_id: span.span_id.clone(),
                    root_span_id: nodes[root.index()].span().span_id.clone(),
                });
            }
            if candidate != root {
                parents[candidate.index()] = Some(root);
            }
        }

        break_cycles(&nodes, &mut parents, root, &mut anomalies);

        for (i, parent) in parents.iter().enumerate() {
            if let Some(parent) = parent {
                nodes[i].parent = Some(*parent);
                nodes[parent.index()].children.push(NodeId::new(i));
            }
        }
        for i in 0..nodes.len() {
            let mut children = std::mem::take(&mut nodes[i].children);
            children.sort_by(|a, b| by_order(&nodes, *a, *b));
            nodes[i].children = children;
        }

        Ok(BuiltTree {
            tree: SpanTree::from_parts(nodes, root),
            anomalies,
        })
    }

    /// Keeps the first record per span id, in input order.
    fn index_records(
        &self,
        records: impl IntoIterator<Item = SpanRecord>,
        anomalies: &mut Vec<Anomaly>,
    ) -> (Vec<SpanNode>, HashMap<String, NodeId>) {
        let mut nodes = Vec::new();
        let mut index = HashMap::new();
        for record in records {
            if record.trace_id != self.trace_id {
                anomalies.push(Anomaly::ForeignTrace {
                    span_id: record.span_id,
                    trace_id: record.trace_id,
                });
                continue;
            }
            if index.contains_key(&record.span_id) {
                anomalies.push(Anomaly::DuplicateSpanId {
                    span_id: record.span_id,
                });
                continue;
            }
            index.insert(record.span_id.clone(), NodeId::new(nodes.len()));
            nodes.push(SpanNode::new(record));
        }
        (nodes, index)
    }
}

fn by_order(nodes: &[SpanNode], a: NodeId, b: NodeId) -> Ordering {
    let a = nodes[a.index()].span();
    let b = nodes[b.index()].span();
    a.order_key().cmp(&b.order_key())
}

/// Walks parent links from every node and cuts each cycle it finds.
///
/// Nodes are visited in sibling order and each cycle is cut at its earliest
/// member, so the repaired shape does not depend on input order.
fn break_cycles(
    nodes: &[SpanNode],
    parents: &mut [Option<NodeId>],
    root: NodeId,
    anomalies: &mut Vec<Anomaly>,
) {
    let mut visit = vec![Visit::Pending; nodes.len()];
    visit[root.index()] = Visit::Done;

    let mut starts = (0..nodes.len()).map(NodeId::new).collect::<Vec<_>>();
    starts.sort_by(|a, b| by_order(nodes, *a, *b));

    let mut path = Vec::new();
    for start in starts {
        path.clear();
        let mut cur = start;
        loop {
            match visit[cur.index()] {
                Visit::Done => break,
                Visit::OnPath => {
                    let Some(pos) = path.iter().position(|id| *id == cur) else {
                        break;
                    };
                    let Some(cut) = path[pos..]
                        .iter()
                        .copied()
                        .min_by(|a, b| by_order(nodes, *a, *b))
                    else {
                        break;
                    };
                    let span = nodes[cut.index()].span();
                    anomalies.push(Anomaly::CycleBroken {
                        span_id: span.span_id.clone(),
                        parent_id: span.parent_id.clone().unwrap_or_default(),
                    });
                    parents[cut.index()] = Some(root);
                    break;
                }
                Visit::Pending => {
                    visit[cur.index()] = Visit::OnPath;
                    path.push(cur);
                    match parents[cur.index()] {
                        Some(parent) => cur = parent,
                        None => break,
                    }
                }
            }
        }
        for id in &path {
            visit[id.index()] = Visit::Done;
        }
    }
}

#[cfg(test)]
mod tests {
    use testkit::span;
    use tracetree_core::error::TraceTreeError;

    use super::*;

    fn child_ids(tree: &SpanTree, span_id: &str) -> Vec<String> {
        tree.find(span_id)
            .unwrap()
            .children()
            .map(|c| c.span().span_id.clone())
            .collect()
    }

    #[test]
    fn chain_builds_one_child_per_level() {
        let n = 6;
        let mut records = (1..=n)
            .map(|i| {
                let parent = (i > 1).then(|| (i - 1).to_string());
                span("t1", &i.to_string(), parent.as_deref(), i)
            })
            .collect::<Vec<_>>();
        records.reverse();

        let built = TreeBuilder::new("t1").build(records).unwrap();
        let tree = built.tree;
        assert!(built.anomalies.is_empty());
        assert_eq!(tree.depth(), n as usize);
        assert_eq!(tree.span_count(), n as usize);
        for node in tree.iter() {
            let expected = if node.span().span_id == n.to_string() { 0 } else { 1 };
            assert_eq!(node.children().len(), expected);
        }
        assert_eq!(tree.root().span().span_id, "1");
    }

    #[test]
    fn siblings_sort_by_start_time() {
        let tree = TreeBuilder::new("t1")
            .build(vec![
                span("t1", "root", None, 0),
                span("t1", "late", Some("root"), 20),
                span("t1", "early", Some("root"), 10),
                span("t1", "last", Some("root"), 30),
            ])
            .unwrap()
            .tree;
        assert_eq!(child_ids(&tree, "root"), vec!["early", "late", "last"]);
    }

    #[test]
    fn equal_start_times_sort_by_span_id() {
        let tree = TreeBuilder::new("t1")
            .build(vec![
                span("t1", "root", None, 0),
                span("t1", "b", Some("root"), 5),
                span("t1", "a", Some("root"), 5),
            ])
            .unwrap()
            .tree;
        assert_eq!(child_ids(&tree, "root"), vec!["a", "b"]);
    }

    #[test]
    fn dangling_parent_attaches_under_root() {
        let built = TreeBuilder::new("t1")
            .build(vec![
                span("t1", "root", None, 0),
                span("t1", "child", Some("root"), 1),
                span("t1", "orphan", Some("truncated"), 2),
            ])
            .unwrap();

        assert_eq!(child_ids(&built.tree, "root"), vec!["child", "orphan"]);
        assert_eq!(built.tree.span_count(), 3);
        assert_eq!(
            built.anomalies,
            vec![Anomaly::DanglingParent {
                span_id: "orphan".into(),
                parent_id: "truncated".into(),
            }]
        );
    }

    #[test]
    fn duplicate_span_id_keeps_first_record() {
        let mut first = span("t1", "dup", Some("root"), 1);
        first.name = "first".into();
        let mut second = span("t1", "dup", Some("root"), 2);
        second.name = "second".into();

        let built = TreeBuilder::new("t1")
            .build(vec![span("t1", "root", None, 0), first, second])
            .unwrap();

        assert_eq!(built.tree.span_count(), 2);
        assert_eq!(built.tree.find("dup").unwrap().span().name, "first");
        assert_eq!(
            built.anomalies,
            vec![Anomaly::DuplicateSpanId {
                span_id: "dup".into()
            }]
        );
    }

    #[test]
    fn fully_cyclic_group_is_malformed() {
        let err = TreeBuilder::new("t1")
            .build(vec![
                span("t1", "A", Some("B"), 0),
                span("t1", "B", Some("C"), 1),
                span("t1", "C", Some("A"), 2),
            ])
            .unwrap_err();

        assert!(err.is_malformed_trace());
        assert!(matches!(
            err,
            TraceTreeError::MalformedTrace { ref trace_id, spans: 3 } if trace_id == "t1"
        ));
    }

    #[test]
    fn empty_group_is_malformed() {
        let err = TreeBuilder::new("t1").build(Vec::new()).unwrap_err();
        assert!(matches!(err, TraceTreeError::MalformedTrace { spans: 0, .. }));
    }

    #[test]
    fn extra_roots_move_under_earliest_root() {
        let built = TreeBuilder::new("t1")
            .build(vec![
                span("t1", "second", None, 10),
                span("t1", "first", None, 0),
                span("t1", "second.child", Some("second"), 11),
            ])
            .unwrap();

        let tree = built.tree;
        assert_eq!(tree.root().span().span_id, "first");
        assert_eq!(child_ids(&tree, "first"), vec!["second"]);
        assert_eq!(child_ids(&tree, "second"), vec!["second.child"]);
        assert_eq!(
            built.anomalies,
            vec![Anomaly::ExtraRoot {
                span_id: "second".into(),
                root_span_id: "first".into(),
            }]
        );
    }

    #[test]
    fn root_tie_breaks_on_span_id() {
        let tree = TreeBuilder::new("t1")
            .build(vec![span("t1", "y", None, 0), span("t1", "x", None, 0)])
            .unwrap()
            .tree;
        assert_eq!(tree.root().span().span_id, "x");
        assert_eq!(child_ids(&tree, "x"), vec!["y"]);
    }

    #[test]
    fn partial_cycle_is_cut_at_earliest_member() {
        let built = TreeBuilder::new("t1")
            .build(vec![
                span("t1", "root", None, 0),
                span("t1", "c1", Some("c2"), 5),
                span("t1", "c2", Some("c1"), 3),
                span("t1", "tail", Some("c1"), 7),
            ])
            .unwrap();

        let tree = built.tree;
        assert_eq!(tree.span_count(), 4);
        assert_eq!(child_ids(&tree, "root"), vec!["c2"]);
        assert_eq!(child_ids(&tree, "c2"), vec!["c1"]);
        assert_eq!(child_ids(&tree, "c1"), vec!["tail"]);
        assert_eq!(
            built.anomalies,
            vec![Anomaly::CycleBroken {
                span_id: "c2".into(),
                parent_id: "c1".into(),
            }]
        );
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let built = TreeBuilder::new("t1")
            .build(vec![span("t1", "root", None, 0), span("t1", "me", Some("me"), 1)])
            .unwrap();
        assert_eq!(child_ids(&built.tree, "root"), vec!["me"]);
        assert_eq!(built.anomalies.len(), 1);
        assert_eq!(built.anomalies[0].kind(), "cycle_broken");
    }

    #[test]
    fn cycle_repair_ignores_input_order() {
        let records = vec![
            span("t1", "root", None, 0),
            span("t1", "a", Some("c"), 4),
            span("t1", "b", Some("a"), 2),
            span("t1", "c", Some("b"), 6),
            span("t1", "d", Some("b"), 1),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let first = TreeBuilder::new("t1").build(records).unwrap().tree;
        let second = TreeBuilder::new("t1").build(reversed).unwrap().tree;

        let shape = |tree: &SpanTree| {
            tree.iter()
                .map(|n| {
                    let parent = n.parent().map(|p| p.span().span_id.clone());
                    (n.span().span_id.clone(), parent)
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&first), shape(&second));
        assert_eq!(child_ids(&first, "root"), vec!["b"]);
    }

    #[test]
    fn foreign_trace_records_are_dropped() {
        let built = TreeBuilder::new("t1")
            .build(vec![span("t1", "root", None, 0), span("t2", "other", None, 1)])
            .unwrap();
        assert_eq!(built.tree.span_count(), 1);
        assert_eq!(
            built.anomalies,
            vec![Anomaly::ForeignTrace {
                span_id: "other".into(),
                trace_id: "t2".into(),
            }]
        );
    }

    #[test]
    fn every_non_root_node_has_one_parent() {
        let built = TreeBuilder::new("t1")
            .build(vec![
                span("t1", "r2", None, 3),
                span("t1", "x", Some("y"), 4),
                span("t1", "y", Some("x"), 5),
                span("t1", "r1", None, 1),
                span("t1", "z", Some("missing"), 2),
                span("t1", "w", Some("z"), 6),
            ])
            .unwrap();
        let tree = built.tree;
        assert_eq!(tree.iter().count(), tree.span_count());
        for node in tree.iter() {
            assert_eq!(node.parent().is_none(), node.is_root());
        }
    }
}
