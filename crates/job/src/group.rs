use std::collections::BTreeMap;

use tracetree_core::model::span::SpanRecord;

/// All spans of one trace, in the order they arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceGroup {
    pub trace_id: String,
    pub spans: Vec<SpanRecord>,
}

/// Partitions records by trace id; groups come back sorted by trace id.
pub fn group_by_trace(records: impl IntoIterator<Item = SpanRecord>) -> Vec<TraceGroup> {
    let mut groups: BTreeMap<String, Vec<SpanRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.trace_id.clone())
            .or_default()
            .push(record);
    }
    groups
        .into_iter()
        .map(|(trace_id, spans)| TraceGroup { trace_id, spans })
        .collect()
}
