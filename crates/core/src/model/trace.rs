use serde::{Deserialize, Serialize};

use crate::model::span::SpanRecord;

/// One output row per trace: the root span's fields plus the serialized tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedTraceRecord {
    #[serde(flatten)]
    pub root: SpanRecord,
    pub root_span: String,
}

impl AggregatedTraceRecord {
    pub fn trace_id(&self) -> &str {
        &self.root.trace_id
    }
}
