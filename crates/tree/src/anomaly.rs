use serde::Serialize;

/// A data-quality condition the builder normalized instead of rejecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// A later record reused a span id; only the first record was kept.
    DuplicateSpanId { span_id: String },
    /// The record belongs to another trace and was dropped.
    ForeignTrace { span_id: String, trace_id: String },
    /// `parent_id` names a span missing from the group.
    DanglingParent { span_id: String, parent_id: String },
    /// A second span without a parent, moved under the elected root.
    ExtraRoot { span_id: String, root_span_id: String },
    /// The span closed a parent cycle and was moved under the root.
    CycleBroken { span_id: String, parent_id: String },
}

impl Anomaly {
    pub fn span_id(&self) -> &str {
        match self {
            Self::DuplicateSpanId { span_id }
            | Self::ForeignTrace { span_id, .. }
            | Self::DanglingParent { span_id, .. }
            | Self::ExtraRoot { span_id, .. }
            | Self::CycleBroken { span_id, .. } => span_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateSpanId { .. } => "duplicate_span_id",
            Self::ForeignTrace { .. } => "foreign_trace",
            Self::DanglingParent { .. } => "dangling_parent",
            Self::ExtraRoot { .. } => "extra_root",
            Self::CycleBroken { .. } => "cycle_broken",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_tag() {
        let anomaly = Anomaly::DanglingParent {
            span_id: "5".into(),
            parent_id: "gone".into(),
        };
        let value = serde_json::to_value(&anomaly).unwrap();
        assert_eq!(value["kind"], anomaly.kind());
        assert_eq!(value["parent_id"], "gone");
        assert_eq!(anomaly.span_id(), "5");
    }
}
