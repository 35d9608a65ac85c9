use tracetree_core::error::Result;
use tracetree_core::model::span::SpanRecord;
use tracetree_core::model::trace::AggregatedTraceRecord;
use tracing::debug;

use crate::anomaly::Anomaly;
use crate::builder::TreeBuilder;

/// Turns one trace group into one aggregated record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceAggregator;

#[derive(Debug)]
pub struct AggregateOutcome {
    pub record: AggregatedTraceRecord,
    pub span_count: usize,
    pub anomalies: Vec<Anomaly>,
}

impl TraceAggregator {
    pub fn aggregate(
        &self,
        trace_id: &str,
        records: Vec<SpanRecord>,
    ) -> Result<AggregatedTraceRecord> {
        self.aggregate_with_report(trace_id, records)
            .map(|outcome| outcome.record)
    }

    /// Like [`Self::aggregate`] but also returns what the builder normalized.
    pub fn aggregate_with_report(
        &self,
        trace_id: &str,
        records: Vec<SpanRecord>,
    ) -> Result<AggregateOutcome> {
        let built = TreeBuilder::new(trace_id).build(records)?;
        for anomaly in &built.anomalies {
            debug!(
                trace_id,
                kind = anomaly.kind(),
                span_id = anomaly.span_id(),
                "normalized span anomaly"
            );
        }

        let root_span = built.tree.serialize()?;
        let span_count = built.tree.span_count();
        let root = built.tree.into_root_span();

        Ok(AggregateOutcome {
            record: AggregatedTraceRecord { root, root_span },
            span_count,
            anomalies: built.anomalies,
        })
    }
}
