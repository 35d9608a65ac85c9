use serde::Serialize;
use tokio::task::JoinSet;
use tracetree_core::error::{Result, TraceTreeError};
use tracetree_core::model::trace::AggregatedTraceRecord;
use tracetree_tree::TraceAggregator;
use tracing::{info, warn};

use crate::group::TraceGroup;

/// Aggregates trace groups on a fixed number of blocking workers.
#[derive(Debug, Clone)]
pub struct Runner {
    workers: usize,
    aggregator: TraceAggregator,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BatchReport {
    pub traces: usize,
    pub spans: usize,
    pub anomalies: usize,
    pub failed: Vec<FailedTrace>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailedTrace {
    pub trace_id: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct BatchOutput {
    pub records: Vec<AggregatedTraceRecord>,
    pub report: BatchReport,
}

impl Runner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            aggregator: TraceAggregator,
        }
    }

    /// Aggregates every group. A malformed trace is logged and reported but
    /// never stops the other groups; records come back sorted by trace id.
    pub async fn run(&self, groups: Vec<TraceGroup>) -> Result<BatchOutput> {
        let mut shards: Vec<Vec<TraceGroup>> = (0..self.workers).map(|_| Vec::new()).collect();
        for (i, group) in groups.into_iter().enumerate() {
            shards[i % self.workers].push(group);
        }

        let mut tasks = JoinSet::new();
        for shard in shards.into_iter().filter(|s| !s.is_empty()) {
            let aggregator = self.aggregator;
            tasks.spawn_blocking(move || aggregate_shard(aggregator, shard));
        }

        let mut records = Vec::new();
        let mut report = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            let shard = joined
                .map_err(|e| TraceTreeError::Internal(format!("aggregation worker failed: {e}")))?;
            records.extend(shard.records);
            report.spans += shard.report.spans;
            report.anomalies += shard.report.anomalies;
            report.failed.extend(shard.report.failed);
        }

        records.sort_by(|a, b| a.trace_id().cmp(b.trace_id()));
        report.failed.sort_by(|a, b| a.trace_id.cmp(&b.trace_id));
        report.traces = records.len();

        info!(
            traces = report.traces,
            spans = report.spans,
            anomalies = report.anomalies,
            failed = report.failed.len(),
            "aggregated trace batch"
        );
        Ok(BatchOutput { records, report })
    }
}

fn aggregate_shard(aggregator: TraceAggregator, shard: Vec<TraceGroup>) -> BatchOutput {
    let mut records = Vec::with_capacity(shard.len());
    let mut report = BatchReport::default();
    for group in shard {
        match aggregator.aggregate_with_report(&group.trace_id, group.spans) {
            Ok(outcome) => {
                report.spans += outcome.span_count;
                report.anomalies += outcome.anomalies.len();
                records.push(outcome.record);
            }
            Err(err) => {
                warn!(trace_id = %group.trace_id, error = %err, "skipping trace");
                report.failed.push(FailedTrace {
                    trace_id: group.trace_id,
                    reason: err.to_string(),
                });
            }
        }
    }
    BatchOutput { records, report }
}
