use duckdb::params;
use tracetree_core::error::{Result, TraceTreeError};
use tracetree_core::model::span::SpanRecord;
use tracetree_core::model::trace::AggregatedTraceRecord;
use tracing::debug;

use crate::Store;

impl Store {
    /// Appends spans in the given order. Duplicate span ids are kept; the
    /// aggregation step decides which record wins.
    pub fn insert_spans(&self, spans: &[SpanRecord]) -> Result<()> {
        if spans.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| TraceTreeError::Store(format!("begin tx failed: {e}")))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO spans
                     (id, trace_id, span_id, parent_id, span_type, name, status, framework,
                      start_time, end_time, input, output, attributes, events_json, links_json)
                     VALUES (nextval('spans_id_seq'), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| TraceTreeError::Store(format!("prepare insert spans failed: {e}")))?;

            for span in spans {
                stmt.execute(params![
                    span.trace_id,
                    span.span_id,
                    span.parent_id,
                    span.span_type,
                    span.name,
                    span.status,
                    span.framework,
                    span.start_time.to_rfc3339(),
                    span.end_time.to_rfc3339(),
                    span.input,
                    span.output,
                    span.attributes,
                    encode_list(&span.events)?,
                    encode_list(&span.links)?,
                ])
                .map_err(|e| TraceTreeError::Store(format!("insert span failed: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| TraceTreeError::Store(format!("commit spans failed: {e}")))?;
        debug!(count = spans.len(), "inserted spans");
        Ok(())
    }

    /// Writes aggregated traces; a trace id that is already stored is replaced.
    pub fn insert_traces(&self, traces: &[AggregatedTraceRecord]) -> Result<()> {
        if traces.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| TraceTreeError::Store(format!("begin tx failed: {e}")))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO traces
                     (trace_id, span_id, parent_id, span_type, name, status, framework,
                      start_time, end_time, input, output, attributes, events_json, links_json,
                      root_span)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| {
                    TraceTreeError::Store(format!("prepare insert traces failed: {e}"))
                })?;

            for trace in traces {
                let root = &trace.root;
                stmt.execute(params![
                    root.trace_id,
                    root.span_id,
                    root.parent_id,
                    root.span_type,
                    root.name,
                    root.status,
                    root.framework,
                    root.start_time.to_rfc3339(),
                    root.end_time.to_rfc3339(),
                    root.input,
                    root.output,
                    root.attributes,
                    encode_list(&root.events)?,
                    encode_list(&root.links)?,
                    trace.root_span,
                ])
                .map_err(|e| TraceTreeError::Store(format!("insert trace failed: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| TraceTreeError::Store(format!("commit traces failed: {e}")))?;
        debug!(count = traces.len(), "inserted traces");
        Ok(())
    }
}

fn encode_list(items: &[String]) -> Result<String> {
    serde_json::to_string(items)
        .map_err(|e| TraceTreeError::Encode(format!("failed to encode list column: {e}")))
}
