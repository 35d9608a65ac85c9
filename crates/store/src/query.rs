use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::types::Value;
use duckdb::{Row, params, params_from_iter};
use serde::{Deserialize, Serialize};
use tracetree_core::error::{Result, TraceTreeError};
use tracetree_core::filter::TimeWindow;
use tracetree_core::model::span::SpanRecord;
use tracetree_core::model::trace::AggregatedTraceRecord;

use crate::Store;

const SPAN_COLUMNS: &str = "trace_id, span_id, parent_id, span_type, name, status, framework,
     start_time, end_time, input, output, attributes, events_json, links_json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceListItem {
    pub trace_id: String,
    pub root_name: String,
    pub span_type: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub duration_ms: i64,
}

impl Store {
    /// Spans whose start time falls in `window`, in arrival order.
    pub fn fetch_spans(&self, window: &TimeWindow) -> Result<Vec<SpanRecord>> {
        let (where_sql, args) = window_clause(window);
        let sql = format!("SELECT {SPAN_COLUMNS} FROM spans {where_sql} ORDER BY id ASC");

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TraceTreeError::Store(format!("prepare fetch spans failed: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), SpanRow::from_row)
            .map_err(|e| TraceTreeError::Store(format!("query spans failed: {e}")))?;

        let mut spans = Vec::new();
        for row in rows {
            let row = row.map_err(|e| TraceTreeError::Store(format!("map span failed: {e}")))?;
            spans.push(row.into_span()?);
        }
        Ok(spans)
    }

    pub fn get_trace(&self, trace_id: &str) -> Result<Option<AggregatedTraceRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SPAN_COLUMNS}, root_span FROM traces WHERE trace_id = ?"
            ))
            .map_err(|e| TraceTreeError::Store(format!("prepare get trace failed: {e}")))?;
        let mut rows = stmt
            .query_map(params![trace_id], |row| {
                Ok((SpanRow::from_row(row)?, row.get::<_, String>(14)?))
            })
            .map_err(|e| TraceTreeError::Store(format!("query trace failed: {e}")))?;

        let Some(row) = rows.next() else {
            return Ok(None);
        };
        let (span, root_span) =
            row.map_err(|e| TraceTreeError::Store(format!("map trace failed: {e}")))?;
        Ok(Some(AggregatedTraceRecord {
            root: span.into_span()?,
            root_span,
        }))
    }

    /// Aggregated traces whose root starts in `window`, most recent first.
    pub fn list_traces(&self, window: &TimeWindow, limit: usize) -> Result<Vec<TraceListItem>> {
        let (where_sql, args) = window_clause(window);
        let sql = format!(
            "SELECT trace_id, name, span_type, status, start_time, end_time
             FROM traces {where_sql}
             ORDER BY start_time DESC, trace_id ASC
             LIMIT {limit}"
        );

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TraceTreeError::Store(format!("prepare traces failed: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                let start = naive_to_utc(row.get::<_, NaiveDateTime>(4)?);
                let end = naive_to_utc(row.get::<_, NaiveDateTime>(5)?);
                Ok(TraceListItem {
                    trace_id: row.get::<_, String>(0)?,
                    root_name: row.get::<_, String>(1)?,
                    span_type: row.get::<_, String>(2)?,
                    status: row.get::<_, String>(3)?,
                    start_time: start,
                    duration_ms: (end - start).num_milliseconds().max(0),
                })
            })
            .map_err(|e| TraceTreeError::Store(format!("query traces failed: {e}")))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(
                row.map_err(|e| TraceTreeError::Store(format!("map traces row failed: {e}")))?,
            );
        }
        Ok(items)
    }
}

/// `WHERE` clause over `start_time`, empty for an open window.
fn window_clause(window: &TimeWindow) -> (String, Vec<Value>) {
    let mut where_parts = Vec::new();
    let mut args = Vec::new();

    if let Some(since) = window.since {
        where_parts.push("start_time >= ?");
        args.push(Value::Text(since.to_rfc3339()));
    }
    if let Some(until) = window.until {
        where_parts.push("start_time <= ?");
        args.push(Value::Text(until.to_rfc3339()));
    }

    if where_parts.is_empty() {
        (String::new(), args)
    } else {
        (format!("WHERE {}", where_parts.join(" AND ")), args)
    }
}

/// Raw column values; list columns are decoded outside the row callback so
/// JSON errors surface as store errors.
struct SpanRow {
    trace_id: String,
    span_id: String,
    parent_id: Option<String>,
    span_type: String,
    name: String,
    status: String,
    framework: String,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    input: Option<String>,
    output: Option<String>,
    attributes: String,
    events_json: String,
    links_json: String,
}

impl SpanRow {
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            trace_id: row.get(0)?,
            span_id: row.get(1)?,
            parent_id: row.get(2)?,
            span_type: row.get(3)?,
            name: row.get(4)?,
            status: row.get(5)?,
            framework: row.get(6)?,
            start_time: row.get(7)?,
            end_time: row.get(8)?,
            input: row.get(9)?,
            output: row.get(10)?,
            attributes: row.get(11)?,
            events_json: row.get(12)?,
            links_json: row.get(13)?,
        })
    }

    fn into_span(self) -> Result<SpanRecord> {
        Ok(SpanRecord {
            events: decode_list(&self.events_json, &self.span_id)?,
            links: decode_list(&self.links_json, &self.span_id)?,
            trace_id: self.trace_id,
            span_id: self.span_id,
            parent_id: self.parent_id,
            span_type: self.span_type,
            name: self.name,
            status: self.status,
            framework: self.framework,
            start_time: naive_to_utc(self.start_time),
            end_time: naive_to_utc(self.end_time),
            input: self.input,
            output: self.output,
            attributes: self.attributes,
        })
    }
}

fn decode_list(raw: &str, span_id: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| {
        TraceTreeError::Store(format!("bad list column for span {span_id}: {e}"))
    })
}

fn naive_to_utc(ts: NaiveDateTime) -> DateTime<Utc> {
    ts.and_utc()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use testkit::{sample_trace, span};
    use tracetree_core::filter::TimeWindow;
    use tracetree_core::model::trace::AggregatedTraceRecord;

    use crate::Store;

    #[test]
    fn spans_round_trip_in_arrival_order() {
        let store = Store::open_in_memory().unwrap();
        let spans = sample_trace("t1");
        store.insert_spans(&spans).unwrap();

        assert_eq!(store.fetch_spans(&TimeWindow::all()).unwrap(), spans);
    }

    #[test]
    fn duplicate_span_ids_are_kept() {
        let store = Store::open_in_memory().unwrap();
        let mut second = span("t1", "dup", None, 5);
        second.name = "second".into();
        store
            .insert_spans(&[span("t1", "dup", None, 0), second])
            .unwrap();

        let fetched = store.fetch_spans(&TimeWindow::all()).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[1].name, "second");
        assert_eq!(store.status().unwrap().spans_count, 2);
    }

    #[test]
    fn fetch_spans_honors_window() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_spans(&[
                span("t1", "a", None, 0),
                span("t1", "b", Some("a"), 60),
                span("t2", "c", None, 120),
            ])
            .unwrap();

        let since = testkit::base_time() + Duration::seconds(30);
        let until = testkit::base_time() + Duration::seconds(90);
        let window = TimeWindow::new(Some(since), Some(until)).unwrap();
        let ids = store
            .fetch_spans(&window)
            .unwrap()
            .into_iter()
            .map(|s| s.span_id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn traces_replace_by_trace_id() {
        let store = Store::open_in_memory().unwrap();
        let root = span("t1", "root", None, 0);
        let first = AggregatedTraceRecord {
            root: root.clone(),
            root_span: "{\"v\":1}".into(),
        };
        let second = AggregatedTraceRecord {
            root,
            root_span: "{\"v\":2}".into(),
        };
        store.insert_traces(&[first]).unwrap();
        store.insert_traces(&[second.clone()]).unwrap();

        assert_eq!(store.get_trace("t1").unwrap(), Some(second));
        assert_eq!(store.get_trace("missing").unwrap(), None);
        assert_eq!(store.status().unwrap().traces_count, 1);
    }

    #[test]
    fn list_traces_newest_first_with_limit() {
        let store = Store::open_in_memory().unwrap();
        let records = ["old", "mid", "new"]
            .iter()
            .enumerate()
            .map(|(i, id)| AggregatedTraceRecord {
                root: span(id, "root", None, i as i64 * 60),
                root_span: "{}".into(),
            })
            .collect::<Vec<_>>();
        store.insert_traces(&records).unwrap();

        let items = store.list_traces(&TimeWindow::all(), 2).unwrap();
        let ids = items.iter().map(|i| i.trace_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["new", "mid"]);
        assert_eq!(items[0].duration_ms, 1000);

        let since = chrono::Utc.with_ymd_and_hms(2024, 2, 5, 0, 2, 30).unwrap();
        let window = TimeWindow::new(Some(since), None).unwrap();
        let recent = store.list_traces(&window, 10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].trace_id, "new");
    }

    #[test]
    fn list_traces_with_zero_limit_is_empty() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_traces(&[AggregatedTraceRecord {
                root: span("t1", "root", None, 0),
                root_span: "{}".into(),
            }])
            .unwrap();

        assert!(store.list_traces(&TimeWindow::all(), 0).unwrap().is_empty());
        assert_eq!(store.list_traces(&TimeWindow::all(), 1).unwrap().len(), 1);
    }

    #[test]
    fn list_traces_window_applies_before_limit() {
        let store = Store::open_in_memory().unwrap();
        let records = (0..5)
            .map(|i| AggregatedTraceRecord {
                root: span(&format!("t{i}"), "root", None, i * 60),
                root_span: "{}".into(),
            })
            .collect::<Vec<_>>();
        store.insert_traces(&records).unwrap();

        let until = testkit::base_time() + Duration::seconds(150);
        let window = TimeWindow::new(None, Some(until)).unwrap();
        let ids = store
            .list_traces(&window, 2)
            .unwrap()
            .into_iter()
            .map(|i| i.trace_id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["t2", "t1"]);
    }
}
