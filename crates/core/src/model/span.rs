use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized span as delivered by the preprocessing stage.
///
/// `input` and `output` stay `None` when the raw record carried no such
/// attribute. `attributes`, `events` and `links` are opaque string payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    pub parent_id: Option<String>,
    pub span_type: String,
    pub name: String,
    pub status: String,
    pub framework: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub attributes: String,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

impl SpanRecord {
    pub fn duration_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds().max(0)
    }

    /// Sibling ordering key: start time, then span id.
    pub fn order_key(&self) -> (DateTime<Utc>, &str) {
        (self.start_time, self.span_id.as_str())
    }
}
