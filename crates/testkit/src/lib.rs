use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracetree_core::model::span::SpanRecord;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 5, 0, 1, 0).unwrap()
}

/// A one-second span starting `start_offset_secs` after [`base_time`].
pub fn span(
    trace_id: &str,
    span_id: &str,
    parent_id: Option<&str>,
    start_offset_secs: i64,
) -> SpanRecord {
    let start = base_time() + Duration::seconds(start_offset_secs);
    SpanRecord {
        trace_id: trace_id.to_string(),
        span_id: span_id.to_string(),
        parent_id: parent_id.map(str::to_string),
        span_type: "llm".to_string(),
        name: format!("span {span_id}"),
        status: "OK".to_string(),
        framework: "LLM".to_string(),
        start_time: start,
        end_time: start + Duration::seconds(1),
        input: Some("in".to_string()),
        output: Some("out".to_string()),
        attributes: "{}".to_string(),
        events: Vec::new(),
        links: Vec::new(),
    }
}

/// A small retrieval-augmented chat invocation, listed children first.
pub fn sample_trace(trace_id: &str) -> Vec<SpanRecord> {
    let base = base_time();
    let mut embed = span(trace_id, "embed", Some("retrieve"), 2);
    embed.span_type = "embedding".to_string();
    embed.name = "embed query".to_string();

    let mut retrieve = span(trace_id, "retrieve", Some("chat"), 1);
    retrieve.span_type = "retrieval".to_string();
    retrieve.name = "vector search".to_string();
    retrieve.end_time = base + Duration::seconds(4);
    retrieve.attributes = "{\"index\":\"docs\",\"top_k\":\"5\"}".to_string();

    let mut completion = span(trace_id, "completion", Some("chat"), 5);
    completion.name = "chat completion".to_string();
    completion.end_time = base + Duration::seconds(9);
    completion.events = vec!["{\"name\":\"first_token\"}".to_string()];

    let mut chat = span(trace_id, "chat", None, 0);
    chat.span_type = "flow".to_string();
    chat.name = "chat".to_string();
    chat.end_time = base + Duration::seconds(10);
    chat.input = Some("{\"question\":\"what is a span?\"}".to_string());
    chat.output = Some("{\"answer\":\"a unit of work\"}".to_string());

    vec![embed, completion, retrieve, chat]
}

pub fn write_jsonl(path: &Path, spans: &[SpanRecord]) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for span in spans {
        serde_json::to_writer(&mut file, span)?;
        file.write_all(b"\n")?;
    }
    Ok(())
}
