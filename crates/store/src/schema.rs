pub const SCHEMA_SQL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS spans_id_seq;

CREATE TABLE IF NOT EXISTS spans (
  id BIGINT PRIMARY KEY,
  trace_id TEXT NOT NULL,
  span_id TEXT NOT NULL,
  parent_id TEXT,
  span_type TEXT NOT NULL,
  name TEXT NOT NULL,
  status TEXT NOT NULL,
  framework TEXT NOT NULL,
  start_time TIMESTAMP NOT NULL,
  end_time TIMESTAMP NOT NULL,
  input TEXT,
  output TEXT,
  attributes TEXT NOT NULL,
  events_json TEXT NOT NULL,
  links_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS traces (
  trace_id TEXT PRIMARY KEY,
  span_id TEXT NOT NULL,
  parent_id TEXT,
  span_type TEXT NOT NULL,
  name TEXT NOT NULL,
  status TEXT NOT NULL,
  framework TEXT NOT NULL,
  start_time TIMESTAMP NOT NULL,
  end_time TIMESTAMP NOT NULL,
  input TEXT,
  output TEXT,
  attributes TEXT NOT NULL,
  events_json TEXT NOT NULL,
  links_json TEXT NOT NULL,
  root_span TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_spans_trace ON spans(trace_id);
CREATE INDEX IF NOT EXISTS idx_spans_start ON spans(start_time);
CREATE INDEX IF NOT EXISTS idx_traces_start ON traces(start_time);
"#;
