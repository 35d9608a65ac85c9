//! Newline-delimited JSON input and output.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracetree_core::error::{Result, TraceTreeError};
use tracetree_core::model::span::SpanRecord;
use tracetree_core::model::trace::AggregatedTraceRecord;

pub fn read_spans(path: &Path) -> Result<Vec<SpanRecord>> {
    let file = File::open(path)
        .map_err(|e| TraceTreeError::Io(format!("failed to open {}: {e}", path.display())))?;
    read_spans_from(BufReader::new(file))
}

/// One span per line; blank lines are skipped.
pub fn read_spans_from(reader: impl BufRead) -> Result<Vec<SpanRecord>> {
    let mut spans = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| TraceTreeError::Io(format!("read failed: {e}")))?;
        if line.trim().is_empty() {
            continue;
        }
        let span = serde_json::from_str(&line)
            .map_err(|e| TraceTreeError::Parse(format!("line {}: {e}", idx + 1)))?;
        spans.push(span);
    }
    Ok(spans)
}

pub fn write_traces(path: &Path, traces: &[AggregatedTraceRecord]) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| TraceTreeError::Io(format!("failed to create {}: {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_traces_to(&mut out, traces)?;
    out.flush()
        .map_err(|e| TraceTreeError::Io(format!("flush failed: {e}")))
}

pub fn write_traces_to(mut writer: impl Write, traces: &[AggregatedTraceRecord]) -> Result<()> {
    for trace in traces {
        serde_json::to_writer(&mut writer, trace)
            .map_err(|e| TraceTreeError::Encode(format!("failed to encode trace: {e}")))?;
        writer
            .write_all(b"\n")
            .map_err(|e| TraceTreeError::Io(format!("write failed: {e}")))?;
    }
    Ok(())
}
