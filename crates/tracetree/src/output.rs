use std::io::IsTerminal;

use chrono::SecondsFormat;
use owo_colors::OwoColorize;
use tracetree_job::{BatchReport, WriteStats};
use tracetree_store::StoreStatus;
use tracetree_store::query::TraceListItem;
use tracetree_tree::SerializedSpan;

pub fn print_tree_human(root: &SerializedSpan) {
    let color = std::io::stdout().is_terminal();
    println!(
        "TRACE {} spans={} duration={}ms",
        root.span.trace_id,
        root.span_count(),
        root.span.duration_ms()
    );
    for (node, depth) in root.walk() {
        let span = &node.span;
        println!(
            "{}{} [{}] {} ({}ms) {}",
            "  ".repeat(depth),
            span.name,
            span.span_type,
            span.span_id,
            span.duration_ms(),
            status_label(&span.status, color)
        );
    }
}

fn status_label(status: &str, color: bool) -> String {
    if !color {
        return status.to_string();
    }
    match status.to_ascii_uppercase().as_str() {
        "OK" | "SUCCESS" => status.green().to_string(),
        "ERROR" | "FAILED" => status.red().to_string(),
        "UNSET" | "" => status.bright_black().to_string(),
        _ => status.yellow().to_string(),
    }
}

pub fn print_traces_human(items: &[TraceListItem]) {
    for item in items {
        println!(
            "{} trace={} duration={}ms type={} status={} root=\"{}\"",
            item.start_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            item.trace_id,
            item.duration_ms,
            item.span_type,
            item.status,
            item.root_name
        );
    }
    println!("-- {} traces --", items.len());
}

/// Batch summaries go to stderr so aggregated JSON Lines on stdout stay clean.
pub fn print_report_human(report: &BatchReport, written: Option<&WriteStats>) {
    eprintln!(
        "traces={} spans={} anomalies={} failed={}",
        report.traces,
        report.spans,
        report.anomalies,
        report.failed.len()
    );
    for failed in &report.failed {
        eprintln!("  failed trace={} reason={}", failed.trace_id, failed.reason);
    }
    if let Some(stats) = written {
        eprintln!(
            "written traces={} failed_batches={}",
            stats.traces_written, stats.failed_batches
        );
    }
}

pub fn print_status_human(v: &StoreStatus) {
    println!("db_path={}", v.db_path);
    println!("db_size_bytes={}", v.db_size_bytes);
    println!("spans={} traces={}", v.spans_count, v.traces_count);
    if let Some(oldest) = v.oldest_span {
        println!(
            "oldest={}",
            oldest.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
    }
    if let Some(newest) = v.newest_span {
        println!(
            "newest={}",
            newest.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
    }
}
