mod output;
mod telemetry;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracetree_core::config::Config;
use tracetree_core::filter::TimeWindow;
use tracetree_core::time::resolve_window;
use tracetree_job::jsonl::{read_spans, write_traces, write_traces_to};
use tracetree_job::{BatchReport, Pipeline, PipelineConfig, Runner, WriteStats, group_by_trace};
use tracetree_store::Store;
use tracetree_tree::decode_root_span;
use tracing::info;

use crate::output::{print_report_human, print_status_human, print_traces_human, print_tree_human};
use crate::telemetry::{init_cli_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "tracetree")]
#[command(about = "Aggregate flat span records into nested trace trees")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[arg(long, global = true)]
    workers: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Aggregate a JSON Lines span file into JSON Lines trace records")]
    Aggregate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, help = "Output file; stdout when omitted")]
        output: Option<PathBuf>,
    },
    #[command(about = "Append spans from a JSON Lines file to the store")]
    Load {
        #[arg(long)]
        input: PathBuf,
    },
    #[command(about = "Aggregate stored spans in a time window")]
    Run {
        #[arg(long, help = "RFC3339 time or duration ago (e.g. 2h)")]
        since: Option<String>,
        #[arg(long)]
        until: Option<String>,
    },
    #[command(about = "Print one aggregated trace tree")]
    Show { trace_id: String },
    #[command(about = "List aggregated traces")]
    Traces {
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        until: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    Status,
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    window: TimeWindow,
    report: &'a BatchReport,
    written: WriteStats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing();
    let result = dispatch(cli).await;
    shutdown_tracing();
    result
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let cfg = load_config(&cli)?;

    match cli.command {
        Commands::Aggregate { input, output } => {
            let spans = read_spans(&input).with_context(|| format!("read {}", input.display()))?;
            let batch = Runner::new(cfg.workers).run(group_by_trace(spans)).await?;

            match output {
                Some(path) => write_traces(&path, &batch.records)
                    .with_context(|| format!("write {}", path.display()))?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    write_traces_to(&mut stdout, &batch.records)?;
                    stdout.flush()?;
                }
            }

            if cli.json {
                eprintln!("{}", serde_json::to_string(&batch.report)?);
            } else {
                print_report_human(&batch.report, None);
            }
            Ok(())
        }
        Commands::Load { input } => {
            let spans = read_spans(&input).with_context(|| format!("read {}", input.display()))?;
            let store = open_store(&cfg)?;
            let pipeline = Pipeline::new(store, PipelineConfig::from(&cfg));
            for chunk in chunked(spans, cfg.write_batch_size) {
                pipeline.submit_spans(chunk).await;
            }
            let stats = pipeline.finish().await?;
            info!(spans = stats.spans_written, "loaded spans");

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!(
                    "loaded spans={} failed_batches={}",
                    stats.spans_written, stats.failed_batches
                );
            }
            stats.ensure_complete()?;
            Ok(())
        }
        Commands::Run { since, until } => {
            let window = resolve_window(
                since.as_deref(),
                until.as_deref(),
                cfg.default_window,
                Utc::now(),
            )?;
            let store = open_store(&cfg)?;
            let spans = store.fetch_spans(&window)?;
            info!(spans = spans.len(), ?window, "fetched span window");

            let batch = Runner::new(cfg.workers).run(group_by_trace(spans)).await?;
            let pipeline = Pipeline::new(store, PipelineConfig::from(&cfg));
            for chunk in chunked(batch.records, cfg.write_batch_size) {
                pipeline.submit_traces(chunk).await;
            }
            let written = pipeline.finish().await?;

            if cli.json {
                let summary = RunSummary {
                    window,
                    report: &batch.report,
                    written,
                };
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_report_human(&batch.report, Some(&written));
            }
            written.ensure_complete()?;
            Ok(())
        }
        Commands::Show { trace_id } => {
            let store = open_store(&cfg)?;
            let record = store
                .get_trace(&trace_id)?
                .with_context(|| format!("trace {trace_id} not found"))?;

            if cli.json {
                println!("{}", record.root_span);
            } else {
                let tree = decode_root_span(&record.root_span)?;
                print_tree_human(&tree);
            }
            Ok(())
        }
        Commands::Traces {
            since,
            until,
            limit,
        } => {
            let window = resolve_window(since.as_deref(), until.as_deref(), None, Utc::now())?;
            let store = open_store(&cfg)?;
            let items = store.list_traces(&window, limit)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                print_traces_human(&items);
            }
            Ok(())
        }
        Commands::Status => {
            let store = open_store(&cfg)?;
            let status = store.status()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status_human(&status);
            }
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = Config::load().context("load config")?;
    if let Some(v) = &cli.db_path {
        cfg.db_path = v.clone();
    }
    if let Some(v) = cli.workers {
        cfg.workers = v;
    }
    cfg.validate().context("validate config")?;
    Ok(cfg)
}

fn open_store(cfg: &Config) -> anyhow::Result<Store> {
    Store::open(&cfg.db_path).with_context(|| format!("open store {}", cfg.db_path.display()))
}

fn chunked<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(size).collect());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "tracetree",
            "run",
            "--since",
            "2h",
            "--db-path",
            "/tmp/t.duckdb",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/t.duckdb")));
        assert!(matches!(
            cli.command,
            Commands::Run { since: Some(ref s), until: None } if s == "2h"
        ));
    }

    #[test]
    fn chunked_splits_evenly_with_remainder() {
        let chunks = chunked((0..7).collect::<Vec<_>>(), 3);
        assert_eq!(chunks, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert!(chunked(Vec::<u8>::new(), 3).is_empty());
    }
}
