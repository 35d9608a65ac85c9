use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracetree_core::config::Config;
use tracetree_core::error::{Result, TraceTreeError};
use tracetree_core::model::span::SpanRecord;
use tracetree_core::model::trace::AggregatedTraceRecord;
use tracetree_store::Store;
use tracing::{debug, warn};

/// Buffered writers for raw spans and aggregated traces.
///
/// Batches are flushed when the buffer reaches `batch_size` or the flush
/// interval elapses; [`Pipeline::finish`] drains whatever is left.
pub struct Pipeline {
    spans_tx: mpsc::Sender<Vec<SpanRecord>>,
    traces_tx: mpsc::Sender<Vec<AggregatedTraceRecord>>,
    spans_writer: JoinHandle<WriterTally>,
    traces_writer: JoinHandle<WriterTally>,
}

pub struct PipelineConfig {
    pub channel_capacity: usize,
    pub flush_interval: Duration,
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            flush_interval: Duration::from_millis(200),
            batch_size: 512,
        }
    }
}

impl From<&Config> for PipelineConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            channel_capacity: cfg.channel_capacity,
            flush_interval: cfg.flush_interval(),
            batch_size: cfg.write_batch_size,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct WriteStats {
    pub spans_written: usize,
    pub traces_written: usize,
    pub failed_batches: usize,
}

impl WriteStats {
    /// Fails when any batch could not be written; those records are lost.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.failed_batches == 0 {
            return Ok(());
        }
        Err(TraceTreeError::Store(format!(
            "{} write batches failed (spans written={}, traces written={})",
            self.failed_batches, self.spans_written, self.traces_written
        )))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct WriterTally {
    written: usize,
    failed_batches: usize,
}

impl Pipeline {
    pub fn new(store: Store, cfg: PipelineConfig) -> Self {
        let (spans_tx, spans_rx) = mpsc::channel(cfg.channel_capacity.max(1));
        let (traces_tx, traces_rx) = mpsc::channel(cfg.channel_capacity.max(1));
        let batch_size = cfg.batch_size.max(1);

        let span_store = store.clone();
        let spans_writer = tokio::spawn(run_writer(
            "span",
            spans_rx,
            batch_size,
            cfg.flush_interval,
            move |batch: &[SpanRecord]| span_store.insert_spans(batch),
        ));
        let traces_writer = tokio::spawn(run_writer(
            "trace",
            traces_rx,
            batch_size,
            cfg.flush_interval,
            move |batch: &[AggregatedTraceRecord]| store.insert_traces(batch),
        ));

        Self {
            spans_tx,
            traces_tx,
            spans_writer,
            traces_writer,
        }
    }

    pub async fn submit_spans(&self, spans: Vec<SpanRecord>) {
        if self.spans_tx.send(spans).await.is_err() {
            warn!("span pipeline dropped batch: receiver closed");
        }
    }

    pub async fn submit_traces(&self, traces: Vec<AggregatedTraceRecord>) {
        if self.traces_tx.send(traces).await.is_err() {
            warn!("trace pipeline dropped batch: receiver closed");
        }
    }

    /// Closes both channels and waits until every buffered record is written.
    pub async fn finish(self) -> Result<WriteStats> {
        let Self {
            spans_tx,
            traces_tx,
            spans_writer,
            traces_writer,
        } = self;
        drop(spans_tx);
        drop(traces_tx);

        let spans = spans_writer
            .await
            .map_err(|e| TraceTreeError::Internal(format!("span writer failed: {e}")))?;
        let traces = traces_writer
            .await
            .map_err(|e| TraceTreeError::Internal(format!("trace writer failed: {e}")))?;

        Ok(WriteStats {
            spans_written: spans.written,
            traces_written: traces.written,
            failed_batches: spans.failed_batches + traces.failed_batches,
        })
    }
}

async fn run_writer<T, F>(
    kind: &'static str,
    mut rx: mpsc::Receiver<Vec<T>>,
    batch_size: usize,
    flush_interval: Duration,
    mut write: F,
) -> WriterTally
where
    F: FnMut(&[T]) -> Result<()>,
{
    let mut ticker = tokio::time::interval(flush_interval);
    let mut buffer = Vec::new();
    let mut tally = WriterTally::default();
    loop {
        tokio::select! {
            batch = rx.recv() => match batch {
                Some(batch) => {
                    buffer.extend(batch);
                    if buffer.len() >= batch_size {
                        flush(kind, &mut write, &mut buffer, &mut tally);
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    flush(kind, &mut write, &mut buffer, &mut tally);
                }
            }
        }
    }
    if !buffer.is_empty() {
        flush(kind, &mut write, &mut buffer, &mut tally);
    }
    debug!(kind, written = tally.written, "writer drained");
    tally
}

fn flush<T, F>(kind: &'static str, write: &mut F, buffer: &mut Vec<T>, tally: &mut WriterTally)
where
    F: FnMut(&[T]) -> Result<()>,
{
    match write(buffer.as_slice()) {
        Ok(()) => tally.written += buffer.len(),
        Err(e) => {
            tally.failed_batches += 1;
            warn!(kind, error = ?e, "failed to write batch");
        }
    }
    buffer.clear();
}
