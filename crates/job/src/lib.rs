pub mod group;
pub mod jsonl;
pub mod pipeline;
pub mod runner;

pub use group::{TraceGroup, group_by_trace};
pub use pipeline::{Pipeline, PipelineConfig, WriteStats};
pub use runner::{BatchOutput, BatchReport, FailedTrace, Runner};
