use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceTreeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("storage error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("encode error: {0}")]
    Encode(String),

    /// No span in the group can be elected root: every span names a parent
    /// that exists in the group, so the parent links form cycles only.
    #[error("malformed trace {trace_id}: no root among {spans} spans")]
    MalformedTrace { trace_id: String, spans: usize },

    #[error("internal error: {0}")]
    Internal(String),
}

impl TraceTreeError {
    pub fn is_malformed_trace(&self) -> bool {
        matches!(self, Self::MalformedTrace { .. })
    }
}

pub type Result<T> = std::result::Result<T, TraceTreeError>;
