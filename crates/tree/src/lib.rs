//! Rebuilds the span hierarchy of one trace from an unordered group of
//! span records and aggregates it into a single trace record.

pub mod aggregate;
pub mod anomaly;
pub mod builder;
pub mod node;
pub mod serialize;
pub mod tree;

pub use aggregate::{AggregateOutcome, TraceAggregator};
pub use anomaly::Anomaly;
pub use builder::{BuiltTree, TreeBuilder};
pub use node::{NodeId, SpanNode};
pub use serialize::{SerializedSpan, decode_root_span};
pub use tree::{Iter, NodeRef, SpanTree};
