//! Logging and observability
//!
//! Prune events, the sinks that receive them, and the JSONL event log.

pub mod event;
pub mod jsonl;

pub use event::{EventFanout, EventKind, EventSink, PruneEvent};
pub use jsonl::JsonlEventLog;
