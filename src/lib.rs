//! Suite prune - housekeeping for cycling workflow suites
//!
//! Deletes cycle-indexed work directories, shared data and job logs that a
//! suite no longer needs, on its job hosts and locally, after optionally
//! pulling and archiving job logs.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

pub mod cli;
pub mod log;
pub mod prune;

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use cli::{render_run_summary, ConsoleReporter};
pub use log::{EventFanout, EventKind, EventSink, JsonlEventLog, PruneEvent};
pub use prune::archive::{JobLogArchiver, LogMode, LogViewGenerator};
pub use prune::config::PruneConfig;
pub use prune::engine::{CylcEngine, ItemCategory, SuiteEngine};
pub use prune::error::PruneError;
pub use prune::executor::{PruneExecutor, PruneReport};
pub use prune::remote::{RemoteShell, SshRunner};
pub use prune::resolver::{CycleItem, Resolver, RetentionPlan};
pub use prune::shift::CycleShifter;
