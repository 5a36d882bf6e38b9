//! CLI output formatting
//!
//! Provides human-readable terminal display for prune runs.

pub mod display;

pub use display::format_event;
pub use display::render_run_summary;
pub use display::ConsoleReporter;
