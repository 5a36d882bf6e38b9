//! Console display for prune runs
//!
//! Renders prune events and the run summary as human-readable terminal
//! output. All output goes to stderr so stdout remains clean for piping.

use colored::Colorize;

use crate::log::event::{EventKind, EventSink, PruneEvent};
use crate::prune::executor::PruneReport;

/// Event sink printing one line per event
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    show_chdir: bool,
}

impl ConsoleReporter {
    /// Create a reporter that hides directory changes
    #[must_use]
    pub const fn new() -> Self {
        Self { show_chdir: false }
    }

    /// Also print directory changes
    #[must_use]
    pub const fn verbose(mut self, show_chdir: bool) -> Self {
        self.show_chdir = show_chdir;
        self
    }
}

impl EventSink for ConsoleReporter {
    fn handle(&self, event: &PruneEvent) {
        if event.kind == EventKind::Chdir && !self.show_chdir {
            return;
        }
        eprintln!("{}", format_event(event));
    }
}

/// Format an event as a single line
#[must_use]
pub fn format_event(event: &PruneEvent) -> String {
    let label = event.kind.label();
    let label = match event.kind {
        EventKind::Chdir => label.dimmed(),
        EventKind::Delete => label.red(),
        EventKind::Archive => label.green(),
        EventKind::Pull => label.blue(),
        EventKind::RemoteFailure => label.red().bold(),
    };

    match &event.detail {
        Some(detail) => format!("  {label}: {} ({detail})", event.location()),
        None => format!("  {label}: {}", event.location()),
    }
}

/// Print the summary of a finished run
pub fn render_run_summary(report: &PruneReport) {
    let Some(suite_name) = &report.suite_name else {
        return;
    };

    eprintln!("{}", "─".repeat(50).dimmed());
    let status = if report.host_failures.is_empty() {
        "PRUNED".green().bold().to_string()
    } else {
        "PRUNED WITH ERRORS".yellow().bold().to_string()
    };
    eprintln!("  {status} {}", suite_name.bold());

    for line in summary_lines(report) {
        eprintln!("  {line}");
    }
    for failure in &report.host_failures {
        eprintln!("  {} {}", "✗".red().bold(), failure.message.red());
    }
    eprintln!();
}

/// Plain summary lines of a run
#[must_use]
pub fn summary_lines(report: &PruneReport) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.remote_log_cycles.is_empty() {
        lines.push(format!(
            "Remote job logs pruned: {}",
            report.remote_log_cycles.join(" ")
        ));
    }
    if !report.archived_log_cycles.is_empty() {
        lines.push(format!(
            "Job logs archived: {}",
            report.archived_log_cycles.join(" ")
        ));
    }

    let hosts = report.hosts_pruned.len() + report.host_failures.len();
    lines.push(format!(
        "Hosts: {hosts} ({} ok, {} failed) | remote deletions: {} | local deletions: {}",
        report.hosts_pruned.len(),
        report.host_failures.len(),
        report.remote_deleted,
        report.local_deleted
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prune::executor::HostFailure;

    #[test]
    fn test_format_local_delete() {
        let line = format_event(&PruneEvent::local(EventKind::Delete, "work/a.2013010100"));
        assert!(line.contains("delete"));
        assert!(line.ends_with(": work/a.2013010100"));
    }

    #[test]
    fn test_format_remote_failure_includes_detail() {
        let event = PruneEvent::remote(EventKind::RemoteFailure, "hpc1", "cylc-run/s")
            .with_detail("pruning failed on host hpc1");
        let line = format_event(&event);
        assert!(line.contains("remote-failure"));
        assert!(line.contains("hpc1:cylc-run/s (pruning failed on host hpc1)"));
    }

    #[test]
    fn test_summary_lines_counts() {
        let report = PruneReport {
            suite_name: Some("my.suite".to_string()),
            archived_log_cycles: vec!["2013010100".to_string()],
            hosts_pruned: vec!["hpc2".to_string()],
            host_failures: vec![HostFailure {
                host: "hpc1".to_string(),
                message: "pruning failed on host hpc1".to_string(),
            }],
            remote_deleted: 3,
            local_deleted: 4,
            ..PruneReport::default()
        };

        let lines = summary_lines(&report);

        assert_eq!(lines[0], "Job logs archived: 2013010100");
        assert_eq!(
            lines[1],
            "Hosts: 2 (1 ok, 1 failed) | remote deletions: 3 | local deletions: 4"
        );
    }

    #[test]
    fn test_summary_lines_minimal_run() {
        let report = PruneReport {
            suite_name: Some("my.suite".to_string()),
            ..PruneReport::default()
        };
        assert_eq!(summary_lines(&report).len(), 1);
    }

    // Rendering only writes to stderr
    #[test]
    fn test_render_no_panic() {
        render_run_summary(&PruneReport::default());
        render_run_summary(&PruneReport {
            suite_name: Some("my.suite".to_string()),
            host_failures: vec![HostFailure {
                host: "hpc1".to_string(),
                message: "boom".to_string(),
            }],
            ..PruneReport::default()
        });

        let reporter = ConsoleReporter::new().verbose(true);
        reporter.handle(&PruneEvent::local(EventKind::Chdir, "/tmp"));
        reporter.handle(&PruneEvent::remote(EventKind::Pull, "hpc1", "log/job/*"));
    }
}
