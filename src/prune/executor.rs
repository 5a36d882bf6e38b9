//! Prune executor
//!
//! Runs one housekeeping pass over a suite: job log processing, then
//! deletion on every job host, then deletion in the local suite directory.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::log::event::{EventKind, EventSink, PruneEvent};
use crate::prune::archive::{LogMode, LogViewGenerator};
use crate::prune::config::PruneConfig;
use crate::prune::engine::{join_glob, SuiteEngine};
use crate::prune::error::PruneError;
use crate::prune::fs_util::FsUtil;
use crate::prune::remote::{build_prune_command, RemoteShell};
use crate::prune::resolver::{split_words, Resolver, RetentionPlan};
use crate::prune::shift::CycleShifter;

/// A job host where remote deletion failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFailure {
    /// The host
    pub host: String,
    /// Error message
    pub message: String,
}

/// Summary of a prune run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Suite that was pruned, `None` if the run was skipped
    pub suite_name: Option<String>,
    /// Deletion globs, relative to the suite directory
    pub globs: Vec<String>,
    /// Cycles whose remote job logs were pulled and removed
    pub remote_log_cycles: Vec<String>,
    /// Cycles whose job logs were archived
    pub archived_log_cycles: Vec<String>,
    /// Hosts where remote deletion succeeded
    pub hosts_pruned: Vec<String>,
    /// Hosts where remote deletion failed
    pub host_failures: Vec<HostFailure>,
    /// Paths deleted on job hosts
    pub remote_deleted: usize,
    /// Paths deleted locally
    pub local_deleted: usize,
}

impl PruneReport {
    /// Returns true if no suite was set and nothing ran
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.suite_name.is_none()
    }
}

/// Executes prune runs against a suite
pub struct PruneExecutor {
    config: PruneConfig,
    shifter: CycleShifter,
    engine: Arc<dyn SuiteEngine>,
    remote: Arc<dyn RemoteShell>,
    logs: Arc<dyn LogViewGenerator>,
    sink: Arc<dyn EventSink>,
}

impl PruneExecutor {
    /// Create a new executor with the given configuration and collaborators
    pub fn new(
        config: PruneConfig,
        shifter: CycleShifter,
        engine: Arc<dyn SuiteEngine>,
        remote: Arc<dyn RemoteShell>,
        logs: Arc<dyn LogViewGenerator>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            shifter,
            engine,
            remote,
            logs,
            sink,
        }
    }

    /// Resolve every setting into a plan.
    pub fn plan(&self) -> Result<RetentionPlan, PruneError> {
        Resolver::new(&self.config, &self.shifter).plan()
    }

    /// Build the deletion globs of a plan: datac, then work, then job logs.
    ///
    /// Extra arguments of a cycle item are split into words and each word is
    /// joined onto the item's glob head.
    pub fn globs(&self, plan: &RetentionPlan) -> Result<Vec<String>, PruneError> {
        let mut globs = Vec::new();
        for (category, items) in &plan.categories {
            for item in items {
                let head = self.engine.cycle_items_glob(*category, item.cycle());
                match item.args() {
                    Some(args) => {
                        for arg in split_words(category.setting_key(), args)? {
                            globs.push(join_glob(&head, &arg));
                        }
                    }
                    None => globs.push(head),
                }
            }
        }
        globs.extend(plan.prune_logs.iter().map(|c| self.engine.job_log_glob(c)));
        Ok(globs)
    }

    /// Run a prune pass over `suite_name`.
    ///
    /// An unset suite is a silent no-op. Settings and globs are resolved
    /// before anything is touched. A failing job host is reported and
    /// skipped; local deletion errors propagate once the working directory
    /// has been restored.
    pub async fn execute(&self, suite_name: Option<&str>) -> Result<PruneReport> {
        let Some(suite_name) = suite_name.filter(|name| !name.is_empty()) else {
            return Ok(PruneReport::default());
        };

        let plan = self.plan()?;
        let globs = self.globs(&plan)?;

        let mut report = PruneReport {
            suite_name: Some(suite_name.to_string()),
            ..PruneReport::default()
        };

        self.process_logs(suite_name, &plan, &mut report).await?;

        if globs.is_empty() {
            return Ok(report);
        }
        report.globs = globs;

        self.prune_remote(suite_name, &mut report).await?;

        let suite_dir = self.engine.suite_dir(suite_name);
        let mut fs = FsUtil::from_current_dir(&*self.sink)?;
        report.local_deleted = prune_local(&mut fs, &suite_dir, &report.globs)?;

        Ok(report)
    }

    async fn process_logs(
        &self,
        suite_name: &str,
        plan: &RetentionPlan,
        report: &mut PruneReport,
    ) -> Result<()> {
        let remote_cycles = plan.remote_log_cycles_to_prune();
        if !remote_cycles.is_empty() {
            self.logs
                .generate(suite_name, &remote_cycles, LogMode::RemotePrune)
                .await
                .context("Failed to prune remote job logs")?;
            report.remote_log_cycles = remote_cycles;
        }

        if !plan.archive_logs.is_empty() {
            self.logs
                .generate(suite_name, &plan.archive_logs, LogMode::Archive)
                .await
                .context("Failed to archive job logs")?;
            report.archived_log_cycles.clone_from(&plan.archive_logs);
        }
        Ok(())
    }

    async fn prune_remote(&self, suite_name: &str, report: &mut PruneReport) -> Result<()> {
        let hosts = self
            .engine
            .job_hosts(suite_name)
            .with_context(|| format!("Failed to list job hosts of {suite_name}"))?;
        let root = self
            .engine
            .suite_dir_rel(suite_name)
            .to_string_lossy()
            .into_owned();
        let command = build_prune_command(&root, &report.globs);

        for host in hosts {
            match self.remote.exec(&host, &command).await {
                Ok(output) => {
                    self.sink
                        .handle(&PruneEvent::remote(EventKind::Chdir, &host, &root));
                    for line in output.lines().filter(|l| !l.trim().is_empty()) {
                        self.sink
                            .handle(&PruneEvent::remote(EventKind::Delete, &host, line));
                        report.remote_deleted += 1;
                    }
                    report.hosts_pruned.push(host);
                }
                Err(e) => {
                    self.sink.handle(
                        &PruneEvent::remote(EventKind::RemoteFailure, &host, &root)
                            .with_detail(e.to_string()),
                    );
                    report.host_failures.push(HostFailure {
                        host,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Delete every match of `globs` under `suite_dir`, each glob's matches in
/// sorted order. Returns the number of paths deleted.
fn prune_local(fs: &mut FsUtil<'_>, suite_dir: &Path, globs: &[String]) -> Result<usize> {
    let dir = fs
        .enter(suite_dir)
        .with_context(|| format!("Failed to enter suite directory {}", suite_dir.display()))?;

    let mut deleted = 0;
    for glob in globs {
        for path in dir.expand(glob)? {
            dir.delete(&path)?;
            deleted += 1;
        }
    }
    Ok(deleted)
}
