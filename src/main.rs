//! Suite prune - housekeeping for cycling workflow suites
//!
//! CLI entry point, normally run as a task of the suite it prunes.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use suite_prune::cli::{render_run_summary, ConsoleReporter};
use suite_prune::log::{EventFanout, JsonlEventLog};
use suite_prune::prune::archive::JobLogArchiver;
use suite_prune::prune::config::PruneConfig;
use suite_prune::prune::engine::CylcEngine;
use suite_prune::prune::executor::PruneExecutor;
use suite_prune::prune::remote::SshRunner;
use suite_prune::prune::shift::CycleShifter;

/// Suite housekeeping
///
/// Deletes cycle work directories, shared data and job logs that are no
/// longer needed, on every job host and locally. Does nothing when no suite
/// name is set.
#[derive(Parser, Debug)]
#[command(name = "suite-prune", version, about)]
struct Cli {
    /// Path to the prune.toml configuration file
    #[arg(long, default_value = "prune.toml")]
    config: PathBuf,

    /// Directory for the event log (.suite-prune by default)
    #[arg(long, default_value = ".suite-prune")]
    log_dir: PathBuf,

    /// Name of the suite to prune
    #[arg(long, env = "ROSE_SUITE_NAME")]
    suite_name: Option<String>,

    /// Cycle point of the running task, enables relative offsets such as -6h
    #[arg(long, env = "ROSE_TASK_CYCLE_TIME")]
    cycle_time: Option<String>,

    /// Home directory holding the suite run directory
    #[arg(long, env = "HOME")]
    home: Option<PathBuf>,

    /// Also print directory changes
    #[arg(long, short)]
    verbose: bool,
}

/// Build the cycle shifter for an optional task cycle time.
fn task_cycle_shifter(cycle_time: Option<&str>) -> Result<CycleShifter> {
    match cycle_time.filter(|c| !c.trim().is_empty()) {
        None => Ok(CycleShifter::inactive()),
        Some(cycle_time) => CycleShifter::new(cycle_time)
            .with_context(|| format!("Invalid task cycle time '{cycle_time}'")),
    }
}

/// The home directory, required once there is a suite to prune.
fn require_home(home: Option<PathBuf>) -> Result<PathBuf> {
    home.filter(|h| !h.as_os_str().is_empty())
        .context("Home directory is not set, pass --home or set HOME")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(suite_name) = cli.suite_name.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(());
    };

    let home = require_home(cli.home.clone())?;

    // Load configuration
    let config = PruneConfig::from_path(&cli.config)
        .with_context(|| format!("Failed to load config from '{}'", cli.config.display()))?;
    let shifter = task_cycle_shifter(cli.cycle_time.as_deref())?;

    // Initialize collaborators
    let log = JsonlEventLog::new(&cli.log_dir).context("Failed to initialize event log")?;
    let sink = Arc::new(
        EventFanout::new()
            .with(ConsoleReporter::new().verbose(cli.verbose))
            .with(log),
    );
    let engine = Arc::new(CylcEngine::new(config.suite.clone(), &home));
    let remote = Arc::new(SshRunner::new(config.ssh_command()?, config.rsync_command()?));
    let logs = Arc::new(JobLogArchiver::new(
        engine.clone(),
        remote.clone(),
        sink.clone(),
    ));

    let executor = PruneExecutor::new(config, shifter, engine, remote, logs, sink);
    let report = executor
        .execute(Some(suite_name))
        .await
        .with_context(|| format!("Failed to prune suite '{suite_name}'"))?;

    render_run_summary(&report);
    Ok(())
}
