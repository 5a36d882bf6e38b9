//! Suite engine conventions
//!
//! Maps cycles to the globs of items a suite creates for them, and locates
//! the suite directory and the hosts that ran its jobs.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::prune::config::SuiteConfig;

/// Categories of cycle items that can be pruned with extra arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCategory {
    /// Shared data for a cycle
    Datac,
    /// Task work directories for a cycle
    Work,
}

impl ItemCategory {
    /// All categories, in the order their globs are accumulated
    pub const ALL: [Self; 2] = [Self::Datac, Self::Work];

    /// Category name as used in setting keys
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Datac => "datac",
            Self::Work => "work",
        }
    }

    /// The `[prune]` setting listing the cycles to prune for this category
    #[must_use]
    pub const fn setting_key(self) -> &'static str {
        match self {
            Self::Datac => crate::prune::config::PRUNE_DATAC_AT,
            Self::Work => crate::prune::config::PRUNE_WORK_AT,
        }
    }
}

/// Layout and job placement of a running suite
pub trait SuiteEngine: Send + Sync {
    /// Glob of the items of `category` created for `cycle`, relative to the
    /// suite directory
    fn cycle_items_glob(&self, category: ItemCategory, cycle: &str) -> String;

    /// Glob of the job log files for `cycle`, relative to the suite directory
    fn job_log_glob(&self, cycle: &str) -> String;

    /// Remote hosts (`host` or `user@host`) that ran jobs for the suite
    fn job_hosts(&self, suite_name: &str) -> Result<Vec<String>>;

    /// Suite directory relative to the home directory of any host
    fn suite_dir_rel(&self, suite_name: &str) -> PathBuf;

    /// Absolute suite directory on this host
    fn suite_dir(&self, suite_name: &str) -> PathBuf;
}

/// Cylc-style layout: suites live under `<home>/<run-dir>/<suite>`
#[derive(Debug, Clone)]
pub struct CylcEngine {
    config: SuiteConfig,
    home: PathBuf,
}

impl CylcEngine {
    /// Create an engine for the given layout, with `home` as this host's
    /// home directory
    #[must_use]
    pub fn new(config: SuiteConfig, home: impl Into<PathBuf>) -> Self {
        Self {
            config,
            home: home.into(),
        }
    }

    /// The home directory suites are resolved against
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }
}

impl SuiteEngine for CylcEngine {
    fn cycle_items_glob(&self, category: ItemCategory, cycle: &str) -> String {
        let template = match category {
            ItemCategory::Datac => &self.config.globs.datac,
            ItemCategory::Work => &self.config.globs.work,
        };
        template.replace("{cycle}", cycle)
    }

    fn job_log_glob(&self, cycle: &str) -> String {
        self.config.globs.job_logs.replace("{cycle}", cycle)
    }

    fn job_hosts(&self, _suite_name: &str) -> Result<Vec<String>> {
        let mut hosts: Vec<String> = Vec::new();
        for host in &self.config.job_hosts {
            if is_local_host(host) || hosts.contains(host) {
                continue;
            }
            hosts.push(host.clone());
        }
        Ok(hosts)
    }

    fn suite_dir_rel(&self, suite_name: &str) -> PathBuf {
        Path::new(&self.config.run_dir).join(suite_name)
    }

    fn suite_dir(&self, suite_name: &str) -> PathBuf {
        self.home.join(self.suite_dir_rel(suite_name))
    }
}

/// Whether `auth` (`host` or `user@host`) names this machine
fn is_local_host(auth: &str) -> bool {
    let host = auth.rsplit_once('@').map_or(auth, |(_, host)| host);
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Join a sub-path onto a glob head.
///
/// An absolute `arg` replaces the head, as with path joining.
#[must_use]
pub fn join_glob(head: &str, arg: &str) -> String {
    if arg.starts_with('/') || head.is_empty() {
        arg.to_string()
    } else if head.ends_with('/') {
        format!("{head}{arg}")
    } else {
        format!("{head}/{arg}")
    }
}
