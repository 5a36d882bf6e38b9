//! Prune configuration parser
//!
//! Parses `prune.toml` into the `[prune]` settings plus the suite layout and
//! external command settings used by the default collaborators.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Section holding the retention settings
pub const SECTION: &str = "prune";

/// Cycles whose remote job logs are pulled back and removed from job hosts
pub const PRUNE_REMOTE_LOGS_AT: &str = "prune-remote-logs-at";
/// Cycles whose job logs are packed into a tarball
pub const ARCHIVE_LOGS_AT: &str = "archive-logs-at";
/// Cycles whose job logs are deleted
pub const PRUNE_LOGS_AT: &str = "prune-logs-at";
/// Cycles whose shared data is deleted, optionally with sub-paths
pub const PRUNE_DATAC_AT: &str = "prune-datac-at";
/// Cycles whose task work directories are deleted, optionally with sub-paths
pub const PRUNE_WORK_AT: &str = "prune-work-at";

/// Every key accepted in the `[prune]` section
pub const PRUNE_KEYS: &[&str] = &[
    PRUNE_REMOTE_LOGS_AT,
    ARCHIVE_LOGS_AT,
    PRUNE_LOGS_AT,
    PRUNE_DATAC_AT,
    PRUNE_WORK_AT,
];

/// Glob templates mapping a cycle to the items created for it.
///
/// `{cycle}` is replaced by the cycle point. Paths are relative to the suite
/// directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct GlobTemplates {
    /// Shared data written for a cycle
    #[serde(default = "default_datac_glob")]
    pub datac: String,
    /// Task work directories for a cycle
    #[serde(default = "default_work_glob")]
    pub work: String,
    /// Job log files for a cycle
    #[serde(default = "default_job_logs_glob")]
    pub job_logs: String,
}

impl Default for GlobTemplates {
    fn default() -> Self {
        Self {
            datac: default_datac_glob(),
            work: default_work_glob(),
            job_logs: default_job_logs_glob(),
        }
    }
}

fn default_datac_glob() -> String {
    "share/data/{cycle}".to_string()
}

fn default_work_glob() -> String {
    "work/*.{cycle}".to_string()
}

fn default_job_logs_glob() -> String {
    "log/job/*.{cycle}.*".to_string()
}

/// Where suites live and which hosts run their jobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct SuiteConfig {
    /// Directory holding suites, relative to the home directory on every host
    #[serde(default = "default_run_dir")]
    pub run_dir: String,
    /// Remote hosts (`host` or `user@host`) that run jobs for the suite
    #[serde(default)]
    pub job_hosts: Vec<String>,
    /// Cycle item glob templates
    #[serde(default)]
    pub globs: GlobTemplates,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            run_dir: default_run_dir(),
            job_hosts: Vec::new(),
            globs: GlobTemplates::default(),
        }
    }
}

fn default_run_dir() -> String {
    "cylc-run".to_string()
}

/// Command lines for external tools, split with shell quoting rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalConfig {
    /// Remote shell command, the host and script are appended
    #[serde(default = "default_ssh")]
    pub ssh: String,
    /// File transfer command, source and destination are appended
    #[serde(default = "default_rsync")]
    pub rsync: String,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            ssh: default_ssh(),
            rsync: default_rsync(),
        }
    }
}

fn default_ssh() -> String {
    "ssh -oBatchMode=yes".to_string()
}

fn default_rsync() -> String {
    "rsync -a".to_string()
}

/// Top-level configuration parsed from prune.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PruneConfig {
    /// Retention settings, raw strings keyed by setting name
    #[serde(default)]
    pub prune: BTreeMap<String, String>,
    /// Suite layout
    #[serde(default)]
    pub suite: SuiteConfig,
    /// External commands
    #[serde(default)]
    pub external: ExternalConfig,
}

impl PruneConfig {
    /// Parse a prune.toml file from a path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse prune.toml content from a string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse prune.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Look up a raw setting value.
    ///
    /// Only the `[prune]` section carries free-form settings; any other
    /// section yields `None`.
    #[must_use]
    pub fn get_value(&self, section: &str, key: &str) -> Option<&str> {
        if section != SECTION {
            return None;
        }
        self.prune.get(key).map(String::as_str)
    }

    /// Split the configured ssh command line into program and arguments
    pub fn ssh_command(&self) -> Result<Vec<String>> {
        split_command("external.ssh", &self.external.ssh)
    }

    /// Split the configured rsync command line into program and arguments
    pub fn rsync_command(&self) -> Result<Vec<String>> {
        split_command("external.rsync", &self.external.rsync)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        for key in self.prune.keys() {
            if !PRUNE_KEYS.contains(&key.as_str()) {
                bail!(
                    "Unknown setting '[{SECTION}]{key}'. Valid settings: {}",
                    PRUNE_KEYS.join(", ")
                );
            }
        }

        if self.suite.run_dir.trim().is_empty() {
            bail!("suite.run-dir cannot be empty");
        }

        for host in &self.suite.job_hosts {
            if host.trim().is_empty() || host.contains(char::is_whitespace) {
                bail!("Invalid job host '{host}': must be a non-empty host name without spaces");
            }
        }

        let globs = &self.suite.globs;
        for (name, template) in [
            ("datac", &globs.datac),
            ("work", &globs.work),
            ("job-logs", &globs.job_logs),
        ] {
            if !template.contains("{cycle}") {
                bail!("suite.globs.{name} = '{template}' must contain '{{cycle}}'");
            }
        }

        self.ssh_command()?;
        self.rsync_command()?;

        Ok(())
    }
}

fn split_command(name: &str, command: &str) -> Result<Vec<String>> {
    let words = shell_words::split(command)
        .with_context(|| format!("Invalid command line for {name}: '{command}'"))?;
    if words.is_empty() {
        bail!("{name} cannot be empty");
    }
    Ok(words)
}
