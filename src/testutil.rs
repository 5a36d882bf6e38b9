//! Shared test utilities
//!
//! Recording and scripted fakes of the prune collaborators. Only compiled in
//! test builds.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::log::event::{EventKind, EventSink, PruneEvent};
use crate::prune::archive::{LogMode, LogViewGenerator};
use crate::prune::config::SuiteConfig;
use crate::prune::engine::CylcEngine;
use crate::prune::error::PruneError;
use crate::prune::remote::RemoteShell;

/// Sink that keeps every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PruneEvent>>,
}

impl RecordingSink {
    /// All events, in arrival order
    pub fn events(&self) -> Vec<PruneEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Kinds of all events
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|e| e.kind).collect()
    }

    /// Host-qualified targets of all events
    pub fn locations(&self) -> Vec<String> {
        self.events().iter().map(PruneEvent::location).collect()
    }
}

impl EventSink for RecordingSink {
    fn handle(&self, event: &PruneEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// A call made to a [`ScriptedRemote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `exec(host, command)`
    Exec(String, String),
    /// `pull(host, remote_glob, _)`
    Pull(String, String),
}

/// Remote shell that records calls and answers from a script
#[derive(Default)]
pub struct ScriptedRemote {
    output: String,
    scripted_output: Vec<(String, String)>,
    failing_exec: Vec<String>,
    failing_pull: Vec<String>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl ScriptedRemote {
    /// Answer every successful `exec` with `output`
    #[must_use]
    pub fn with_output(mut self, output: &str) -> Self {
        self.output = output.to_string();
        self
    }

    /// Answer an `exec` whose command contains `fragment` with `output`
    #[must_use]
    pub fn with_output_for(mut self, fragment: &str, output: &str) -> Self {
        self.scripted_output
            .push((fragment.to_string(), output.to_string()));
        self
    }

    /// Make `exec` fail on `host`
    #[must_use]
    pub fn failing_exec(mut self, host: &str) -> Self {
        self.failing_exec.push(host.to_string());
        self
    }

    /// Make `pull` fail on a host or remote glob containing `target`
    #[must_use]
    pub fn failing_pull(mut self, host: &str) -> Self {
        self.failing_pull.push(host.to_string());
        self
    }

    /// Every call, in order
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Hosts `exec` was called on, in order
    pub fn exec_hosts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Exec(host, _) => Some(host),
                RemoteCall::Pull(..) => None,
            })
            .collect()
    }

    /// Commands passed to `exec`, in order
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Exec(_, command) => Some(command),
                RemoteCall::Pull(..) => None,
            })
            .collect()
    }

    /// `(host, remote_glob)` of every pull, in order
    pub fn pulls(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Pull(host, glob) => Some((host, glob)),
                RemoteCall::Exec(..) => None,
            })
            .collect()
    }
}

#[async_trait]
impl RemoteShell for ScriptedRemote {
    async fn exec(&self, host: &str, command: &str) -> Result<String, PruneError> {
        self.calls
            .lock()
            .unwrap()
            .push(RemoteCall::Exec(host.to_string(), command.to_string()));
        if self.failing_exec.iter().any(|h| h == host) {
            return Err(PruneError::Remote {
                host: host.to_string(),
                command: command.to_string(),
                exit_code: Some(255),
                stderr: "Connection refused".to_string(),
            });
        }
        let output = self
            .scripted_output
            .iter()
            .find(|(fragment, _)| command.contains(fragment.as_str()))
            .map_or(&self.output, |(_, output)| output);
        Ok(output.clone())
    }

    async fn pull(
        &self,
        host: &str,
        remote_glob: &str,
        _local_dir: &Path,
    ) -> Result<(), PruneError> {
        self.calls
            .lock()
            .unwrap()
            .push(RemoteCall::Pull(host.to_string(), remote_glob.to_string()));
        if self
            .failing_pull
            .iter()
            .any(|t| t == host || remote_glob.contains(t.as_str()))
        {
            return Err(PruneError::Remote {
                host: host.to_string(),
                command: format!("rsync {host}:{remote_glob}"),
                exit_code: Some(23),
                stderr: "No such file or directory".to_string(),
            });
        }
        Ok(())
    }
}

/// Log generator that records its calls
#[derive(Default)]
pub struct RecordingLogs {
    fail: bool,
    calls: Mutex<Vec<(String, Vec<String>, LogMode)>>,
}

impl RecordingLogs {
    /// Make every call fail
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// `(suite, cycles, mode)` of every call, in order
    pub fn calls(&self) -> Vec<(String, Vec<String>, LogMode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogViewGenerator for RecordingLogs {
    async fn generate(&self, suite_name: &str, cycles: &[String], mode: LogMode) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((suite_name.to_string(), cycles.to_vec(), mode));
        if self.fail {
            bail!("log generation failed");
        }
        Ok(())
    }
}

/// A Cylc engine with default layout under `home`, with the given job hosts
pub fn cylc_engine(home: &Path, hosts: &[&str]) -> CylcEngine {
    let config = SuiteConfig {
        job_hosts: hosts.iter().map(ToString::to_string).collect(),
        ..SuiteConfig::default()
    };
    CylcEngine::new(config, home)
}
