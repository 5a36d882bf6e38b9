//! Remote shell access to job hosts
//!
//! [`RemoteShell`] is the seam between the executor and the network. The
//! default [`SshRunner`] shells out to the configured `ssh` and `rsync`
//! commands.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as TokioCommand;

use crate::prune::error::PruneError;

/// Runs commands on, and copies files from, remote hosts
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run a shell command on `host` and return its stdout.
    ///
    /// Fails with [`PruneError::Remote`] if the command cannot be started or
    /// exits non-zero.
    async fn exec(&self, host: &str, command: &str) -> Result<String, PruneError>;

    /// Copy the files matching `remote_glob` on `host` into `local_dir`.
    async fn pull(&self, host: &str, remote_glob: &str, local_dir: &Path)
        -> Result<(), PruneError>;
}

/// Remote shell backed by `ssh` and `rsync` subprocesses
#[derive(Debug, Clone)]
pub struct SshRunner {
    ssh: Vec<String>,
    rsync: Vec<String>,
}

impl SshRunner {
    /// Create a runner from split command lines.
    ///
    /// The host and script are appended to `ssh`; the source and destination
    /// to `rsync`. Both must name at least a program.
    #[must_use]
    pub const fn new(ssh: Vec<String>, rsync: Vec<String>) -> Self {
        Self { ssh, rsync }
    }

    async fn run(&self, host: &str, argv: Vec<String>) -> Result<String, PruneError> {
        let command_line = shell_words::join(&argv);
        let Some((program, args)) = argv.split_first() else {
            return Err(PruneError::Remote {
                host: host.to_string(),
                command: command_line,
                exit_code: None,
                stderr: "empty command line".to_string(),
            });
        };

        let mut cmd = std::process::Command::new(program);
        cmd.args(args);

        match run_command(cmd).await {
            Ok((stdout, _stderr, Some(0))) => Ok(stdout),
            Ok((_stdout, stderr, exit_code)) => Err(PruneError::Remote {
                host: host.to_string(),
                command: command_line,
                exit_code,
                stderr,
            }),
            Err(e) => Err(PruneError::Remote {
                host: host.to_string(),
                command: command_line,
                exit_code: None,
                stderr: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl RemoteShell for SshRunner {
    async fn exec(&self, host: &str, command: &str) -> Result<String, PruneError> {
        let mut argv = self.ssh.clone();
        argv.push(host.to_string());
        argv.push(command.to_string());
        self.run(host, argv).await
    }

    async fn pull(
        &self,
        host: &str,
        remote_glob: &str,
        local_dir: &Path,
    ) -> Result<(), PruneError> {
        let mut argv = self.rsync.clone();
        argv.push(format!("{host}:{remote_glob}"));
        argv.push(format!("{}/", local_dir.display()));
        self.run(host, argv).await.map(|_| ())
    }
}

/// Build the list-then-delete script run on each job host.
///
/// The script changes into `root`, prints the sorted matches of `globs`
/// (nothing for a glob that matches nothing) and removes them.
#[must_use]
pub fn build_prune_command(root: &str, globs: &[String]) -> String {
    format!(
        "{}; rm -rf {}",
        build_list_command(root, globs),
        escaped_patterns(globs)
    )
}

/// Build a script that only prints the sorted matches of `globs` under `root`.
#[must_use]
pub fn build_list_command(root: &str, globs: &[String]) -> String {
    format!(
        "set -e; cd {}; (ls -d {} 2>/dev/null || true) | sort",
        shell_words::quote(root),
        escaped_patterns(globs)
    )
}

fn escaped_patterns(globs: &[String]) -> String {
    globs
        .iter()
        .map(|g| escape_glob(g))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape shell syntax in a glob, leaving the wildcards `* ? [ ] !` active.
#[must_use]
pub fn escape_glob(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '\n' => escaped.push_str("'\n'"),
            c if c.is_ascii_alphanumeric() || "*?[]!-_./,:=+@%".contains(c) => escaped.push(c),
            c => {
                escaped.push('\\');
                escaped.push(c);
            }
        }
    }
    escaped
}

/// Run a command to completion, capturing stdout and stderr.
///
/// Both streams are read concurrently. Returns the captured output and the
/// exit code (`None` if killed by a signal).
async fn run_command(
    cmd: std::process::Command,
) -> std::io::Result<(String, String, Option<i32>)> {
    let mut tokio_cmd = TokioCommand::from(cmd);
    tokio_cmd.stdin(Stdio::null());
    tokio_cmd.stdout(Stdio::piped());
    tokio_cmd.stderr(Stdio::piped());

    let mut child = tokio_cmd.spawn()?;

    let stdout_handle = child.stdout.take().map(|out| tokio::spawn(read_lines(out)));
    let stderr_handle = child.stderr.take().map(|err| tokio::spawn(read_lines(err)));

    let status = child.wait().await?;

    let stdout = match stdout_handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };
    let stderr = match stderr_handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };

    Ok((stdout, stderr, status.code()))
}

async fn read_lines<R: AsyncRead + Unpin>(stream: R) -> String {
    let mut lines = BufReader::new(stream).lines();
    let mut captured = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if !captured.is_empty() {
            captured.push('\n');
        }
        captured.push_str(&line);
    }
    captured
}
