//! Error taxonomy for pruning
//!
//! Configuration and offset errors are fatal and abort a run before any
//! side effect. Remote errors are recovered per host by the executor.

use thiserror::Error;

/// Failure while substituting environment variables into a setting value
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{name}: unbound variable")]
pub struct UnboundVariableError {
    /// Name of the variable that has no value
    pub name: String,
}

/// Errors raised while resolving settings or talking to remote hosts
#[derive(Debug, Error)]
pub enum PruneError {
    /// A setting references an environment variable that is not set
    #[error("setting [{section}]{key}={value} is invalid: {source}")]
    Config {
        /// Configuration section of the setting
        section: String,
        /// Key of the setting
        key: String,
        /// Original, unsubstituted setting value
        value: String,
        /// Underlying substitution failure
        #[source]
        source: UnboundVariableError,
    },

    /// A setting value (or a cycle argument) cannot be split into words
    #[error("setting [{section}]{key}={value} is invalid: {message}")]
    Tokenize {
        /// Configuration section of the setting
        section: String,
        /// Key of the setting
        key: String,
        /// Text that failed to split
        value: String,
        /// Tokenizer diagnostic
        message: String,
    },

    /// A cycle offset is syntactically malformed or out of range
    #[error("[{section}]{key}: bad cycle offset '{token}': {message}")]
    Offset {
        /// Configuration section of the setting
        section: String,
        /// Key of the setting
        key: String,
        /// The offending token
        token: String,
        /// What was wrong with it
        message: String,
    },

    /// A command on a remote host could not be run or exited non-zero
    #[error("pruning failed on host {host}: {command} (exit {}): {stderr}", format_exit_code(.exit_code))]
    Remote {
        /// Host the command was sent to
        host: String,
        /// The command line that failed
        command: String,
        /// Exit code, `None` if the process could not be spawned or was killed
        exit_code: Option<i32>,
        /// Captured stderr, or the spawn error
        stderr: String,
    },
}

impl PruneError {
    /// Returns true for errors that must abort the whole run
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Remote { .. })
    }

    /// The host a remote error relates to
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Remote { host, .. } => Some(host),
            _ => None,
        }
    }
}

/// Format an exit code for display, returning "unknown" if there is none.
#[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
fn format_exit_code(exit_code: &Option<i32>) -> String {
    exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}
