//! Filesystem events emitted while pruning
//!
//! Events are informational only. Sinks receive every event and must not
//! affect the control flow of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a path
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// The working context moved to a directory
    Chdir,
    /// A path was deleted
    Delete,
    /// Files were packed into an archive
    Archive,
    /// Remote files were copied to the local suite directory
    Pull,
    /// A command on a remote host failed
    RemoteFailure,
}

impl EventKind {
    /// Short lowercase label for display
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Chdir => "chdir",
            Self::Delete => "delete",
            Self::Archive => "archive",
            Self::Pull => "pull",
            Self::RemoteFailure => "remote-failure",
        }
    }
}

/// A single event, as written to the event log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PruneEvent {
    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
    /// What happened
    pub kind: EventKind,
    /// Path (or command, for failures) the event is about
    pub target: String,
    /// Remote host qualifier, `None` for local events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Extra information such as an error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PruneEvent {
    /// A local event
    #[must_use]
    pub fn local(kind: EventKind, target: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            target: target.into(),
            host: None,
            detail: None,
        }
    }

    /// An event on a remote host
    #[must_use]
    pub fn remote(kind: EventKind, host: &str, target: impl Into<String>) -> Self {
        Self {
            host: Some(host.to_string()),
            ..Self::local(kind, target)
        }
    }

    /// Attach a detail message
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The target qualified by its host, `host:path` for remote events
    #[must_use]
    pub fn location(&self) -> String {
        self.host.as_ref().map_or_else(
            || self.target.clone(),
            |host| format!("{host}:{}", self.target),
        )
    }
}

/// Receives events. Implementations must not fail the caller.
pub trait EventSink: Send + Sync {
    /// Handle one event
    fn handle(&self, event: &PruneEvent);
}

impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    fn handle(&self, event: &PruneEvent) {
        (**self).handle(event);
    }
}

/// Forwards every event to each of its sinks, in order
#[derive(Default)]
pub struct EventFanout {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventFanout {
    /// Create an empty fanout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[must_use]
    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl EventSink for EventFanout {
    fn handle(&self, event: &PruneEvent) {
        for sink in &self.sinks {
            sink.handle(event);
        }
    }
}
