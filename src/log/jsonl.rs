//! JSONL (JSON Lines) event log
//!
//! Provides append-only logging of prune events to `<log-dir>/prune.jsonl`

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use crate::log::event::{EventSink, PruneEvent};

/// JSONL logger for prune events
///
/// Each line is a JSON object representing a single event.
pub struct JsonlEventLog {
    log_path: PathBuf,
}

impl JsonlEventLog {
    /// Create a new JSONL event log
    ///
    /// # Arguments
    /// * `log_dir` - Directory where prune.jsonl will be stored
    ///
    /// # Errors
    /// Returns an error if the log directory cannot be created
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        Ok(Self {
            log_path: log_dir.join("prune.jsonl"),
        })
    }

    /// Append an event to the log
    ///
    /// # Errors
    /// Returns an error if:
    /// - The log file cannot be opened or created
    /// - The event cannot be serialized to JSON
    /// - Writing to the file fails
    pub fn append(&self, event: &PruneEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open log file: {}", self.log_path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event to JSON")?;

        writeln!(file, "{json}").context("Failed to write to log file")?;

        Ok(())
    }

    /// Read all events from the log, in the order they were written
    ///
    /// # Errors
    /// Returns an error if:
    /// - The log file cannot be read
    /// - Any line cannot be parsed as valid JSON
    pub fn read_all(&self) -> Result<Vec<PruneEvent>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.log_path)
            .with_context(|| format!("Failed to read log file: {}", self.log_path.display()))?;

        let mut events = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let event: PruneEvent = serde_json::from_str(line)
                .with_context(|| format!("Failed to parse line {} as JSON", line_num + 1))?;

            events.push(event);
        }

        Ok(events)
    }

    /// Get the path to the log file
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

impl EventSink for JsonlEventLog {
    fn handle(&self, event: &PruneEvent) {
        if let Err(e) = self.append(event) {
            eprintln!("Warning: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::event::EventKind;
    use tempfile::TempDir;

    #[test]
    fn test_new_log_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("log").join("prune");

        let log = JsonlEventLog::new(&log_dir).unwrap();

        assert!(log_dir.exists());
        assert_eq!(log.log_path(), log_dir.join("prune.jsonl"));
    }

    #[test]
    fn test_append_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let log = JsonlEventLog::new(temp_dir.path()).unwrap();

        log.append(&PruneEvent::local(EventKind::Delete, "work/a.2013010100"))
            .unwrap();

        assert!(log.log_path().exists());
    }

    #[test]
    fn test_read_all_empty_log() {
        let temp_dir = TempDir::new().unwrap();
        let log = JsonlEventLog::new(temp_dir.path()).unwrap();

        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_handle_appends_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let log = JsonlEventLog::new(temp_dir.path()).unwrap();

        log.handle(&PruneEvent::remote(EventKind::Chdir, "hpc1", "cylc-run/s"));
        log.handle(&PruneEvent::remote(
            EventKind::Delete,
            "hpc1",
            "work/a.2013010100",
        ));
        log.handle(&PruneEvent::local(EventKind::Delete, "share/data/2013010100"));

        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, EventKind::Chdir);
        assert_eq!(events[0].location(), "hpc1:cylc-run/s");
        assert_eq!(events[1].location(), "hpc1:work/a.2013010100");
        assert_eq!(events[2].host, None);
    }

    #[test]
    fn test_read_all_skips_blank_lines() {
        let temp_dir = TempDir::new().unwrap();
        let log = JsonlEventLog::new(temp_dir.path()).unwrap();
        log.append(&PruneEvent::local(EventKind::Delete, "a")).unwrap();
        let mut content = fs::read_to_string(log.log_path()).unwrap();
        content.push_str("\n\n");
        fs::write(log.log_path(), content).unwrap();

        assert_eq!(log.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_read_all_rejects_corrupt_line() {
        let temp_dir = TempDir::new().unwrap();
        let log = JsonlEventLog::new(temp_dir.path()).unwrap();
        fs::write(log.log_path(), "{not json}\n").unwrap();

        let err = log.read_all().unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_handle_does_not_panic_when_log_unwritable() {
        let temp_dir = TempDir::new().unwrap();
        let log = JsonlEventLog::new(temp_dir.path()).unwrap();
        // A directory where the log file should be makes every append fail
        fs::create_dir(log.log_path()).unwrap();

        log.handle(&PruneEvent::local(EventKind::Delete, "a"));
    }
}
