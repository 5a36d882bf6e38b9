//! Job log housekeeping
//!
//! Pulls job logs back from job hosts and packs them into per-cycle
//! tarballs before the generic deletion runs.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::log::event::{EventKind, EventSink, PruneEvent};
use crate::prune::engine::SuiteEngine;
use crate::prune::fs_util::FsUtil;
use crate::prune::remote::{build_list_command, build_prune_command, RemoteShell};

/// What to do with the job logs of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Pull remote logs into the suite and remove them from job hosts
    RemotePrune,
    /// Pull remote logs, then pack the local logs into a tarball
    Archive,
}

/// Maintains the job log view of a suite
#[async_trait]
pub trait LogViewGenerator: Send + Sync {
    /// Process the job logs of `cycles` in the given mode
    async fn generate(&self, suite_name: &str, cycles: &[String], mode: LogMode) -> Result<()>;
}

/// Default log generator: rsync pull, remote removal, tar.gz packing
pub struct JobLogArchiver {
    engine: Arc<dyn SuiteEngine>,
    remote: Arc<dyn RemoteShell>,
    sink: Arc<dyn EventSink>,
}

impl JobLogArchiver {
    /// Create an archiver over the given collaborators
    pub fn new(
        engine: Arc<dyn SuiteEngine>,
        remote: Arc<dyn RemoteShell>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            engine,
            remote,
            sink,
        }
    }

    /// Pull each cycle's logs from every job host, then remove them there.
    ///
    /// A failure is reported per host and cycle, and the remaining cycles
    /// still run. Remote logs are only removed after they were pulled.
    async fn pull_remote(&self, suite_name: &str, cycles: &[String]) -> Result<()> {
        let hosts = self.engine.job_hosts(suite_name)?;
        if hosts.is_empty() || cycles.is_empty() {
            return Ok(());
        }

        let suite_dir = self.engine.suite_dir(suite_name);
        let root = self
            .engine
            .suite_dir_rel(suite_name)
            .to_string_lossy()
            .into_owned();

        for host in &hosts {
            for cycle in cycles {
                let glob = self.engine.job_log_glob(cycle);
                if let Err(e) = self.pull_cycle(host, &root, &suite_dir, &glob).await {
                    let target = format!("{root}/{glob}");
                    self.sink.handle(
                        &PruneEvent::remote(EventKind::RemoteFailure, host, target)
                            .with_detail(e.to_string()),
                    );
                }
            }
        }
        Ok(())
    }

    /// Pull and remove the matches of one job log glob on one host.
    ///
    /// A glob with no remote matches is skipped without pulling.
    async fn pull_cycle(
        &self,
        host: &str,
        root: &str,
        suite_dir: &Path,
        glob: &str,
    ) -> Result<()> {
        let globs = [glob.to_string()];
        let listing = self.remote.exec(host, &build_list_command(root, &globs)).await?;
        if listing.trim().is_empty() {
            return Ok(());
        }

        let local_dir = Path::new(glob)
            .parent()
            .map_or_else(|| suite_dir.to_path_buf(), |parent| suite_dir.join(parent));
        std::fs::create_dir_all(&local_dir)
            .with_context(|| format!("Failed to create {}", local_dir.display()))?;

        let remote_glob = format!("{root}/{glob}");
        self.remote.pull(host, &remote_glob, &local_dir).await?;
        self.sink
            .handle(&PruneEvent::remote(EventKind::Pull, host, &remote_glob));

        let output = self
            .remote
            .exec(host, &build_prune_command(root, &globs))
            .await?;
        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            self.sink
                .handle(&PruneEvent::remote(EventKind::Delete, host, line));
        }
        Ok(())
    }

    /// Pack the local job logs of each cycle into `log/job-<cycle>.tar.gz`.
    ///
    /// Entries of an existing archive are kept; a log present both in the
    /// archive and in the suite keeps its suite copy.
    fn archive_local(&self, suite_name: &str, cycles: &[String]) -> Result<()> {
        let suite_dir = self.engine.suite_dir(suite_name);
        if !suite_dir.is_dir() {
            return Ok(());
        }
        let fs = FsUtil::new(&*self.sink, &suite_dir);

        for cycle in cycles {
            let glob = self.engine.job_log_glob(cycle);
            let mut entries = fs.expand(&glob)?;
            if entries.is_empty() {
                continue;
            }

            let archive = archive_path(cycle);
            if restore_tarball(&suite_dir, &archive)? {
                entries = fs.expand(&glob)?;
            }
            write_tarball(&suite_dir, &archive, &entries)?;
            self.sink.handle(
                &PruneEvent::local(EventKind::Archive, archive.display().to_string())
                    .with_detail(format!("{} entries", entries.len())),
            );

            for entry in &entries {
                fs.delete(entry)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LogViewGenerator for JobLogArchiver {
    async fn generate(&self, suite_name: &str, cycles: &[String], mode: LogMode) -> Result<()> {
        self.pull_remote(suite_name, cycles).await?;
        if mode == LogMode::Archive {
            self.archive_local(suite_name, cycles)?;
        }
        Ok(())
    }
}

/// Archive of a cycle's job logs, relative to the suite directory
#[must_use]
pub fn archive_path(cycle: &str) -> PathBuf {
    PathBuf::from(format!("log/job-{cycle}.tar.gz"))
}

/// Unpack the entries of `base/archive` that are missing under `base`.
///
/// Returns false if there is no such archive.
fn restore_tarball(base: &Path, archive: &Path) -> Result<bool> {
    let source = base.join(archive);
    if !source.is_file() {
        return Ok(false);
    }

    let file = File::open(&source)
        .with_context(|| format!("Failed to open archive {}", source.display()))?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    let entries = tarball
        .entries()
        .with_context(|| format!("Failed to read archive {}", source.display()))?;

    for entry in entries {
        let mut entry =
            entry.with_context(|| format!("Failed to read archive {}", source.display()))?;
        let path = entry
            .path()
            .with_context(|| format!("Bad entry path in archive {}", source.display()))?
            .into_owned();
        if std::fs::symlink_metadata(base.join(&path)).is_ok() {
            continue;
        }
        entry
            .unpack_in(base)
            .with_context(|| format!("Failed to restore {} from archive", path.display()))?;
    }
    Ok(true)
}

/// Write `entries` (relative to `base`) into a gzipped tarball at `base/archive`.
///
/// The tarball is written next to the target and renamed into place.
fn write_tarball(base: &Path, archive: &Path, entries: &[PathBuf]) -> Result<()> {
    let target = base.join(archive);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut partial = target.clone().into_os_string();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let file = File::create(&partial)
        .with_context(|| format!("Failed to create archive {}", partial.display()))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    for entry in entries {
        let full = base.join(entry);
        let added = if full.is_dir() {
            builder.append_dir_all(entry, &full)
        } else {
            builder.append_path_with_name(&full, entry)
        };
        added.with_context(|| format!("Failed to add {} to archive", entry.display()))?;
    }

    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .with_context(|| format!("Failed to finish archive {}", target.display()))?;
    std::fs::rename(&partial, &target)
        .with_context(|| format!("Failed to move archive into {}", target.display()))?;
    Ok(())
}
