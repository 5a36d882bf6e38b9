//! Filesystem helper with an explicit working context
//!
//! Relative paths are resolved against the helper's own working directory
//! instead of the process one, so a run never mutates global state. Every
//! change of directory and every deletion is reported to the event sink.

use std::io::ErrorKind;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use glob::{MatchOptions, Pattern};

use crate::log::event::{EventKind, EventSink, PruneEvent};

/// Wildcards match neither `/` nor a leading `.`, like a POSIX shell.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Filesystem operations relative to a working directory
pub struct FsUtil<'a> {
    sink: &'a dyn EventSink,
    cwd: PathBuf,
}

impl<'a> FsUtil<'a> {
    /// Create a helper whose working directory is `cwd`
    pub fn new(sink: &'a dyn EventSink, cwd: impl Into<PathBuf>) -> Self {
        Self {
            sink,
            cwd: cwd.into(),
        }
    }

    /// Create a helper starting in the process working directory
    pub fn from_current_dir(sink: &'a dyn EventSink) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        Ok(Self::new(sink, cwd))
    }

    /// The current working directory
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Resolve `path` against the working directory
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.cwd.join(path)
    }

    /// Change the working directory.
    pub fn chdir(&mut self, path: &Path) -> Result<()> {
        let target = self.resolve(path);
        if !target.is_dir() {
            bail!("Cannot change directory: {} is not a directory", target.display());
        }
        self.set_cwd(target);
        Ok(())
    }

    /// Change into `path` until the returned guard is dropped.
    ///
    /// The previous directory is restored on every exit path, including
    /// early returns through `?` and unwinding.
    pub fn enter(&mut self, path: &Path) -> Result<WorkingDir<'_, 'a>> {
        let saved = self.cwd.clone();
        self.chdir(path)?;
        Ok(WorkingDir { fs: self, saved })
    }

    /// Delete a file, symlink or directory tree.
    ///
    /// A path that does not exist is not an error and emits no event.
    pub fn delete(&self, path: &Path) -> Result<()> {
        let target = self.resolve(path);
        let metadata = match std::fs::symlink_metadata(&target) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to stat {}", target.display()))
            }
        };

        let removed = if metadata.is_dir() {
            std::fs::remove_dir_all(&target)
        } else {
            std::fs::remove_file(&target)
        };
        removed.with_context(|| format!("Failed to delete {}", target.display()))?;

        self.sink
            .handle(&PruneEvent::local(EventKind::Delete, path.display().to_string()));
        Ok(())
    }

    /// Expand a glob pattern against the working directory.
    ///
    /// Follows `sh` rules: `**` is a plain `*` and a `[` without a closing
    /// `]` is literal. A pattern the glob matcher still rejects is matched
    /// literally. Matches under the working directory are returned relative
    /// to it. The result is sorted.
    pub fn expand(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let paths = match glob::glob_with(&self.anchor(&shell_pattern(pattern)), MATCH_OPTIONS) {
            Ok(paths) => paths,
            Err(_) => glob::glob_with(&self.anchor(&Pattern::escape(pattern)), MATCH_OPTIONS)
                .with_context(|| format!("Invalid glob pattern: {pattern}"))?,
        };

        let mut matches: Vec<PathBuf> = paths
            .filter_map(std::result::Result::ok)
            .map(|p| {
                p.strip_prefix(&self.cwd)
                    .map_or_else(|_| p.clone(), Path::to_path_buf)
            })
            .collect();
        matches.sort();
        Ok(matches)
    }

    fn anchor(&self, pattern: &str) -> String {
        if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            format!(
                "{}/{pattern}",
                Pattern::escape(&self.cwd.to_string_lossy()).trim_end_matches('/')
            )
        }
    }

    fn set_cwd(&mut self, dir: PathBuf) {
        self.sink
            .handle(&PruneEvent::local(EventKind::Chdir, dir.display().to_string()));
        self.cwd = dir;
    }
}

/// Rewrite a shell glob into the glob matcher's syntax.
fn shell_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                out.push('*');
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.extend(&chars[i..=end]);
                    i = end;
                }
                None => out.push_str("[[]"),
            },
            c => out.push(c),
        }
        i += 1;
    }
    out
}

/// Index of the `]` closing the bracket expression opened at `start`.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if chars.get(i) == Some(&'!') {
        i += 1;
    }
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while let Some(&c) = chars.get(i) {
        match c {
            ']' => return Some(i),
            '/' => return None,
            _ => i += 1,
        }
    }
    None
}

/// Scoped working directory, see [`FsUtil::enter`]
pub struct WorkingDir<'f, 'a> {
    fs: &'f mut FsUtil<'a>,
    saved: PathBuf,
}

impl<'a> Deref for WorkingDir<'_, 'a> {
    type Target = FsUtil<'a>;

    fn deref(&self) -> &Self::Target {
        &*self.fs
    }
}

impl DerefMut for WorkingDir<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.fs
    }
}

impl Drop for WorkingDir<'_, '_> {
    fn drop(&mut self) {
        let saved = std::mem::take(&mut self.saved);
        self.fs.set_cwd(saved);
    }
}
