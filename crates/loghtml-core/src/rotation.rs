//! Size-based rotation with timestamped archives and a retention count.
//!
//! ```text
//! logs/
//! ├── log.html                              # active document
//! ├── 2026-01-21_14-13-48-120_log.html      # rotated (oldest)
//! └── 2026-01-21_14-20-02-907_log.html      # rotated (newest)
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Duration as ChronoDuration, Local};
use tracing::{debug, warn};

use crate::config::LoggerConfig;
use crate::document::{self, OpenedDocument};
use crate::error::{LogError, LogResult};

/// Timestamp prefix of rotated file names; sorts chronologically.
pub const ROTATED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S-%3f";

/// Outcome of a successful rotation.
#[derive(Debug)]
pub struct Rotation {
    /// Fresh active document.
    pub document: OpenedDocument,
    /// Where the previous document went, if it still existed.
    pub archived: Option<PathBuf>,
    /// Rotated files removed by retention.
    pub evicted: Vec<PathBuf>,
}

/// Decides when to rotate and which archives to keep.
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    log_dir: PathBuf,
    main_filename: String,
    max_size: u64,
    max_files: usize,
}

impl RotationPolicy {
    pub fn new(log_dir: impl Into<PathBuf>, main_filename: impl Into<String>, max_size: u64, max_files: usize) -> Self {
        Self {
            log_dir: log_dir.into(),
            main_filename: main_filename.into(),
            max_size,
            max_files,
        }
    }

    pub fn from_config(config: &LoggerConfig) -> Self {
        Self::new(
            config.log_dir.clone(),
            config.main_filename.clone(),
            config.max_size,
            config.max_files,
        )
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Path of the active document.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn active_path(&self) -> PathBuf {
        self.log_dir.join(&self.main_filename)
    }

    pub fn should_rotate(&self, current_size: u64) -> bool {
        current_size >= self.max_size
    }

    /// First unused archive name for a rotation at `now`.
    ///
    /// Collisions (several rotations within one millisecond) move the
    /// timestamp forward so names stay unique and sortable.
    pub fn archive_path(&self, now: DateTime<Local>) -> PathBuf {
        let mut stamp = now;
        loop {
            let candidate = self.log_dir.join(format!(
                "{}_{}",
                stamp.format(ROTATED_TIMESTAMP_FORMAT),
                self.main_filename
            ));
            if !candidate.exists() {
                return candidate;
            }
            stamp += ChronoDuration::milliseconds(1);
        }
    }

    /// Archive `active` and start a fresh document with `header`.
    ///
    /// The caller must already have finalized `active`. If the rename fails
    /// because the file (or the log directory) is gone, a fresh document is
    /// still created, recreating the directory if needed. Any other
    /// rename failure leaves `active` in place and returns
    /// [`LogError::Rotation`].
    pub fn rotate(&self, active: &Path, header: &str) -> LogResult<Rotation> {
        let target = self.archive_path(Local::now());
        let archived = match fs::rename(active, &target) {
            Ok(()) => Some(target),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %active.display(), "Active document vanished before rotation");
                None
            }
            Err(e) => {
                return Err(LogError::Rotation(format!(
                    "cannot rename {} to {}: {}",
                    active.display(),
                    target.display(),
                    e
                )))
            }
        };

        // A NotFound above may mean the whole directory went away.
        fs::create_dir_all(&self.log_dir)?;
        let document = document::create(active, header)?;
        let evicted = self.enforce_retention();

        debug!(
            archived = ?archived,
            evicted = evicted.len(),
            "Rotated log document"
        );

        Ok(Rotation {
            document,
            archived,
            evicted,
        })
    }

    /// Rotated files in this directory, oldest first.
    ///
    /// Ordered by creation time (modification time where the filesystem
    /// does not report one), then by name.
    pub fn rotated_files(&self) -> io::Result<Vec<PathBuf>> {
        let suffix = format!("_{}", self.main_filename);
        let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();

        for entry in fs::read_dir(&self.log_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let is_rotated = name
                .strip_suffix(&suffix)
                .is_some_and(|stamp| stamp.starts_with(|c: char| c.is_ascii_digit()));
            if !is_rotated {
                continue;
            }
            let created = entry
                .metadata()
                .and_then(|m| m.created().or_else(|_| m.modified()))
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((created, entry.path()));
        }

        files.sort();
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    /// Delete the oldest rotated files beyond `max_files`.
    ///
    /// Failures are skipped per file; the returned list holds the files that
    /// were actually removed.
    pub fn enforce_retention(&self) -> Vec<PathBuf> {
        let files = match self.rotated_files() {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %self.log_dir.display(), error = %e, "Cannot list rotated documents");
                return Vec::new();
            }
        };
        if files.len() <= self.max_files {
            return Vec::new();
        }

        let excess = files.len() - self.max_files;
        files
            .into_iter()
            .take(excess)
            .filter(|path| match fs::remove_file(path) {
                Ok(()) => true,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot remove old log document");
                    false
                }
            })
            .collect()
    }
}
