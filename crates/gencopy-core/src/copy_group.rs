//! One source file's backup-and-prune unit of work.

use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;

use crate::clock::Clock;
use crate::copy::copy_file;
use crate::errors::{BackupError, BackupErrorKind, BackupResult};
use crate::logger::Logger;
use crate::naming::{backup_dir_for, compute_destination, SourceName};
use crate::retention::{enforce, Generations};
use crate::versions::{find_latest, scan, VersionEntry, VersionPattern};

/// What the copy step did for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupAction {
    Copied { destination: PathBuf, bytes: u64 },
    /// Source mtime equals the latest version's mtime.
    SkippedUnchanged { latest: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub action: BackupAction,
    pub pruned: usize,
}

/// Backup of a single source file for a single pass.
///
/// The destination (and its timestamp) is fixed when the group is built;
/// versions are always re-read from disk.
#[derive(Debug, Clone)]
pub struct CopyGroup {
    source: PathBuf,
    backup_spec: PathBuf,
    backup_dir: PathBuf,
    destination: PathBuf,
    generations: Generations,
    pattern: VersionPattern,
}

impl CopyGroup {
    pub fn new(
        source: impl Into<PathBuf>,
        backup_spec: impl Into<PathBuf>,
        generations: Generations,
        clock: &dyn Clock,
    ) -> BackupResult<Self> {
        let source = source.into();
        let backup_spec = backup_spec.into();

        let metadata = fs::metadata(&source).map_err(|err| {
            BackupError::io(BackupErrorKind::SourceUnavailable, &source, "stat source", err)
        })?;
        if metadata.is_dir() {
            return Err(BackupError::invalid_source(&source, "is a directory"));
        }
        if !metadata.is_file() {
            return Err(BackupError::invalid_source(&source, "is not a regular file"));
        }

        let destination = compute_destination(&source, &backup_spec, clock)?;
        let backup_dir = backup_dir_for(&source, &backup_spec);
        let pattern = VersionPattern::for_source(&SourceName::from_path(&source)?);

        Ok(Self {
            source,
            backup_spec,
            backup_dir,
            destination,
            generations,
            pattern,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn backup_spec(&self) -> &Path {
        &self.backup_spec
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn generations(&self) -> Generations {
        self.generations
    }

    /// Current versions of this source, oldest first.
    pub fn versions(&self) -> BackupResult<Vec<VersionEntry>> {
        scan(&self.pattern, &self.backup_dir)
    }

    pub fn latest_version(&self) -> BackupResult<Option<VersionEntry>> {
        Ok(find_latest(&self.versions()?).cloned())
    }

    /// Prune versions beyond the generation limit.
    pub fn enforce_retention(&self, logger: &dyn Logger) -> BackupResult<usize> {
        enforce(&self.pattern, &self.backup_dir, self.generations, logger)
    }

    /// Ensure the backup directory, copy unless unchanged, then prune.
    pub fn backup(&self, logger: &dyn Logger) -> BackupResult<BackupOutcome> {
        fs::create_dir_all(&self.backup_dir).map_err(|err| {
            logger.error("create backup directory", &self.backup_dir, &err.to_string());
            BackupError::io(
                BackupErrorKind::DirectoryCreateFailed,
                &self.backup_dir,
                "create backup directory",
                err,
            )
        })?;

        let action = match self.unchanged_since_latest()? {
            Some(latest) => {
                logger.skip_unchanged(&self.source, &latest);
                BackupAction::SkippedUnchanged { latest }
            }
            None => {
                let bytes = copy_file(&self.source, &self.destination, logger)?;
                BackupAction::Copied {
                    destination: self.destination.clone(),
                    bytes,
                }
            }
        };

        let pruned = self.enforce_retention(logger)?;
        Ok(BackupOutcome { action, pruned })
    }

    /// Latest version path when its mtime equals the source's current mtime.
    fn unchanged_since_latest(&self) -> BackupResult<Option<PathBuf>> {
        let Some(latest) = self.latest_version()? else {
            return Ok(None);
        };
        let source_meta = fs::metadata(&self.source).map_err(|err| {
            BackupError::io(
                BackupErrorKind::SourceUnavailable,
                &self.source,
                "stat source",
                err,
            )
        })?;
        let source_mtime = FileTime::from_last_modification_time(&source_meta);
        let latest_mtime = FileTime::from_system_time(latest.modified);
        log::debug!(
            "{} mtime {} / latest {} mtime {}",
            self.source.display(),
            source_mtime,
            latest.path.display(),
            latest_mtime
        );
        Ok((source_mtime == latest_mtime).then_some(latest.path))
    }
}
