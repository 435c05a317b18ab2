//! Error taxonomy for backup passes.
//!
//! Every failure is scoped to one source file (or one input) and carries the
//! offending path, so the scheduler can report it and keep going:
//! - Input errors: the path is not something we can back up
//! - Filesystem errors: a directory could not be read or created
//! - Copy/prune errors: a step of the copy group failed mid-way

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Kind of backup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupErrorKind {
    /// Source is a directory (or other non-file) where a file was expected.
    InvalidSourceKind,
    /// Source does not exist or its metadata cannot be read.
    SourceUnavailable,
    /// Listing a backup or input directory failed.
    DirectoryUnreadable,
    /// Creating the backup directory failed.
    DirectoryCreateFailed,
    /// Open, create, stream or rename failed while copying.
    CopyFailed,
    /// Deleting an old version failed.
    PruneFailed,
    /// A job list row could not be parsed.
    JobListInvalid,
    /// The settings file could not be read or parsed.
    SettingsInvalid,
}

impl BackupErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackupErrorKind::InvalidSourceKind => "invalid source kind",
            BackupErrorKind::SourceUnavailable => "source unavailable",
            BackupErrorKind::DirectoryUnreadable => "directory unreadable",
            BackupErrorKind::DirectoryCreateFailed => "directory create failed",
            BackupErrorKind::CopyFailed => "copy failed",
            BackupErrorKind::PruneFailed => "prune failed",
            BackupErrorKind::JobListInvalid => "job list invalid",
            BackupErrorKind::SettingsInvalid => "settings invalid",
        }
    }
}

impl fmt::Display for BackupErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backup error with its kind and the path that failed.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {}: {message}", .path.display())]
pub struct BackupError {
    pub kind: BackupErrorKind,
    pub path: PathBuf,
    pub message: String,
    #[source]
    pub source: Option<io::Error>,
}

impl BackupError {
    pub fn new(kind: BackupErrorKind, path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.as_ref().to_path_buf(),
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an I/O error, keeping it as the error source.
    pub fn io(
        kind: BackupErrorKind,
        path: impl AsRef<Path>,
        context: &str,
        err: io::Error,
    ) -> Self {
        Self {
            kind,
            path: path.as_ref().to_path_buf(),
            message: format!("{context}: {err}"),
            source: Some(err),
        }
    }

    pub fn invalid_source(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::new(BackupErrorKind::InvalidSourceKind, path, message)
    }

    pub fn is_kind(&self, kind: BackupErrorKind) -> bool {
        self.kind == kind
    }
}

/// Result type for backup operations.
pub type BackupResult<T> = std::result::Result<T, BackupError>;
