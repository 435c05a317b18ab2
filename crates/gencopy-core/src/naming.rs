//! Destination naming for backup copies.
//!
//! A copy of `/a/b/report.csv` taken at 2024-01-02 03:04:05 is named
//! `report_20240102-030405.csv` and lands either under an absolute backup
//! directory or under `<parent>/<backup_spec>`.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::clock::Clock;
use crate::errors::{BackupError, BackupErrorKind, BackupResult};

/// strftime layout of the timestamp token: 8-digit date, hyphen, 6-digit time.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// File name split into the parts that make up a version name.
///
/// Parts stay as OS strings so names that are not valid UTF-8 are backed up
/// like any other file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceName {
    /// File stem (`report` for `report.csv`).
    pub basename: OsString,
    /// Extension including the leading dot, or empty.
    pub ext: OsString,
}

impl SourceName {
    pub fn from_path(source: &Path) -> BackupResult<Self> {
        let basename = source
            .file_stem()
            .ok_or_else(|| BackupError::invalid_source(source, "path has no file name"))?
            .to_os_string();
        let ext = match source.extension() {
            Some(ext) => {
                let mut dotted = OsString::from(".");
                dotted.push(ext);
                dotted
            }
            None => OsString::new(),
        };
        Ok(Self { basename, ext })
    }

    /// Version file name for the given timestamp token.
    pub fn version_file_name(&self, token: &str) -> OsString {
        let mut name = self.basename.clone();
        name.push("_");
        name.push(token);
        name.push(&self.ext);
        name
    }
}

/// Resolve the backup directory for `source`.
///
/// An absolute `backup_spec` is used as-is; a relative one is joined onto
/// the source's parent directory.
pub fn backup_dir_for(source: &Path, backup_spec: &Path) -> PathBuf {
    if backup_spec.is_absolute() {
        backup_spec.to_path_buf()
    } else {
        let parent = source.parent().unwrap_or_else(|| Path::new(""));
        parent.join(backup_spec)
    }
}

/// Timestamp token for the clock's current time.
pub fn timestamp_token(clock: &dyn Clock) -> String {
    clock.now().format(TIMESTAMP_FORMAT).to_string()
}

/// Compute where a new copy of `source` goes.
pub fn compute_destination(
    source: &Path,
    backup_spec: &Path,
    clock: &dyn Clock,
) -> BackupResult<PathBuf> {
    match fs::metadata(source) {
        Ok(md) if md.is_dir() => {
            return Err(BackupError::invalid_source(source, "is a directory"));
        }
        Ok(_) => {}
        // A missing source is caught when the copy group stats it; naming
        // itself only needs the path.
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(BackupError::io(
                BackupErrorKind::SourceUnavailable,
                source,
                "stat source",
                err,
            ));
        }
    }

    let name = SourceName::from_path(source)?;
    let file_name = name.version_file_name(&timestamp_token(clock));
    Ok(backup_dir_for(source, backup_spec).join(file_name))
}
