//! Discovery of existing backup copies ("versions") of one source file.
//!
//! A version is a regular file in the backup directory named
//! `<basename>_<8 digits>-<6 digits><ext>`. Ordering is by modification time,
//! not by the timestamp in the name; equal mtimes fall back to the file name
//! so that `find_latest`/`find_oldest` are deterministic.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fmt::Write;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::bytes::Regex;

use crate::errors::{BackupError, BackupErrorKind, BackupResult};
use crate::naming::SourceName;

/// One existing backup copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl VersionEntry {
    fn order(&self, other: &Self) -> Ordering {
        self.modified
            .cmp(&other.modified)
            .then_with(|| self.path.file_name().cmp(&other.path.file_name()))
    }
}

/// Name matcher scoped to a single source's basename and extension.
///
/// Matching runs on the raw name bytes, so sources whose names are not
/// valid UTF-8 still find their versions.
#[derive(Debug, Clone)]
pub struct VersionPattern {
    regex: Regex,
}

impl VersionPattern {
    pub fn new(basename: impl AsRef<OsStr>, ext: impl AsRef<OsStr>) -> Self {
        let pattern = format!(
            r"(?-u)^{}_[0-9]{{8}}-[0-9]{{6}}{}$",
            escape_bytes(basename.as_ref().as_encoded_bytes()),
            escape_bytes(ext.as_ref().as_encoded_bytes())
        );
        let regex = Regex::new(&pattern).expect("escaped version pattern");
        Self { regex }
    }

    pub fn for_source(name: &SourceName) -> Self {
        Self::new(&name.basename, &name.ext)
    }

    pub fn matches(&self, file_name: impl AsRef<OsStr>) -> bool {
        self.regex.is_match(file_name.as_ref().as_encoded_bytes())
    }
}

/// Literal byte pattern: alphanumerics as-is, everything else as `\xHH`.
fn escape_bytes(raw: &[u8]) -> String {
    let mut escaped = String::with_capacity(raw.len() * 4);
    for &byte in raw {
        if byte.is_ascii_alphanumeric() {
            escaped.push(char::from(byte));
        } else {
            let _ = write!(escaped, r"\x{byte:02X}");
        }
    }
    escaped
}

/// List the versions of `basename`/`ext` in `dir`, oldest first.
///
/// A missing directory is an empty version set. Entries that disappear
/// between listing and stat (another pass pruning its own versions) are
/// skipped.
pub fn list_versions(
    basename: impl AsRef<OsStr>,
    ext: impl AsRef<OsStr>,
    dir: &Path,
) -> BackupResult<Vec<VersionEntry>> {
    scan(&VersionPattern::new(basename, ext), dir)
}

pub(crate) fn scan(pattern: &VersionPattern, dir: &Path) -> BackupResult<Vec<VersionEntry>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(BackupError::io(
                BackupErrorKind::DirectoryUnreadable,
                dir,
                "list backup directory",
                err,
            ))
        }
    };

    let mut versions = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|err| {
            BackupError::io(
                BackupErrorKind::DirectoryUnreadable,
                dir,
                "read backup directory entry",
                err,
            )
        })?;
        if !pattern.matches(entry.file_name()) {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(md) => md,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(BackupError::io(
                    BackupErrorKind::DirectoryUnreadable,
                    entry.path(),
                    "stat version",
                    err,
                ))
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().map_err(|err| {
            BackupError::io(
                BackupErrorKind::DirectoryUnreadable,
                entry.path(),
                "read version mtime",
                err,
            )
        })?;
        versions.push(VersionEntry {
            path: entry.path(),
            modified,
        });
    }

    versions.sort_by(VersionEntry::order);
    Ok(versions)
}

/// Most recently modified version, if any.
pub fn find_latest(versions: &[VersionEntry]) -> Option<&VersionEntry> {
    versions.iter().max_by(|a, b| a.order(b))
}

/// Least recently modified version, if any.
pub fn find_oldest(versions: &[VersionEntry]) -> Option<&VersionEntry> {
    versions.iter().min_by(|a, b| a.order(b))
}
