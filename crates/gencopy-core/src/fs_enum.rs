use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

use crate::copy::PARTIAL_FILE_SUFFIX;
use crate::errors::{BackupError, BackupErrorKind, BackupResult};
// Candidate discovery for directory inputs (immediate children only)

/// File name exclusion patterns applied to directory children.
#[derive(Debug)]
pub struct FileFilter {
    pub exclude_files: Vec<String>,
    compiled_files: OnceCell<globset::GlobSet>,
}

impl FileFilter {
    pub fn new(exclude_files: Vec<String>) -> Self {
        Self {
            exclude_files,
            compiled_files: OnceCell::new(),
        }
    }

    fn build_globset(patterns: &[String]) -> globset::GlobSet {
        let mut builder = globset::GlobSetBuilder::new();
        for pat in patterns {
            match globset::Glob::new(pat) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(err) => log::warn!("ignoring invalid exclude pattern {pat:?}: {err}"),
            }
        }
        builder.build().unwrap_or_else(|_| globset::GlobSet::empty())
    }

    fn file_globs(&self) -> &globset::GlobSet {
        self.compiled_files
            .get_or_init(|| Self::build_globset(&self.exclude_files))
    }

    /// Check if a file should be backed up.
    pub fn allows_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        if name.to_string_lossy().ends_with(PARTIAL_FILE_SUFFIX) {
            return false;
        }
        !self.file_globs().is_match(name)
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Clone for FileFilter {
    fn clone(&self) -> Self {
        Self::new(self.exclude_files.clone())
    }
}

/// What an input path turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    File,
    Directory,
}

pub fn classify_input(path: &Path) -> BackupResult<InputKind> {
    let md = fs::metadata(path).map_err(|err| {
        BackupError::io(BackupErrorKind::SourceUnavailable, path, "stat input", err)
    })?;
    if md.is_dir() {
        Ok(InputKind::Directory)
    } else if md.is_file() {
        Ok(InputKind::File)
    } else {
        Err(BackupError::invalid_source(path, "is neither a file nor a directory"))
    }
}

/// Regular files directly inside `root`, sorted by path.
///
/// Subdirectories are not descended into. When `backup_spec` resolves to
/// `root` itself nothing is returned, so versions are never backed up again.
pub fn enumerate_candidates(
    root: &Path,
    backup_spec: &Path,
    filter: &FileFilter,
) -> BackupResult<Vec<PathBuf>> {
    let backup_dir = if backup_spec.is_absolute() {
        backup_spec.to_path_buf()
    } else {
        root.join(backup_spec)
    };
    if same_dir(&backup_dir, root) {
        log::warn!(
            "backup directory {} is the input directory itself; skipping",
            root.display()
        );
        return Ok(Vec::new());
    }

    let read_dir = fs::read_dir(root).map_err(|err| {
        BackupError::io(BackupErrorKind::DirectoryUnreadable, root, "list input directory", err)
    })?;

    let mut files = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|err| {
            BackupError::io(
                BackupErrorKind::DirectoryUnreadable,
                root,
                "read input directory entry",
                err,
            )
        })?;
        let path = entry.path();
        // Follow symlinks so a linked file is backed up like a regular one.
        let md = match fs::metadata(&path) {
            Ok(md) => md,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                log::warn!("skipping {}: {err}", path.display());
                continue;
            }
        };
        if !md.is_file() || !filter.allows_file(&path) {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::Result;
    use tempfile::tempdir;

    #[test]
    fn lists_immediate_files_only() -> Result<()> {
        let tmp = tempdir()?;
        let root = tmp.path();
        fs::write(root.join("b.txt"), b"b")?;
        fs::write(root.join("a.txt"), b"a")?;
        fs::create_dir_all(root.join("_old"))?;
        fs::write(root.join("_old").join("a_20240101-000000.txt"), b"a")?;
        fs::create_dir_all(root.join("nested"))?;
        fs::write(root.join("nested").join("deep.txt"), b"d")?;

        let files = enumerate_candidates(root, Path::new("_old"), &FileFilter::default())?;
        assert_eq!(files, vec![root.join("a.txt"), root.join("b.txt")]);
        Ok(())
    }

    #[test]
    fn exclude_patterns_and_partials_are_skipped() -> Result<()> {
        let tmp = tempdir()?;
        let root = tmp.path();
        fs::write(root.join("keep.csv"), b"k")?;
        fs::write(root.join("scratch.tmp"), b"t")?;
        fs::write(root.join("keep.csv.gencopy.partial"), b"p")?;

        let filter = FileFilter::new(vec!["*.tmp".to_string()]);
        let files = enumerate_candidates(root, Path::new("_old"), &filter)?;
        assert_eq!(files, vec![root.join("keep.csv")]);
        Ok(())
    }

    #[test]
    fn absolute_backup_dir_equal_to_root_yields_nothing() -> Result<()> {
        let tmp = tempdir()?;
        let root = tmp.path();
        fs::write(root.join("a_20240101-000000.txt"), b"a")?;

        let files = enumerate_candidates(root, root, &FileFilter::default())?;
        assert!(files.is_empty());
        Ok(())
    }

    #[test]
    fn classify_reports_missing_inputs() -> Result<()> {
        let tmp = tempdir()?;
        assert_eq!(classify_input(tmp.path())?, InputKind::Directory);
        let err = classify_input(&tmp.path().join("nope")).expect_err("missing");
        assert!(err.is_kind(BackupErrorKind::SourceUnavailable));
        Ok(())
    }
}
