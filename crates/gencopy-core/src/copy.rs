use filetime::{set_file_mtime, FileTime};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::errors::{BackupError, BackupErrorKind, BackupResult};
use crate::logger::Logger;

/// Suffix for temporary files while a copy is in progress.
pub const PARTIAL_FILE_SUFFIX: &str = ".gencopy.partial";

const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Guard that ensures temp files are cleaned up on failure.
/// Deletes the temp file on drop unless `commit()` is called.
struct TempFileGuard {
    temp_path: PathBuf,
    committed: bool,
}

impl TempFileGuard {
    fn new(temp_path: PathBuf) -> Self {
        Self {
            temp_path,
            committed: false,
        }
    }

    /// Atomically rename temp file to final destination.
    fn commit(mut self, final_path: &Path) -> io::Result<()> {
        // On Windows, rename fails if destination exists, so remove first
        #[cfg(windows)]
        {
            let _ = fs::remove_file(final_path);
        }
        fs::rename(&self.temp_path, final_path)?;
        self.committed = true;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.temp_path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

fn temp_path_for(dst: &Path) -> PathBuf {
    let mut temp = dst.as_os_str().to_owned();
    temp.push(PARTIAL_FILE_SUFFIX);
    PathBuf::from(temp)
}

/// Copy `src` to `dst` byte-for-byte and give `dst` the source's mtime.
///
/// Data goes to `<dst>.gencopy.partial` first and is renamed into place only
/// once the copy and the mtime update succeeded, so a failed copy never
/// leaves a truncated version behind. An existing `dst` is replaced.
pub fn copy_file(src: &Path, dst: &Path, logger: &dyn Logger) -> BackupResult<u64> {
    logger.start(src, dst);

    match copy_inner(src, dst) {
        Ok(bytes) => {
            logger.copy_done(src, dst, bytes);
            Ok(bytes)
        }
        Err(err) => {
            logger.error("copy", src, &err.message);
            Err(err)
        }
    }
}

fn copy_inner(src: &Path, dst: &Path) -> BackupResult<u64> {
    let copy_err = |context: &str, path: &Path, err: io::Error| {
        BackupError::io(BackupErrorKind::CopyFailed, path, context, err)
    };

    let src_file = File::open(src).map_err(|e| copy_err("open source", src, e))?;
    let src_meta = src_file
        .metadata()
        .map_err(|e| copy_err("stat source", src, e))?;
    let mtime = FileTime::from_last_modification_time(&src_meta);

    let guard = TempFileGuard::new(temp_path_for(dst));
    let dst_file =
        File::create(guard.path()).map_err(|e| copy_err("create destination", guard.path(), e))?;

    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, src_file);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, dst_file);
    let bytes = io::copy(&mut reader, &mut writer).map_err(|e| copy_err("copy data", src, e))?;
    let dst_file = writer
        .into_inner()
        .map_err(|e| copy_err("flush destination", guard.path(), e.into_error()))?;
    dst_file
        .sync_all()
        .map_err(|e| copy_err("sync destination", guard.path(), e))?;
    drop(dst_file);

    set_file_mtime(guard.path(), mtime)
        .map_err(|e| copy_err("set destination mtime", guard.path(), e))?;
    guard
        .commit(dst)
        .map_err(|e| copy_err("rename into place", dst, e))?;

    Ok(bytes)
}
