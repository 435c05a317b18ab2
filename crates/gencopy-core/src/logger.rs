//! Event sink injected into copy groups and the scheduler.
//!
//! The core never talks to a logging backend directly for user-facing
//! events; callers pick a sink. `NoopLogger` is what tests use,
//! `LogLogger` forwards to the `log` facade.

use std::path::Path;

pub trait Logger: Send + Sync {
    fn start(&self, _src: &Path, _dst: &Path) {}
    fn copy_done(&self, _src: &Path, _dst: &Path, _bytes: u64) {}
    fn skip_unchanged(&self, _src: &Path, _latest: &Path) {}
    fn pruned(&self, _path: &Path) {}
    fn error(&self, _context: &str, _path: &Path, _message: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {}

/// Forwards events to the `log` crate at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLogger;

impl Logger for LogLogger {
    fn start(&self, src: &Path, dst: &Path) {
        log::trace!("start {} -> {}", src.display(), dst.display());
    }

    fn copy_done(&self, src: &Path, dst: &Path, bytes: u64) {
        log::info!("copied {} -> {} ({} bytes)", src.display(), dst.display(), bytes);
    }

    fn skip_unchanged(&self, src: &Path, latest: &Path) {
        log::debug!(
            "skip: unchanged {} (same mtime as {})",
            src.display(),
            latest.display()
        );
    }

    fn pruned(&self, path: &Path) {
        log::info!("pruned {}", path.display());
    }

    fn error(&self, context: &str, path: &Path, message: &str) {
        log::error!("{context} {}: {message}", path.display());
    }
}
