use std::path::PathBuf;
use std::time::Duration;

use crate::copy_group::{BackupAction, BackupOutcome};
use crate::errors::{BackupError, BackupResult};

/// Result of one source file in a pass.
#[derive(Debug)]
pub struct FileReport {
    pub source: PathBuf,
    pub result: BackupResult<BackupOutcome>,
}

impl FileReport {
    pub fn failed(error: BackupError) -> Self {
        Self {
            source: error.path.clone(),
            result: Err(error),
        }
    }
}

/// Summary of a backup pass.
#[derive(Debug, Default)]
pub struct PassSummary {
    pub planned_files: usize,
    pub copied_files: usize,
    pub skipped_files: usize,
    pub pruned_versions: usize,
    pub total_bytes: u64,
    pub duration: Duration,
    pub reports: Vec<FileReport>,
}

impl PassSummary {
    pub(crate) fn record(&mut self, report: FileReport) {
        if let Ok(outcome) = &report.result {
            match &outcome.action {
                BackupAction::Copied { bytes, .. } => {
                    self.copied_files += 1;
                    self.total_bytes += bytes;
                }
                BackupAction::SkippedUnchanged { .. } => self.skipped_files += 1,
            }
            self.pruned_versions += outcome.pruned;
        }
        self.reports.push(report);
    }

    pub fn failures(&self) -> impl Iterator<Item = &BackupError> {
        self.reports.iter().filter_map(|r| r.result.as_ref().err())
    }

    pub fn failed_files(&self) -> usize {
        self.failures().count()
    }

    pub fn is_success(&self) -> bool {
        self.failed_files() == 0
    }
}
