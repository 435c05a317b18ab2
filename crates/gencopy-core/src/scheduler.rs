//! Fan-out of copy groups across many files with a bounded worker pool.
//!
//! A pass expands every job into source files, then runs one copy group per
//! file. At most `workers` copy groups run at once (semaphore permits taken
//! before a task is spawned), and at most one copy group per source file is
//! in flight across every pass sharing the same `Scheduler`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};

use crate::clock::Clock;
use crate::copy_group::CopyGroup;
use crate::errors::{BackupError, BackupErrorKind};
use crate::fs_enum::{classify_input, enumerate_candidates, FileFilter, InputKind};
use crate::logger::Logger;
use crate::retention::Generations;
use crate::summary::{FileReport, PassSummary};

/// One configured input: a file or a directory whose immediate files are
/// backed up, with its own backup directory and generation limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJob {
    pub path: PathBuf,
    pub backup_dir: PathBuf,
    pub generations: Generations,
}

impl BackupJob {
    pub fn new(
        path: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
        generations: Generations,
    ) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
            generations,
        }
    }
}

/// Options for executing a backup pass.
#[derive(Clone, Debug)]
pub struct PassOptions {
    pub workers: usize,
    pub filter: FileFilter,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            filter: FileFilter::default(),
        }
    }
}

/// A source file resolved from a job.
#[derive(Debug, Clone)]
struct PlannedFile {
    source: PathBuf,
    /// Canonical path; the same file spelled differently shares one key.
    key: PathBuf,
    backup_dir: PathBuf,
    generations: Generations,
}

/// Per-source mutexes shared by every pass of one scheduler.
#[derive(Default)]
struct SourceLocks {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl SourceLocks {
    fn lock_for(&self, key: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(key.to_path_buf())
            .or_default()
            .clone()
    }

    /// Forget locks nobody holds or waits on.
    fn prune(&self) {
        self.locks.lock().retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

pub struct Scheduler {
    clock: Arc<dyn Clock>,
    logger: Arc<dyn Logger>,
    locks: Arc<SourceLocks>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>, logger: Arc<dyn Logger>) -> Self {
        Self {
            clock,
            logger,
            locks: Arc::new(SourceLocks::default()),
        }
    }

    /// Run one pass over `jobs` and wait for every file to finish.
    ///
    /// Per-file failures end up in the summary; they never stop other files.
    pub async fn run_pass(&self, jobs: &[BackupJob], options: &PassOptions) -> PassSummary {
        let started = Instant::now();
        let mut summary = PassSummary::default();

        let planning = {
            let jobs = jobs.to_vec();
            let filter = options.filter.clone();
            tokio::task::spawn_blocking(move || plan_pass(&jobs, &filter)).await
        };
        let (planned, planning_failures) = match planning {
            Ok(plan) => plan,
            Err(err) => {
                log::error!("planning worker failed: {err}");
                let failures = jobs
                    .iter()
                    .map(|job| {
                        FileReport::failed(BackupError::new(
                            BackupErrorKind::DirectoryUnreadable,
                            &job.path,
                            format!("planning worker failed: {err}"),
                        ))
                    })
                    .collect();
                (Vec::new(), failures)
            }
        };
        for failure in planning_failures {
            if let Err(err) = &failure.result {
                self.logger
                    .error("plan", &failure.source, &err.to_string());
            }
            summary.record(failure);
        }
        summary.planned_files = planned.len();
        log::debug!(
            "pass planned {} file(s) with {} worker(s)",
            planned.len(),
            options.workers.max(1)
        );

        let mut executor = CopyGroupExecutor::new(options.workers);
        for file in planned {
            let lock = self.locks.lock_for(&file.key);
            executor
                .spawn(file, Arc::clone(&self.clock), Arc::clone(&self.logger), lock)
                .await;
            executor.drain_ready(&mut summary);
        }
        executor.finish(&mut summary).await;
        self.locks.prune();

        summary.reports.sort_by(|a, b| a.source.cmp(&b.source));
        summary.duration = started.elapsed();
        summary
    }

    /// Run a pass over plain paths sharing one backup directory and limit.
    pub async fn run_pass_for(
        &self,
        paths: &[PathBuf],
        backup_spec: &Path,
        generations: Generations,
        options: &PassOptions,
    ) -> PassSummary {
        let jobs: Vec<BackupJob> = paths
            .iter()
            .map(|path| BackupJob::new(path, backup_spec, generations))
            .collect();
        self.run_pass(&jobs, options).await
    }
}

/// Expand jobs into source files, dropping duplicates of the same file.
fn plan_pass(jobs: &[BackupJob], filter: &FileFilter) -> (Vec<PlannedFile>, Vec<FileReport>) {
    let mut planned = Vec::new();
    let mut failures = Vec::new();
    let mut seen = HashSet::new();

    for job in jobs {
        let sources = match classify_input(&job.path) {
            Ok(InputKind::File) => vec![job.path.clone()],
            Ok(InputKind::Directory) => {
                match enumerate_candidates(&job.path, &job.backup_dir, filter) {
                    Ok(files) => files,
                    Err(err) => {
                        failures.push(FileReport::failed(err));
                        continue;
                    }
                }
            }
            Err(err) => {
                failures.push(FileReport::failed(err));
                continue;
            }
        };

        for source in sources {
            let key = fs::canonicalize(&source).unwrap_or_else(|_| source.clone());
            if !seen.insert(key.clone()) {
                log::warn!(
                    "{} is listed by more than one input; backing it up once",
                    source.display()
                );
                continue;
            }
            planned.push(PlannedFile {
                source,
                key,
                backup_dir: job.backup_dir.clone(),
                generations: job.generations,
            });
        }
    }

    (planned, failures)
}

fn run_copy_group(file: &PlannedFile, clock: &dyn Clock, logger: &dyn Logger) -> FileReport {
    let result = CopyGroup::new(&file.source, &file.backup_dir, file.generations, clock)
        .and_then(|group| group.backup(logger));
    if let Err(err) = &result {
        log::debug!("backup of {} failed: {err}", file.source.display());
    }
    FileReport {
        source: file.source.clone(),
        result,
    }
}

struct CopyGroupExecutor {
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<FileReport>,
    sources: HashMap<Id, PathBuf>,
}

impl CopyGroupExecutor {
    fn new(max_parallel: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_parallel.max(1))),
            tasks: JoinSet::new(),
            sources: HashMap::new(),
        }
    }

    async fn spawn(
        &mut self,
        file: PlannedFile,
        clock: Arc<dyn Clock>,
        logger: Arc<dyn Logger>,
        source_lock: Arc<tokio::sync::Mutex<()>>,
    ) {
        let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore lives as long as the executor and is never closed.
            Err(_) => return,
        };

        let source = file.source.clone();
        let handle = self.tasks.spawn(async move {
            let _permit = permit;
            let _guard = source_lock.lock_owned().await;
            let source = file.source.clone();
            tokio::task::spawn_blocking(move || {
                run_copy_group(&file, clock.as_ref(), logger.as_ref())
            })
            .await
            .unwrap_or_else(|err| panicked(source, &err))
        });
        self.sources.insert(handle.id(), source);
    }

    fn drain_ready(&mut self, summary: &mut PassSummary) {
        while let Some(join_result) = self.tasks.try_join_next_with_id() {
            let report = self.convert_join_result(join_result);
            summary.record(report);
        }
    }

    async fn finish(mut self, summary: &mut PassSummary) {
        while let Some(join_result) = self.tasks.join_next_with_id().await {
            let report = self.convert_join_result(join_result);
            summary.record(report);
        }
    }

    fn convert_join_result(
        &mut self,
        join_result: Result<(Id, FileReport), JoinError>,
    ) -> FileReport {
        match join_result {
            Ok((id, report)) => {
                self.sources.remove(&id);
                report
            }
            Err(err) => {
                let source = self.sources.remove(&err.id()).unwrap_or_default();
                panicked(source, &err)
            }
        }
    }
}

fn panicked(source: PathBuf, err: &JoinError) -> FileReport {
    FileReport {
        result: Err(BackupError::new(
            BackupErrorKind::CopyFailed,
            &source,
            format!("copy worker failed: {err}"),
        )),
        source,
    }
}
