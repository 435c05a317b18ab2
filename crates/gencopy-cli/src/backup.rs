use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eyre::{bail, Context, Result};
use gencopy_core::clock::SystemClock;
use gencopy_core::config::Settings;
use gencopy_core::fs_enum::FileFilter;
use gencopy_core::jobs::load_jobs;
use gencopy_core::logger::LogLogger;
use gencopy_core::{BackupJob, Generations, PassOptions, PassSummary, Scheduler};
use tokio::sync::watch;

use crate::cli::Cli;

/// Everything a run needs once flags and settings are merged.
#[derive(Debug)]
pub struct RunPlan {
    pub jobs: Vec<BackupJob>,
    pub options: PassOptions,
    pub interval: Duration,
    pub once: bool,
}

/// Merge command-line flags over the settings file and resolve the job list.
pub fn plan_from(cli: &Cli, settings: Settings) -> Result<RunPlan> {
    let generations = cli
        .generations
        .map(Generations::from)
        .unwrap_or(settings.generations);
    let backup_dir = cli.backup_dir.clone().unwrap_or(settings.backup_dir);
    let inputs: Vec<PathBuf> = if cli.inputs.is_empty() {
        settings.inputs
    } else {
        cli.inputs.clone()
    };
    let exclude = if cli.exclude.is_empty() {
        settings.exclude
    } else {
        cli.exclude.clone()
    };

    let mut jobs: Vec<BackupJob> = inputs
        .into_iter()
        .map(|path| BackupJob::new(path, backup_dir.clone(), generations))
        .collect();
    if let Some(list) = cli.job_list.clone().or(settings.job_list) {
        let listed = load_jobs(&list)
            .wrap_err_with(|| format!("failed to load job list {}", list.display()))?;
        log::debug!("loaded {} job(s) from {}", listed.len(), list.display());
        jobs.extend(listed);
    }
    if jobs.is_empty() {
        bail!("nothing to back up: pass one or more INPUTS or a job list (--jobs)");
    }

    let mut options = PassOptions {
        filter: FileFilter::new(exclude),
        ..PassOptions::default()
    };
    if let Some(workers) = cli.workers.or(settings.workers) {
        options.workers = workers.max(1);
    }

    Ok(RunPlan {
        jobs,
        options,
        interval: Duration::from_secs(cli.interval.unwrap_or(settings.interval_secs)),
        once: cli.once,
    })
}

/// Run passes until `--once` completes or Ctrl-C arrives.
///
/// A pass in progress always runs to completion; Ctrl-C only cuts the wait
/// between passes short. Returns whether the last pass had no failed file.
pub async fn run(plan: RunPlan) -> Result<bool> {
    let scheduler = Scheduler::new(Arc::new(SystemClock), Arc::new(LogLogger));
    let mut shutdown = watch_ctrl_c();

    for job in &plan.jobs {
        log::debug!(
            "job {} -> {} (generations {})",
            job.path.display(),
            job.backup_dir.display(),
            job.generations
        );
    }

    loop {
        let summary = scheduler.run_pass(&plan.jobs, &plan.options).await;
        print_summary(&summary, plan.options.workers);
        let succeeded = summary.is_success();

        if plan.once || *shutdown.borrow() {
            return Ok(succeeded);
        }

        tokio::select! {
            _ = tokio::time::sleep(plan.interval) => {}
            _ = shutdown.changed() => {
                log::info!("interrupted; stopping after the last pass");
                return Ok(succeeded);
            }
        }
    }
}

fn watch_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(true);
            }
            Err(err) => {
                log::warn!("unable to listen for Ctrl-C: {err}");
                // Keep the sender alive so the receiver never reports a change.
                tx.closed().await;
            }
        }
    });
    rx
}

fn print_summary(summary: &PassSummary, workers: usize) {
    println!(
        "Pass complete: {} copied, {} unchanged, {} pruned, {} in {:.2?}",
        summary.copied_files,
        summary.skipped_files,
        summary.pruned_versions,
        format_bytes(summary.total_bytes),
        summary.duration
    );
    println!(
        "• Files planned: {} | Workers: {}",
        summary.planned_files, workers
    );

    let failed = summary.failed_files();
    if failed > 0 {
        eprintln!("• Failed: {failed} file(s)");
        for err in summary.failures() {
            eprintln!("  {err}");
        }
    }
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes == 0 {
        return "0 B".to_owned();
    }
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
