//! Job list files: one `path,generation,destination` row per input.
//!
//! No header row. Lines starting with `#` are comments. Trailing columns may
//! be omitted, in which case the generation defaults to 10 and the
//! destination to `_old`.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::errors::{BackupError, BackupErrorKind, BackupResult};
use crate::retention::Generations;
use crate::scheduler::BackupJob;

pub const DEFAULT_JOB_GENERATIONS: i64 = 10;
pub const DEFAULT_JOB_BACKUP_DIR: &str = "_old";

pub fn load_jobs(path: &Path) -> BackupResult<Vec<BackupJob>> {
    let file = File::open(path).map_err(|err| {
        BackupError::io(BackupErrorKind::JobListInvalid, path, "open job list", err)
    })?;
    parse_jobs_from(file, path)
}

/// Parse a job list from any reader. Errors carry an empty path.
pub fn parse_jobs<R: Read>(reader: R) -> BackupResult<Vec<BackupJob>> {
    parse_jobs_from(reader, Path::new(""))
}

fn parse_jobs_from<R: Read>(reader: R, origin: &Path) -> BackupResult<Vec<BackupJob>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut jobs = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| {
            BackupError::new(
                BackupErrorKind::JobListInvalid,
                origin,
                format!("malformed row: {err}"),
            )
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let invalid = |message: String| {
            BackupError::new(
                BackupErrorKind::JobListInvalid,
                origin,
                format!("line {line}: {message}"),
            )
        };

        let path = record.get(0).unwrap_or_default();
        if path.is_empty() {
            // A row of empty fields is just a blank line.
            if record.iter().all(str::is_empty) {
                continue;
            }
            return Err(invalid("missing source path".to_string()));
        }

        let generations = match record.get(1).filter(|g| !g.is_empty()) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|err| invalid(format!("invalid generation {raw:?}: {err}")))?,
            None => DEFAULT_JOB_GENERATIONS,
        };
        let backup_dir = record
            .get(2)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_JOB_BACKUP_DIR);

        jobs.push(BackupJob::new(
            PathBuf::from(path),
            backup_dir,
            Generations::from(generations),
        ));
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::Result;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_columns_take_defaults() -> Result<()> {
        let input = "\
# path,generation,destination
/data/report.csv,3,/vault
/data/notes.txt
/data/photos, ,archive
/data/db.sqlite,-1
";
        let jobs = parse_jobs(input.as_bytes())?;
        assert_eq!(
            jobs,
            vec![
                BackupJob::new("/data/report.csv", "/vault", Generations::Keep(3)),
                BackupJob::new("/data/notes.txt", "_old", Generations::Keep(10)),
                BackupJob::new("/data/photos", "archive", Generations::Keep(10)),
                BackupJob::new("/data/db.sqlite", "_old", Generations::Unbounded),
            ]
        );
        Ok(())
    }

    #[test]
    fn bad_generation_names_the_line() {
        let err = parse_jobs("/a,3\n/b,lots\n".as_bytes()).expect_err("invalid generation");
        assert!(err.is_kind(BackupErrorKind::JobListInvalid));
        assert!(err.message.contains("line 2"), "{}", err.message);
    }

    #[test]
    fn blank_path_with_other_columns_is_rejected() {
        let err = parse_jobs(",3,_old\n".as_bytes()).expect_err("blank path");
        assert!(err.is_kind(BackupErrorKind::JobListInvalid));
    }

    #[test]
    fn load_reports_missing_file() -> Result<()> {
        let tmp = tempdir()?;
        let list = tmp.path().join("jobs.csv");
        let err = load_jobs(&list).expect_err("missing job list");
        assert!(err.is_kind(BackupErrorKind::JobListInvalid));
        assert_eq!(err.path, list);

        fs::write(&list, "  ./inbox , 2 , done \n")?;
        let jobs = load_jobs(&list)?;
        assert_eq!(jobs, vec![BackupJob::new("./inbox", "done", Generations::Keep(2))]);
        Ok(())
    }
}
