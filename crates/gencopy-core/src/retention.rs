//! Generation limits and pruning of old versions.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{BackupError, BackupErrorKind, BackupResult};
use crate::logger::Logger;
use crate::versions::{find_oldest, scan, VersionPattern};

/// Maximum number of versions kept per source file.
///
/// Configuration uses a signed integer where any negative value (the `-1`
/// sentinel) means "never prune".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Generations {
    #[default]
    Unbounded,
    Keep(usize),
}

impl Generations {
    pub fn limit(self) -> Option<usize> {
        match self {
            Generations::Unbounded => None,
            Generations::Keep(n) => Some(n),
        }
    }
}

impl From<i64> for Generations {
    fn from(value: i64) -> Self {
        if value < 0 {
            Generations::Unbounded
        } else {
            Generations::Keep(usize::try_from(value).unwrap_or(usize::MAX))
        }
    }
}

impl From<Generations> for i64 {
    fn from(value: Generations) -> Self {
        match value {
            Generations::Unbounded => -1,
            Generations::Keep(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }
}

impl fmt::Display for Generations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generations::Unbounded => f.write_str("unbounded"),
            Generations::Keep(n) => write!(f, "{n}"),
        }
    }
}

/// Delete the oldest versions in `dir` until at most `generations` remain.
///
/// The version set is re-listed after every deletion instead of deleting the
/// bottom `count - limit` from one scan, so changes made to the directory in
/// between are taken into account. Returns the number of deleted versions.
pub fn enforce(
    pattern: &VersionPattern,
    dir: &Path,
    generations: Generations,
    logger: &dyn Logger,
) -> BackupResult<usize> {
    let Some(limit) = generations.limit() else {
        return Ok(0);
    };

    let mut deleted = 0;
    loop {
        let versions = scan(pattern, dir)?;
        if versions.len() <= limit {
            break;
        }
        let Some(oldest) = find_oldest(&versions) else {
            break;
        };
        match fs::remove_file(&oldest.path) {
            Ok(()) => {
                deleted += 1;
                logger.pruned(&oldest.path);
            }
            // Someone else removed it between the scan and now.
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                logger.error("prune", &oldest.path, &err.to_string());
                return Err(BackupError::io(
                    BackupErrorKind::PruneFailed,
                    &oldest.path,
                    "remove old version",
                    err,
                ));
            }
        }
    }
    Ok(deleted)
}
