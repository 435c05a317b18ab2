pub mod clock;
pub mod config;
pub mod copy;
pub mod copy_group;
pub mod errors;
pub mod fs_enum;
pub mod jobs;
pub mod logger;
pub mod naming;
pub mod retention;
pub mod scheduler;
pub mod summary;
pub mod versions;

pub use copy_group::{BackupAction, BackupOutcome, CopyGroup};
pub use errors::{BackupError, BackupErrorKind, BackupResult};
pub use retention::Generations;
pub use scheduler::{BackupJob, PassOptions, Scheduler};
pub use summary::{FileReport, PassSummary};
