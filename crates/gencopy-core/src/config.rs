use directories::{BaseDirs, ProjectDirs};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::errors::{BackupError, BackupErrorKind, BackupResult};
use crate::retention::Generations;

pub const SETTINGS_FILE_NAME: &str = "gencopy.toml";
pub const DEFAULT_BACKUP_DIR: &str = "_old";
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

static CONFIG_DIR_OVERRIDE: Lazy<RwLock<Option<PathBuf>>> = Lazy::new(|| RwLock::new(None));

/// Override the configuration directory for the current process.
/// Subsequent calls replace the previous override.
pub fn set_config_dir<P: AsRef<Path>>(path: P) {
    *CONFIG_DIR_OVERRIDE.write() = Some(path.as_ref().to_path_buf());
}

/// Clear any previously configured override.
pub fn clear_config_dir_override() {
    CONFIG_DIR_OVERRIDE.write().take();
}

/// Resolve the configuration directory.
/// Priority: explicit override -> platform standard -> ~/.config/gencopy
pub fn config_dir() -> BackupResult<PathBuf> {
    if let Some(path) = CONFIG_DIR_OVERRIDE.read().clone() {
        return Ok(path);
    }

    if let Some(proj) = ProjectDirs::from("com", "Gencopy", "gencopy") {
        return Ok(proj.config_dir().to_path_buf());
    }

    if let Some(base) = BaseDirs::new() {
        return Ok(base.home_dir().join(".config").join("gencopy"));
    }

    Err(BackupError::new(
        BackupErrorKind::SettingsInvalid,
        "",
        "unable to determine configuration directory (no override and no platform default)",
    ))
}

pub fn settings_path() -> BackupResult<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE_NAME))
}

/// Values read from `gencopy.toml`. Command-line flags win over these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub generations: Generations,
    pub backup_dir: PathBuf,
    pub interval_secs: u64,
    pub workers: Option<usize>,
    pub exclude: Vec<String>,
    pub inputs: Vec<PathBuf>,
    pub job_list: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            generations: Generations::Unbounded,
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            interval_secs: DEFAULT_INTERVAL_SECS,
            workers: None,
            exclude: Vec::new(),
            inputs: Vec::new(),
            job_list: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`; a missing file gives the defaults.
    pub fn load(path: &Path) -> BackupResult<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("no settings file at {}; using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(BackupError::io(
                    BackupErrorKind::SettingsInvalid,
                    path,
                    "read settings file",
                    err,
                ))
            }
        };
        Self::parse(&content).map_err(|err| BackupError {
            path: path.to_path_buf(),
            ..err
        })
    }

    /// Load `gencopy.toml` from the resolved configuration directory.
    pub fn load_default() -> BackupResult<Self> {
        Self::load(&settings_path()?)
    }

    pub fn parse(content: &str) -> BackupResult<Self> {
        toml::from_str(content).map_err(|err| {
            BackupError::new(
                BackupErrorKind::SettingsInvalid,
                "",
                format!("failed to parse settings: {err}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::Result;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() -> Result<()> {
        let tmp = tempdir()?;
        let settings = Settings::load(&tmp.path().join(SETTINGS_FILE_NAME))?;
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.generations, Generations::Unbounded);
        assert_eq!(settings.backup_dir, PathBuf::from("_old"));
        assert_eq!(settings.interval_secs, 300);
        Ok(())
    }

    #[test]
    fn parses_partial_file() -> Result<()> {
        let settings = Settings::parse(
            r#"
generations = 3
exclude = ["*.tmp", "~*"]
inputs = ["/srv/data"]
"#,
        )?;
        assert_eq!(settings.generations, Generations::Keep(3));
        assert_eq!(settings.exclude, vec!["*.tmp".to_string(), "~*".to_string()]);
        assert_eq!(settings.inputs, vec![PathBuf::from("/srv/data")]);
        assert_eq!(settings.interval_secs, DEFAULT_INTERVAL_SECS);
        assert_eq!(settings.workers, None);
        Ok(())
    }

    #[test]
    fn negative_generations_mean_unbounded() -> Result<()> {
        let settings = Settings::parse("generations = -5\n")?;
        assert_eq!(settings.generations, Generations::Unbounded);
        Ok(())
    }

    #[test]
    fn invalid_file_names_the_path() -> Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, "interval_secs = \"soon\"\n")?;
        let err = Settings::load(&path).expect_err("bad settings");
        assert!(err.is_kind(BackupErrorKind::SettingsInvalid));
        assert_eq!(err.path, path);

        fs::write(&path, "colour = true\n")?;
        assert!(Settings::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn override_wins() -> Result<()> {
        let tmp = tempdir()?;
        set_config_dir(tmp.path());
        assert_eq!(config_dir()?, tmp.path());
        assert_eq!(settings_path()?, tmp.path().join(SETTINGS_FILE_NAME));
        clear_config_dir_override();
        Ok(())
    }
}
