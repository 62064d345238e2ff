//! Logger configuration and default resolution
//!
//! Every field of [`LogConfig`] is optional. Resolution fills the unset ones
//! (`None`, an empty path or zero) from defaults rooted at a base directory,
//! normally the directory of the running executable.

use crate::appenders::RotationPolicy;
use crate::core::error::{LoggerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory, under the base directory, holding the default log files
pub const DEFAULT_LOG_DIR: &str = "log";
pub const DEFAULT_INFO_FILE: &str = "info_utc.log";
pub const DEFAULT_ERROR_FILE: &str = "error_utc.log";
/// Megabytes
pub const DEFAULT_MAX_SIZE_MB: u64 = 1000;
pub const DEFAULT_MAX_BACKUPS: usize = 1000;
/// Days
pub const DEFAULT_MAX_AGE_DAYS: u32 = 90;

/// User-supplied logger configuration
///
/// # Examples
///
/// ```
/// use daylog::config::LogConfig;
///
/// let resolved = LogConfig::default()
///     .with_info_file("/srv/app/info.log")
///     .with_max_backups(30)
///     .resolve_in("/srv/app");
///
/// assert_eq!(resolved.info_file.to_str(), Some("/srv/app/info.log"));
/// assert_eq!(resolved.error_file.to_str(), Some("/srv/app/log/error_utc.log"));
/// assert_eq!(resolved.max_backups, 30);
/// assert_eq!(resolved.max_size, 1000);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Destination of info-and-above records
    pub info_file: Option<PathBuf>,
    /// Destination of error-and-above records
    pub error_file: Option<PathBuf>,
    /// Size rotation threshold per file, in megabytes
    pub max_size: Option<u64>,
    /// Rotated files kept per log file
    pub max_backups: Option<usize>,
    /// Days a rotated file is kept
    pub max_age: Option<u32>,
}

/// [`LogConfig`] with every field filled in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLogConfig {
    pub info_file: PathBuf,
    pub error_file: PathBuf,
    pub max_size: u64,
    pub max_backups: usize,
    pub max_age: u32,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_info_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.info_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_error_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_max_size(mut self, megabytes: u64) -> Self {
        self.max_size = Some(megabytes);
        self
    }

    #[must_use]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = Some(count);
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, days: u32) -> Self {
        self.max_age = Some(days);
        self
    }

    /// Fill unset fields with defaults rooted at `base_dir`
    ///
    /// Pure: nothing is created on disk.
    pub fn resolve_in(self, base_dir: impl AsRef<Path>) -> ResolvedLogConfig {
        let log_dir = base_dir.as_ref().join(DEFAULT_LOG_DIR);
        ResolvedLogConfig {
            info_file: path_or(self.info_file, || log_dir.join(DEFAULT_INFO_FILE)),
            error_file: path_or(self.error_file, || log_dir.join(DEFAULT_ERROR_FILE)),
            max_size: nonzero_or(self.max_size, DEFAULT_MAX_SIZE_MB),
            max_backups: nonzero_or(self.max_backups, DEFAULT_MAX_BACKUPS),
            max_age: nonzero_or(self.max_age, DEFAULT_MAX_AGE_DAYS),
        }
    }

    /// Fill unset fields with defaults rooted at the executable's directory
    ///
    /// # Errors
    ///
    /// [`LoggerError::ExecutableDir`] when the executable path cannot be
    /// determined.
    pub fn resolve(self) -> Result<ResolvedLogConfig> {
        let base_dir = executable_dir()?;
        Ok(self.resolve_in(base_dir))
    }
}

impl ResolvedLogConfig {
    /// Rotation limits for both file sinks: compressed backups named in UTC
    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy::new()
            .with_max_size_mb(self.max_size)
            .with_max_backups(self.max_backups)
            .with_max_age_days(self.max_age)
            .with_compression(true)
            .with_local_time(false)
    }
}

impl From<ResolvedLogConfig> for LogConfig {
    fn from(resolved: ResolvedLogConfig) -> Self {
        Self {
            info_file: Some(resolved.info_file),
            error_file: Some(resolved.error_file),
            max_size: Some(resolved.max_size),
            max_backups: Some(resolved.max_backups),
            max_age: Some(resolved.max_age),
        }
    }
}

/// Directory containing the running executable
pub fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().map_err(|e| {
        LoggerError::executable_dir("Cannot determine the executable path", Some(e))
    })?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        LoggerError::executable_dir(
            format!("Executable path '{}' has no parent directory", exe.display()),
            None,
        )
    })
}

fn path_or(path: Option<PathBuf>, default: impl FnOnce() -> PathBuf) -> PathBuf {
    match path {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => default(),
    }
}

fn nonzero_or<T: Default + PartialEq>(value: Option<T>, default: T) -> T {
    match value {
        Some(value) if value != T::default() => value,
        _ => default,
    }
}
