//! Rotating file appender with dated backups
//!
//! The active file keeps its configured name. Rotation renames it to
//! `<stem>-<timestamp><ext>` (UTC unless `local_time` is set) and starts a fresh
//! file. Rotation happens when a write would push the file past the size
//! limit, or when [`Rotatable::rotate`] is called explicitly.
//!
//! After each rotation the backups are "milled" on a background thread: the
//! newest `max_backups` are kept, anything older than `max_age` is removed, and
//! survivors are gzipped when compression is enabled.
//!
//! The appender is a cloneable handle. All clones share one file, so the
//! logger can write through one clone while a scheduler rotates through
//! another.

use crate::core::appender::Appender;
use crate::core::encoder::JsonEncoder;
use crate::core::error::{LoggerError, Result};
use crate::core::log_entry::LogEntry;
use crate::scheduler::Rotatable;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use crossbeam_channel::Sender;
use flate2::write::GzEncoder;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const MEGABYTE: u64 = 1024 * 1024;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;
const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const BACKUP_TIME_PARSE_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.f";
const COMPRESS_SUFFIX: &str = ".gz";
const CLEANUP_THREAD_NAME: &str = "daylog-cleanup";

/// Limits applied by a [`RotatingFileAppender`]
///
/// # Examples
///
/// ```
/// use daylog::appenders::RotationPolicy;
///
/// let policy = RotationPolicy::new()
///     .with_max_size_mb(50)
///     .with_max_backups(7)
///     .with_max_age_days(30)
///     .with_compression(true);
/// assert_eq!(policy.max_size_bytes, 50 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Size at which the active file is rotated
    pub max_size_bytes: u64,
    /// Number of backups to keep; 0 keeps all of them
    pub max_backups: usize,
    /// Backups older than this are removed; `None` keeps them regardless of age
    pub max_age: Option<Duration>,
    /// Gzip backups after rotation
    pub compress: bool,
    /// Use local time instead of UTC in backup file names
    pub local_time: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: 100 * MEGABYTE,
            max_backups: 0,
            max_age: None,
            compress: false,
            local_time: false,
        }
    }
}

impl RotationPolicy {
    /// Create a new rotation policy with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size_mb(mut self, megabytes: u64) -> Self {
        self.max_size_bytes = megabytes.saturating_mul(MEGABYTE);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size_bytes(mut self, bytes: u64) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_age_days(mut self, days: u32) -> Self {
        self.max_age = Some(Duration::from_secs(u64::from(days) * SECONDS_PER_DAY));
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_local_time(mut self, enabled: bool) -> Self {
        self.local_time = enabled;
        self
    }

    /// Whether rotated files need any pruning or compression at all
    fn needs_cleanup(&self) -> bool {
        self.max_backups > 0 || self.max_age.is_some() || self.compress
    }
}

/// A rotated file found next to the active log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub path: PathBuf,
    /// Rotation time recovered from the file name
    pub timestamp: DateTime<Utc>,
    pub compressed: bool,
}

impl BackupFile {
    /// File name without the compression suffix; a backup and its gzipped
    /// twin share this key.
    fn base_name(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match name.strip_suffix(COMPRESS_SUFFIX) {
            Some(stripped) if self.compressed => stripped.to_string(),
            _ => name,
        }
    }
}

/// Naming and retention of the backups of one log file
///
/// Shared between the writing side, which names new backups, and the cleanup
/// thread, which prunes and compresses them.
struct BackupSet {
    path: PathBuf,
    policy: RotationPolicy,
}

enum CleanupMessage {
    Mill,
    /// Answered once every earlier request has been processed
    Sync(Sender<()>),
    Stop,
}

/// Background thread that mills backups after each rotation
struct CleanupThread {
    sender: Sender<CleanupMessage>,
    handle: JoinHandle<()>,
}

impl CleanupThread {
    fn spawn(backups: Arc<BackupSet>) -> io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name(CLEANUP_THREAD_NAME.to_string())
            .spawn(move || {
                for message in receiver {
                    match message {
                        CleanupMessage::Mill => backups.mill(),
                        CleanupMessage::Sync(done) => {
                            let _ = done.send(());
                        }
                        CleanupMessage::Stop => break,
                    }
                }
            })?;
        Ok(Self { sender, handle })
    }

    /// Finish queued work, then end the thread
    fn stop(self) {
        let _ = self.sender.send(CleanupMessage::Stop);
        let _ = self.handle.join();
    }
}

#[derive(Default)]
struct FileState {
    writer: Option<BufWriter<File>>,
    size: u64,
    /// Started on the first cleanup request
    cleanup: Option<CleanupThread>,
}

struct SharedFile {
    backups: Arc<BackupSet>,
    state: Mutex<FileState>,
}

/// Rotating file appender
///
/// The file and its directory are created on first write or rotation, not on
/// construction. Pruning and compression of old backups run on a background
/// thread, so writers only wait for the rename of the active file.
///
/// # Examples
///
/// ```no_run
/// use daylog::appenders::{RotatingFileAppender, RotationPolicy};
/// use daylog::scheduler::Rotatable;
///
/// let policy = RotationPolicy::new().with_max_size_mb(10).with_compression(true);
/// let appender = RotatingFileAppender::new("/var/log/app/info_utc.log", policy);
/// appender.rotate().unwrap();
/// ```
#[derive(Clone)]
pub struct RotatingFileAppender {
    shared: Arc<SharedFile>,
    encoder: JsonEncoder,
}

impl RotatingFileAppender {
    pub fn new<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Self {
        Self {
            shared: Arc::new(SharedFile {
                backups: Arc::new(BackupSet {
                    path: path.as_ref().to_path_buf(),
                    policy,
                }),
                state: Mutex::new(FileState::default()),
            }),
            encoder: JsonEncoder::default(),
        }
    }

    /// Set the encoder for this handle
    #[must_use]
    pub fn with_encoder(mut self, encoder: JsonEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.shared.backups.path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.shared.backups.policy
    }

    /// Bytes written to the active file, including buffered bytes
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.shared.state.lock().size
    }

    /// Write raw bytes, rotating first if they would not fit
    ///
    /// # Errors
    ///
    /// Fails if `bytes` alone is larger than the size limit, or on IO errors.
    pub fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.shared.state.lock();
        self.shared.write(&mut state, bytes)
    }

    /// Flush and close the active file; the next write reopens it
    pub fn close(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        self.shared.close(&mut state)
    }

    /// Block until pruning and compression requested so far have finished
    pub fn wait_for_cleanup(&self) {
        let sender = match self.shared.state.lock().cleanup {
            Some(ref cleanup) => cleanup.sender.clone(),
            None => return,
        };
        let (done, finished) = crossbeam_channel::bounded(1);
        if sender.send(CleanupMessage::Sync(done)).is_ok() {
            let _ = finished.recv();
        }
    }

    /// Backups of this file, newest first
    pub fn backups(&self) -> Result<Vec<BackupFile>> {
        self.shared.backups.list()
    }

    /// Path the active file would be renamed to if rotated at `at`
    #[must_use]
    pub fn backup_path_at(&self, at: DateTime<Utc>) -> PathBuf {
        self.shared.backups.backup_path(at)
    }
}

impl SharedFile {
    fn path(&self) -> &Path {
        &self.backups.path
    }

    fn write(&self, state: &mut FileState, bytes: &[u8]) -> Result<()> {
        let len = bytes.len() as u64;
        let max = self.backups.policy.max_size_bytes;
        if len > max {
            return Err(LoggerError::file_appender(
                self.path().display().to_string(),
                format!("write length {} exceeds maximum file size {}", len, max),
            ));
        }

        if state.writer.is_none() {
            self.open_existing_or_new(state, len)?;
        }

        if state.size + len > max {
            self.rotate(state)?;
        }

        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("File writer not initialized"))?;
        writer.write_all(bytes).map_err(|e| {
            LoggerError::file_appender(
                self.path().display().to_string(),
                format!("Failed to write log entry: {}", e),
            )
        })?;
        state.size += len;
        Ok(())
    }

    /// Open the active file for appending, or start a new one when it is
    /// missing or has no room for `write_len` more bytes.
    fn open_existing_or_new(&self, state: &mut FileState, write_len: u64) -> Result<()> {
        self.request_cleanup(state);

        let path = self.path();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return self.open_new(state),
            Err(e) => {
                return Err(LoggerError::io_operation(
                    "inspect log file",
                    format!("Cannot access metadata of '{}'", path.display()),
                    e,
                ))
            }
        };

        if metadata.len() + write_len >= self.backups.policy.max_size_bytes {
            return self.rotate(state);
        }

        match OpenOptions::new().append(true).open(path) {
            Ok(file) => {
                state.writer = Some(BufWriter::new(file));
                state.size = metadata.len();
                Ok(())
            }
            // Unreadable leftovers are moved aside rather than blocking logging
            Err(_) => self.open_new(state),
        }
    }

    /// Move any existing active file to its backup name and create an empty one
    fn open_new(&self, state: &mut FileState) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        if path.exists() {
            let backup = self.backups.free_backup_path(Utc::now());
            fs::rename(path, &backup).map_err(|e| {
                LoggerError::file_rotation(
                    path.display().to_string(),
                    format!("Failed to rename to '{}': {}", backup.display(), e),
                )
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| {
                LoggerError::file_rotation(
                    path.display().to_string(),
                    format!("Failed to create new log file: {}", e),
                )
            })?;

        state.writer = Some(BufWriter::new(file));
        state.size = 0;
        Ok(())
    }

    fn close(&self, state: &mut FileState) -> Result<()> {
        if let Some(mut writer) = state.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.path().display().to_string(),
                    format!("Failed to flush before closing: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn rotate(&self, state: &mut FileState) -> Result<()> {
        self.close(state)?;
        self.open_new(state)?;
        self.request_cleanup(state);
        Ok(())
    }

    /// Hand a mill pass to the cleanup thread, starting it if needed. Without
    /// a thread the pass runs inline.
    fn request_cleanup(&self, state: &mut FileState) {
        if !self.backups.policy.needs_cleanup() {
            return;
        }

        if state.cleanup.is_none() {
            match CleanupThread::spawn(Arc::clone(&self.backups)) {
                Ok(cleanup) => state.cleanup = Some(cleanup),
                Err(e) => {
                    eprintln!(
                        "[WARN] Failed to start cleanup thread for {}: {}",
                        self.path().display(),
                        e
                    );
                    self.backups.mill();
                    return;
                }
            }
        }

        let queued = state
            .cleanup
            .as_ref()
            .is_some_and(|cleanup| cleanup.sender.send(CleanupMessage::Mill).is_ok());
        if !queued {
            self.backups.mill();
        }
    }

    fn flush(&self, state: &mut FileState) -> Result<()> {
        if let Some(ref mut writer) = state.writer {
            writer.flush().map_err(|e| {
                LoggerError::file_appender(
                    self.path().display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }
}

impl BackupSet {
    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// (`"<stem>-"`, `".<ext>"`) of the active file name
    fn prefix_and_ext(&self) -> (String, String) {
        let filename = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app.log".to_string());
        let ext = Path::new(&filename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let stem = &filename[..filename.len() - ext.len()];
        (format!("{}-", stem), ext)
    }

    fn backup_path(&self, at: DateTime<Utc>) -> PathBuf {
        let (prefix, ext) = self.prefix_and_ext();
        let stamp = if self.policy.local_time {
            at.with_timezone(&Local).format(BACKUP_TIME_FORMAT).to_string()
        } else {
            at.format(BACKUP_TIME_FORMAT).to_string()
        };
        self.directory().join(format!("{}{}{}", prefix, stamp, ext))
    }

    /// Backup path for `at`, moved forward a millisecond at a time past names
    /// already taken by an earlier rotation in the same millisecond
    fn free_backup_path(&self, mut at: DateTime<Utc>) -> PathBuf {
        let mut backup = self.backup_path(at);
        while backup.exists() || with_suffix(&backup, COMPRESS_SUFFIX).exists() {
            at += chrono::Duration::milliseconds(1);
            backup = self.backup_path(at);
        }
        backup
    }

    fn timestamp_from_name(&self, name: &str, prefix: &str, ext: &str) -> Option<DateTime<Utc>> {
        let stamp = name.strip_prefix(prefix)?.strip_suffix(ext)?;
        let naive = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_PARSE_FORMAT).ok()?;
        if self.policy.local_time {
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.with_timezone(&Utc))
        } else {
            Some(Utc.from_utc_datetime(&naive))
        }
    }

    fn list(&self) -> Result<Vec<BackupFile>> {
        let directory = self.directory();
        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(LoggerError::io_operation(
                    "list log directory",
                    format!("Cannot read '{}'", directory.display()),
                    e,
                ))
            }
        };

        let (prefix, ext) = self.prefix_and_ext();
        let mut backups = Vec::new();
        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(timestamp) = self.timestamp_from_name(&name, &prefix, &ext) {
                backups.push(BackupFile {
                    path: entry.path(),
                    timestamp,
                    compressed: false,
                });
            } else if let Some(timestamp) = name
                .strip_suffix(COMPRESS_SUFFIX)
                .and_then(|stripped| self.timestamp_from_name(stripped, &prefix, &ext))
            {
                backups.push(BackupFile {
                    path: entry.path(),
                    timestamp,
                    compressed: true,
                });
            }
        }

        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(backups)
    }

    /// Prune and compress backups; failures are reported and never stop logging
    fn mill(&self) {
        if let Err(e) = self.mill_once() {
            eprintln!(
                "[WARN] Failed to process rotated logs of {}: {}",
                self.path.display(),
                e
            );
        }
    }

    fn mill_once(&self) -> Result<()> {
        let policy = &self.policy;
        if !policy.needs_cleanup() {
            return Ok(());
        }

        let mut files = self.list()?;
        let mut remove = Vec::new();

        if policy.max_backups > 0 && policy.max_backups < files.len() {
            let mut preserved = HashSet::new();
            let mut remaining = Vec::new();
            for file in files {
                preserved.insert(file.base_name());
                if preserved.len() > policy.max_backups {
                    remove.push(file);
                } else {
                    remaining.push(file);
                }
            }
            files = remaining;
        }

        let cutoff = policy
            .max_age
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .and_then(|age| Utc::now().checked_sub_signed(age));
        if let Some(cutoff) = cutoff {
            let (expired, kept): (Vec<_>, Vec<_>) =
                files.into_iter().partition(|f| f.timestamp < cutoff);
            remove.extend(expired);
            files = kept;
        }

        for file in &remove {
            if let Err(e) = fs::remove_file(&file.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    eprintln!("[WARN] Failed to remove old backup {}: {}", file.path.display(), e);
                }
            }
        }

        if policy.compress {
            for file in files.iter().filter(|f| !f.compressed) {
                if let Err(e) = compress_file(&file.path) {
                    eprintln!("[WARN] Failed to compress {}: {}", file.path.display(), e);
                }
            }
        }

        Ok(())
    }
}

impl Drop for SharedFile {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(mut writer) = state.writer.take() {
            // Best effort flush - ignore errors during drop
            let _ = writer.flush();
        }
        if let Some(cleanup) = state.cleanup.take() {
            cleanup.stop();
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn gzip(input: File, output: File) -> io::Result<()> {
    let mut reader = BufReader::with_capacity(64 * 1024, input);
    let mut encoder = GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.flush()
}

/// Gzip `path` to `path.gz`, removing the original only once the compressed
/// file is complete.
fn compress_file(path: &Path) -> Result<()> {
    let gz_path = with_suffix(path, COMPRESS_SUFFIX);
    let temp_gz_path = with_suffix(path, ".gz.tmp");

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let output = File::create(&temp_gz_path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp_gz_path.display()),
            e,
        )
    })?;

    if let Err(e) = gzip(input, output) {
        let _ = fs::remove_file(&temp_gz_path);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    fs::rename(&temp_gz_path, &gz_path).map_err(|e| {
        let _ = fs::remove_file(&temp_gz_path);
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to rename compressed file to: {}", gz_path.display()),
            e,
        )
    })?;

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[WARN] Compression succeeded but failed to remove original file {}: {}",
            path.display(),
            e
        );
    }

    Ok(())
}

impl Rotatable for RotatingFileAppender {
    fn rotate(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        self.shared.rotate(&mut state)
    }

    fn label(&self) -> String {
        self.path().display().to_string()
    }
}

impl Appender for RotatingFileAppender {
    fn append(&mut self, entry: &LogEntry) -> Result<()> {
        let line = self.encoder.encode_line(entry)?;
        self.write_bytes(line.as_bytes())
    }

    fn flush(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock();
        self.shared.flush(&mut state)
    }

    fn name(&self) -> &str {
        "rotating_file"
    }
}

impl Write for RotatingFileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Appender::flush(self).map_err(io::Error::other)
    }
}
