//! Main logger implementation
//!
//! A [`Logger`] is a cheap, cloneable handle. Every clone, named child and
//! field-carrying child shares the same sinks, so handing a logger to another
//! thread is just a `clone()`. Each sink has its own minimum level; a record
//! is written to every sink whose threshold it meets.

use super::{
    appender::Appender,
    error::Result,
    log_context::{FieldValue, LogContext},
    log_entry::{Caller, LogEntry},
    log_level::LogLevel,
    metrics::LoggerMetrics,
};
use crate::scheduler::{SchedulerHandle, SchedulerState};
use parking_lot::{Mutex, RwLock};
use std::backtrace::Backtrace;
use std::panic::Location;
use std::sync::Arc;

/// An appender paired with the lowest level it accepts
pub struct LeveledAppender {
    min_level: LogLevel,
    appender: Box<dyn Appender>,
}

impl LeveledAppender {
    pub fn new(min_level: LogLevel, appender: Box<dyn Appender>) -> Self {
        Self {
            min_level,
            appender,
        }
    }

    #[inline]
    pub fn accepts(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn name(&self) -> &str {
        self.appender.name()
    }
}

struct LoggerCore {
    appenders: RwLock<Vec<LeveledAppender>>,
    metrics: LoggerMetrics,
    stacktrace_level: Option<LogLevel>,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl LoggerCore {
    fn flush_all(&self) -> Result<()> {
        let mut appenders = self.appenders.write();
        let mut first_error = None;
        for leveled in appenders.iter_mut() {
            if let Err(e) = leveled.appender.flush() {
                eprintln!(
                    "[LOGGER ERROR] Appender '{}' flush failed: {}",
                    leveled.appender.name(),
                    e
                );
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => {
                self.metrics.record_flush_failure();
                Err(e)
            }
            None => Ok(()),
        }
    }
}

impl Drop for LoggerCore {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all() {
            eprintln!("[LOGGER ERROR] Failed to flush during shutdown: {}", e);
        }

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Logger shutting down with {} dropped logs (drop rate: {:.2}%)",
                dropped,
                self.metrics.drop_rate()
            );
        }
    }
}

#[derive(Clone)]
pub struct Logger {
    core: Arc<LoggerCore>,
    name: Option<Arc<str>>,
    fields: Arc<LogContext>,
}

impl Logger {
    /// A logger with no sinks; records are discarded until one is added
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(Vec::new(), None, None)
    }

    /// Create a builder for Logger
    ///
    /// # Example
    /// ```
    /// use daylog::prelude::*;
    ///
    /// let logger = Logger::builder()
    ///     .appender(LogLevel::Debug, ConsoleAppender::new())
    ///     .name("worker")
    ///     .build();
    /// assert!(logger.enabled(LogLevel::Debug));
    /// ```
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    fn from_parts(
        appenders: Vec<LeveledAppender>,
        name: Option<String>,
        stacktrace_level: Option<LogLevel>,
    ) -> Self {
        Self {
            core: Arc::new(LoggerCore {
                appenders: RwLock::new(appenders),
                metrics: LoggerMetrics::new(),
                stacktrace_level,
                scheduler: Mutex::new(None),
            }),
            name: name.map(Arc::from),
            fields: Arc::new(LogContext::new()),
        }
    }

    /// Add a sink shared by every handle of this logger
    pub fn add_appender(&self, min_level: LogLevel, appender: Box<dyn Appender>) {
        self.core
            .appenders
            .write()
            .push(LeveledAppender::new(min_level, appender));
    }

    /// Names and thresholds of the attached sinks, in dispatch order
    pub fn appenders(&self) -> Vec<(String, LogLevel)> {
        self.core
            .appenders
            .read()
            .iter()
            .map(|a| (a.name().to_string(), a.min_level()))
            .collect()
    }

    /// A child logger whose records carry `name` in the `logger` key.
    /// Names nest with a `.` separator.
    #[must_use]
    pub fn named(&self, name: &str) -> Logger {
        let full = match self.name.as_deref() {
            Some(parent) if !name.is_empty() => format!("{}.{}", parent, name),
            Some(parent) => parent.to_string(),
            None => name.to_string(),
        };
        Logger {
            core: Arc::clone(&self.core),
            name: (!full.is_empty()).then(|| Arc::from(full)),
            fields: Arc::clone(&self.fields),
        }
    }

    /// A child logger that attaches `pairs` to every record it writes
    #[must_use]
    pub fn with<I, K, V>(&self, pairs: I) -> Logger
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut fields = (*self.fields).clone();
        fields.extend(pairs);
        Logger {
            core: Arc::clone(&self.core),
            name: self.name.clone(),
            fields: Arc::new(fields),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether any sink would accept a record at `level`
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.core.appenders.read().iter().any(|a| a.accepts(level))
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if !self.enabled(level) {
            return;
        }
        let entry = self.build_entry(level, message.into(), (*self.fields).clone(), Location::caller());
        self.dispatch(&entry);
    }

    /// Log with alternating key/value pairs
    #[track_caller]
    pub fn log_with_fields<I, K, V>(&self, level: LogLevel, message: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        if !self.enabled(level) {
            return;
        }
        let mut fields = (*self.fields).clone();
        fields.extend(pairs);
        let entry = self.build_entry(level, message.into(), fields, Location::caller());
        self.dispatch(&entry);
    }

    fn build_entry(
        &self,
        level: LogLevel,
        message: String,
        fields: LogContext,
        location: &Location<'_>,
    ) -> LogEntry {
        let mut entry = LogEntry::new(level, message)
            .with_caller(Caller::from(location))
            .with_fields(fields);
        if let Some(ref name) = self.name {
            entry = entry.with_logger_name(&**name);
        }
        if self.core.stacktrace_level.is_some_and(|min| level >= min) {
            entry = entry.with_stacktrace(Backtrace::force_capture().to_string());
        }
        entry
    }

    /// Write to every accepting sink with per-appender panic isolation, so one
    /// failing sink never keeps a record from the others.
    fn dispatch(&self, entry: &LogEntry) {
        let mut appenders = self.core.appenders.write();
        let mut has_error = false;

        for leveled in appenders.iter_mut().filter(|a| a.accepts(entry.level)) {
            let append_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                leveled.appender.append(entry)
            }));

            match append_result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!(
                        "[LOGGER ERROR] Appender '{}' failed: {}",
                        leveled.appender.name(),
                        e
                    );
                    has_error = true;
                }
                Err(panic_info) => {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    eprintln!(
                        "[LOGGER CRITICAL] Appender '{}' panicked: {}. \
                         Other appenders continue to function.",
                        leveled.appender.name(),
                        panic_msg
                    );
                    has_error = true;
                }
            }
        }

        if has_error {
            self.core.metrics.record_dropped();
        } else {
            self.core.metrics.record_logged();
        }
    }

    #[inline]
    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    #[track_caller]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Debug record with key/value pairs
    ///
    /// ```
    /// # use daylog::prelude::*;
    /// # let logger = Logger::new();
    /// logger.debugw("cache miss", [("key", "user:42")]);
    /// ```
    #[inline]
    #[track_caller]
    pub fn debugw<I, K, V>(&self, message: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.log_with_fields(LogLevel::Debug, message, pairs);
    }

    #[inline]
    #[track_caller]
    pub fn infow<I, K, V>(&self, message: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.log_with_fields(LogLevel::Info, message, pairs);
    }

    #[inline]
    #[track_caller]
    pub fn warnw<I, K, V>(&self, message: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.log_with_fields(LogLevel::Warn, message, pairs);
    }

    #[inline]
    #[track_caller]
    pub fn errorw<I, K, V>(&self, message: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.log_with_fields(LogLevel::Error, message, pairs);
    }

    /// Flush every sink. Call before process exit so buffered records reach disk.
    pub fn flush(&self) -> Result<()> {
        self.core.flush_all()
    }

    /// Alias of [`Logger::flush`]
    pub fn sync(&self) -> Result<()> {
        self.flush()
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.core.metrics
    }

    /// Number of records at least one sink failed to write
    pub fn dropped_count(&self) -> u64 {
        self.core.metrics.dropped_count()
    }

    pub(crate) fn attach_scheduler(&self, handle: SchedulerHandle) {
        *self.core.scheduler.lock() = Some(handle);
    }

    /// State of the rotation scheduler, if this logger owns one
    pub fn scheduler_state(&self) -> Option<SchedulerState> {
        self.core.scheduler.lock().as_ref().map(SchedulerHandle::state)
    }

    /// Block until the rotation scheduler has stopped. Returns `false` if
    /// there was no scheduler or its thread panicked.
    ///
    /// The scheduler only stops once its cancellation token is cancelled.
    pub fn join_scheduler(&self) -> bool {
        let handle = self.core.scheduler.lock().take();
        match handle {
            Some(handle) => handle.join(),
            None => false,
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("appenders", &self.appenders())
            .finish()
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use daylog::prelude::*;
///
/// let logger = Logger::builder()
///     .appender(LogLevel::Info, ConsoleAppender::new())
///     .stacktrace_level(LogLevel::Error)
///     .build();
/// assert!(!logger.enabled(LogLevel::Debug));
/// ```
pub struct LoggerBuilder {
    appenders: Vec<LeveledAppender>,
    name: Option<String>,
    stacktrace_level: Option<LogLevel>,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            appenders: Vec::new(),
            name: None,
            stacktrace_level: None,
        }
    }

    /// Add an appender accepting records at `min_level` and above
    #[must_use = "builder methods return a new value"]
    pub fn appender<A: Appender + 'static>(mut self, min_level: LogLevel, appender: A) -> Self {
        self.appenders
            .push(LeveledAppender::new(min_level, Box::new(appender)));
        self
    }

    /// Add an already boxed appender
    #[must_use = "builder methods return a new value"]
    pub fn boxed_appender(mut self, min_level: LogLevel, appender: Box<dyn Appender>) -> Self {
        self.appenders.push(LeveledAppender::new(min_level, appender));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a captured stack trace to records at `level` and above
    #[must_use = "builder methods return a new value"]
    pub fn stacktrace_level(mut self, level: LogLevel) -> Self {
        self.stacktrace_level = Some(level);
        self
    }

    /// Build the Logger
    pub fn build(self) -> Logger {
        Logger::from_parts(self.appenders, self.name, self.stacktrace_level)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
