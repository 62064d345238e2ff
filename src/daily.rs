//! Daily rotating logger assembly
//!
//! Wires three sinks into one [`Logger`]:
//!
//! | sink       | accepts          |
//! |------------|------------------|
//! | error file | `ERROR`          |
//! | info file  | `INFO` and above |
//! | console    | `DEBUG` and above|
//!
//! Both files are rotated once at startup, then at every local midnight by a
//! background [`RotationScheduler`] that runs until the caller's
//! [`CancellationToken`] is cancelled.

use crate::appenders::{ConsoleAppender, RotatingFileAppender};
use crate::config::LogConfig;
use crate::core::encoder::{EncoderConfig, JsonEncoder};
use crate::core::error::Result;
use crate::core::log_level::LogLevel;
use crate::core::logger::Logger;
use crate::scheduler::{
    CancellationToken, Clock, Rotatable, RotationScheduler, SystemClock, DEFAULT_TICK_INTERVAL,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Build the daily logger with defaults rooted at the executable's directory
///
/// # Errors
///
/// Fails when the executable directory is needed but cannot be determined, or
/// when the scheduler thread cannot be started.
///
/// # Example
///
/// ```no_run
/// use daylog::prelude::*;
///
/// let cancel = CancellationToken::new();
/// let logger = new_logger(&cancel, LogConfig::default()).unwrap();
/// logger.infow("service started", [("port", 8080)]);
///
/// cancel.cancel();
/// logger.join_scheduler();
/// logger.sync().unwrap();
/// ```
pub fn new_logger(cancel: &CancellationToken, config: LogConfig) -> Result<Logger> {
    DailyLoggerBuilder::new(config).build(cancel)
}

/// Builder for the daily logger with its injectable parts exposed
pub struct DailyLoggerBuilder {
    config: LogConfig,
    base_dir: Option<PathBuf>,
    console: Option<ConsoleAppender>,
    name: Option<String>,
    stacktrace_level: Option<LogLevel>,
    encoder: EncoderConfig,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
}

impl DailyLoggerBuilder {
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            base_dir: None,
            console: None,
            name: None,
            stacktrace_level: None,
            encoder: EncoderConfig::default(),
            clock: Arc::new(SystemClock),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Root for default paths instead of the executable's directory
    #[must_use = "builder methods return a new value"]
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Console sink to use instead of stdout
    #[must_use = "builder methods return a new value"]
    pub fn console(mut self, console: ConsoleAppender) -> Self {
        self.console = Some(console);
        self
    }

    /// Send console output to `writer`
    #[must_use = "builder methods return a new value"]
    pub fn console_writer<W: Write + Send + Sync + 'static>(self, writer: W) -> Self {
        self.console(ConsoleAppender::with_writer(writer))
    }

    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn stacktrace_level(mut self, level: LogLevel) -> Self {
        self.stacktrace_level = Some(level);
        self
    }

    /// Encoding shared by all three sinks
    #[must_use = "builder methods return a new value"]
    pub fn encoder_config(mut self, config: EncoderConfig) -> Self {
        self.encoder = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn build(self, cancel: &CancellationToken) -> Result<Logger> {
        let resolved = match self.base_dir {
            Some(dir) => self.config.resolve_in(dir),
            None => self.config.resolve()?,
        };
        let policy = resolved.rotation_policy();
        let encoder = JsonEncoder::new(self.encoder);

        let info_file = RotatingFileAppender::new(&resolved.info_file, policy.clone())
            .with_encoder(encoder.clone());
        let error_file =
            RotatingFileAppender::new(&resolved.error_file, policy).with_encoder(encoder.clone());
        let console = self.console.unwrap_or_default().with_encoder(encoder);

        let mut builder = Logger::builder()
            .appender(LogLevel::Error, error_file.clone())
            .appender(LogLevel::Info, info_file.clone())
            .appender(LogLevel::Debug, console);
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(level) = self.stacktrace_level {
            builder = builder.stacktrace_level(level);
        }
        let logger = builder.build();

        for file in [&info_file, &error_file] {
            if let Err(e) = file.rotate() {
                eprintln!(
                    "[WARN] Initial rotation of {} failed: {}",
                    file.path().display(),
                    e
                );
            }
        }

        let targets: Vec<Arc<dyn Rotatable>> = vec![Arc::new(info_file), Arc::new(error_file)];
        let handle = RotationScheduler::new(targets, cancel.clone())
            .with_clock(self.clock)
            .with_interval(self.tick_interval)
            .spawn()?;
        logger.attach_scheduler(handle);

        Ok(logger)
    }
}

impl std::fmt::Debug for DailyLoggerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DailyLoggerBuilder")
            .field("config", &self.config)
            .field("base_dir", &self.base_dir)
            .field("name", &self.name)
            .field("stacktrace_level", &self.stacktrace_level)
            .field("tick_interval", &self.tick_interval)
            .finish()
    }
}
