//! # daylog
//!
//! A leveled JSON logger that splits its output by severity and rotates its
//! files every day.
//!
//! ## Features
//!
//! - **Split output**: errors go to their own file, info and above to another,
//!   everything from debug up to the console
//! - **Daily rotation**: both files are rotated at startup and at local midnight
//! - **Retention**: size-based rotation, gzip-compressed backups, pruning by
//!   count and age
//! - **Structured records**: one JSON object per line, with caller and
//!   key/value fields
//!
//! ## Quick start
//!
//! ```no_run
//! use daylog::prelude::*;
//!
//! let cancel = CancellationToken::new();
//! let logger = new_logger(&cancel, LogConfig::default()).unwrap();
//!
//! logger.info("service started");
//! logger.errorw("request failed", [("status", 503)]);
//!
//! cancel.cancel();
//! logger.join_scheduler();
//! logger.sync().unwrap();
//! ```

pub mod appenders;
pub mod config;
pub mod core;
pub mod daily;
pub mod macros;
pub mod scheduler;

pub mod prelude {
    pub use crate::appenders::{ConsoleAppender, RotatingFileAppender, RotationPolicy};
    pub use crate::config::{LogConfig, ResolvedLogConfig};
    pub use crate::core::{
        Appender, EncoderConfig, FieldValue, LogContext, LogEntry, LogLevel, Logger,
        LoggerBuilder, LoggerError, LoggerMetrics, Result, TimestampFormat,
    };
    pub use crate::daily::{new_logger, DailyLoggerBuilder};
    pub use crate::scheduler::{CancellationToken, Rotatable, SchedulerState};
}

pub use appenders::{ConsoleAppender, RotatingFileAppender, RotationPolicy};
pub use config::{LogConfig, ResolvedLogConfig};
pub use core::{
    Appender, Caller, EncoderConfig, FieldValue, JsonEncoder, LogContext, LogEntry, LogLevel,
    Logger, LoggerBuilder, LoggerError, LoggerMetrics, Result, TimestampFormat,
};
pub use daily::{new_logger, DailyLoggerBuilder};
pub use scheduler::{CancellationToken, RotationScheduler, SchedulerState};
