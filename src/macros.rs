//! Logging macros for ergonomic log message formatting.
//!
//! The plain macros format their arguments like `format!`. The `*w!` macros
//! take a fixed message followed by `key => value` pairs that end up as
//! top-level keys of the JSON record.
//!
//! # Examples
//!
//! ```
//! use daylog::prelude::*;
//! use daylog::{info, infow};
//!
//! let logger = Logger::new();
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! infow!(logger, "request served", "status" => 200, "path" => "/health");
//! ```

/// Log a message with automatic formatting.
///
/// # Examples
///
/// ```
/// # use daylog::prelude::*;
/// # let logger = Logger::new();
/// use daylog::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format!($($arg)+))
    };
}

/// Log a debug-level message.
///
/// ```
/// # use daylog::prelude::*;
/// # let logger = Logger::new();
/// use daylog::debug;
/// debug!(logger, "Counter value: {}", 10);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// ```
/// # use daylog::prelude::*;
/// # let logger = Logger::new();
/// use daylog::error;
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log with key/value pairs at the given level.
///
/// ```
/// # use daylog::prelude::*;
/// # let logger = Logger::new();
/// use daylog::logw;
/// logw!(logger, LogLevel::Warn, "slow query", "elapsed_ms" => 1250, "table" => "orders");
/// ```
#[macro_export]
macro_rules! logw {
    ($logger:expr, $level:expr, $msg:expr $(,)?) => {
        $logger.log($level, $msg)
    };
    ($logger:expr, $level:expr, $msg:expr, $($key:expr => $value:expr),+ $(,)?) => {
        $logger.log_with_fields(
            $level,
            $msg,
            [$((::std::string::String::from($key), $crate::FieldValue::from($value))),+],
        )
    };
}

/// Debug record with key/value pairs.
#[macro_export]
macro_rules! debugw {
    ($logger:expr, $($rest:tt)+) => {
        $crate::logw!($logger, $crate::LogLevel::Debug, $($rest)+)
    };
}

/// Info record with key/value pairs.
#[macro_export]
macro_rules! infow {
    ($logger:expr, $($rest:tt)+) => {
        $crate::logw!($logger, $crate::LogLevel::Info, $($rest)+)
    };
}

/// Warning record with key/value pairs.
#[macro_export]
macro_rules! warnw {
    ($logger:expr, $($rest:tt)+) => {
        $crate::logw!($logger, $crate::LogLevel::Warn, $($rest)+)
    };
}

/// Error record with key/value pairs.
///
/// ```
/// # use daylog::prelude::*;
/// # let logger = Logger::new();
/// use daylog::errorw;
/// let err = "connection reset";
/// errorw!(logger, "upstream failed", "error" => err, "retry" => true);
/// ```
#[macro_export]
macro_rules! errorw {
    ($logger:expr, $($rest:tt)+) => {
        $crate::logw!($logger, $crate::LogLevel::Error, $($rest)+)
    };
}
