//! Timestamp formatting utilities
//!
//! Record times are local wall-clock times. The default rendering is ISO 8601
//! with milliseconds and a numeric UTC offset, so every line is unambiguous
//! even though rotated file names use UTC.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

fn is_valid_strftime(format_str: &str) -> bool {
    StrftimeItems::new(format_str).all(|item| !matches!(item, Item::Error))
}

/// Standardized timestamp format options
///
/// # Examples
///
/// ```
/// use daylog::core::TimestampFormat;
/// use chrono::Local;
///
/// let format = TimestampFormat::Iso8601;
/// let timestamp = format.format(&Local::now());
/// // Output: "2025-01-08T10:30:45.123+0800"
/// assert!(timestamp.contains('T'));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds and offset: `2025-01-08T10:30:45.123+0800`
    #[default]
    Iso8601,

    /// RFC 3339 format: `2025-01-08T10:30:45.123456+08:00`
    Rfc3339,

    /// Unix timestamp in milliseconds: `1736332245123`
    ///
    /// Encoded as a JSON number rather than a string.
    UnixMillis,

    /// Custom strftime format
    ///
    /// A string chrono cannot parse is rendered as [`TimestampFormat::Iso8601`].
    ///
    /// ```
    /// use daylog::core::TimestampFormat;
    ///
    /// let format = TimestampFormat::Custom("%Y-%m-%d %H:%M:%S".to_string());
    /// ```
    Custom(String),
}

impl TimestampFormat {
    /// Format a `DateTime<Local>` according to this format
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Local>) -> String {
        match self {
            TimestampFormat::Rfc3339 => datetime.to_rfc3339(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(format_str) if is_valid_strftime(format_str) => {
                datetime.format(format_str).to_string()
            }
            TimestampFormat::Iso8601 | TimestampFormat::Custom(_) => {
                datetime.format(ISO8601_FORMAT).to_string()
            }
        }
    }

    /// False for a custom format chrono would fail to render
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            TimestampFormat::Custom(format_str) => is_valid_strftime(format_str),
            _ => true,
        }
    }

    /// Check if this is a Unix-based numeric format
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, TimestampFormat::UnixMillis)
    }
}
