//! JSON line encoding for log entries
//!
//! Every sink writes one JSON object per record. Keys appear in a fixed order:
//! time, level, logger, caller, message, the record's fields, stacktrace.
//! `logger`, `caller` and `stacktrace` are omitted when the record has none.
//! A field named after any of these keys is dropped, whether or not the record
//! fills that key.

use super::error::Result;
use super::log_entry::LogEntry;
use super::timestamp::TimestampFormat;
use serde_json::{Map, Value};

/// Key names and value styles used by [`JsonEncoder`]
///
/// # Examples
///
/// ```
/// use daylog::core::{EncoderConfig, TimestampFormat};
///
/// let config = EncoderConfig::default()
///     .with_message_key("message")
///     .with_timestamp_format(TimestampFormat::UnixMillis)
///     .with_level_uppercase(false);
/// assert_eq!(config.message_key, "message");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub time_key: String,
    pub level_key: String,
    pub name_key: String,
    pub caller_key: String,
    pub message_key: String,
    pub stacktrace_key: String,
    pub timestamp_format: TimestampFormat,
    /// Whether to display log level in uppercase (ERROR vs error)
    pub level_uppercase: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            time_key: "time".to_string(),
            level_key: "level".to_string(),
            name_key: "logger".to_string(),
            caller_key: "caller".to_string(),
            message_key: "msg".to_string(),
            stacktrace_key: "stacktrace".to_string(),
            timestamp_format: TimestampFormat::default(),
            level_uppercase: true,
        }
    }
}

impl EncoderConfig {
    #[must_use]
    pub fn with_time_key(mut self, key: impl Into<String>) -> Self {
        self.time_key = key.into();
        self
    }

    #[must_use]
    pub fn with_level_key(mut self, key: impl Into<String>) -> Self {
        self.level_key = key.into();
        self
    }

    #[must_use]
    pub fn with_name_key(mut self, key: impl Into<String>) -> Self {
        self.name_key = key.into();
        self
    }

    #[must_use]
    pub fn with_caller_key(mut self, key: impl Into<String>) -> Self {
        self.caller_key = key.into();
        self
    }

    #[must_use]
    pub fn with_message_key(mut self, key: impl Into<String>) -> Self {
        self.message_key = key.into();
        self
    }

    #[must_use]
    pub fn with_stacktrace_key(mut self, key: impl Into<String>) -> Self {
        self.stacktrace_key = key.into();
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    #[must_use]
    pub fn with_level_uppercase(mut self, uppercase: bool) -> Self {
        self.level_uppercase = uppercase;
        self
    }

    /// Whether `key` names one of the fixed keys
    #[must_use]
    pub fn is_reserved(&self, key: &str) -> bool {
        [
            &self.time_key,
            &self.level_key,
            &self.name_key,
            &self.caller_key,
            &self.message_key,
            &self.stacktrace_key,
        ]
        .iter()
        .any(|reserved| reserved.as_str() == key)
    }
}

/// Encodes a [`LogEntry`] as a single JSON line
#[derive(Debug, Clone, Default)]
pub struct JsonEncoder {
    config: EncoderConfig,
}

impl JsonEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode an entry, terminated by a newline
    pub fn encode_line(&self, entry: &LogEntry) -> Result<String> {
        let mut line = self.encode(entry)?;
        line.push('\n');
        Ok(line)
    }

    /// Encode an entry without the trailing newline
    pub fn encode(&self, entry: &LogEntry) -> Result<String> {
        let config = &self.config;
        let mut json_obj = Map::new();

        json_obj.insert(config.time_key.clone(), self.timestamp_value(entry));

        let level = if config.level_uppercase {
            entry.level.to_str()
        } else {
            entry.level.to_lowercase_str()
        };
        json_obj.insert(config.level_key.clone(), Value::String(level.to_string()));

        if let Some(ref name) = entry.logger_name {
            json_obj.insert(config.name_key.clone(), Value::String(name.clone()));
        }

        if let Some(ref caller) = entry.caller {
            json_obj.insert(config.caller_key.clone(), Value::String(caller.short()));
        }

        json_obj.insert(
            config.message_key.clone(),
            Value::String(entry.message.clone()),
        );

        for (key, value) in entry.fields.fields().filter(|(key, _)| !config.is_reserved(key)) {
            json_obj.insert(key.to_string(), value.to_json_value());
        }

        if let Some(ref stacktrace) = entry.stacktrace {
            json_obj.insert(
                config.stacktrace_key.clone(),
                Value::String(stacktrace.clone()),
            );
        }

        Ok(serde_json::to_string(&Value::Object(json_obj))?)
    }

    fn timestamp_value(&self, entry: &LogEntry) -> Value {
        match self.config.timestamp_format {
            TimestampFormat::UnixMillis => Value::Number(entry.timestamp.timestamp_millis().into()),
            ref format => Value::String(format.format(&entry.timestamp)),
        }
    }
}
