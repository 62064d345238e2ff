//! Console appender implementation
//!
//! Writes the same JSON lines as the file sinks. By default the stream is
//! stdout; any `Write` target can be injected instead.

use crate::core::{Appender, JsonEncoder, LogEntry, LoggerError, Result};
use std::io::{self, Write};

pub struct ConsoleAppender {
    writer: Box<dyn Write + Send + Sync>,
    encoder: JsonEncoder,
}

impl ConsoleAppender {
    /// Console appender on stdout
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    /// Console appender on stderr
    pub fn stderr() -> Self {
        Self::with_writer(io::stderr())
    }

    /// Console appender on an arbitrary stream
    ///
    /// # Example
    ///
    /// ```
    /// use daylog::appenders::ConsoleAppender;
    ///
    /// let appender = ConsoleAppender::with_writer(std::io::sink());
    /// ```
    pub fn with_writer<W: Write + Send + Sync + 'static>(writer: W) -> Self {
        Self {
            writer: Box::new(writer),
            encoder: JsonEncoder::default(),
        }
    }

    /// Set the encoder for this appender
    #[must_use]
    pub fn with_encoder(mut self, encoder: JsonEncoder) -> Self {
        self.encoder = encoder;
        self
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&mut self, entry: &LogEntry) -> Result<()> {
        let line = self.encoder.encode_line(entry)?;
        self.writer.write_all(line.as_bytes()).map_err(|e| {
            LoggerError::io_operation("writing to console", "failed to write log line", e)
        })?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
