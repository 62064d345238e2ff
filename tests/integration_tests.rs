//! Integration tests for the daily logger
//!
//! These tests verify:
//! - Level routing across the error file, info file and console
//! - Default paths rooted at the base directory
//! - Structured records (fields, logger names, caller, stack traces)
//! - Size rotation, backup pruning and compression
//! - Midnight rotation and scheduler cancellation

use daylog::appenders::{RotatingFileAppender, RotationPolicy};
use daylog::config::LogConfig;
use daylog::core::encoder::EncoderConfig;
use daylog::core::log_level::LogLevel;
use daylog::core::logger::Logger;
use daylog::core::timestamp::TimestampFormat;
use daylog::daily::DailyLoggerBuilder;
use daylog::scheduler::{CancellationToken, SchedulerState};
use daylog::{errorw, infow};
use chrono::NaiveTime;
use flate2::read::GzDecoder;
use parking_lot::Mutex;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn records(&self) -> Vec<Value> {
        let text = String::from_utf8(self.0.lock().clone()).expect("console output is UTF-8");
        parse_lines(&text)
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn parse_lines(text: &str) -> Vec<Value> {
    text.lines()
        .map(|line| serde_json::from_str(line).expect("every line is a JSON object"))
        .collect()
}

fn read_records(path: &Path) -> Vec<Value> {
    parse_lines(&fs::read_to_string(path).expect("Failed to read log file"))
}

fn backups_of(dir: &Path, stem: &str) -> Vec<PathBuf> {
    let prefix = format!("{}-", stem);
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .expect("Failed to list log dir")
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(&prefix))
                .unwrap_or(false)
        })
        .collect();
    found.sort();
    found
}

fn gunzip(path: &Path) -> String {
    let mut text = String::new();
    GzDecoder::new(File::open(path).expect("Failed to open backup"))
        .read_to_string(&mut text)
        .expect("Failed to decompress backup");
    text
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn daily_logger(base: &Path, config: LogConfig, console: SharedBuffer) -> (Logger, CancellationToken) {
    let cancel = CancellationToken::new();
    let logger = DailyLoggerBuilder::new(config)
        .base_dir(base)
        .console_writer(console)
        .build(&cancel)
        .expect("Failed to build logger");
    (logger, cancel)
}

fn shutdown(logger: &Logger, cancel: &CancellationToken) {
    cancel.cancel();
    assert!(logger.join_scheduler());
    logger.sync().expect("Failed to sync");
}

#[test]
fn test_error_reaches_custom_info_file_and_default_error_file() {
    let base = TempDir::new().expect("Failed to create temp dir");
    let elsewhere = TempDir::new().expect("Failed to create temp dir");
    let info_path = elsewhere.path().join("custom_info.log");

    let (logger, cancel) = daily_logger(
        base.path(),
        LogConfig::new().with_info_file(&info_path),
        SharedBuffer::default(),
    );
    logger.error("boom");
    shutdown(&logger, &cancel);

    let error_path = base.path().join("log").join("error_utc.log");
    for path in [&info_path, &error_path] {
        let records = read_records(path);
        assert_eq!(records.len(), 1, "{}", path.display());
        assert_eq!(records[0]["level"], "ERROR");
        assert_eq!(records[0]["msg"], "boom");
    }
    assert!(!base.path().join("log").join("info_utc.log").exists());
}

#[test]
fn test_level_routing_matrix() {
    let base = TempDir::new().expect("Failed to create temp dir");
    let console = SharedBuffer::default();
    let (logger, cancel) = daily_logger(base.path(), LogConfig::default(), console.clone());

    logger.debug("debug record");
    logger.info("info record");
    logger.warn("warn record");
    logger.error("error record");
    shutdown(&logger, &cancel);

    let messages = |records: Vec<Value>| -> Vec<String> {
        records
            .iter()
            .map(|r| r["msg"].as_str().unwrap_or_default().to_string())
            .collect()
    };

    let log_dir = base.path().join("log");
    assert_eq!(
        messages(read_records(&log_dir.join("error_utc.log"))),
        vec!["error record"]
    );
    assert_eq!(
        messages(read_records(&log_dir.join("info_utc.log"))),
        vec!["info record", "warn record", "error record"]
    );
    assert_eq!(
        messages(console.records()),
        vec!["debug record", "info record", "warn record", "error record"]
    );
}

#[test]
fn test_structured_record_shape() {
    let base = TempDir::new().expect("Failed to create temp dir");
    let console = SharedBuffer::default();
    let (logger, cancel) = daily_logger(base.path(), LogConfig::default(), console.clone());

    let line = line!() + 1;
    infow!(logger, "user signed in", "user" => "alice", "attempt" => 2, "admin" => false);
    shutdown(&logger, &cancel);

    let record = &read_records(&base.path().join("log/info_utc.log"))[0];
    assert_eq!(record["level"], "INFO");
    assert_eq!(record["msg"], "user signed in");
    assert_eq!(record["user"], "alice");
    assert_eq!(record["attempt"], 2);
    assert_eq!(record["admin"], false);
    assert_eq!(
        record["caller"],
        format!("tests/integration_tests.rs:{}", line)
    );
    assert!(record.get("logger").is_none());
    assert!(record.get("stacktrace").is_none());

    let time = record["time"].as_str().expect("time is a string");
    assert!(chrono::DateTime::parse_from_str(time, "%Y-%m-%dT%H:%M:%S%.3f%z").is_ok(), "{}", time);

    let keys: Vec<&String> = record.as_object().expect("object").keys().collect();
    assert_eq!(keys, vec!["time", "level", "caller", "msg", "user", "attempt", "admin"]);
}

#[test]
fn test_named_logger_with_fields() {
    let base = TempDir::new().expect("Failed to create temp dir");
    let console = SharedBuffer::default();
    let cancel = CancellationToken::new();
    let logger = DailyLoggerBuilder::new(LogConfig::default())
        .base_dir(base.path())
        .console_writer(console.clone())
        .name("api")
        .build(&cancel)
        .expect("Failed to build logger");

    let handler = logger.named("orders").with([("request_id", "r-17")]);
    errorw!(handler, "payment declined", "amount" => 12.5);
    shutdown(&logger, &cancel);

    let record = &read_records(&base.path().join("log/error_utc.log"))[0];
    assert_eq!(record["logger"], "api.orders");
    assert_eq!(record["request_id"], "r-17");
    assert_eq!(record["amount"], 12.5);
}

#[test]
fn test_stacktrace_for_errors() {
    let base = TempDir::new().expect("Failed to create temp dir");
    let console = SharedBuffer::default();
    let cancel = CancellationToken::new();
    let logger = DailyLoggerBuilder::new(LogConfig::default())
        .base_dir(base.path())
        .console_writer(console.clone())
        .stacktrace_level(LogLevel::Error)
        .build(&cancel)
        .expect("Failed to build logger");

    logger.warn("plain");
    logger.error("traced");
    shutdown(&logger, &cancel);

    let records = console.records();
    assert!(records[0].get("stacktrace").is_none());
    assert!(records[1]["stacktrace"].is_string());
}

#[test]
fn test_custom_encoder_applies_to_every_sink() {
    let base = TempDir::new().expect("Failed to create temp dir");
    let console = SharedBuffer::default();
    let cancel = CancellationToken::new();
    let logger = DailyLoggerBuilder::new(LogConfig::default())
        .base_dir(base.path())
        .console_writer(console.clone())
        .encoder_config(
            EncoderConfig::default()
                .with_message_key("message")
                .with_timestamp_format(TimestampFormat::UnixMillis),
        )
        .build(&cancel)
        .expect("Failed to build logger");

    logger.error("custom keys");
    shutdown(&logger, &cancel);

    for record in console
        .records()
        .into_iter()
        .chain(read_records(&base.path().join("log/error_utc.log")))
    {
        assert_eq!(record["message"], "custom keys");
        assert!(record["time"].is_i64());
    }
}

#[test]
fn test_newlines_cannot_forge_records() {
    let base = TempDir::new().expect("Failed to create temp dir");
    let (logger, cancel) = daily_logger(base.path(), LogConfig::default(), SharedBuffer::default());

    logger.info("User login\n{\"level\":\"ERROR\",\"msg\":\"forged\"}");
    shutdown(&logger, &cancel);

    let content = fs::read_to_string(base.path().join("log/info_utc.log")).expect("read");
    assert_eq!(content.lines().count(), 1);
    assert_eq!(fs::metadata(base.path().join("log/error_utc.log")).expect("stat").len(), 0);
}

#[test]
fn test_size_rotation_through_logger() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("sized.log");
    let sink = RotatingFileAppender::new(&path, RotationPolicy::new().with_max_size_bytes(1024));
    let logger = Logger::builder().appender(LogLevel::Info, sink.clone()).build();

    for i in 0..40 {
        logger.infow("filler", [("index", i)]);
        thread::sleep(Duration::from_millis(2));
    }
    logger.flush().expect("Failed to flush");

    let backups = backups_of(dir.path(), "sized");
    assert!(!backups.is_empty());

    let mut total = read_records(&path).len();
    for backup in &backups {
        assert!(fs::metadata(backup).expect("stat").len() <= 1024);
        total += read_records(backup).len();
    }
    assert_eq!(total, 40);
    assert_eq!(logger.dropped_count(), 0);
}

#[test]
fn test_restarts_prune_to_max_backups() {
    let base = TempDir::new().expect("Failed to create temp dir");
    let config = LogConfig::new().with_max_backups(2);

    for run in 0..4 {
        let (logger, cancel) = daily_logger(base.path(), config.clone(), SharedBuffer::default());
        logger.info(format!("run {}", run));
        shutdown(&logger, &cancel);
        drop(logger);
        thread::sleep(Duration::from_millis(5));
    }

    let backups = backups_of(&base.path().join("log"), "info_utc");
    assert_eq!(backups.len(), 2, "{:?}", backups);
    assert!(backups.iter().all(|b| b.to_string_lossy().ends_with(".log.gz")));

    // Newest backup holds the previous run
    let newest = backups.last().expect("backup");
    assert!(gunzip(newest).contains("run 2"));
    assert!(fs::read_to_string(base.path().join("log/info_utc.log"))
        .expect("read")
        .contains("run 3"));
}

#[test]
fn test_startup_rotation_compresses_previous_file() {
    let base = TempDir::new().expect("Failed to create temp dir");

    let (first, cancel) = daily_logger(base.path(), LogConfig::default(), SharedBuffer::default());
    first.error("from the first run");
    shutdown(&first, &cancel);
    drop(first);
    thread::sleep(Duration::from_millis(5));

    let (second, cancel) = daily_logger(base.path(), LogConfig::default(), SharedBuffer::default());
    shutdown(&second, &cancel);
    drop(second);

    let log_dir = base.path().join("log");
    for stem in ["info_utc", "error_utc"] {
        let backups = backups_of(&log_dir, stem);
        let compressed: Vec<_> = backups
            .iter()
            .filter(|b| b.to_string_lossy().ends_with(".log.gz"))
            .collect();
        assert!(!compressed.is_empty(), "no compressed backup for {}", stem);
        assert!(gunzip(compressed.last().expect("backup")).contains("from the first run"));
    }
}

#[test]
fn test_midnight_rotation_with_injected_clock() {
    let base = TempDir::new().expect("Failed to create temp dir");
    let cancel = CancellationToken::new();
    let logger = DailyLoggerBuilder::new(LogConfig::default())
        .base_dir(base.path())
        .console_writer(io::sink())
        .clock(Arc::new(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default()))
        .tick_interval(Duration::from_millis(20))
        .build(&cancel)
        .expect("Failed to build logger");

    let log_dir = base.path().join("log");
    assert!(wait_until(Duration::from_secs(5), || {
        !backups_of(&log_dir, "error_utc").is_empty() && !backups_of(&log_dir, "info_utc").is_empty()
    }));
    assert_eq!(logger.scheduler_state(), Some(SchedulerState::Running));

    shutdown(&logger, &cancel);
    drop(logger);
    let settled = backups_of(&log_dir, "info_utc").len();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(backups_of(&log_dir, "info_utc").len(), settled);
}

#[test]
fn test_cancelled_scheduler_never_rotates() {
    let base = TempDir::new().expect("Failed to create temp dir");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let logger = DailyLoggerBuilder::new(LogConfig::default())
        .base_dir(base.path())
        .console_writer(io::sink())
        .clock(Arc::new(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default()))
        .tick_interval(Duration::from_millis(5))
        .build(&cancel)
        .expect("Failed to build logger");

    assert!(wait_until(Duration::from_secs(5), || {
        logger.scheduler_state() == Some(SchedulerState::Stopped)
    }));
    assert!(logger.join_scheduler());

    // Logging still works after the scheduler has stopped
    logger.info("still writing");
    logger.sync().expect("Failed to sync");

    let log_dir = base.path().join("log");
    assert!(backups_of(&log_dir, "info_utc").is_empty());
    assert!(backups_of(&log_dir, "error_utc").is_empty());
    assert_eq!(read_records(&log_dir.join("info_utc.log")).len(), 1);
}

#[test]
fn test_config_from_json_file() {
    let base = TempDir::new().expect("Failed to create temp dir");
    let config_path = base.path().join("logging.json");
    let info_path = base.path().join("custom").join("app.log");
    fs::write(
        &config_path,
        serde_json::json!({ "info_file": info_path, "max_backups": 3 }).to_string(),
    )
    .expect("Failed to write config");

    let config: LogConfig =
        serde_json::from_str(&fs::read_to_string(&config_path).expect("read")).expect("parse");
    let resolved = config.clone().resolve_in(base.path());
    assert_eq!(resolved.info_file, info_path);
    assert_eq!(resolved.max_backups, 3);
    assert_eq!(resolved.max_size, 1000);

    let (logger, cancel) = daily_logger(base.path(), config, SharedBuffer::default());
    logger.info("configured");
    shutdown(&logger, &cancel);

    assert_eq!(read_records(&info_path)[0]["msg"], "configured");
}
