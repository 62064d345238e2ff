//! Property-based tests for daylog using proptest

use chrono::{NaiveTime, TimeZone, Utc};
use daylog::appenders::{RotatingFileAppender, RotationPolicy};
use daylog::config::{
    LogConfig, DEFAULT_ERROR_FILE, DEFAULT_INFO_FILE, DEFAULT_LOG_DIR, DEFAULT_MAX_AGE_DAYS,
    DEFAULT_MAX_BACKUPS, DEFAULT_MAX_SIZE_MB,
};
use daylog::prelude::*;
use daylog::scheduler::is_midnight;
use daylog::JsonEncoder;
use proptest::prelude::*;
use std::path::PathBuf;

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop::sample::select(LogLevel::ALL.to_vec())
}

/// Paths including the empty one, which counts as unset
fn any_path() -> impl Strategy<Value = Option<PathBuf>> {
    prop::option::of(prop_oneof![
        Just(String::new()),
        "/[a-z]{1,8}(/[a-z_]{1,8}){0,2}\\.log",
    ])
    .prop_map(|p| p.map(PathBuf::from))
}

fn any_config() -> impl Strategy<Value = LogConfig> {
    (
        any_path(),
        any_path(),
        prop::option::of(0u64..10_000),
        prop::option::of(0usize..10_000),
        prop::option::of(0u32..10_000),
    )
        .prop_map(|(info_file, error_file, max_size, max_backups, max_age)| LogConfig {
            info_file,
            error_file,
            max_size,
            max_backups,
            max_age,
        })
}

fn any_base_dir() -> impl Strategy<Value = PathBuf> {
    "/[a-z]{1,8}(/[a-z]{1,8}){0,3}".prop_map(PathBuf::from)
}

// ============================================================================
// Configuration resolution
// ============================================================================

proptest! {
    /// Every field is filled in whatever the input
    #[test]
    fn test_resolution_is_total(config in any_config(), base in any_base_dir()) {
        let resolved = config.resolve_in(&base);

        prop_assert!(!resolved.info_file.as_os_str().is_empty());
        prop_assert!(!resolved.error_file.as_os_str().is_empty());
        prop_assert!(resolved.max_size > 0);
        prop_assert!(resolved.max_backups > 0);
        prop_assert!(resolved.max_age > 0);
    }

    /// Resolving a resolved configuration changes nothing, whatever the base
    #[test]
    fn test_resolution_is_idempotent(
        config in any_config(),
        base in any_base_dir(),
        other_base in any_base_dir(),
    ) {
        let once = config.resolve_in(&base);
        let twice = LogConfig::from(once.clone()).resolve_in(&other_base);
        prop_assert_eq!(once, twice);
    }

    /// Leaving exactly one field unset yields that field's default and keeps the rest
    #[test]
    fn test_each_default_independently(
        unset in 0usize..5,
        base in any_base_dir(),
        size in 1u64..10_000,
        backups in 1usize..10_000,
        age in 1u32..10_000,
    ) {
        let info = PathBuf::from("/srv/custom/info.log");
        let error = PathBuf::from("/srv/custom/error.log");
        let mut config = LogConfig::new()
            .with_info_file(&info)
            .with_error_file(&error)
            .with_max_size(size)
            .with_max_backups(backups)
            .with_max_age(age);
        match unset {
            0 => config.info_file = None,
            1 => config.error_file = None,
            2 => config.max_size = None,
            3 => config.max_backups = None,
            _ => config.max_age = None,
        }

        let resolved = config.resolve_in(&base);
        let log_dir = base.join(DEFAULT_LOG_DIR);

        prop_assert_eq!(
            resolved.info_file,
            if unset == 0 { log_dir.join(DEFAULT_INFO_FILE) } else { info }
        );
        prop_assert_eq!(
            resolved.error_file,
            if unset == 1 { log_dir.join(DEFAULT_ERROR_FILE) } else { error }
        );
        prop_assert_eq!(resolved.max_size, if unset == 2 { DEFAULT_MAX_SIZE_MB } else { size });
        prop_assert_eq!(resolved.max_backups, if unset == 3 { DEFAULT_MAX_BACKUPS } else { backups });
        prop_assert_eq!(resolved.max_age, if unset == 4 { DEFAULT_MAX_AGE_DAYS } else { age });
    }

    /// Zero is the same as leaving a number unset
    #[test]
    fn test_zero_means_unset(base in any_base_dir()) {
        let zeroed = LogConfig::new().with_max_size(0).with_max_backups(0).with_max_age(0);
        prop_assert_eq!(zeroed.resolve_in(&base), LogConfig::default().resolve_in(&base));
    }
}

// ============================================================================
// Midnight detection
// ============================================================================

proptest! {
    #[test]
    fn test_midnight_only_at_zero_seconds(h in 0u32..24, m in 0u32..60, s in 0u32..60, ms in 0u32..1000) {
        let time = NaiveTime::from_hms_milli_opt(h, m, s, ms).unwrap();
        prop_assert_eq!(is_midnight(&time), h == 0 && m == 0 && s == 0);
    }
}

// ============================================================================
// LogLevel
// ============================================================================

proptest! {
    #[test]
    fn test_log_level_str_roundtrip(level in any_level()) {
        let parsed: LogLevel = level.to_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
        let parsed: LogLevel = level.to_lowercase_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
    }

    /// Ordering follows severity
    #[test]
    fn test_log_level_ordering(level1 in any_level(), level2 in any_level()) {
        let val1 = level1 as u8;
        let val2 = level2 as u8;

        prop_assert_eq!(level1 <= level2, val1 <= val2);
        prop_assert_eq!(level1 < level2, val1 < val2);
        prop_assert_eq!(level1.cmp(&level2), val1.cmp(&val2));
    }

    #[test]
    fn test_log_level_display(level in any_level()) {
        prop_assert_eq!(format!("{}", level), level.to_str());
    }

    #[test]
    fn test_log_level_invalid_parse(invalid in "[a-cf-hj-vx-zA-CF-HJ-VX-Z0-9_][a-z]{0,6}") {
        prop_assert!(invalid.parse::<LogLevel>().is_err());
    }
}

// ============================================================================
// Encoding
// ============================================================================

proptest! {
    /// Any message is encoded as exactly one JSON line that decodes back to it
    #[test]
    fn test_encoded_record_is_one_line(message in ".*", level in any_level()) {
        let entry = LogEntry::new(level, message.clone());
        let line = JsonEncoder::default().encode_line(&entry).unwrap();

        prop_assert_eq!(line.matches('\n').count(), 1);
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        prop_assert_eq!(value["msg"].as_str(), Some(message.as_str()));
        prop_assert_eq!(value["level"].as_str(), Some(level.to_str()));
    }

    /// Later values for a key replace earlier ones without moving the key
    #[test]
    fn test_context_last_value_wins(
        keys in prop::collection::vec("[a-c]", 1..12),
    ) {
        let mut context = LogContext::new();
        for (i, key) in keys.iter().enumerate() {
            context.add_field(key.clone(), i as i64);
        }

        let mut expected_order: Vec<&str> = Vec::new();
        for key in &keys {
            if !expected_order.contains(&key.as_str()) {
                expected_order.push(key);
            }
        }
        let order: Vec<&str> = context.fields().map(|(k, _)| k).collect();
        prop_assert_eq!(order, expected_order);

        for key in &keys {
            let last = keys.iter().rposition(|k| k == key).unwrap() as i64;
            prop_assert_eq!(context.get(key), Some(&FieldValue::Int(last)));
        }
    }
}

// ============================================================================
// Backup names
// ============================================================================

proptest! {
    #[test]
    fn test_backup_names_sort_by_time(a in 0i64..4_000_000_000_000, b in 0i64..4_000_000_000_000) {
        let appender = RotatingFileAppender::new("/var/log/app/info_utc.log", RotationPolicy::new());
        let at = |millis: i64| Utc.timestamp_millis_opt(millis).unwrap();

        let name_a = appender.backup_path_at(at(a)).to_string_lossy().into_owned();
        let name_b = appender.backup_path_at(at(b)).to_string_lossy().into_owned();

        prop_assert!(name_a.starts_with("/var/log/app/info_utc-"));
        prop_assert!(name_a.ends_with(".log"));
        prop_assert_eq!(name_a.len(), name_b.len());
        prop_assert_eq!(name_a.cmp(&name_b), a.cmp(&b));
    }
}
