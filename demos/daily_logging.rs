//! Daily logging example
//!
//! Builds the daily logger under a temporary directory, writes records at each
//! level and shows where they landed.
//!
//! Run with: cargo run --example daily_logging

use daylog::prelude::*;
use daylog::{errorw, info, infow};
use std::fs;

fn main() -> Result<()> {
    println!("=== daylog - Daily Logging Example ===\n");

    let base_dir = std::env::temp_dir().join("daylog-demo");
    let cancel = CancellationToken::new();
    let logger = DailyLoggerBuilder::new(LogConfig::new().with_max_backups(7))
        .base_dir(&base_dir)
        .name("demo")
        .stacktrace_level(LogLevel::Error)
        .build(&cancel)?;

    println!("1. Console output (debug and above):");
    logger.debug("Loading configuration...");
    info!(logger, "Configuration loaded from {}", base_dir.display());
    logger.warn("Using default settings for some options");

    let db = logger.named("db").with([("pool", "primary")]);
    infow!(db, "connection established", "latency_ms" => 4);
    errorw!(db, "query failed", "table" => "orders", "retry" => true);

    for i in 1..=3 {
        logger.infow("processing item", [("item", i)]);
    }

    logger.sync()?;

    println!("\n2. Files written:");
    let log_dir = base_dir.join("log");
    for name in ["info_utc.log", "error_utc.log"] {
        let path = log_dir.join(name);
        let lines = fs::read_to_string(&path)?.lines().count();
        println!("   {} ({} records)", path.display(), lines);
    }

    println!("\n3. Stopping the rotation scheduler");
    cancel.cancel();
    logger.join_scheduler();
    println!("   scheduler stopped: {}", logger.scheduler_state().is_none());

    println!("\n=== Example completed ===");
    Ok(())
}
