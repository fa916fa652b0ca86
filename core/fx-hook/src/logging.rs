//! File logging for the hook.
//!
//! The hook runs inside the host CLI's hook pipeline, so nothing is ever
//! written to stdout or stderr. Logs go to `~/.claude-fx/logs/hook.log`.

use fs_err as fs;
use fx_core::config;
use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "hook.log";
const DEBUG_ENV: &str = "CLAUDE_FX_DEBUG_LOG";

/// Installs the file subscriber. Returns `None` (logging off) when the log
/// file cannot be opened.
pub fn init() -> Option<WorkerGuard> {
    let logs = config::logs_dir(&config::runtime_dir().ok()?);
    fs::create_dir_all(&logs).ok()?;

    // The builder reports an unopenable log file instead of panicking.
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_NAME)
        .build(&logs)
        .ok()?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .ok()?;
    Some(guard)
}

fn filter() -> EnvFilter {
    if debug_enabled() {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}
