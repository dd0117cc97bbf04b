//! Structured logging module for Serenity
//!
//! Writes daily log files under the configured log directory with categories:
//! - GATE: Safety gate interceptions
//! - CONVERSATION: Session lifecycle and model dispatch
//! - WELLNESS: Wellness suggestions and safety reminders
//! - MOOD: Mood ledger writes
//! - STORAGE: Settings and session persistence
//! - ERROR: Model and persistence failures
//!
//! Lines go to stderr until `init_logging` sets a file, so the terminal chat
//! stays readable. Set `SERENITY_LOG_STDERR=1` to keep the echo.

use chrono::{Local, Utc};
use once_cell::sync::Lazy;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Log categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Gate,
    Conversation,
    Wellness,
    Mood,
    Storage,
    Error,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Gate => "GATE",
            LogCategory::Conversation => "CONVERSATION",
            LogCategory::Wellness => "WELLNESS",
            LogCategory::Mood => "MOOD",
            LogCategory::Storage => "STORAGE",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Log directory; file output stays off until `init_logging` sets it.
static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

/// Set to echo log lines to stderr even when a log file is configured
pub const STDERR_ENV: &str = "SERENITY_LOG_STDERR";

static STDERR_FORCED: Lazy<bool> = Lazy::new(|| {
    std::env::var(STDERR_ENV).is_ok_and(|v| !v.is_empty() && v != "0")
});

/// Lines reach stderr only until a file takes over, unless forced.
fn echo_to_stderr(file_configured: bool, forced: bool) -> bool {
    forced || !file_configured
}

fn log_file_path(dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    dir.join(format!("serenity-{}.log", today))
}

/// Initialize the logging system - creates the log directory if needed
pub fn init_logging(log_dir: &Path) -> std::io::Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    *LOG_DIR.lock().unwrap_or_else(|e| e.into_inner()) = Some(log_dir.to_path_buf());

    log(LogCategory::Conversation, None, "Serenity logging initialized");
    Ok(())
}

/// Format one log line. Session ids are shortened to 8 chars.
pub fn format_line(category: LogCategory, session_id: Option<&str>, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let session_context = session_id
        .map(|id| format!("session={} | ", &id[..id.char_indices().nth(8).map_or(id.len(), |(i, _)| i)]))
        .unwrap_or_default();

    format!(
        "[{}] [{}] {}{}\n",
        timestamp,
        category.as_str(),
        session_context,
        message
    )
}

/// Log a message with category and optional session context
pub fn log(category: LogCategory, session_id: Option<&str>, message: &str) {
    let line = format_line(category, session_id, message);
    let dir = LOG_DIR.lock().unwrap_or_else(|e| e.into_inner()).clone();

    // stdout belongs to the transcript
    if echo_to_stderr(dir.is_some(), *STDERR_FORCED) {
        eprint!("{}", line);
    }

    if let Some(dir) = dir {
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path(&dir))
        {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

pub fn log_gate(session_id: Option<&str>, message: &str) {
    log(LogCategory::Gate, session_id, message);
}

pub fn log_conversation(session_id: Option<&str>, message: &str) {
    log(LogCategory::Conversation, session_id, message);
}

pub fn log_wellness(session_id: Option<&str>, message: &str) {
    log(LogCategory::Wellness, session_id, message);
}

pub fn log_mood(message: &str) {
    log(LogCategory::Mood, None, message);
}

pub fn log_storage(message: &str) {
    log(LogCategory::Storage, None, message);
}

pub fn log_error(session_id: Option<&str>, message: &str) {
    log(LogCategory::Error, session_id, message);
}

/// Clean up old log files (keep the last `keep_days` days)
pub fn cleanup_old_logs(keep_days: i64) -> std::io::Result<usize> {
    let dir = LOG_DIR.lock().unwrap_or_else(|e| e.into_inner()).clone();
    let Some(log_dir) = dir else {
        return Ok(0);
    };
    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(keep_days);
    let mut deleted = 0;

    for entry in fs::read_dir(&log_dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified_time: chrono::DateTime<Utc> = modified.into();
                if modified_time < cutoff && fs::remove_file(&path).is_ok() {
                    deleted += 1;
                }
            }
        }
    }

    Ok(deleted)
}
