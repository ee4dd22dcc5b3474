//! Run logging and output control
//!
//! This module provides the [`Logger`] handle that every component receives
//! explicitly. Operational lines are tagged with a step name and a stable code
//! token (`[CODE] Step: message`) and fan out to the console, an append-only
//! log file, and an optional in-memory capture.

use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }

    fn emoji(&self) -> &'static str {
        match self {
            Level::Debug => "🐛",
            Level::Info => "ℹ️ ",
            Level::Warning => "⚠️ ",
            Level::Error => "❌",
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            other => Err(format!("Unknown log level: {}", other)),
        }
    }
}

/// One tagged log line, as kept by the in-memory capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub step: String,
    pub code: String,
    pub message: String,
}

/// Logger responsible for all operator-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub level: Level,
    pub console: bool,
    file: Option<Arc<Mutex<File>>>,
    capture: Option<Arc<Mutex<Vec<LogRecord>>>>,
}

impl Logger {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            console: true,
            file: None,
            capture: None,
        }
    }

    /// Silent logger that records every line at DEBUG and above in memory
    pub fn capturing() -> Self {
        Self {
            level: Level::Debug,
            console: false,
            file: None,
            capture: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Append every line to `path`, creating parent directories as needed
    pub fn with_file(mut self, path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.file = Some(Arc::new(Mutex::new(file)));
        Ok(self)
    }

    /// Emit a tagged line: `[CODE] step: message`
    pub fn event(&self, level: Level, step: &str, code: &str, message: &str) {
        if let Some(capture) = &self.capture {
            if let Ok(mut records) = capture.lock() {
                records.push(LogRecord {
                    level,
                    step: step.to_string(),
                    code: code.to_string(),
                    message: message.to_string(),
                });
            }
        }

        if level < self.level {
            return;
        }

        let line = format!("[{}] {}: {}", code, step, message);

        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
                let _ = writeln!(file, "{} [{}] {}", timestamp, level.as_str(), line);
            }
        }

        if self.console {
            if level >= Level::Warning {
                eprintln!("{} [{}] {}", level.emoji(), level.as_str(), line);
            } else {
                println!("{} [{}] {}", level.emoji(), level.as_str(), line);
            }
        }
    }

    pub fn debug(&self, step: &str, code: &str, message: &str) {
        self.event(Level::Debug, step, code, message);
    }

    pub fn info(&self, step: &str, code: &str, message: &str) {
        self.event(Level::Info, step, code, message);
    }

    pub fn warning(&self, step: &str, code: &str, message: &str) {
        self.event(Level::Warning, step, code, message);
    }

    pub fn error(&self, step: &str, code: &str, message: &str) {
        self.event(Level::Error, step, code, message);
    }

    /// Main section heading (console only)
    pub fn section(&self, title: &str) {
        if self.console {
            println!("\n=== {} ===", title);
        }
    }

    /// Key-value pair summary display
    pub fn summary_kv(&self, title: &str, items: &[(&str, String)]) {
        if self.console {
            println!("\n--- {} ---", title);
            for (key, value) in items {
                println!("  {}: {}", key, value);
            }
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{:.2}s", duration.as_secs_f64())
        } else if secs < 3600 {
            format!("{}m{:02}s", secs / 60, secs % 60)
        } else {
            format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }

    /// Snapshot of captured lines; empty unless built with [`Logger::capturing`]
    pub fn records(&self) -> Vec<LogRecord> {
        self.capture
            .as_ref()
            .and_then(|capture| capture.lock().ok().map(|records| records.clone()))
            .unwrap_or_default()
    }

    /// Captured lines carrying `code`
    pub fn records_with_code(&self, code: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|record| record.code == code)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("info".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warning);
        assert!("loud".parse::<Level>().is_err());
        assert!(Level::Debug < Level::Error);
    }

    #[test]
    fn test_capture_keeps_codes() {
        let logger = Logger::capturing();
        logger.info("Image Pull", "PULL_STARTED", "pulling a");
        logger.error("Image Pull", "PULL_FAILED", "pull of a failed");

        let records = logger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(logger.records_with_code("PULL_FAILED").len(), 1);
        assert_eq!(records[0].step, "Image Pull");
    }

    #[test]
    fn test_clones_share_capture() {
        let logger = Logger::capturing();
        let clone = logger.clone();
        clone.debug("Docker Command", "DOCKER_RUNNING", "docker pull a");
        assert_eq!(logger.records().len(), 1);
    }

    #[test]
    fn test_file_sink_appends_tagged_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("mirror.log");
        let logger = Logger::new(Level::Info)
            .with_console(false)
            .with_file(&path)
            .unwrap();

        logger.debug("Hidden", "DEBUG_ONLY", "below threshold");
        logger.warning("Repository Check", "REPO_PREP_FAILED", "could not create p/i");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[WARNING] [REPO_PREP_FAILED] Repository Check: could not create p/i"));
        assert!(!content.contains("DEBUG_ONLY"));
    }

    #[test]
    fn test_format_duration() {
        let logger = Logger::capturing();
        assert_eq!(logger.format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(logger.format_duration(Duration::from_secs(125)), "2m05s");
        assert_eq!(logger.format_duration(Duration::from_secs(3725)), "1h02m05s");
    }
}
