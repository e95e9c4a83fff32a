// Logging
//
// Logger trait, console and null implementations, and the per-plugin
// wrapper handed to transformer hooks.

use serde::{Deserialize, Serialize};

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

/// Logger trait.
pub trait Logger: Send + Sync {
    fn level(&self) -> LogLevel;
    fn debug(&self, msg: &str);
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
    fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.level()
    }
}

/// Console logger.
pub struct ConsoleLogger {
    level: LogLevel,
}

impl ConsoleLogger {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }
}

impl Logger for ConsoleLogger {
    fn level(&self) -> LogLevel {
        self.level
    }

    fn debug(&self, msg: &str) {
        if self.is_enabled(LogLevel::Debug) {
            eprintln!("[DEBUG] {}", msg);
        }
    }

    fn info(&self, msg: &str) {
        if self.is_enabled(LogLevel::Info) {
            println!("[INFO] {}", msg);
        }
    }

    fn warn(&self, msg: &str) {
        if self.is_enabled(LogLevel::Warn) {
            eprintln!("[WARN] {}", msg);
        }
    }

    fn error(&self, msg: &str) {
        if self.is_enabled(LogLevel::Error) {
            eprintln!("[ERROR] {}", msg);
        }
    }
}

/// Null logger (logs nothing).
pub struct NullLogger;

impl NullLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for NullLogger {
    fn level(&self) -> LogLevel {
        LogLevel::Error
    }
    fn debug(&self, _msg: &str) {}
    fn info(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}

/// Logger handed to plugin hooks. Prefixes every message with the plugin
/// name so interleaved worker output stays attributable.
pub struct PluginLogger<'a> {
    origin: &'a str,
    inner: &'a dyn Logger,
}

impl<'a> PluginLogger<'a> {
    pub fn new(origin: &'a str, inner: &'a dyn Logger) -> Self {
        Self { origin, inner }
    }

    pub fn origin(&self) -> &str {
        self.origin
    }

    pub fn debug(&self, msg: &str) {
        self.inner.debug(&format!("[{}] {}", self.origin, msg));
    }

    pub fn info(&self, msg: &str) {
        self.inner.info(&format!("[{}] {}", self.origin, msg));
    }

    pub fn warn(&self, msg: &str) {
        self.inner.warn(&format!("[{}] {}", self.origin, msg));
    }

    pub fn error(&self, msg: &str) {
        self.inner.error(&format!("[{}] {}", self.origin, msg));
    }
}
