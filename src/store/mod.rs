//! # Log Store Module
//!
//! This module defines the log record types and the persistence contract
//! used by the log service. The store accepts whole batches of events and
//! reports failures as either transient (worth retrying) or terminal
//! (retrying will not help), which is what the retry coordinator keys off.
//!
//! ## Features
//!
//! - **Typed Levels**: `LogLevel` with a stable string form for storage
//! - **Source Attribution**: best-effort caller file/line/function capture
//! - **Backend Contract**: the `LogStore` trait with classified errors
//! - **SQLite Backend**: `sqlite::SqliteLogStore`, the production store

pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use thiserror::Error;

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Severity of a log event. The uppercase name is the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Parse a level name, case-insensitive. `WARN` is accepted for `WARNING`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARNING" | "WARN" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            "CRITICAL" => Some(LogLevel::Critical),
            _ => None,
        }
    }
}

/// One immutable log record pending persistence.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub message: String,
    pub level: LogLevel,
    pub context: String,
    pub timestamp: DateTime<Utc>,
}

/// Best-effort attribution of the call site that produced a log event.
///
/// `capture` is `#[track_caller]`, so as long as every wrapper between the
/// original call expression and `capture` is also `#[track_caller]`, the
/// recorded location is the original caller rather than logging internals.
/// When no attribution is available, the display form is the literal
/// `unknown`.
#[derive(Debug, Clone)]
pub struct SourceContext {
    file: &'static str,
    line: u32,
    function: Option<&'static str>,
}

impl SourceContext {
    /// Capture the caller's file and line.
    #[track_caller]
    pub fn capture() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
            function: None,
        }
    }

    /// A context with no attribution, displayed as `unknown`.
    pub fn unknown() -> Self {
        Self {
            file: "",
            line: 0,
            function: None,
        }
    }

    /// Attach the enclosing function name, e.g. via the `function_name` crate.
    pub fn in_function(mut self, function: &'static str) -> Self {
        self.function = Some(function);
        self
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            return f.write_str("unknown");
        }
        match self.function {
            Some(function) => write!(f, "{}:{} in {}", self.file, self.line, function),
            None => write!(f, "{}:{}", self.file, self.line),
        }
    }
}

/// Storage failure classification consumed by the retry coordinator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connectivity or transaction failure, expected to be retry-recoverable.
    #[error("transient storage error: {0}")]
    Transient(String),
    /// Programming or data error; retrying will not help.
    #[error("terminal storage error: {0}")]
    Terminal(String),
}

///////////////////////////////////////////////////////////////////////////////
//****                         Public Traits                             ****//
///////////////////////////////////////////////////////////////////////////////

/// A durable sink for batches of log events.
///
/// A `persist` attempt either commits the whole batch or leaves the store
/// untouched; partial writes must not survive a failed attempt.
pub trait LogStore: Send + Sync {
    fn persist(&self, batch: &[LogEvent]) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S: LogStore> LogStore for Arc<S> {
    fn persist(&self, batch: &[LogEvent]) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).persist(batch)
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_string_form_is_uppercase() {
        assert_eq!(LogLevel::Warning.as_str(), "WARNING");
        assert_eq!(LogLevel::Critical.as_str(), "CRITICAL");
    }

    #[test]
    fn level_parse_accepts_common_spellings() {
        assert_eq!(LogLevel::parse("warn"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("ERROR"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("Info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn context_capture_points_at_the_caller() {
        let context = SourceContext::capture().to_string();
        assert!(context.contains("store/mod.rs"), "context was {}", context);
    }

    #[test]
    fn context_degrades_to_unknown() {
        assert_eq!(SourceContext::unknown().to_string(), "unknown");
    }

    #[test]
    fn context_includes_function_when_attached() {
        let context = SourceContext::capture().in_function("handle_request");
        assert!(context.to_string().ends_with("in handle_request"));
    }
}
