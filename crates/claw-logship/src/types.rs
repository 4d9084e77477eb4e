//! Core types for log shipping.
//!
//! This module provides:
//! - [`Level`]: Severity levels for log events
//! - [`LogEvent`]: A captured log event with its throwable chain
//! - [`Throwable`] / [`StackFrame`]: Error information attached to an event
//! - [`Attribute`] / [`Item`]: The store-side representation of an event

use std::fmt;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShipError};

/// Maximum number of items a single batch write may carry.
pub const MAX_ITEMS_PER_BATCH: usize = 25;

/// Maximum length in bytes of a single attribute value.
pub const MAX_ATTRIBUTE_VALUE_BYTES: usize = 1024;

/// Length of generated item ids.
pub const ITEM_ID_LEN: usize = 20;

/// Log severity levels, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// Most verbose, detailed debugging information
    Trace = 0,
    /// Debugging information
    Debug = 1,
    /// General information
    Info = 2,
    /// Warning conditions
    Warn = 3,
    /// Error conditions
    Error = 4,
    /// Unrecoverable conditions
    Fatal = 5,
}

impl Level {
    /// Returns the upper-case name stored in the `Level` attribute.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame of a captured stack trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Fully qualified function or method name
    pub symbol: String,
    /// Source file, if known
    pub file: Option<String>,
    /// Line number, if known
    pub line: Option<u32>,
}

impl StackFrame {
    /// Creates a frame with a known source position.
    #[must_use]
    pub fn new(symbol: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            symbol: symbol.into(),
            file: Some(file.into()),
            line: Some(line),
        }
    }

    /// Creates a frame without source information.
    #[must_use]
    pub fn unknown(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            file: None,
            line: None,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}({file}:{line})", self.symbol),
            (Some(file), None) => write!(f, "{}({file})", self.symbol),
            (None, _) => write!(f, "{}(Unknown Source)", self.symbol),
        }
    }
}

/// An error attached to a log event, with its cause chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throwable {
    /// Fully qualified error type name
    pub class_name: String,
    /// Error message, if any
    pub message: Option<String>,
    /// Stack frames, innermost first
    #[serde(default)]
    pub frames: Vec<StackFrame>,
    /// The error that caused this one
    pub cause: Option<Box<Throwable>>,
}

impl Throwable {
    /// Creates a throwable with a message and no frames.
    #[must_use]
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: Some(message.into()),
            frames: Vec::new(),
            cause: None,
        }
    }

    /// Creates a throwable that carries no message.
    #[must_use]
    pub fn without_message(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: None,
            frames: Vec::new(),
            cause: None,
        }
    }

    /// Appends a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Sets the direct cause.
    #[must_use]
    pub fn caused_by(mut self, cause: Self) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns the deepest error in the cause chain.
    ///
    /// Returns `None` when this throwable has no cause at all.
    #[must_use]
    pub fn root_cause(&self) -> Option<&Self> {
        let mut current = self.cause.as_deref()?;
        while let Some(next) = current.cause.as_deref() {
            current = next;
        }
        Some(current)
    }
}

/// A log event handed to the appender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Name of the logger that produced the event
    pub logger_name: String,
    /// Name of the producing thread
    pub thread_name: String,
    /// Severity level
    pub level: Level,
    /// Source location, e.g. `module::function(file.rs:12)`
    pub location: String,
    /// Rendered message
    pub message: String,
    /// Space-delimited nested diagnostic context
    pub ndc: Option<String>,
    /// Attached error chain
    pub throwable: Option<Throwable>,
    /// Milliseconds since the Unix epoch
    pub timestamp_millis: i64,
}

impl LogEvent {
    /// Creates a new log event builder.
    #[must_use]
    pub fn builder() -> LogEventBuilder {
        LogEventBuilder::default()
    }
}

/// Builder for constructing log events.
#[derive(Debug, Default)]
pub struct LogEventBuilder {
    logger_name: Option<String>,
    thread_name: Option<String>,
    level: Option<Level>,
    location: Option<String>,
    message: Option<String>,
    ndc: Option<String>,
    throwable: Option<Throwable>,
    timestamp_millis: Option<i64>,
}

impl LogEventBuilder {
    /// Sets the logger name.
    #[must_use]
    pub fn logger_name(mut self, name: impl Into<String>) -> Self {
        self.logger_name = Some(name.into());
        self
    }

    /// Sets the thread name.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    /// Sets the level.
    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets the source location.
    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the nested diagnostic context.
    #[must_use]
    pub fn ndc(mut self, ndc: impl Into<String>) -> Self {
        self.ndc = Some(ndc.into());
        self
    }

    /// Attaches an error chain.
    #[must_use]
    pub fn throwable(mut self, throwable: Throwable) -> Self {
        self.throwable = Some(throwable);
        self
    }

    /// Sets the timestamp in epoch milliseconds.
    #[must_use]
    pub const fn timestamp_millis(mut self, millis: i64) -> Self {
        self.timestamp_millis = Some(millis);
        self
    }

    /// Builds the event.
    ///
    /// Thread name defaults to the current thread, location to `"?"` and
    /// timestamp to now.
    ///
    /// # Errors
    ///
    /// Returns an error if logger name, level or message is not set.
    pub fn build(self) -> Result<LogEvent> {
        let logger_name = self
            .logger_name
            .ok_or(ShipError::MissingField("logger_name"))?;
        let level = self.level.ok_or(ShipError::MissingField("level"))?;
        let message = self.message.ok_or(ShipError::MissingField("message"))?;

        let thread_name = self.thread_name.unwrap_or_else(|| {
            std::thread::current()
                .name()
                .unwrap_or("unnamed")
                .to_string()
        });

        Ok(LogEvent {
            logger_name,
            thread_name,
            level,
            location: self.location.unwrap_or_else(|| "?".to_string()),
            message,
            ndc: self.ndc,
            throwable: self.throwable,
            timestamp_millis: self
                .timestamp_millis
                .unwrap_or_else(|| Utc::now().timestamp_millis()),
        })
    }
}

/// A named value attached to an item.
///
/// `replace` is always false for shipped events so that repeated names
/// accumulate instead of overwriting each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name; may repeat within an item
    pub name: String,
    /// Attribute value
    pub value: String,
    /// Whether the store should overwrite existing values of this name
    pub replace: bool,
}

impl Attribute {
    /// Creates an appending (non-replacing) attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            replace: false,
        }
    }
}

/// One record written to a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Opaque random identifier
    pub item_id: String,
    /// Attributes in insertion order
    pub attributes: Vec<Attribute>,
}

impl Item {
    /// Creates an item with a freshly generated id.
    #[must_use]
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self {
            item_id: generate_item_id(),
            attributes,
        }
    }

    /// Returns the first value stored under `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Returns every value stored under `name`, in order.
    #[must_use]
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|a| a.name == name)
            .map(|a| a.value.as_str())
            .collect()
    }
}

/// An ordered group of items submitted in one write.
pub type Batch = Vec<Item>;

/// Generates a random alphanumeric item id.
#[must_use]
pub fn generate_item_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ITEM_ID_LEN)
        .map(char::from)
        .collect()
}
