//! Conversion of log events into store attributes.
//!
//! Attributes are produced in a fixed order:
//!
//! ```text
//! LoggerName, NDC_0..NDC_n, ThreadName, Level, LocationInformation, Message,
//! [ErrorClass, ErrorMessage, ErrorTrace*, [CauseClass, CauseMessage, CauseTrace*]],
//! TimeStamp
//! ```
//!
//! Values longer than the configured limit are truncated at a UTF-8 char
//! boundary so that no attribute can be rejected by the store for length.

use crate::types::{Attribute, LogEvent, Throwable, MAX_ATTRIBUTE_VALUE_BYTES};

/// Encodes log events into ordered attribute lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventEncoder {
    max_value_len: usize,
}

impl Default for EventEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEncoder {
    /// Creates an encoder using the store's value limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_value_len: MAX_ATTRIBUTE_VALUE_BYTES,
        }
    }

    /// Creates an encoder with a custom value limit in bytes.
    ///
    /// The limit is capped at [`MAX_ATTRIBUTE_VALUE_BYTES`] and raised to at
    /// least one byte.
    #[must_use]
    pub fn with_max_value_len(max_value_len: usize) -> Self {
        Self {
            max_value_len: max_value_len.clamp(1, MAX_ATTRIBUTE_VALUE_BYTES),
        }
    }

    /// Returns the value limit in bytes.
    #[must_use]
    pub const fn max_value_len(&self) -> usize {
        self.max_value_len
    }

    /// Encodes one event. Never fails.
    #[must_use]
    pub fn encode(&self, event: &LogEvent) -> Vec<Attribute> {
        let mut attrs = Vec::with_capacity(8);

        self.push(&mut attrs, "LoggerName", &event.logger_name);
        if let Some(ndc) = &event.ndc {
            for (i, token) in ndc_tokens(ndc).into_iter().enumerate() {
                self.push(&mut attrs, &format!("NDC_{i}"), token);
            }
        }
        self.push(&mut attrs, "ThreadName", &event.thread_name);
        self.push(&mut attrs, "Level", event.level.as_str());
        self.push(&mut attrs, "LocationInformation", &event.location);
        self.push(&mut attrs, "Message", &event.message);

        if let Some(throwable) = &event.throwable {
            self.push_throwable(&mut attrs, throwable, "Error");
            if let Some(root) = throwable.root_cause() {
                self.push_throwable(&mut attrs, root, "Cause");
            }
        }

        self.push(
            &mut attrs,
            "TimeStamp",
            &event.timestamp_millis.to_string(),
        );
        attrs
    }

    fn push_throwable(&self, attrs: &mut Vec<Attribute>, throwable: &Throwable, prefix: &str) {
        self.push(attrs, &format!("{prefix}Class"), &throwable.class_name);
        self.push(
            attrs,
            &format!("{prefix}Message"),
            throwable.message.as_deref().unwrap_or_default(),
        );
        let trace_name = format!("{prefix}Trace");
        for (i, frame) in throwable.frames.iter().enumerate() {
            self.push(attrs, &trace_name, &format!("{i}_{frame}"));
        }
    }

    fn push(&self, attrs: &mut Vec<Attribute>, name: &str, value: &str) {
        attrs.push(Attribute::new(name, truncate(value, self.max_value_len)));
    }
}

/// Encodes an event with the default value limit.
#[must_use]
pub fn encode(event: &LogEvent) -> Vec<Attribute> {
    EventEncoder::new().encode(event)
}

/// Splits a nested context on single spaces, dropping trailing empty tokens.
///
/// An empty context yields a single empty token.
fn ndc_tokens(ndc: &str) -> Vec<&str> {
    if ndc.is_empty() {
        return vec![""];
    }
    let mut tokens: Vec<&str> = ndc.split(' ').collect();
    while tokens.last().is_some_and(|t| t.is_empty()) {
        tokens.pop();
    }
    tokens
}

/// Truncates `value` to at most `max` bytes on a char boundary.
fn truncate(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
