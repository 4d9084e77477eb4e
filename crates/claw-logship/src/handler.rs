//! Error reporting for failed write attempts.
//!
//! Every failure that does not heal itself is handed to an [`ErrorHandler`].
//! Reports are fire-and-forget.

use std::fmt;
use std::sync::Arc;

use crate::error::StoreError;

/// Classification attached to each report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A store call failed.
    GenericFailure,
    /// Credentials could not be resolved.
    CredentialFailure,
}

impl ErrorCode {
    /// Returns the string representation of this code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GenericFailure => "generic_failure",
            Self::CredentialFailure => "credential_failure",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for delivery failure reports.
pub trait ErrorHandler: Send + Sync {
    /// Reports one failure.
    fn error(&self, message: &str, error: &StoreError, code: ErrorCode);
}

/// Reports failures through `tracing` at error level.
#[derive(Debug, Clone, Default)]
pub struct TracingErrorHandler {
    prefix: Option<String>,
}

impl TracingErrorHandler {
    /// Creates a new tracing-based handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handler that tags every report with `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl ErrorHandler for TracingErrorHandler {
    fn error(&self, message: &str, error: &StoreError, code: ErrorCode) {
        let prefix = self.prefix.as_deref().unwrap_or("LOGSHIP");
        tracing::error!(
            target: "claw_logship",
            %code,
            error = %error,
            "[{prefix}] {message}"
        );
    }
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopErrorHandler;

impl ErrorHandler for NoopErrorHandler {
    fn error(&self, _message: &str, _error: &StoreError, _code: ErrorCode) {}
}

impl<T: ErrorHandler + ?Sized> ErrorHandler for Arc<T> {
    fn error(&self, message: &str, error: &StoreError, code: ErrorCode) {
        (**self).error(message, error, code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingHandler {
        count: AtomicUsize,
    }

    impl ErrorHandler for CountingHandler {
        fn error(&self, _message: &str, _error: &StoreError, _code: ErrorCode) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn error_code_display() {
        assert_eq!(ErrorCode::GenericFailure.to_string(), "generic_failure");
        assert_eq!(ErrorCode::CredentialFailure.as_str(), "credential_failure");
    }

    #[test]
    fn tracing_handler_with_prefix() {
        let handler = TracingErrorHandler::with_prefix("SDB");
        assert_eq!(handler.prefix.as_deref(), Some("SDB"));
        handler.error(
            "put failed",
            &StoreError::Client("timeout".to_string()),
            ErrorCode::GenericFailure,
        );
    }

    #[test]
    fn tracing_handler_emits_under_subscriber() {
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        tracing::subscriber::with_default(subscriber, || {
            TracingErrorHandler::new().error(
                "put failed",
                &StoreError::Client("timeout".to_string()),
                ErrorCode::GenericFailure,
            );
        });
    }

    #[test]
    fn arc_handler_forwards() {
        let handler = Arc::new(CountingHandler::default());
        let shared: Arc<dyn ErrorHandler> = handler.clone();
        shared.error(
            "x",
            &StoreError::Client("y".to_string()),
            ErrorCode::GenericFailure,
        );
        handler.error(
            "x",
            &StoreError::Client("y".to_string()),
            ErrorCode::GenericFailure,
        );
        assert_eq!(handler.count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn noop_handler_does_nothing() {
        NoopErrorHandler.error(
            "x",
            &StoreError::Client("y".to_string()),
            ErrorCode::GenericFailure,
        );
    }

    #[test]
    fn handlers_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TracingErrorHandler>();
        assert_send_sync::<NoopErrorHandler>();
    }
}
