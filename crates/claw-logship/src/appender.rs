//! The appender facade.
//!
//! [`StoreAppender`] accepts one event at a time, buffers it, and once the
//! buffer is full encodes the pending events and hands them to the
//! [`WriteExecutor`]. Flushes run synchronously on the calling thread. All
//! state sits behind a single lock, so at most one flush (with its retry
//! loop) is in flight per appender and concurrent callers wait for it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BatchBuffer;
use crate::config::AppenderConfig;
use crate::credentials::{CredentialResolver, EnvironmentCredentials};
use crate::encoder::EventEncoder;
use crate::error::{Result, ShipError};
use crate::executor::{WriteExecutor, WriteOutcome};
use crate::handler::{ErrorHandler, TracingErrorHandler};
use crate::metrics::{MetricsSnapshot, ShipperMetrics};
use crate::namer::{Clock, SystemClock};
use crate::store::StoreConnector;
use crate::types::{Item, LogEvent};

/// Capability interface of a log appender.
pub trait Appender: Send + Sync {
    /// Accepts one event. Never fails; delivery problems go to the error
    /// handler.
    fn append(&self, event: LogEvent);

    /// Writes any buffered events now.
    fn flush(&self);

    /// Flushes and releases resources. Later calls do nothing.
    fn close(&self);

    /// Returns true once [`close`](Self::close) has run.
    fn is_closed(&self) -> bool;
}

struct AppenderState {
    config: AppenderConfig,
    encoder: EventEncoder,
    buffer: BatchBuffer,
    executor: WriteExecutor,
    closed: bool,
}

impl AppenderState {
    fn flush(&mut self) -> Option<WriteOutcome> {
        if self.buffer.is_empty() {
            return None;
        }
        let events = self.buffer.drain();
        let batch: Vec<Item> = events
            .iter()
            .map(|event| Item::new(self.encoder.encode(event)))
            .collect();
        drop(events);

        let outcome = self.executor.execute(&batch);
        tracing::debug!(
            target: "claw_logship",
            items = batch.len(),
            ?outcome,
            "flushed buffer"
        );
        Some(outcome)
    }
}

/// Appender that ships events to a key/value store.
pub struct StoreAppender {
    state: Mutex<AppenderState>,
    metrics: Arc<ShipperMetrics>,
}

impl StoreAppender {
    /// Starts building an appender for `config`.
    #[must_use]
    pub fn builder(config: AppenderConfig) -> StoreAppenderBuilder {
        StoreAppenderBuilder {
            config,
            connector: None,
            credentials: None,
            error_handler: None,
            clock: None,
        }
    }

    /// Flushes pending events and returns the write outcome, if a write was
    /// needed.
    pub fn flush_now(&self) -> Option<WriteOutcome> {
        self.state.lock().flush()
    }

    /// Replaces the configuration.
    ///
    /// Pending events are flushed under the old configuration first and the
    /// store client is released.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the appender is closed.
    pub fn reconfigure(&self, config: AppenderConfig) -> Result<()> {
        let config = config.validated()?;
        let mut state = self.state.lock();
        if state.closed {
            return Err(ShipError::Config("appender is closed".to_string()));
        }
        state.flush();
        state.buffer.set_capacity(config.buffer_size);
        state.encoder = EventEncoder::with_max_value_len(config.max_value_len);
        state.executor.reconfigure(config.executor_settings());
        tracing::info!(
            target: "claw_logship",
            region = %config.region,
            prefix = %config.collection_prefix,
            buffer_size = config.buffer_size,
            retry = config.retry,
            "appender reconfigured"
        );
        state.config = config;
        Ok(())
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> AppenderConfig {
        self.state.lock().config.clone()
    }

    /// Number of buffered events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Delivery counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Appender for StoreAppender {
    fn append(&self, event: LogEvent) {
        let mut state = self.state.lock();
        if state.closed {
            self.metrics.record_rejected();
            tracing::warn!(
                target: "claw_logship",
                logger = %event.logger_name,
                "append on closed appender ignored"
            );
            return;
        }
        state.buffer.add(event);
        self.metrics.record_appended();
        if state.buffer.should_flush() {
            state.flush();
        }
    }

    fn flush(&self) {
        self.flush_now();
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.flush();
        state.executor.shutdown();
        state.closed = true;
        tracing::debug!(target: "claw_logship", "appender closed");
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Drop for StoreAppender {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for StoreAppender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StoreAppender")
            .field("config", &state.config)
            .field("pending", &state.buffer.len())
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}

/// Builder for [`StoreAppender`].
pub struct StoreAppenderBuilder {
    config: AppenderConfig,
    connector: Option<Arc<dyn StoreConnector>>,
    credentials: Option<Arc<dyn CredentialResolver>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    clock: Option<Arc<dyn Clock>>,
}

impl StoreAppenderBuilder {
    /// Sets the connector used to build store clients. Required.
    #[must_use]
    pub fn connector(mut self, connector: impl StoreConnector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Sets the credential resolver. Defaults to [`EnvironmentCredentials`].
    #[must_use]
    pub fn credentials(mut self, resolver: impl CredentialResolver + 'static) -> Self {
        self.credentials = Some(Arc::new(resolver));
        self
    }

    /// Sets the error handler. Defaults to [`TracingErrorHandler`].
    #[must_use]
    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Sets the clock used for collection names. Defaults to [`SystemClock`].
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validates the configuration and builds the appender.
    ///
    /// # Errors
    ///
    /// Returns an error if no connector was set or the configuration is
    /// invalid.
    pub fn build(self) -> Result<StoreAppender> {
        let config = self.config.validated()?;
        let connector = self.connector.ok_or(ShipError::MissingField("connector"))?;
        let metrics = Arc::new(ShipperMetrics::new());

        let executor = WriteExecutor::new(
            config.executor_settings(),
            connector,
            self.credentials
                .unwrap_or_else(|| Arc::new(EnvironmentCredentials)),
            self.error_handler
                .unwrap_or_else(|| Arc::new(TracingErrorHandler::new())),
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            Arc::clone(&metrics),
        );

        tracing::debug!(
            target: "claw_logship",
            region = %config.region,
            prefix = %config.collection_prefix,
            buffer_size = config.buffer_size,
            retry = config.retry,
            "appender created"
        );

        Ok(StoreAppender {
            state: Mutex::new(AppenderState {
                encoder: EventEncoder::with_max_value_len(config.max_value_len),
                buffer: BatchBuffer::new(config.buffer_size),
                executor,
                config,
                closed: false,
            }),
            metrics,
        })
    }
}
