//! # claw-logship
//!
//! Batched log shipping to a schema-less key/value store.
//!
//! Events are buffered, encoded into ordered attribute lists and written in
//! batches to monthly collections named `<prefix>-YYYY-MM`. Missing
//! collections are created on demand; client failures are retried with a
//! bounded attempt budget and reported to an [`ErrorHandler`].
//!
//! This crate provides:
//!
//! - [`LogEvent`]: Captured log event with optional error chain
//! - [`EventEncoder`]: Event to attribute conversion
//! - [`BatchBuffer`]: Bounded pending-event buffer
//! - [`WriteExecutor`]: Retrying batch writer
//! - [`StoreAppender`]: The [`Appender`] facade tying them together
//! - [`StoreClient`] / [`StoreConnector`]: Store boundary traits
//! - [`MemoryStore`]: In-process store backend
//!
//! ## Example
//!
//! ```rust
//! use claw_logship::{
//!     Appender, AppenderConfig, Credentials, Level, LogEvent, MemoryStore,
//!     StaticCredentials, StoreAppender,
//! };
//!
//! let store = MemoryStore::new();
//! let appender = StoreAppender::builder(AppenderConfig::new().with_collection_prefix("Logs"))
//!     .connector(store.connector())
//!     .credentials(StaticCredentials::new(Credentials::new("id", "secret")))
//!     .build()?;
//!
//! let event = LogEvent::builder()
//!     .logger_name("app")
//!     .level(Level::Info)
//!     .message("Application started")
//!     .build()?;
//! appender.append(event);
//! appender.close();
//!
//! assert_eq!(store.item_count(), 1);
//! # Ok::<(), claw_logship::ShipError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod appender;
pub mod buffer;
pub mod config;
pub mod credentials;
pub mod encoder;
pub mod error;
pub mod executor;
pub mod handler;
pub mod memory;
pub mod metrics;
pub mod namer;
pub mod store;
pub mod types;

// Re-export main types
pub use appender::{Appender, StoreAppender, StoreAppenderBuilder};
pub use buffer::BatchBuffer;
pub use config::AppenderConfig;
pub use credentials::{
    CredentialChain, CredentialResolver, Credentials, EnvironmentCredentials, StaticCredentials,
};
pub use encoder::{encode, EventEncoder};
pub use error::{CredentialError, Result, ShipError, StoreError};
pub use executor::{ExecutorSettings, WriteExecutor, WriteOutcome, MAX_COLLECTION_RECOVERIES};
pub use handler::{ErrorCode, ErrorHandler, NoopErrorHandler, TracingErrorHandler};
pub use memory::{CallCounts, MemoryClient, MemoryConnector, MemoryStore};
pub use metrics::{MetricsSnapshot, ShipperMetrics};
pub use namer::{collection_name, Clock, ManualClock, SystemClock};
pub use store::{StoreClient, StoreConnector};
pub use types::{
    Attribute, Batch, Item, Level, LogEvent, LogEventBuilder, StackFrame, Throwable,
    MAX_ATTRIBUTE_VALUE_BYTES, MAX_ITEMS_PER_BATCH,
};
