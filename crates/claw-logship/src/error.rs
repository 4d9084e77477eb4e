//! Error types for the log shipper.

use thiserror::Error;

/// Errors raised while configuring or building the shipper.
///
/// Nothing in the append path returns these; delivery failures are
/// reported through the [`ErrorHandler`](crate::handler::ErrorHandler).
#[derive(Debug, Error)]
pub enum ShipError {
    /// A required field was not provided.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// TOML configuration could not be parsed.
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON configuration could not be parsed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures returned by a [`StoreClient`](crate::store::StoreClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The target collection does not exist yet.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// Any other remote or client-side failure.
    #[error("client error: {0}")]
    Client(String),
}

impl StoreError {
    /// Returns true for the self-healing missing-collection case.
    #[must_use]
    pub const fn is_collection_missing(&self) -> bool {
        matches!(self, Self::CollectionNotFound(_))
    }
}

/// Failures resolving store credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// No resolver could supply credentials.
    #[error("credentials unavailable: {0}")]
    Unavailable(String),
}

impl From<CredentialError> for StoreError {
    fn from(err: CredentialError) -> Self {
        Self::Client(err.to_string())
    }
}

/// Result type alias for shipper operations.
pub type Result<T> = std::result::Result<T, ShipError>;
