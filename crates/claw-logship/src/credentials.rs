//! Credentials used to build store clients.
//!
//! Resolvers are injected into the appender; there is no process-wide
//! provider.

use std::fmt;
use std::sync::Arc;

use crate::error::CredentialError;

/// Environment variable holding the access key id.
pub const ENV_ACCESS_KEY_ID: &str = "LOGSHIP_ACCESS_KEY_ID";
/// Environment variable holding the secret access key.
pub const ENV_SECRET_ACCESS_KEY: &str = "LOGSHIP_SECRET_ACCESS_KEY";
/// Environment variable holding an optional session token.
pub const ENV_SESSION_TOKEN: &str = "LOGSHIP_SESSION_TOKEN";

/// Opaque store credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Temporary session token
    pub session_token: Option<String>,
}

impl Credentials {
    /// Creates long-lived credentials.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Adds a session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Supplies credentials on demand.
pub trait CredentialResolver: Send + Sync {
    /// Resolves credentials.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Unavailable`] if none can be found.
    fn resolve(&self) -> Result<Credentials, CredentialError>;
}

/// Always returns the same credentials.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    /// Wraps fixed credentials.
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl CredentialResolver for StaticCredentials {
    fn resolve(&self) -> Result<Credentials, CredentialError> {
        Ok(self.credentials.clone())
    }
}

/// Reads credentials from `LOGSHIP_*` environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentCredentials;

impl EnvironmentCredentials {
    /// Resolves credentials through `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the key id or secret is missing or empty.
    pub fn resolve_with(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Credentials, CredentialError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let access_key_id = non_empty(ENV_ACCESS_KEY_ID)
            .ok_or_else(|| CredentialError::Unavailable(format!("{ENV_ACCESS_KEY_ID} not set")))?;
        let secret_access_key = non_empty(ENV_SECRET_ACCESS_KEY).ok_or_else(|| {
            CredentialError::Unavailable(format!("{ENV_SECRET_ACCESS_KEY} not set"))
        })?;

        Ok(Credentials {
            access_key_id,
            secret_access_key,
            session_token: non_empty(ENV_SESSION_TOKEN),
        })
    }
}

impl CredentialResolver for EnvironmentCredentials {
    fn resolve(&self) -> Result<Credentials, CredentialError> {
        Self::resolve_with(|name| std::env::var(name).ok())
    }
}

/// Tries resolvers in order; the first success wins.
#[derive(Default, Clone)]
pub struct CredentialChain {
    resolvers: Vec<Arc<dyn CredentialResolver>>,
}

impl CredentialChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a resolver to the chain.
    #[must_use]
    pub fn with(mut self, resolver: impl CredentialResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    /// Number of resolvers in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if the chain has no resolvers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl fmt::Debug for CredentialChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialChain")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

impl CredentialResolver for CredentialChain {
    fn resolve(&self) -> Result<Credentials, CredentialError> {
        let mut reasons = Vec::with_capacity(self.resolvers.len());
        for resolver in &self.resolvers {
            match resolver.resolve() {
                Ok(credentials) => return Ok(credentials),
                Err(CredentialError::Unavailable(reason)) => reasons.push(reason),
            }
        }
        if reasons.is_empty() {
            return Err(CredentialError::Unavailable(
                "no credential resolvers configured".to_string(),
            ));
        }
        Err(CredentialError::Unavailable(reasons.join("; ")))
    }
}
