//! Client and session configuration.
//!
//! [`ClientConfig`] carries the server endpoint and identity used to open a
//! connection; [`SessionConfig`] carries the timing bounds the session state
//! machine enforces. Both validate structurally, not semantically - whether
//! credentials are actually accepted is the server's call.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Time allowed for a connection attempt to reach ready.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed for a join request to be acknowledged.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed for the transport to accept an outbound command.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum time allowed without any inbound activity before the connection
/// is treated as lost.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Interval at which the session sends Ping commands while connected.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Errors from structural configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Endpoint is empty
    #[error("endpoint must not be empty")]
    EmptyEndpoint,

    /// Identity is empty
    #[error("identity must not be empty")]
    EmptyIdentity,

    /// Credentials are absent
    #[error("credentials must be present")]
    MissingCredentials,
}

/// Opaque connection credentials.
///
/// `Debug` redacts the secret so configurations can be logged safely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials(String);

impl Credentials {
    /// Wrap a credential string.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The secret value, for transport implementations performing
    /// authentication.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether any credential material is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(..)")
    }
}

/// Server endpoint and identity used to open a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server endpoint, e.g. `wss://meet.example.org/signaling`.
    pub endpoint: String,
    /// Identity the client authenticates as.
    pub identity: String,
    /// Authentication credentials.
    pub credentials: Credentials,
    /// Optional connection resource, distinguishing multiple connections
    /// under one identity. `None` lets the server assign one.
    pub resource: Option<String>,
}

impl ClientConfig {
    /// Create a configuration with no resource.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        identity: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self { endpoint: endpoint.into(), identity: identity.into(), credentials, resource: None }
    }

    /// Set the connection resource.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Check structural validity.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyEndpoint`] if the endpoint is empty
    /// - [`ConfigError::EmptyIdentity`] if the identity is empty
    /// - [`ConfigError::MissingCredentials`] if no credential material is
    ///   present
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        if self.identity.is_empty() {
            return Err(ConfigError::EmptyIdentity);
        }
        if self.credentials.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        Ok(())
    }
}

/// Timing bounds for the session state machine.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout for a connection attempt to reach ready.
    pub connect_timeout: Duration,
    /// Timeout for a join request to be acknowledged.
    pub join_timeout: Duration,
    /// Timeout for the transport to accept an outbound command.
    pub send_timeout: Duration,
    /// Inbound idle timeout before the connection is treated as lost.
    pub idle_timeout: Duration,
    /// Heartbeat interval (should be < `idle_timeout` / 2).
    pub heartbeat_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}
