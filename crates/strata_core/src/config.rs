//! Member configuration.

use crate::error::{GridError, GridResult};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Default listen host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default listen port
pub const DEFAULT_PORT: u16 = 24000;

/// Default per-recipient delivery timeout in milliseconds
pub const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 5000;

/// Network endpoint a member is reachable on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host IP address
    pub host: String,
    /// Port
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Validate the endpoint
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the host is not an IP address or the port is zero
    pub fn validate(&self) -> GridResult<()> {
        if self.host.parse::<IpAddr>().is_err() {
            return Err(GridError::invalid_argument(
                "host",
                format!("not an IP address: {:?}", self.host),
            ));
        }
        if self.port == 0 {
            return Err(GridError::invalid_argument("port", "must be positive"));
        }
        Ok(())
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Configuration for one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberConfig {
    /// Human readable member name
    pub name: String,
    /// Endpoint handed to the transport collaborator
    #[serde(default)]
    pub endpoint: Endpoint,
    /// Upper bound for a single peer to accept a broadcast message
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

fn default_delivery_timeout_ms() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_MS
}

impl MemberConfig {
    /// Create a config with the default endpoint
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: Endpoint::default(),
            delivery_timeout_ms: DEFAULT_DELIVERY_TIMEOUT_MS,
        }
    }

    /// Set endpoint
    #[must_use]
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.endpoint = Endpoint::new(host, port);
        self
    }

    /// Set delivery timeout
    #[must_use]
    pub fn with_delivery_timeout(mut self, timeout_ms: u64) -> Self {
        self.delivery_timeout_ms = timeout_ms;
        self
    }

    /// Parse a JSON config and validate it
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if parsing or validation fails
    pub fn from_json(json: &str) -> GridResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the config
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on a blank name, bad endpoint or zero timeout
    pub fn validate(&self) -> GridResult<()> {
        if self.name.trim().is_empty() {
            return Err(GridError::invalid_argument(
                "name",
                "member name must not be empty or whitespace",
            ));
        }
        self.endpoint.validate()?;
        if self.delivery_timeout_ms == 0 {
            return Err(GridError::invalid_argument(
                "delivery_timeout_ms",
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for MemberConfig {
    fn default() -> Self {
        Self::new(format!("strata-node-{}", uuid::Uuid::new_v4()))
    }
}
