//! Client configuration.

use std::time::Duration;

use url::Url;

use shard_core::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SCAN_TIMEOUT_SECS, NODE_USER_AGENT};
use shard_core::error::{Result, ShardError};

/// Parses `addr` as a base URL, accepting a bare `host:port`.
///
/// The result never ends with `/`, so routes can be appended directly.
pub(crate) fn base_url(addr: &str) -> Result<String> {
    let addr = addr.trim().trim_end_matches('/');
    let with_scheme = if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| ShardError::ConfigError(format!("invalid address {:?}: {}", addr, e)))?;
    if url.host_str().is_none() {
        return Err(ShardError::ConfigError(format!("address {:?} has no host", addr)));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Configuration for [`ShardClient`](crate::ShardClient).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Index server base URL
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a config for the server at `addr` (`host:port` or a URL).
    pub fn new(addr: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url(addr)?,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for [`NodeClient`](crate::NodeClient).
#[derive(Clone)]
pub struct NodeConfig {
    /// Node API base URL
    pub base_url: String,
    /// API password sent with HTTP basic auth
    pub password: Option<String>,
    /// User agent the node requires
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Deadline for reaching a host during a scan
    pub scan_timeout: Duration,
}

impl NodeConfig {
    /// Creates a config for the node API at `addr` (`host:port` or a URL).
    pub fn new(addr: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url(addr)?,
            password: None,
            user_agent: NODE_USER_AGENT.into(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            scan_timeout: Duration::from_secs(DEFAULT_SCAN_TIMEOUT_SECS),
        })
    }

    /// Sets the API password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Overrides the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the host scan deadline.
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConfig")
            .field("base_url", &self.base_url)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("scan_timeout", &self.scan_timeout)
            .finish()
    }
}

/// Which resolver backend to build.
#[derive(Clone, Debug)]
pub enum ResolverConfig {
    /// Untrusted index server; every answer is signature-checked
    Verified(ClientConfig),
    /// Trusted full node
    Node(NodeConfig),
}

impl ResolverConfig {
    /// Verified index server at `addr`.
    pub fn shard(addr: &str) -> Result<Self> {
        Ok(Self::Verified(ClientConfig::new(addr)?))
    }

    /// Full node at `addr` with an optional API password.
    pub fn node(addr: &str, password: Option<String>) -> Result<Self> {
        let mut config = NodeConfig::new(addr)?;
        config.password = password;
        Ok(Self::Node(config))
    }
}
