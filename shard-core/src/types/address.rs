//! Network address of a storage host.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_NET_ADDRESS_LEN;
use crate::error::{Result, ShardError};

/// A validated `host:port` address.
///
/// IPv6 hosts must be bracketed (`[::1]:9982`). The host part is not
/// resolved; only its shape is checked.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetAddress(String);

impl NetAddress {
    /// Parses and validates an address.
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    fn validate(s: &str) -> Result<()> {
        if s.is_empty() {
            return Err(ShardError::InvalidNetAddress("empty address".into()));
        }
        if s.len() > MAX_NET_ADDRESS_LEN {
            return Err(ShardError::InvalidNetAddress(format!(
                "address longer than {} bytes",
                MAX_NET_ADDRESS_LEN
            )));
        }

        let (host, port) = split_host_port(s)
            .ok_or_else(|| ShardError::InvalidNetAddress(format!("missing port in {:?}", s)))?;

        if host.is_empty() {
            return Err(ShardError::InvalidNetAddress(format!("missing host in {:?}", s)));
        }
        if host.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ShardError::InvalidNetAddress(format!("invalid host in {:?}", s)));
        }

        match port.parse::<u16>() {
            Ok(0) | Err(_) => Err(ShardError::InvalidNetAddress(format!(
                "invalid port {:?}",
                port
            ))),
            Ok(_) => Ok(()),
        }
    }

    /// Returns the host part, without IPv6 brackets.
    pub fn host(&self) -> &str {
        split_host_port(&self.0).map(|(h, _)| h).unwrap_or_default()
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        split_host_port(&self.0)
            .and_then(|(_, p)| p.parse().ok())
            .unwrap_or_default()
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn split_host_port(s: &str) -> Option<(&str, &str)> {
    if let Some(rest) = s.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        Some((host, port))
    } else {
        let (host, port) = s.rsplit_once(':')?;
        // An unbracketed host containing ':' is an IPv6 literal without brackets
        if host.contains(':') {
            return None;
        }
        Some((host, port))
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetAddress({})", self.0)
    }
}

impl TryFrom<String> for NetAddress {
    type Error = ShardError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<NetAddress> for String {
    fn from(addr: NetAddress) -> Self {
        addr.0
    }
}

impl std::str::FromStr for NetAddress {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("host.example.com:9982", "host.example.com", 9982)]
    #[test_case("10.0.0.1:80", "10.0.0.1", 80)]
    #[test_case("[::1]:9982", "::1", 9982)]
    fn test_valid_addresses(input: &str, host: &str, port: u16) {
        let addr = NetAddress::parse(input).unwrap();
        assert_eq!(addr.host(), host);
        assert_eq!(addr.port(), port);
        assert_eq!(addr.to_string(), input);
    }

    #[test_case(""; "empty")]
    #[test_case("host"; "no port")]
    #[test_case(":9982"; "no host")]
    #[test_case("host:0"; "zero port")]
    #[test_case("host:70000"; "port overflow")]
    #[test_case("::1:9982"; "unbracketed ipv6")]
    #[test_case("bad host:80"; "whitespace")]
    fn test_invalid_addresses(input: &str) {
        assert!(NetAddress::parse(input).is_err());
    }

    #[test]
    fn test_rejects_oversized() {
        let long = format!("{}:80", "a".repeat(MAX_NET_ADDRESS_LEN));
        assert!(NetAddress::parse(long).is_err());
    }

    #[test]
    fn test_serde_validates() {
        let addr: NetAddress = serde_json::from_str("\"h:1\"").unwrap();
        assert_eq!(addr.as_str(), "h:1");
        assert!(serde_json::from_str::<NetAddress>("\"nope\"").is_err());
    }
}
