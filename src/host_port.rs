use std::borrow::Borrow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::{fmt, str::FromStr};

/// Key which identifies a remote peer by its `host:port` address.
///
/// Cloning is cheap, the address is shared. Lists treat the address as an opaque
/// key and never validate it; use [`FromStr`] for a strict parse.
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct HostPort(Arc<str>);

/// The address could not be parsed as `host:port`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostPortError {
    /// No `:port` suffix was found.
    #[error("missing port in address: {0}")]
    MissingPort(String),

    /// The host part is empty.
    #[error("missing host in address: {0}")]
    MissingHost(String),

    /// The port is not a valid `u16`.
    #[error("invalid port in address: {0}")]
    InvalidPort(String),

    /// The host contains `:` without being a bracketed IPv6 literal.
    #[error("too many colons in address: {0}")]
    TooManyColons(String),
}

impl HostPort {
    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The host part, everything before the last `:`.
    ///
    /// Bracketed IPv6 literals keep their brackets.
    pub fn host(&self) -> &str {
        self.split().map_or(self.as_str(), |(host, _)| host)
    }

    /// The port, if the address ends in a valid `:port`.
    pub fn port(&self) -> Option<u16> {
        self.split().and_then(|(_, port)| port.parse().ok())
    }

    fn split(&self) -> Option<(&str, &str)> {
        let (host, port) = self.0.rsplit_once(':')?;
        if host.starts_with('[') {
            if !host.ends_with(']') {
                // Unbracketed tail of an IPv6 literal, not a port.
                return None;
            }
        } else if host.contains(':') {
            return None;
        }
        Some((host, port))
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostPort").field(&&*self.0).finish()
    }
}

impl Borrow<str> for HostPort {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for HostPort {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HostPort {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for HostPort {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<&HostPort> for HostPort {
    fn from(value: &HostPort) -> Self {
        value.clone()
    }
}

impl From<SocketAddr> for HostPort {
    fn from(value: SocketAddr) -> Self {
        Self(value.to_string().into())
    }
}

impl FromStr for HostPort {
    type Err = HostPortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let candidate = HostPort::from(s);
        let Some((host, port)) = candidate.split() else {
            if s.contains(':') && !s.starts_with('[') {
                return Err(HostPortError::TooManyColons(s.to_owned()));
            }
            return Err(HostPortError::MissingPort(s.to_owned()));
        };

        if host.is_empty() || host == "[]" {
            return Err(HostPortError::MissingHost(s.to_owned()));
        }

        port.parse::<u16>()
            .map_err(|_| HostPortError::InvalidPort(s.to_owned()))?;

        Ok(candidate)
    }
}
