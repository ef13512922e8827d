//! TCP endpoint shared by the daemon listener and client connector.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_HOST, DEFAULT_PORT};

/// Loopback TCP endpoint the daemon serves its command protocol on.
///
/// The protocol carries no authentication, so the host should remain a
/// loopback address; the port is configurable to allow several daemons on
/// one machine.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Builds an endpoint from a host and port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Builds the default loopback endpoint with a custom port.
    #[must_use]
    pub fn loopback(port: u16) -> Self {
        Self::new(DEFAULT_HOST, port)
    }

    /// Host component.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port component.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::loopback(DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_host_port() {
        let endpoint = Endpoint::loopback(23888);
        assert_eq!(endpoint.to_string(), "127.0.0.1:23888");
    }
}
