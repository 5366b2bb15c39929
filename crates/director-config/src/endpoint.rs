use std::fmt;

use serde::{Deserialize, Serialize};

/// TCP endpoint the daemon listens on.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct ServerEndpoint {
    /// Host name or interface address.
    pub host: String,
    /// TCP port; `0` asks the operating system for an ephemeral port.
    pub port: u16,
}

impl ServerEndpoint {
    /// Builds a TCP endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(formatter, "tcp://[{}]:{}", self.host, self.port)
        } else {
            write!(formatter, "tcp://{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_ipv4_endpoint() {
        let endpoint = ServerEndpoint::new("127.0.0.1", 5555);
        assert_eq!(endpoint.to_string(), "tcp://127.0.0.1:5555");
    }

    #[test]
    fn brackets_ipv6_hosts() {
        let endpoint = ServerEndpoint::new("::1", 5555);
        assert_eq!(endpoint.to_string(), "tcp://[::1]:5555");
    }
}
