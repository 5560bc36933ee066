//! Connection descriptor published to test code.

use gridstone_local::GridEndpoint;
use std::fmt;

/// Immutable host/port snapshot taken once startup completes.
///
/// Valid for the lifetime of the acquisition that produced it. It is not
/// invalidated on release; callers must not use it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    host: String,
    port: u16,
}

impl ConnectionDescriptor {
    /// Creates a descriptor.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host the executor is reachable on.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port the executor is reachable on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The descriptor as a connectable endpoint.
    pub fn endpoint(&self) -> GridEndpoint {
        GridEndpoint::new(self.host.clone(), self.port)
    }
}

impl From<GridEndpoint> for ConnectionDescriptor {
    fn from(endpoint: GridEndpoint) -> Self {
        Self {
            host: endpoint.host,
            port: endpoint.port,
        }
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_endpoint() {
        let descriptor = ConnectionDescriptor::from(GridEndpoint::new("127.0.0.1", 6230));
        assert_eq!(descriptor.host(), "127.0.0.1");
        assert_eq!(descriptor.port(), 6230);
        assert_eq!(descriptor.endpoint(), GridEndpoint::new("127.0.0.1", 6230));
        assert_eq!(descriptor.to_string(), "127.0.0.1:6230");
    }
}
