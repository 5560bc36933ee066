//! The narrow surface a running cluster exposes to test tooling.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Identifier sent as the first token of every coordinator hello line.
pub const PROTOCOL_ID: &str = "GRIDSTONE/1";

/// Reachable address of a cluster component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridEndpoint {
    /// Host name or IP address.
    pub host: String,

    /// TCP port.
    pub port: u16,
}

impl GridEndpoint {
    /// Creates a new endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Formats the endpoint as `host:port` for socket APIs.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<SocketAddr> for GridEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for GridEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A running cluster capable of accepting and executing jobs.
///
/// Test tooling holds the cluster behind this trait and never depends on
/// which engine generation backs it. `close` is idempotent; calling it on
/// an already-closed cluster returns `Ok(())`.
#[async_trait]
pub trait JobExecutorService: Send + Sync {
    /// Coordinator address clients connect to.
    fn endpoint(&self) -> GridEndpoint;

    /// Web/administrative endpoint, if one was assigned.
    fn web_endpoint(&self) -> Option<GridEndpoint>;

    /// Total execution slots across all task managers.
    fn total_slots(&self) -> u32;

    /// Whether the cluster is still accepting work.
    fn is_running(&self) -> bool;

    /// Shuts the cluster down and waits for its components to exit.
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display_and_authority() {
        let endpoint = GridEndpoint::new("127.0.0.1", 6230);
        assert_eq!(endpoint.to_string(), "127.0.0.1:6230");
        assert_eq!(endpoint.authority(), "127.0.0.1:6230");
    }

    #[test]
    fn test_endpoint_from_socket_addr() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let endpoint = GridEndpoint::from(addr);
        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 9000);
    }
}
