//! # gridstone-client: administrative client
//!
//! Submits jobs to a running Gridstone coordinator and queries its state
//! over the line protocol. A client is constructed either directly
//! against a known endpoint ([`GridClient::connect`]) or from the
//! service-discovery information a legacy cluster publishes
//! ([`GridClient::from_discovery`]).

mod error;

pub use error::{ClientError, Result};

use gridstone_local::{FrozenGridConfig, GridEndpoint, PROTOCOL_ID, ServiceDiscovery};
use std::fmt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

/// Identifier of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// The raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Administrative client connected to a Gridstone coordinator.
pub struct GridClient {
    config: FrozenGridConfig,
    endpoint: GridEndpoint,
    advertised_slots: u32,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl GridClient {
    /// Connects to `endpoint` and performs the hello handshake.
    pub async fn connect(config: FrozenGridConfig, endpoint: GridEndpoint) -> Result<Self> {
        let stream = TcpStream::connect(endpoint.authority()).await?;
        let (read_half, writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut hello = String::new();
        reader.read_line(&mut hello).await?;
        let hello = hello.trim_end();
        let advertised_slots = match hello.split_once(' ') {
            Some((PROTOCOL_ID, slots)) => slots.parse().map_err(|_| ClientError::Handshake {
                got: hello.to_string(),
            })?,
            _ => {
                return Err(ClientError::Handshake {
                    got: hello.to_string(),
                });
            }
        };

        debug!(%endpoint, advertised_slots, "client connected");
        Ok(Self {
            config,
            endpoint,
            advertised_slots,
            reader,
            writer,
        })
    }

    /// Connects using the service-discovery information a legacy cluster
    /// publishes.
    pub async fn from_discovery(config: FrozenGridConfig, discovery: &ServiceDiscovery) -> Result<Self> {
        Self::connect(config, discovery.coordinator().clone()).await
    }

    /// The endpoint this client is connected to.
    pub fn endpoint(&self) -> &GridEndpoint {
        &self.endpoint
    }

    /// Slot count the coordinator advertised during the handshake.
    pub fn advertised_slots(&self) -> u32 {
        self.advertised_slots
    }

    /// Client-facing configuration snapshot.
    pub fn config(&self) -> &FrozenGridConfig {
        &self.config
    }

    /// Round-trips a liveness probe.
    pub async fn ping(&mut self) -> Result<()> {
        let reply = self.request("PING").await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(ClientError::Protocol {
                expected: "PONG",
                got: reply,
            })
        }
    }

    /// Submits a job and returns its assigned identifier.
    pub async fn submit_job(&mut self, name: &str) -> Result<JobId> {
        if name.contains(['\n', '\r']) {
            return Err(ClientError::InvalidJobName {
                name: name.to_string(),
            });
        }

        let reply = self.request(&format!("SUBMIT {name}")).await?;
        match reply.strip_prefix("ACK ") {
            Some(id) => Ok(JobId(id.to_string())),
            None => Err(ClientError::Protocol {
                expected: "ACK <job-id>",
                got: reply,
            }),
        }
    }

    /// Closes the connection, telling the coordinator to drop it first.
    pub async fn close(mut self) -> Result<()> {
        self.writer.write_all(b"QUIT\n").await?;
        self.writer.shutdown().await?;

        // Drain until the coordinator hangs up.
        let mut line = String::new();
        while self.reader.read_line(&mut line).await? > 0 {
            line.clear();
        }
        debug!(endpoint = %self.endpoint, "client closed");
        Ok(())
    }

    async fn request(&mut self, command: &str) -> Result<String> {
        self.writer.write_all(format!("{command}\n").as_bytes()).await?;

        let mut reply = String::new();
        let read = self.reader.read_line(&mut reply).await?;
        if read == 0 {
            return Err(ClientError::Protocol {
                expected: "reply line",
                got: "<connection closed>".to_string(),
            });
        }
        Ok(reply.trim_end().to_string())
    }
}
