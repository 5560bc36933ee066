//! # gridstone-local: in-process Gridstone cluster
//!
//! Runs a complete Gridstone cluster inside the current process for local
//! execution and testing. Two engine generations are available:
//!
//! - [`LegacyLocalGrid`] — the shared-process cluster, configured through
//!   loose [`GridConfig`] keys, coordinator port taken from config.
//! - [`MiniGrid`] — the current generation, configured through
//!   [`MiniGridConfiguration`] with an ephemeral coordinator port that is
//!   read back after startup.
//!
//! Both implement [`JobExecutorService`], the narrow surface test tooling
//! consumes: a reachable endpoint, the slot count, and an idempotent
//! asynchronous close.

pub mod config;
mod coordinator;
pub mod error;
pub mod executor;
pub mod legacy;
pub mod minigrid;

pub use config::{FrozenGridConfig, GridConfig, keys};
pub use error::{Error, Result};
pub use executor::{GridEndpoint, JobExecutorService, PROTOCOL_ID};
pub use legacy::{LegacyLocalGrid, ServiceDiscovery};
pub use minigrid::{MiniGrid, MiniGridConfiguration, MiniGridConfigurationBuilder};
