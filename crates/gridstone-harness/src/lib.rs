//! # gridstone-harness: scoped local-cluster lifecycle
//!
//! Starts an in-process Gridstone cluster as a managed test resource:
//!
//! ```text
//! acquire ──► workspace ──► variant start ──► ambient registration ──► ACTIVE
//! release ──► workspace ──► unregister ──► client close ──► bounded executor close ──► IDLE
//! ```
//!
//! Acquisition failures propagate — a broken environment must not look
//! ready. Release never fails: every teardown step runs regardless of
//! earlier failures, and whatever went wrong is aggregated and logged.
//!
//! Two construction variants exist for the same logical resource, chosen
//! by [`ClusterVariant`]: the legacy shared-process cluster and the
//! builder-configured cluster with ephemeral port read-back.

mod config;
mod context;
mod descriptor;
mod error;
mod harness;
mod strategy;
#[cfg(test)]
mod testing;
mod variant;

pub use config::HarnessConfig;
pub use context::{AmbientContext, ContextRegistry};
pub use descriptor::ConnectionDescriptor;
pub use error::{BoxedError, HarnessError, Result, ShutdownError, ShutdownTimeout};
pub use harness::{HarnessState, LocalClusterHarness};
pub use variant::ClusterVariant;

// Types test code needs alongside the harness.
pub use gridstone_client::GridClient;
pub use gridstone_local::{FrozenGridConfig, GridConfig, GridEndpoint, JobExecutorService, keys};
