//! Resource configuration for the harness.

use crate::{HarnessError, Result};
use gridstone_local::config::DEFAULT_TIMEOUT;
use gridstone_local::{GridConfig, keys};
use std::time::Duration;

/// Immutable description of the cluster a harness should start.
///
/// Counts are validated at construction; there is no way to observe a
/// zero task-manager or slot count on a built value. The shutdown timeout
/// defaults to the base configuration's `grid.default-timeout-ms` and can
/// be overridden with [`HarnessConfig::with_shutdown_timeout`].
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    base: GridConfig,
    task_managers: u32,
    slots_per_task_manager: u32,
    shutdown_timeout: Duration,
}

impl HarnessConfig {
    /// Creates a configuration for `task_managers` task managers with
    /// `slots_per_task_manager` slots each.
    pub fn new(base: GridConfig, task_managers: u32, slots_per_task_manager: u32) -> Result<Self> {
        if task_managers == 0 {
            return Err(HarnessError::InvalidConfiguration {
                what: "task manager count must be at least 1".to_string(),
            });
        }
        if slots_per_task_manager == 0 {
            return Err(HarnessError::InvalidConfiguration {
                what: "slots per task manager must be at least 1".to_string(),
            });
        }

        let shutdown_timeout = match base.get_u64(keys::DEFAULT_TIMEOUT_MS) {
            Ok(Some(millis)) => Duration::from_millis(millis),
            Ok(None) => DEFAULT_TIMEOUT,
            Err(error) => {
                return Err(HarnessError::InvalidConfiguration {
                    what: error.to_string(),
                });
            }
        };

        Ok(Self {
            base,
            task_managers,
            slots_per_task_manager,
            shutdown_timeout,
        })
    }

    /// Overrides the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Base cluster configuration.
    pub fn base(&self) -> &GridConfig {
        &self.base
    }

    /// Number of task managers.
    pub fn task_managers(&self) -> u32 {
        self.task_managers
    }

    /// Slots per task manager.
    pub fn slots_per_task_manager(&self) -> u32 {
        self.slots_per_task_manager
    }

    /// Total execution slots across the cluster.
    pub fn total_slots(&self) -> u32 {
        self.task_managers * self.slots_per_task_manager
    }

    /// How long release waits for the executor close to finish.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}
