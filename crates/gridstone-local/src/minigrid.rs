//! Builder-configured cluster, the current engine generation.
//!
//! Unlike the legacy grid, cluster shape is declared up front through
//! [`MiniGridConfiguration`] instead of loose config keys, the
//! coordinator port defaults to ephemeral, and the web endpoint is the
//! coordinator port itself (one multiplexed listener).

use crate::config::{DEFAULT_BIND_ADDRESS, DEFAULT_MANAGED_MEMORY_MB, GridConfig, keys};
use crate::coordinator::{self, GridCore};
use crate::executor::{GridEndpoint, JobExecutorService};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::info;

/// Declarative shape of a [`MiniGrid`].
#[derive(Debug, Clone)]
pub struct MiniGridConfiguration {
    base: GridConfig,
    task_managers: u32,
    slots_per_task_manager: u32,
    scratch_dir: Option<PathBuf>,
}

impl MiniGridConfiguration {
    /// Starts building a configuration.
    pub fn builder() -> MiniGridConfigurationBuilder {
        MiniGridConfigurationBuilder::default()
    }

    /// Base configuration carried into the cluster.
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

    /// Scratch directory, if one was assigned.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }
}

/// Builder for [`MiniGridConfiguration`].
#[derive(Debug, Default)]
pub struct MiniGridConfigurationBuilder {
    base: GridConfig,
    task_managers: Option<u32>,
    slots_per_task_manager: Option<u32>,
    scratch_dir: Option<PathBuf>,
}

impl MiniGridConfigurationBuilder {
    /// Sets the base configuration.
    pub fn with_base_config(mut self, base: GridConfig) -> Self {
        self.base = base;
        self
    }

    /// Sets the number of task managers.
    pub fn with_task_managers(mut self, task_managers: u32) -> Self {
        self.task_managers = Some(task_managers);
        self
    }

    /// Sets the number of slots per task manager.
    pub fn with_slots_per_task_manager(mut self, slots: u32) -> Self {
        self.slots_per_task_manager = Some(slots);
        self
    }

    /// Sets the scratch directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<MiniGridConfiguration> {
        let task_managers = self.task_managers.unwrap_or(1);
        let slots_per_task_manager = self.slots_per_task_manager.unwrap_or(1);
        if task_managers == 0 {
            return Err(Error::InvalidConfiguration(
                "task manager count must be at least 1".to_string(),
            ));
        }
        if slots_per_task_manager == 0 {
            return Err(Error::InvalidConfiguration(
                "slots per task manager must be at least 1".to_string(),
            ));
        }

        Ok(MiniGridConfiguration {
            base: self.base,
            task_managers,
            slots_per_task_manager,
            scratch_dir: self.scratch_dir,
        })
    }
}

/// A running builder-configured cluster.
pub struct MiniGrid {
    core: GridCore,
    effective_config: GridConfig,
}

impl MiniGrid {
    /// Starts a cluster with the given configuration.
    ///
    /// The coordinator port defaults to 0 (ephemeral) so that concurrent
    /// clusters never collide; the bound port is read back and published
    /// through [`JobExecutorService::endpoint`].
    pub async fn start(configuration: MiniGridConfiguration) -> Result<Self> {
        let mut effective = configuration.base.clone();
        if let Some(scratch_dir) = &configuration.scratch_dir {
            effective.set_path(keys::SCRATCH_DIRS, scratch_dir);
        }
        if !effective.contains(keys::TASK_MANAGER_MANAGED_MEMORY_MB) {
            effective.set_u64(keys::TASK_MANAGER_MANAGED_MEMORY_MB, DEFAULT_MANAGED_MEMORY_MB);
        }
        effective.set_u32(keys::TASK_MANAGER_COUNT, configuration.task_managers);
        effective.set_u32(keys::TASK_MANAGER_SLOTS, configuration.slots_per_task_manager);

        let total_slots = configuration.task_managers * configuration.slots_per_task_manager;
        let host = effective
            .get(keys::COORDINATOR_BIND_ADDRESS)
            .unwrap_or(DEFAULT_BIND_ADDRESS)
            .to_string();
        let port = effective.get_u16(keys::COORDINATOR_PORT)?.unwrap_or(0);

        let (listener, endpoint) = coordinator::bind(&host, port).await?;
        effective.set_u16(keys::COORDINATOR_PORT, endpoint.port);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = vec![coordinator::spawn_accept_loop(
            listener,
            total_slots,
            true,
            shutdown_rx.clone(),
        )];
        for id in 0..configuration.task_managers {
            tasks.push(coordinator::spawn_task_manager(
                id,
                configuration.slots_per_task_manager,
                shutdown_rx.clone(),
            ));
        }

        info!(
            %endpoint,
            task_managers = configuration.task_managers,
            slots_per_task_manager = configuration.slots_per_task_manager,
            "mini grid started"
        );

        // The coordinator listener doubles as the web endpoint.
        let web_endpoint = Some(endpoint.clone());

        Ok(Self {
            core: GridCore::new(endpoint, web_endpoint, total_slots, shutdown_tx, tasks),
            effective_config: effective,
        })
    }

    /// Configuration as the running cluster sees it, including the bound
    /// coordinator port.
    pub fn effective_config(&self) -> &GridConfig {
        &self.effective_config
    }
}

#[async_trait]
impl JobExecutorService for MiniGrid {
    fn endpoint(&self) -> GridEndpoint {
        self.core.endpoint()
    }

    fn web_endpoint(&self) -> Option<GridEndpoint> {
        self.core.web_endpoint()
    }

    fn total_slots(&self) -> u32 {
        self.core.total_slots()
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }

    async fn close(&self) -> Result<()> {
        self.core.close().await
    }
}
