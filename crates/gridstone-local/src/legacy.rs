//! Shared-process cluster, the original engine generation.
//!
//! All components live in one process. Task managers either run on the
//! coordinator's execution context (`shared_context = true`) or each get
//! a dedicated context. The administrative client can only talk to a
//! cluster with separate contexts, so client-enabled harnesses must start
//! the legacy grid with `shared_context = false`.

use crate::config::{DEFAULT_BIND_ADDRESS, DEFAULT_COORDINATOR_PORT, GridConfig, keys};
use crate::coordinator::{self, GridCore};
use crate::executor::{GridEndpoint, JobExecutorService};
use crate::{Error, Result};
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

/// Coordinator addressing information published for client construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDiscovery {
    coordinator: GridEndpoint,
}

impl ServiceDiscovery {
    /// Address of the coordinator RPC endpoint.
    pub fn coordinator(&self) -> &GridEndpoint {
        &self.coordinator
    }
}

/// A running shared-process cluster.
pub struct LegacyLocalGrid {
    core: GridCore,
    shared_context: bool,
    task_managers: u32,
    slots_per_task_manager: u32,
}

impl LegacyLocalGrid {
    /// Starts a shared-process cluster described by `config`.
    ///
    /// Task-manager count and slots come from `taskmanager.count` /
    /// `taskmanager.slots` (both default to 1). The coordinator binds
    /// `coordinator.bind-address:coordinator.port`; port 0 picks an
    /// ephemeral port.
    pub async fn start(config: &GridConfig, shared_context: bool) -> Result<Self> {
        let task_managers = config.get_u32(keys::TASK_MANAGER_COUNT)?.unwrap_or(1);
        let slots_per_task_manager = config.get_u32(keys::TASK_MANAGER_SLOTS)?.unwrap_or(1);
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
        let total_slots = task_managers * slots_per_task_manager;

        let host = config
            .get(keys::COORDINATOR_BIND_ADDRESS)
            .unwrap_or(DEFAULT_BIND_ADDRESS)
            .to_string();
        let port = config
            .get_u16(keys::COORDINATOR_PORT)?
            .unwrap_or(DEFAULT_COORDINATOR_PORT);

        let (listener, endpoint) = coordinator::bind(&host, port).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut tasks = vec![coordinator::spawn_accept_loop(
            listener,
            total_slots,
            !shared_context,
            shutdown_rx.clone(),
        )];

        if !shared_context {
            for id in 0..task_managers {
                tasks.push(coordinator::spawn_task_manager(
                    id,
                    slots_per_task_manager,
                    shutdown_rx.clone(),
                ));
            }
        }

        let web_endpoint = match config.get_u16(keys::WEB_PORT)? {
            None => None,
            Some(web_port) => {
                let (web_listener, web_endpoint) = coordinator::bind(&host, web_port).await?;
                tasks.push(coordinator::spawn_web_loop(
                    web_listener,
                    total_slots,
                    shutdown_rx,
                ));
                Some(web_endpoint)
            }
        };

        info!(
            %endpoint,
            task_managers,
            slots_per_task_manager,
            shared_context,
            "legacy local grid started"
        );

        Ok(Self {
            core: GridCore::new(endpoint, web_endpoint, total_slots, shutdown_tx, tasks),
            shared_context,
            task_managers,
            slots_per_task_manager,
        })
    }

    /// Addressing information for client construction.
    pub fn discovery(&self) -> ServiceDiscovery {
        ServiceDiscovery {
            coordinator: self.core.endpoint(),
        }
    }

    /// Whether task managers share the coordinator's execution context.
    pub fn shared_context(&self) -> bool {
        self.shared_context
    }

    /// Number of task managers.
    pub fn task_managers(&self) -> u32 {
        self.task_managers
    }

    /// Slots per task manager.
    pub fn slots_per_task_manager(&self) -> u32 {
        self.slots_per_task_manager
    }
}

#[async_trait]
impl JobExecutorService for LegacyLocalGrid {
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

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpStream;

    fn ephemeral_config() -> GridConfig {
        let mut config = GridConfig::new();
        config.set_u16(keys::COORDINATOR_PORT, 0);
        config
    }

    #[tokio::test]
    async fn test_start_and_close() {
        let grid = LegacyLocalGrid::start(&ephemeral_config(), true).await.unwrap();
        assert!(grid.is_running());
        assert_eq!(grid.total_slots(), 1);
        assert!(grid.endpoint().port != 0);

        grid.close().await.unwrap();
        assert!(!grid.is_running());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let grid = LegacyLocalGrid::start(&ephemeral_config(), false).await.unwrap();
        grid.close().await.unwrap();
        grid.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_coordinator_sends_hello() {
        let mut config = ephemeral_config();
        config.set_u32(keys::TASK_MANAGER_COUNT, 2);
        config.set_u32(keys::TASK_MANAGER_SLOTS, 3);

        let grid = LegacyLocalGrid::start(&config, true).await.unwrap();
        let stream = TcpStream::connect(grid.endpoint().authority()).await.unwrap();
        let mut hello = String::new();
        BufReader::new(stream).read_line(&mut hello).await.unwrap();
        assert_eq!(hello.trim_end(), "GRIDSTONE/1 6");

        grid.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_task_managers_rejected() {
        let mut config = ephemeral_config();
        config.set_u32(keys::TASK_MANAGER_COUNT, 0);

        let result = LegacyLocalGrid::start(&config, true).await;
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_web_endpoint_assigned_when_configured() {
        let mut config = ephemeral_config();
        config.set_u16(keys::WEB_PORT, 0);

        let grid = LegacyLocalGrid::start(&config, true).await.unwrap();
        let web = grid.web_endpoint().expect("web endpoint");
        assert!(web.port != 0);

        grid.close().await.unwrap();
    }
}
