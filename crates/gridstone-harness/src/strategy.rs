//! The two cluster construction strategies.
//!
//! Both produce the same logical resource through mutually incompatible
//! paths. Dispatch is a closed match over [`ClusterVariant`]; unknown
//! tags cannot reach this module because parsing rejects them.

use crate::descriptor::ConnectionDescriptor;
use crate::variant::ClusterVariant;
use crate::{HarnessConfig, HarnessError, Result};
use gridstone_client::GridClient;
use gridstone_local::{
    FrozenGridConfig, GridConfig, JobExecutorService, LegacyLocalGrid, MiniGrid,
    MiniGridConfiguration, keys,
};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Everything a successful start hands back to the controller.
pub(crate) struct StartedCluster {
    pub(crate) executor: Arc<dyn JobExecutorService>,
    pub(crate) client: Option<GridClient>,
    pub(crate) descriptor: ConnectionDescriptor,
    pub(crate) client_config: FrozenGridConfig,
    pub(crate) web_port: Option<u16>,
}

/// Starts the cluster selected by `variant`.
pub(crate) async fn start_cluster(
    variant: ClusterVariant,
    config: &HarnessConfig,
    workspace: &Path,
    enable_client: bool,
) -> Result<StartedCluster> {
    debug!(%variant, enable_client, "starting cluster");
    match variant {
        ClusterVariant::Legacy | ClusterVariant::LegacyProbe | ClusterVariant::LegacyMirror => {
            start_legacy(config, workspace, enable_client).await
        }
        ClusterVariant::New => start_new(config, workspace, enable_client).await,
    }
}

fn scratch_dir(workspace: &Path) -> Result<std::path::PathBuf> {
    let scratch = workspace.join("scratch");
    std::fs::create_dir_all(&scratch).map_err(HarnessError::startup)?;
    Ok(scratch)
}

fn client_config_for(endpoint: &gridstone_local::GridEndpoint) -> FrozenGridConfig {
    let mut config = GridConfig::new();
    config.set(keys::COORDINATOR_BIND_ADDRESS, endpoint.host.clone());
    config.set_u16(keys::COORDINATOR_PORT, endpoint.port);
    config.frozen()
}

/// Legacy path: the cluster shape is merged into loose config keys and
/// the descriptor is derived from the coordinator RPC port. Enabling the
/// administrative client forces separate execution contexts per
/// component; that rewiring is an engine constraint the harness
/// preserves, not a harness policy.
async fn start_legacy(
    config: &HarnessConfig,
    workspace: &Path,
    enable_client: bool,
) -> Result<StartedCluster> {
    let mut grid_config = config.base().clone();
    grid_config.set_u32(keys::TASK_MANAGER_COUNT, config.task_managers());
    grid_config.set_u32(keys::TASK_MANAGER_SLOTS, config.slots_per_task_manager());
    grid_config.set_path(keys::SCRATCH_DIRS, &scratch_dir(workspace)?);

    let grid = LegacyLocalGrid::start(&grid_config, !enable_client)
        .await
        .map_err(HarnessError::startup)?;

    let endpoint = grid.endpoint();
    let discovery = grid.discovery();
    let web_port = grid.web_endpoint().map(|web| web.port);
    let client_config = client_config_for(&endpoint);

    let client = if enable_client {
        let client = GridClient::from_discovery(client_config.clone(), &discovery)
            .await
            .map_err(HarnessError::startup)?;
        Some(client)
    } else {
        None
    };

    Ok(StartedCluster {
        executor: Arc::new(grid),
        client,
        descriptor: ConnectionDescriptor::from(endpoint),
        client_config,
        web_port,
    })
}

/// New path: the cluster shape goes through the explicit builder, the
/// coordinator port is forced ephemeral, and the bound port is read back
/// into both the outbound client configuration and the descriptor.
async fn start_new(
    config: &HarnessConfig,
    workspace: &Path,
    enable_client: bool,
) -> Result<StartedCluster> {
    let scratch = scratch_dir(workspace)?;

    let mut base = config.base().clone();
    // Ephemeral port: concurrently running harnesses must never collide.
    base.set_u16(keys::COORDINATOR_PORT, 0);

    let configuration = MiniGridConfiguration::builder()
        .with_base_config(base)
        .with_task_managers(config.task_managers())
        .with_slots_per_task_manager(config.slots_per_task_manager())
        .with_scratch_dir(scratch)
        .build()
        .map_err(HarnessError::startup)?;

    let grid = MiniGrid::start(configuration)
        .await
        .map_err(HarnessError::startup)?;

    let endpoint = grid.endpoint();
    let web_port = grid.web_endpoint().map(|web| web.port);
    let client_config = client_config_for(&endpoint);

    let client = if enable_client {
        let client = GridClient::connect(client_config.clone(), endpoint.clone())
            .await
            .map_err(HarnessError::startup)?;
        Some(client)
    } else {
        None
    };

    Ok(StartedCluster {
        executor: Arc::new(grid),
        client,
        descriptor: ConnectionDescriptor::from(endpoint),
        client_config,
        web_port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridstone_local::GridConfig;
    use tempfile::TempDir;

    fn harness_config() -> HarnessConfig {
        let mut base = GridConfig::new();
        base.set_u16(keys::COORDINATOR_PORT, 0);
        HarnessConfig::new(base, 2, 2).unwrap()
    }

    #[tokio::test]
    async fn test_legacy_start_produces_descriptor() {
        let workspace = TempDir::new().unwrap();
        let started = start_cluster(ClusterVariant::Legacy, &harness_config(), workspace.path(), false)
            .await
            .unwrap();

        assert!(started.client.is_none());
        assert!(started.descriptor.port() != 0);
        assert_eq!(started.executor.total_slots(), 4);
        assert_eq!(
            started.client_config.get_u16(keys::COORDINATOR_PORT).unwrap(),
            Some(started.descriptor.port())
        );

        started.executor.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_new_start_reads_bound_port_back() {
        let workspace = TempDir::new().unwrap();
        let started = start_cluster(ClusterVariant::New, &harness_config(), workspace.path(), true)
            .await
            .unwrap();

        let client = started.client.expect("client was requested");
        assert_eq!(client.endpoint().port, started.descriptor.port());
        assert_eq!(started.web_port, Some(started.descriptor.port()));

        client.close().await.unwrap();
        started.executor.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_diagnostic_variants_start_as_legacy() {
        let workspace = TempDir::new().unwrap();
        let started = start_cluster(
            ClusterVariant::LegacyProbe,
            &harness_config(),
            workspace.path(),
            false,
        )
        .await
        .unwrap();

        assert!(started.executor.is_running());
        started.executor.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_scratch_dir_created_under_workspace() {
        let workspace = TempDir::new().unwrap();
        let started = start_cluster(ClusterVariant::Legacy, &harness_config(), workspace.path(), false)
            .await
            .unwrap();

        assert!(workspace.path().join("scratch").is_dir());
        started.executor.close().await.unwrap();
    }
}
