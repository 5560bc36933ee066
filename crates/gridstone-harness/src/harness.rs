//! Scoped lifecycle controller for a local Gridstone cluster.

use crate::context::{AmbientContext, ContextRegistry};
use crate::descriptor::ConnectionDescriptor;
use crate::error::{ShutdownError, ShutdownTimeout};
use crate::strategy;
use crate::variant::ClusterVariant;
use crate::{HarnessConfig, HarnessError, Result};
use gridstone_client::GridClient;
use gridstone_local::{FrozenGridConfig, JobExecutorService};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{info, warn};

/// Lifecycle states of a [`LocalClusterHarness`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    /// No cluster resources held.
    Idle,

    /// Acquisition in progress.
    Acquiring,

    /// Cluster running, accessors valid.
    Active,

    /// Teardown in progress.
    Releasing,
}

/// Starts a local Gridstone cluster for the duration of a test scope and
/// guarantees teardown, even when startup was partial or shutdown fails.
///
/// One harness drives one sequential test scope. Concurrent scopes use
/// independent harness instances; the `New` variant's ephemeral-port
/// policy keeps them from colliding.
///
/// ```ignore
/// let registry = Arc::new(ContextRegistry::new());
/// let config = HarnessConfig::new(GridConfig::new(), 2, 4)?;
/// let mut harness =
///     LocalClusterHarness::with_client(config, ClusterVariant::New, registry);
/// harness.acquire().await?;
/// // ... run the test against harness.client_mut()? ...
/// harness.release().await;
/// ```
pub struct LocalClusterHarness {
    config: HarnessConfig,
    variant: ClusterVariant,
    enable_client: bool,
    registry: Arc<ContextRegistry>,
    state: HarnessState,
    workspace: Option<TempDir>,
    executor: Option<Arc<dyn JobExecutorService>>,
    client: Option<GridClient>,
    descriptor: Option<ConnectionDescriptor>,
    client_config: Option<FrozenGridConfig>,
    total_slots: u32,
    web_port: Option<u16>,
}

impl LocalClusterHarness {
    /// Creates a harness without administrative client support.
    pub fn new(config: HarnessConfig, variant: ClusterVariant, registry: Arc<ContextRegistry>) -> Self {
        Self::build(config, variant, registry, false)
    }

    /// Creates a harness that also constructs the administrative client
    /// during acquisition.
    pub fn with_client(
        config: HarnessConfig,
        variant: ClusterVariant,
        registry: Arc<ContextRegistry>,
    ) -> Self {
        Self::build(config, variant, registry, true)
    }

    fn build(
        config: HarnessConfig,
        variant: ClusterVariant,
        registry: Arc<ContextRegistry>,
        enable_client: bool,
    ) -> Self {
        Self {
            config,
            variant,
            enable_client,
            registry,
            state: HarnessState::Idle,
            workspace: None,
            executor: None,
            client: None,
            descriptor: None,
            client_config: None,
            total_slots: 0,
            web_port: None,
        }
    }

    /// Starts the cluster and registers it as the ambient execution
    /// context for batch and streaming test code.
    ///
    /// On failure every partially created resource is released before
    /// the error surfaces; the harness is back in [`HarnessState::Idle`]
    /// and never reports a broken environment as ready.
    pub async fn acquire(&mut self) -> Result<()> {
        if self.state != HarnessState::Idle {
            return Err(HarnessError::AlreadyAcquired);
        }
        self.state = HarnessState::Acquiring;

        // The workspace must exist before the executor: startup may need
        // scratch space.
        let workspace = match tempfile::Builder::new()
            .prefix("gridstone-harness-")
            .tempdir()
        {
            Ok(workspace) => workspace,
            Err(error) => {
                self.state = HarnessState::Idle;
                return Err(HarnessError::startup(error));
            }
        };

        let total_slots = self.config.total_slots();
        info!(
            variant = %self.variant,
            total_slots,
            workspace = %workspace.path().display(),
            "acquiring local cluster"
        );

        let started = match strategy::start_cluster(
            self.variant,
            &self.config,
            workspace.path(),
            self.enable_client,
        )
        .await
        {
            Ok(started) => started,
            Err(error) => {
                if let Err(cleanup) = workspace.close() {
                    warn!(error = %cleanup, "could not remove workspace after failed startup");
                }
                self.state = HarnessState::Idle;
                return Err(error);
            }
        };

        let context = AmbientContext::new(Arc::clone(&started.executor), total_slots);
        self.registry.register_batch(context.clone());
        self.registry.register_stream(context);

        self.workspace = Some(workspace);
        self.executor = Some(started.executor);
        self.client = started.client;
        self.descriptor = Some(started.descriptor);
        self.client_config = Some(started.client_config);
        self.total_slots = total_slots;
        self.web_port = started.web_port;
        self.state = HarnessState::Active;
        Ok(())
    }

    /// Tears the cluster down.
    ///
    /// Never returns an error: teardown failures are aggregated and
    /// logged so they cannot mask the test's own result. Releasing an
    /// unacquired harness is a no-op. Step order is fixed: workspace,
    /// ambient contexts, client, then the time-bounded executor close —
    /// a hanging executor cannot leave stale files or registrations
    /// behind.
    pub async fn release(&mut self) {
        if self.state != HarnessState::Active {
            return;
        }
        self.state = HarnessState::Releasing;

        let mut failure: Option<ShutdownError> = None;

        if let Some(workspace) = self.workspace.take() {
            if let Err(error) = workspace.close() {
                failure = Some(ShutdownError::fold(failure, error));
            }
        }

        self.registry.unregister_stream();
        self.registry.unregister_batch();

        if let Some(client) = self.client.take() {
            if let Err(error) = client.close().await {
                failure = Some(ShutdownError::fold(failure, error));
            }
        }

        if let Some(executor) = self.executor.take() {
            if let Err(error) =
                close_executor_bounded(&executor, self.config.shutdown_timeout()).await
            {
                failure = Some(ShutdownError::fold(failure, error));
            }
        }

        self.descriptor = None;
        self.client_config = None;
        self.total_slots = 0;
        self.web_port = None;
        self.state = HarnessState::Idle;

        match failure {
            None => info!("local cluster released"),
            Some(failure) => {
                warn!(error = %failure, "local cluster did not shut down cleanly");
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HarnessState {
        self.state
    }

    /// The variant this harness starts.
    pub fn variant(&self) -> ClusterVariant {
        self.variant
    }

    /// Total execution slots. Zero unless the harness is active.
    pub fn total_slots(&self) -> u32 {
        self.total_slots
    }

    /// Connection descriptor of the running cluster.
    pub fn descriptor(&self) -> Option<&ConnectionDescriptor> {
        self.descriptor.as_ref()
    }

    /// Client-facing configuration snapshot of the running cluster.
    pub fn client_config(&self) -> Option<&FrozenGridConfig> {
        self.client_config.as_ref()
    }

    /// Web/administrative port, if one was assigned.
    pub fn web_port(&self) -> Option<u16> {
        self.web_port
    }

    /// Path of the scratch workspace while the harness is active.
    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace.as_ref().map(TempDir::path)
    }

    /// The administrative client.
    ///
    /// Fails with [`HarnessError::ClientDisabled`] when client support
    /// was not enabled at construction — checked eagerly even while
    /// active — and with [`HarnessError::ClientUnavailable`] outside the
    /// active window.
    pub fn client(&self) -> Result<&GridClient> {
        if !self.enable_client {
            return Err(HarnessError::ClientDisabled);
        }
        self.client.as_ref().ok_or(HarnessError::ClientUnavailable)
    }

    /// Mutable access to the administrative client; same contract as
    /// [`LocalClusterHarness::client`].
    pub fn client_mut(&mut self) -> Result<&mut GridClient> {
        if !self.enable_client {
            return Err(HarnessError::ClientDisabled);
        }
        self.client.as_mut().ok_or(HarnessError::ClientUnavailable)
    }
}

impl Drop for LocalClusterHarness {
    fn drop(&mut self) {
        if self.state == HarnessState::Active {
            warn!(
                "harness dropped while active; call release() to shut the cluster down cleanly"
            );
        }
    }
}

/// Bounds the executor's asynchronous close by `timeout`.
///
/// On timeout the close is neither retried nor forcibly killed; it may
/// still complete in the background. The caller only learns that waiting
/// stopped.
pub(crate) async fn close_executor_bounded(
    executor: &Arc<dyn JobExecutorService>,
    timeout: Duration,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match tokio::time::timeout(timeout, executor.close()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(Box::new(error)),
        Err(_elapsed) => Err(Box::new(ShutdownTimeout { timeout })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CloseBehavior, StubExecutor};
    use gridstone_local::GridConfig;

    fn stub_harness(behavior: CloseBehavior, timeout: Duration) -> LocalClusterHarness {
        let config = HarnessConfig::new(GridConfig::new(), 1, 2)
            .unwrap()
            .with_shutdown_timeout(timeout);
        let registry = Arc::new(ContextRegistry::new());
        let executor: Arc<dyn JobExecutorService> = Arc::new(StubExecutor::new(2, behavior));

        let context = AmbientContext::new(Arc::clone(&executor), 2);
        registry.register_batch(context.clone());
        registry.register_stream(context);

        LocalClusterHarness {
            config,
            variant: ClusterVariant::New,
            enable_client: false,
            registry,
            state: HarnessState::Active,
            workspace: Some(TempDir::new().unwrap()),
            executor: Some(executor),
            client: None,
            descriptor: Some(ConnectionDescriptor::new("127.0.0.1", 1)),
            client_config: None,
            total_slots: 2,
            web_port: None,
        }
    }

    #[tokio::test]
    async fn test_release_on_idle_harness_is_noop() {
        let config = HarnessConfig::new(GridConfig::new(), 1, 1).unwrap();
        let mut harness =
            LocalClusterHarness::new(config, ClusterVariant::Legacy, Arc::new(ContextRegistry::new()));

        harness.release().await;
        harness.release().await;
        assert_eq!(harness.state(), HarnessState::Idle);
    }

    #[tokio::test]
    async fn test_accessors_before_acquire() {
        let config = HarnessConfig::new(GridConfig::new(), 1, 1).unwrap();
        let harness =
            LocalClusterHarness::new(config, ClusterVariant::Legacy, Arc::new(ContextRegistry::new()));

        assert_eq!(harness.total_slots(), 0);
        assert!(harness.descriptor().is_none());
        assert!(harness.workspace_path().is_none());
        assert!(matches!(harness.client(), Err(HarnessError::ClientDisabled)));
    }

    #[tokio::test]
    async fn test_release_clears_everything() {
        let mut harness = stub_harness(CloseBehavior::Complete, Duration::from_secs(1));
        let workspace = harness.workspace_path().unwrap().to_path_buf();

        harness.release().await;

        assert_eq!(harness.state(), HarnessState::Idle);
        assert!(harness.executor.is_none());
        assert!(harness.descriptor().is_none());
        assert_eq!(harness.total_slots(), 0);
        assert!(!workspace.exists());
        assert!(harness.registry.batch().is_none());
        assert!(harness.registry.stream().is_none());
    }

    #[tokio::test]
    async fn test_release_swallows_close_failure() {
        let mut harness = stub_harness(CloseBehavior::Fail, Duration::from_secs(1));
        harness.release().await;
        assert_eq!(harness.state(), HarnessState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_returns_despite_hanging_close() {
        let mut harness = stub_harness(CloseBehavior::Hang, Duration::from_millis(250));
        let workspace = harness.workspace_path().unwrap().to_path_buf();

        harness.release().await;

        // The bounded wait gave up; everything else was still cleaned up.
        assert_eq!(harness.state(), HarnessState::Idle);
        assert!(!workspace.exists());
        assert!(harness.registry.batch().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_close_reports_timeout() {
        let executor: Arc<dyn JobExecutorService> =
            Arc::new(StubExecutor::new(1, CloseBehavior::Hang));

        let error = close_executor_bounded(&executor, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(error.downcast_ref::<ShutdownTimeout>().is_some());
    }

    #[tokio::test]
    async fn test_bounded_close_passes_error_through() {
        let executor: Arc<dyn JobExecutorService> =
            Arc::new(StubExecutor::new(1, CloseBehavior::Fail));

        let error = close_executor_bounded(&executor, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(error.downcast_ref::<ShutdownTimeout>().is_none());
        assert!(error.to_string().contains("stub close failure"));
    }

    #[tokio::test]
    async fn test_bounded_close_ok() {
        let executor: Arc<dyn JobExecutorService> = Arc::new(StubExecutor::completing(1));
        close_executor_bounded(&executor, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!executor.is_running());
    }
}
