//! Ambient execution context registry.
//!
//! Test-authoring code submits jobs to whatever cluster is registered
//! here when no explicit target is given. The registry is an explicit
//! object injected into the harness and the test environments rather
//! than process-global state; its only mutators are the register and
//! unregister pairs, and the harness calls them 1:1 with acquire and
//! release.

use gridstone_local::JobExecutorService;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// What test environments see as the default execution target.
#[derive(Clone)]
pub struct AmbientContext {
    executor: Arc<dyn JobExecutorService>,
    total_slots: u32,
}

impl AmbientContext {
    /// Creates a context over a running executor.
    pub fn new(executor: Arc<dyn JobExecutorService>, total_slots: u32) -> Self {
        Self {
            executor,
            total_slots,
        }
    }

    /// The executor jobs are submitted to.
    pub fn executor(&self) -> &Arc<dyn JobExecutorService> {
        &self.executor
    }

    /// Parallelism available to implicitly submitted jobs.
    pub fn total_slots(&self) -> u32 {
        self.total_slots
    }
}

impl fmt::Debug for AmbientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmbientContext")
            .field("endpoint", &self.executor.endpoint())
            .field("total_slots", &self.total_slots)
            .finish()
    }
}

/// Holds the ambient context for batch-style and streaming-style test
/// code. The two slots are independent; the harness registers both on
/// acquire and clears both on release.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    batch: Mutex<Option<AmbientContext>>,
    stream: Mutex<Option<AmbientContext>>,
}

impl ContextRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the batch-style context. Replaces (and warns about) any
    /// live registration; two harnesses sharing a registry is a usage
    /// mistake.
    pub fn register_batch(&self, context: AmbientContext) {
        let mut slot = lock(&self.batch);
        if slot.is_some() {
            warn!("replacing a live batch execution context");
        }
        *slot = Some(context);
    }

    /// Clears the batch-style context.
    pub fn unregister_batch(&self) {
        lock(&self.batch).take();
    }

    /// The current batch-style context, if any.
    pub fn batch(&self) -> Option<AmbientContext> {
        lock(&self.batch).clone()
    }

    /// Registers the streaming-style context. Same replacement policy as
    /// [`ContextRegistry::register_batch`].
    pub fn register_stream(&self, context: AmbientContext) {
        let mut slot = lock(&self.stream);
        if slot.is_some() {
            warn!("replacing a live streaming execution context");
        }
        *slot = Some(context);
    }

    /// Clears the streaming-style context.
    pub fn unregister_stream(&self) {
        lock(&self.stream).take();
    }

    /// The current streaming-style context, if any.
    pub fn stream(&self) -> Option<AmbientContext> {
        lock(&self.stream).clone()
    }
}

fn lock(slot: &Mutex<Option<AmbientContext>>) -> MutexGuard<'_, Option<AmbientContext>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubExecutor;

    fn context(slots: u32) -> AmbientContext {
        AmbientContext::new(Arc::new(StubExecutor::completing(slots)), slots)
    }

    #[test]
    fn test_register_and_unregister_batch() {
        let registry = ContextRegistry::new();
        assert!(registry.batch().is_none());

        registry.register_batch(context(4));
        assert_eq!(registry.batch().unwrap().total_slots(), 4);

        registry.unregister_batch();
        assert!(registry.batch().is_none());
    }

    #[test]
    fn test_slots_are_independent() {
        let registry = ContextRegistry::new();
        registry.register_batch(context(2));

        assert!(registry.batch().is_some());
        assert!(registry.stream().is_none());

        registry.register_stream(context(8));
        registry.unregister_batch();

        assert!(registry.batch().is_none());
        assert_eq!(registry.stream().unwrap().total_slots(), 8);
    }

    #[test]
    fn test_register_replaces_live_context() {
        let registry = ContextRegistry::new();
        registry.register_batch(context(1));
        registry.register_batch(context(2));

        assert_eq!(registry.batch().unwrap().total_slots(), 2);
    }
}
