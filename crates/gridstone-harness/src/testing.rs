//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use gridstone_local::{GridEndpoint, JobExecutorService};
use std::sync::atomic::{AtomicBool, Ordering};

/// How a [`StubExecutor`] behaves when closed.
pub(crate) enum CloseBehavior {
    /// Close completes immediately.
    Complete,

    /// Close fails immediately.
    Fail,

    /// Close never completes.
    Hang,
}

/// In-memory stand-in for a running cluster.
pub(crate) struct StubExecutor {
    slots: u32,
    behavior: CloseBehavior,
    running: AtomicBool,
}

impl StubExecutor {
    pub(crate) fn new(slots: u32, behavior: CloseBehavior) -> Self {
        Self {
            slots,
            behavior,
            running: AtomicBool::new(true),
        }
    }

    pub(crate) fn completing(slots: u32) -> Self {
        Self::new(slots, CloseBehavior::Complete)
    }
}

#[async_trait]
impl JobExecutorService for StubExecutor {
    fn endpoint(&self) -> GridEndpoint {
        GridEndpoint::new("127.0.0.1", 1)
    }

    fn web_endpoint(&self) -> Option<GridEndpoint> {
        None
    }

    fn total_slots(&self) -> u32 {
        self.slots
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn close(&self) -> gridstone_local::Result<()> {
        match self.behavior {
            CloseBehavior::Complete => {
                self.running.store(false, Ordering::SeqCst);
                Ok(())
            }
            CloseBehavior::Fail => Err(gridstone_local::Error::Shutdown(
                "stub close failure".to_string(),
            )),
            CloseBehavior::Hang => std::future::pending().await,
        }
    }
}
