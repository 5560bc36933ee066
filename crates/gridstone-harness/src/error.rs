//! Harness error taxonomy.
//!
//! Acquisition failures always propagate: a broken test environment must
//! not silently appear ready. Release failures never propagate; they are
//! folded into a [`ShutdownError`] and logged, so teardown cannot mask a
//! test's own result.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed error payload carried across the harness API boundary.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by harness acquisition and accessors.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Construction-time contract violation, e.g. a zero count.
    #[error("invalid harness configuration: {what}")]
    InvalidConfiguration {
        /// Which contract was violated.
        what: String,
    },

    /// A variant tag outside the known set. Never falls back to a
    /// default.
    #[error("unsupported cluster variant tag {tag:?}")]
    UnsupportedVariant {
        /// The rejected tag.
        tag: String,
    },

    /// Acquire was called while a cluster is already active.
    #[error("harness already acquired; one harness drives one test scope at a time")]
    AlreadyAcquired,

    /// Executor or client construction failed during acquisition.
    #[error("cluster startup failed: {source}")]
    Startup {
        /// Underlying cause.
        #[source]
        source: BoxedError,
    },

    /// The administrative client was not enabled at construction.
    #[error("administrative client support is disabled; enable it when constructing the harness")]
    ClientDisabled,

    /// The administrative client is gone (harness released or never
    /// acquired).
    #[error("administrative client is not available outside the active window")]
    ClientUnavailable,
}

impl HarnessError {
    pub(crate) fn startup(source: impl Into<BoxedError>) -> Self {
        Self::Startup {
            source: source.into(),
        }
    }
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Marker error reported when the bounded executor close exceeds its
/// timeout. The close may still finish in the background; the harness
/// stops waiting and moves on.
#[derive(Error, Debug)]
#[error("executor close did not complete within {timeout:?}")]
pub struct ShutdownTimeout {
    /// The configured shutdown timeout.
    pub timeout: Duration,
}

/// Aggregate of every failure observed during one teardown pass.
///
/// The earliest failure is preserved as the primary cause; later ones are
/// attached as suppressed context. Nothing is discarded silently.
#[derive(Debug)]
pub struct ShutdownError {
    primary: BoxedError,
    suppressed: Vec<BoxedError>,
}

impl ShutdownError {
    /// Wraps the first observed failure.
    pub fn new(primary: impl Into<BoxedError>) -> Self {
        Self {
            primary: primary.into(),
            suppressed: Vec::new(),
        }
    }

    /// Folds `next` into `acc`: the first error becomes the primary
    /// cause, every later one is recorded as suppressed.
    pub fn fold(acc: Option<Self>, next: impl Into<BoxedError>) -> Self {
        match acc {
            None => Self::new(next),
            Some(mut acc) => {
                acc.suppressed.push(next.into());
                acc
            }
        }
    }

    /// The first failure observed.
    pub fn primary(&self) -> &(dyn std::error::Error + Send + Sync) {
        self.primary.as_ref()
    }

    /// Failures observed after the primary, in order.
    pub fn suppressed(&self) -> &[BoxedError] {
        &self.suppressed
    }
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shutdown failed: {}", self.primary)?;
        if !self.suppressed.is_empty() {
            write!(f, " ({} suppressed:", self.suppressed.len())?;
            for error in &self.suppressed {
                write!(f, " [{error}]")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for ShutdownError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.primary.as_ref())
    }
}
