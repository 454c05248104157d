//! Lifecycle-specific error types

use super::Phase;
use thiserror::Error;

/// Errors that can occur during lifecycle operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("the application has already started")]
    AlreadyStarted,

    #[error("the application is not running")]
    NotRunning,

    /// A hook returned an error; the remaining hooks of the chain were skipped.
    #[error("{phase} hook failed: {source}")]
    HookFailed {
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },

    #[error("{phase} hook panicked: {message}")]
    HookPanicked { phase: Phase, message: String },

    #[error("termination signal stream ended before any signal")]
    SignalsClosed,

    /// Installing an OS signal handler failed.
    #[error("failed to listen for shutdown signals: {0}")]
    Signal(#[from] std::io::Error),
}

impl LifecycleError {
    /// The phase whose hook failed, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::HookFailed { phase, .. } | Self::HookPanicked { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// A specialized Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
