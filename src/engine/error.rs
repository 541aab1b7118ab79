//! Runtime errors of the engine.

use thiserror::Error;

/// Errors returned by machine operations.
///
/// Failures of user code never surface here directly: they go through the
/// exception policy first. Only what that policy cannot absorb is returned.
#[derive(Debug, Error)]
pub enum MachineError {
    /// A chain of anonymous transitions did not settle.
    #[error("Anonymous transitions in region {region} did not settle after {limit} steps")]
    AnonymousTransitionLimit { region: String, limit: usize },

    /// User code failed while the machine was handling an `Exception` event
    /// and no exception hook is configured.
    #[error("Unhandled exception: {0:#}")]
    UnhandledException(anyhow::Error),
}

impl MachineError {
    /// Whether the error was raised by user code rather than by the engine.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::UnhandledException(_))
    }
}
