//! Rollout error taxonomy.

use switchctl_remote::RemoteError;
use thiserror::Error;

/// Result type alias for rollout operations.
pub type RolloutResult<T> = Result<T, RolloutError>;

/// Application-level failure of a rollout phase.
///
/// Host-level failures are recorded on the host and the application
/// before one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RolloutError {
    #[error("{host}: {source}")]
    ConnectFailure {
        host: String,
        #[source]
        source: RemoteError,
    },

    #[error("{host}: failed to prefetch artifact {application} ({version})")]
    PrefetchFailure {
        host: String,
        application: String,
        version: String,
        #[source]
        source: RemoteError,
    },

    #[error("{host}: failed to switch {application} to {version}")]
    SwitchFailure {
        host: String,
        application: String,
        version: String,
        #[source]
        source: RemoteError,
    },

    #[error("{0}: no successful instance found")]
    NoSuccessfulInstance(String),

    #[error("{application}: cannot {operation} in state {state}")]
    InvalidState {
        application: String,
        operation: &'static str,
        state: String,
    },

    #[error("concurrency gate closed")]
    GateClosed,
}
