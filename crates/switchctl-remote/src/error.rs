//! Remote transport errors.

use thiserror::Error;

/// Result type alias for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors raised by the remote executor or by a failed command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("connection failed: {message}")]
    Connect { host: String, message: String },

    #[error("failed to start transport: {0}")]
    Spawn(String),

    #[error("transport I/O error: {0}")]
    Io(String),

    #[error("command exited with status {0}")]
    ExitStatus(i32),

    #[error("command terminated by signal")]
    Terminated,

    #[error("not connected")]
    NotConnected,

    #[error("invalid version information: {0}")]
    InvalidVersion(String),
}
