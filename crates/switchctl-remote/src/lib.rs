//! switchctl-remote — one managed application instance on one host.
//!
//! # Components
//!
//! - **`executor`** — the injected transport capability (connect, run a
//!   command capturing its output, close)
//! - **`ssh`** — executor backed by the system OpenSSH client
//! - **`host`** — `RemoteHost` state: connection, current version,
//!   command history, errors
//! - **`command`** — the three fixed remote commands and their records
//! - **`mock`** — scripted executor for tests (`mock` feature)

pub mod command;
pub mod error;
pub mod executor;
pub mod host;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ssh;

pub use command::{Command, ErrorRecord, Version, describe_version};
pub use error::{RemoteError, RemoteResult};
pub use executor::{
    CloseFuture, ConnectFuture, ExecFuture, ExecOutput, HostTarget, RemoteExecutor, RemoteSession,
};
pub use host::RemoteHost;
pub use ssh::{SshConfig, SshExecutor};
