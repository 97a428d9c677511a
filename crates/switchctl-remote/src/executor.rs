//! Remote executor capability.
//!
//! The transport is injected so the rollout pipeline can run against the
//! system ssh client in production and a scripted executor in tests.
//! Futures are boxed to keep both traits object-safe.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::RemoteResult;

/// Boxed future returned by [`RemoteExecutor::connect`].
pub type ConnectFuture<'a> =
    Pin<Box<dyn Future<Output = RemoteResult<Box<dyn RemoteSession>>> + Send + 'a>>;

/// Boxed future returned by [`RemoteSession::execute`].
pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = RemoteResult<ExecOutput>> + Send + 'a>>;

/// Boxed future returned by [`RemoteSession::close`].
pub type CloseFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostTarget {
    pub hostname: String,
    pub port: u16,
    pub username: String,
}

impl fmt::Display for HostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.username.is_empty() {
            write!(f, "{}:{}", self.hostname, self.port)
        } else {
            write!(f, "{}@{}:{}", self.username, self.hostname, self.port)
        }
    }
}

/// Captured output of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// stdout and stderr interleaved in arrival order.
    pub combined: String,
    /// `None` when the command was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    /// Output of a command that exited with `exit_code`.
    pub fn with_exit_code(exit_code: i32) -> Self {
        Self {
            exit_code: Some(exit_code),
            ..Default::default()
        }
    }

    /// Append a line to stdout.
    pub fn push_stdout(&mut self, line: &str) {
        self.stdout.push_str(line);
        self.stdout.push('\n');
        self.combined.push_str(line);
        self.combined.push('\n');
    }

    /// Append a line to stderr.
    pub fn push_stderr(&mut self, line: &str) {
        self.stderr.push_str(line);
        self.stderr.push('\n');
        self.combined.push_str(line);
        self.combined.push('\n');
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Opens sessions to remote hosts.
pub trait RemoteExecutor: Send + Sync {
    /// Establish a session; fails if the host is unreachable or rejects
    /// authentication.
    fn connect<'a>(&'a self, target: &'a HostTarget) -> ConnectFuture<'a>;
}

/// An open session to one host.
pub trait RemoteSession: Send + fmt::Debug {
    /// Run a command, capturing its output. A command that runs and exits
    /// non-zero is `Ok` with the exit code set; `Err` means the transport
    /// failed.
    fn execute<'a>(&'a mut self, command: &'a str) -> ExecFuture<'a>;

    /// Release the session. Must be safe to call more than once.
    fn close(&mut self) -> CloseFuture<'_>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_output_interleaves_streams() {
        let mut out = ExecOutput::default();
        out.push_stdout("one");
        out.push_stderr("two");
        out.push_stdout("three");
        assert_eq!(out.stdout, "one\nthree\n");
        assert_eq!(out.stderr, "two\n");
        assert_eq!(out.combined, "one\ntwo\nthree\n");
    }

    #[test]
    fn success_requires_zero_exit() {
        assert!(ExecOutput::with_exit_code(0).success());
        assert!(!ExecOutput::with_exit_code(1).success());
        assert!(!ExecOutput::default().success());
    }

    #[test]
    fn target_display() {
        let t = HostTarget {
            hostname: "foo-production1".to_string(),
            port: 22,
            username: "deploy".to_string(),
        };
        assert_eq!(t.to_string(), "deploy@foo-production1:22");
    }
}
