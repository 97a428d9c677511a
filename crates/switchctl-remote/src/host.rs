//! Per-host state.
//!
//! ```text
//!   new ──connect()──► connected ──get_version()──► (version | error recorded)
//!    │                    │
//!    │ failure            ├──prefetch()────► Command
//!    ▼                    └──switch_version()► Command
//!  error recorded
//! ```
//!
//! Transitions are monotonic: a host is never reconnected or retried.
//! Every remote invocation is appended to the command history, and every
//! failure is recorded before it is returned to the caller.

use std::fmt;

use tracing::{debug, warn};

use crate::command::{Command, ErrorRecord, Version};
use crate::error::{RemoteError, RemoteResult};
use crate::executor::{HostTarget, RemoteExecutor, RemoteSession};

/// One application instance on one host.
pub struct RemoteHost {
    target: HostTarget,
    dryrun: bool,
    session: Option<Box<dyn RemoteSession>>,
    connected: bool,
    current_version: Option<Version>,
    commands: Vec<Command>,
    errors: Vec<ErrorRecord>,
}

impl RemoteHost {
    pub fn new(target: HostTarget, dryrun: bool) -> Self {
        Self {
            target,
            dryrun,
            session: None,
            connected: false,
            current_version: None,
            commands: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.target.hostname
    }

    pub fn target(&self) -> &HostTarget {
        &self.target
    }

    pub fn dryrun(&self) -> bool {
        self.dryrun
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn current_version(&self) -> Option<&Version> {
        self.current_version.as_ref()
    }

    /// Command history, oldest first.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn record_error(&mut self, record: ErrorRecord) {
        self.errors.push(record);
    }

    /// Open a session through `executor`.
    ///
    /// On failure the error is recorded and the host stays disconnected.
    /// Calling this on an already connected host is a no-op.
    pub async fn connect(&mut self, executor: &dyn RemoteExecutor) -> RemoteResult<()> {
        if self.connected {
            return Ok(());
        }

        match executor.connect(&self.target).await {
            Ok(session) => {
                debug!(host = %self.target.hostname, "connected");
                self.session = Some(session);
                self.connected = true;
                Ok(())
            }
            Err(e) => {
                warn!(host = %self.target.hostname, error = %e, "connect failed");
                self.errors
                    .push(ErrorRecord::new(format!("{}: {e}", self.target)));
                Err(e)
            }
        }
    }

    /// Query the deployed version of `application`.
    ///
    /// Failures are recorded on the host and leave the version unset; they
    /// never change the connection state.
    pub async fn get_version(&mut self, application: &str) -> RemoteResult<&Version> {
        let command = self.run(Command::version_query(application)).await;
        if let Some(e) = command.error.clone() {
            return Err(e);
        }

        match Version::parse(&command.stdout) {
            Ok(version) => {
                debug!(host = %self.target.hostname, %application, %version, "current version");
                Ok(&*self.current_version.insert(version))
            }
            Err(e) => {
                warn!(
                    host = %self.target.hostname,
                    %application,
                    error = %e,
                    "could not parse version information"
                );
                self.errors.push(ErrorRecord::with_command(
                    format!("parsing version information failed: {e}"),
                    command,
                ));
                Err(RemoteError::InvalidVersion(e.to_string()))
            }
        }
    }

    /// Stage `version` of `application` on this host.
    pub async fn prefetch(&mut self, application: &str, version: &str) -> Command {
        self.run(Command::prefetch(application, version)).await
    }

    /// Activate `version` of `application`, honouring the host's dry-run
    /// flag.
    pub async fn switch_version(&mut self, application: &str, version: &str) -> Command {
        self.run(Command::switch(application, version, self.dryrun)).await
    }

    /// Release the session. Idempotent; safe on a never-connected host.
    pub async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
            debug!(host = %self.target.hostname, "session closed");
        }
        self.connected = false;
    }

    async fn run(&mut self, command: Command) -> Command {
        let result = match self.session.as_mut() {
            Some(session) => session.execute(&command.command_line).await,
            None => Err(RemoteError::NotConnected),
        };
        let command = command.complete(result);

        if let Some(e) = &command.error {
            warn!(
                host = %self.target.hostname,
                command = %command.command_line,
                error = %e,
                output = %command.combined.trim_end(),
                "{} failed",
                command.description
            );
            self.errors.push(ErrorRecord::with_command(
                format!("{} failed: {e}", command.description),
                command.clone(),
            ));
        }

        self.commands.push(command.clone());
        command
    }
}

impl fmt::Debug for RemoteHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteHost")
            .field("target", &self.target)
            .field("dryrun", &self.dryrun)
            .field("connected", &self.connected)
            .field("current_version", &self.current_version)
            .field("commands", &self.commands.len())
            .field("errors", &self.errors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockExecutor, MockResponse};

    fn host(name: &str, dryrun: bool) -> RemoteHost {
        RemoteHost::new(
            HostTarget {
                hostname: name.to_string(),
                port: 22,
                username: "deploy".to_string(),
            },
            dryrun,
        )
    }

    #[tokio::test]
    async fn connect_failure_is_recorded() {
        let exec = MockExecutor::new().fail_connect("web1");
        let mut h = host("web1", false);

        assert!(h.connect(&exec).await.is_err());
        assert!(!h.is_connected());
        assert_eq!(h.errors().len(), 1);
        assert!(h.errors()[0].command.is_none());
    }

    #[tokio::test]
    async fn version_query_parses_json() {
        let exec = MockExecutor::new().with_version("web1", "2.0.1", "2021-03-04");
        let mut h = host("web1", false);
        h.connect(&exec).await.unwrap();

        let version = h.get_version("foo").await.unwrap();
        assert_eq!(version.to_string(), "2.0.1 [2021-03-04]");
        assert_eq!(h.commands().len(), 1);
        assert_eq!(h.commands()[0].command_line, "switch -i -a foo");
        assert!(!h.has_errors());
    }

    #[tokio::test]
    async fn unparseable_version_is_non_fatal() {
        let exec = MockExecutor::new().respond("web1", "switch -i", MockResponse::ok("garbage"));
        let mut h = host("web1", false);
        h.connect(&exec).await.unwrap();

        assert!(h.get_version("foo").await.is_err());
        assert!(h.is_connected());
        assert!(h.current_version().is_none());
        assert_eq!(h.errors().len(), 1);
        assert!(h.errors()[0].command.is_some());
    }

    #[tokio::test]
    async fn failed_prefetch_keeps_output() {
        let exec = MockExecutor::new().respond(
            "web1",
            "switch -a foo -v 1.0 --prefetch",
            MockResponse::exit(2, "download failed"),
        );
        let mut h = host("web1", false);
        h.connect(&exec).await.unwrap();

        let cmd = h.prefetch("foo", "1.0").await;
        assert_eq!(cmd.error, Some(RemoteError::ExitStatus(2)));
        assert_eq!(cmd.combined, "download failed\n");
        assert!(h.has_errors());
    }

    #[tokio::test]
    async fn switch_uses_dryrun_flag() {
        let exec = MockExecutor::new();
        let mut h = host("web1", true);
        h.connect(&exec).await.unwrap();

        let cmd = h.switch_version("foo", "1.0").await;
        assert!(!cmd.failed());
        assert_eq!(exec.executed_on("web1"), vec!["switch -a foo -v 1.0 -y -n"]);
    }

    #[tokio::test]
    async fn commands_without_session_fail() {
        let mut h = host("web1", false);
        let cmd = h.prefetch("foo", "1.0").await;
        assert_eq!(cmd.error, Some(RemoteError::NotConnected));
        assert_eq!(h.commands().len(), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let exec = MockExecutor::new();
        let mut h = host("web1", false);
        h.close().await;

        h.connect(&exec).await.unwrap();
        h.close().await;
        h.close().await;
        assert!(!h.is_connected());
        assert_eq!(exec.closes(), vec!["web1"]);
    }
}
