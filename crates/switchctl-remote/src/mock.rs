//! Scripted in-memory executor.
//!
//! Responses are matched by hostname (or `"*"` for any host) and command
//! prefix; the most recently registered matching rule wins. Unmatched
//! version queries report version `1.0.0`; every other unmatched command
//! exits 0 with no output.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::RemoteError;
use crate::executor::{
    CloseFuture, ConnectFuture, ExecFuture, ExecOutput, HostTarget, RemoteExecutor, RemoteSession,
};

/// Wildcard hostname for [`MockExecutor::respond`].
pub const ANY_HOST: &str = "*";

/// Scripted outcome of one command.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    TransportError(String),
}

impl MockResponse {
    pub fn ok(stdout: &str) -> Self {
        Self::Exit {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn exit(code: i32, stderr: &str) -> Self {
        Self::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn transport_error(message: &str) -> Self {
        Self::TransportError(message.to_string())
    }

    fn into_result(self) -> Result<ExecOutput, RemoteError> {
        match self {
            Self::Exit {
                code,
                stdout,
                stderr,
            } => {
                let mut output = ExecOutput::with_exit_code(code);
                for line in stdout.lines() {
                    output.push_stdout(line);
                }
                for line in stderr.lines() {
                    output.push_stderr(line);
                }
                Ok(output)
            }
            Self::TransportError(message) => Err(RemoteError::Io(message)),
        }
    }
}

/// A command observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCommand {
    pub hostname: String,
    pub command: String,
}

#[derive(Debug, Clone)]
struct Rule {
    hostname: String,
    prefix: String,
    response: MockResponse,
}

#[derive(Debug, Default)]
struct MockState {
    failing_hosts: Vec<String>,
    rules: Vec<Rule>,
    latency: Duration,
    connects: Vec<String>,
    executed: Vec<ExecutedCommand>,
    closes: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Executor whose behaviour is scripted per host and command.
///
/// Cloning shares the script and the recorded observations.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    state: Arc<Mutex<MockState>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make connecting to `hostname` fail.
    pub fn fail_connect(self, hostname: &str) -> Self {
        self.lock().failing_hosts.push(hostname.to_string());
        self
    }

    /// Script the response to commands on `hostname` starting with `prefix`.
    pub fn respond(self, hostname: &str, prefix: &str, response: MockResponse) -> Self {
        self.lock().rules.push(Rule {
            hostname: hostname.to_string(),
            prefix: prefix.to_string(),
            response,
        });
        self
    }

    /// Script the version reported by `hostname`.
    pub fn with_version(self, hostname: &str, version: &str, mtime: &str) -> Self {
        let json = format!(
            "{{\"currentVersion\":\"{version}\",\"currentVersionMtime\":\"{mtime}\"}}"
        );
        self.respond(hostname, "switch -i ", MockResponse::ok(&json))
    }

    /// Delay applied to every connect and command.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    /// Hostnames connected to, in order.
    pub fn connects(&self) -> Vec<String> {
        self.lock().connects.clone()
    }

    pub fn executed(&self) -> Vec<ExecutedCommand> {
        self.lock().executed.clone()
    }

    /// Commands run on `hostname`, in order.
    pub fn executed_on(&self, hostname: &str) -> Vec<String> {
        self.lock()
            .executed
            .iter()
            .filter(|c| c.hostname == hostname)
            .map(|c| c.command.clone())
            .collect()
    }

    /// Hostnames whose sessions were closed, in order.
    pub fn closes(&self) -> Vec<String> {
        self.lock().closes.clone()
    }

    /// Highest number of hosts busy at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    fn enter(&self) -> Duration {
        let mut state = self.lock();
        state.in_flight += 1;
        state.max_in_flight = state.max_in_flight.max(state.in_flight);
        state.latency
    }

    fn leave(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    fn response_for(&self, hostname: &str, command: &str) -> MockResponse {
        let state = self.lock();
        let scripted = state
            .rules
            .iter()
            .rev()
            .find(|r| {
                (r.hostname == hostname || r.hostname == ANY_HOST)
                    && command.starts_with(&r.prefix)
            })
            .map(|r| r.response.clone());

        scripted.unwrap_or_else(|| {
            if command.starts_with("switch -i ") {
                MockResponse::ok(
                    "{\"currentVersion\":\"1.0.0\",\"currentVersionMtime\":\"2020-01-01 00:00:00\"}",
                )
            } else {
                MockResponse::ok("")
            }
        })
    }
}

impl RemoteExecutor for MockExecutor {
    fn connect<'a>(&'a self, target: &'a HostTarget) -> ConnectFuture<'a> {
        Box::pin(async move {
            let latency = self.enter();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            self.leave();

            let mut state = self.lock();
            state.connects.push(target.hostname.clone());
            if state.failing_hosts.contains(&target.hostname) {
                return Err(RemoteError::Connect {
                    host: target.hostname.clone(),
                    message: "connection refused".to_string(),
                });
            }
            drop(state);

            Ok(Box::new(MockSession {
                hostname: target.hostname.clone(),
                executor: self.clone(),
                open: true,
            }) as Box<dyn RemoteSession>)
        })
    }
}

#[derive(Debug)]
struct MockSession {
    hostname: String,
    executor: MockExecutor,
    open: bool,
}

impl RemoteSession for MockSession {
    fn execute<'a>(&'a mut self, command: &'a str) -> ExecFuture<'a> {
        Box::pin(async move {
            if !self.open {
                return Err(RemoteError::NotConnected);
            }

            let latency = self.executor.enter();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            self.executor.leave();

            self.executor.lock().executed.push(ExecutedCommand {
                hostname: self.hostname.clone(),
                command: command.to_string(),
            });
            self.executor
                .response_for(&self.hostname, command)
                .into_result()
        })
    }

    fn close(&mut self) -> CloseFuture<'_> {
        Box::pin(async move {
            if self.open {
                self.open = false;
                self.executor.lock().closes.push(self.hostname.clone());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str) -> HostTarget {
        HostTarget {
            hostname: name.to_string(),
            port: 22,
            username: "deploy".to_string(),
        }
    }

    #[tokio::test]
    async fn latest_matching_rule_wins() {
        let exec = MockExecutor::new()
            .respond(ANY_HOST, "switch -a", MockResponse::exit(1, "generic"))
            .respond("web2", "switch -a", MockResponse::ok("fine"));

        let mut s1 = exec.connect(&target("web1")).await.unwrap();
        let mut s2 = exec.connect(&target("web2")).await.unwrap();

        assert_eq!(s1.execute("switch -a foo").await.unwrap().exit_code, Some(1));
        assert_eq!(s2.execute("switch -a foo").await.unwrap().stdout, "fine\n");
    }

    #[tokio::test]
    async fn default_version_response_is_json() {
        let exec = MockExecutor::new();
        let mut s = exec.connect(&target("web1")).await.unwrap();
        let out = s.execute("switch -i -a foo").await.unwrap();
        assert!(out.stdout.contains("currentVersion"));
    }

    #[tokio::test]
    async fn closed_session_rejects_commands() {
        let exec = MockExecutor::new();
        let mut s = exec.connect(&target("web1")).await.unwrap();
        s.close().await;
        s.close().await;
        assert_eq!(s.execute("true").await, Err(RemoteError::NotConnected));
        assert_eq!(exec.closes().len(), 1);
    }
}
