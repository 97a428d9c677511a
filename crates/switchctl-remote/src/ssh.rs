//! Executor backed by the system OpenSSH client.
//!
//! ```text
//!   connect  ──► ssh -o ControlMaster=auto ... host true     (opens master)
//!   execute  ──► ssh -o ControlMaster=auto ... host <cmd>    (reuses master)
//!   close    ──► ssh -o ControlMaster=auto ... -O exit host  (stops master)
//! ```
//!
//! Authentication is left to ssh itself (agent or keys, `BatchMode=yes` so
//! it never prompts). Connection timeouts are ssh's own. Control sockets
//! live in a private temporary directory owned by the executor.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::error::{RemoteError, RemoteResult};
use crate::executor::{
    CloseFuture, ConnectFuture, ExecFuture, ExecOutput, HostTarget, RemoteExecutor, RemoteSession,
};

/// How long to keep reading output after ssh has exited. A backgrounded
/// master can hold the pipes open.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// OpenSSH client settings.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// ssh binary to run.
    pub program: PathBuf,
    pub connect_timeout: Duration,
    pub server_alive_interval: Duration,
    pub server_alive_count_max: u32,
    /// How long an idle master connection survives.
    pub control_persist: Duration,
    pub identity_file: Option<PathBuf>,
    pub strict_host_key_checking: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ssh"),
            connect_timeout: Duration::from_secs(10),
            server_alive_interval: Duration::from_secs(15),
            server_alive_count_max: 3,
            control_persist: Duration::from_secs(60),
            identity_file: None,
            strict_host_key_checking: "accept-new".to_string(),
        }
    }
}

/// [`RemoteExecutor`] that shells out to `ssh`.
#[derive(Debug)]
pub struct SshExecutor {
    config: Arc<SshConfig>,
    control_dir: tempfile::TempDir,
}

impl SshExecutor {
    pub fn new(config: SshConfig) -> RemoteResult<Self> {
        let control_dir = tempfile::Builder::new()
            .prefix("switchctl-ssh-")
            .tempdir()
            .map_err(|e| RemoteError::Io(format!("creating control directory: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            control_dir,
        })
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Directory holding the multiplexing sockets.
    pub fn control_dir(&self) -> &Path {
        self.control_dir.path()
    }

    /// Options shared by every invocation for `target`.
    fn options(&self, target: &HostTarget) -> Vec<String> {
        let c = &self.config;
        let mut args = Vec::new();
        let mut opt = |value: String| {
            args.push("-o".to_string());
            args.push(value);
        };

        opt("BatchMode=yes".to_string());
        opt(format!("ConnectTimeout={}", c.connect_timeout.as_secs().max(1)));
        opt(format!("StrictHostKeyChecking={}", c.strict_host_key_checking));
        opt(format!("ServerAliveInterval={}", c.server_alive_interval.as_secs()));
        opt(format!("ServerAliveCountMax={}", c.server_alive_count_max));
        opt("ControlMaster=auto".to_string());
        opt(format!("ControlPath={}/%C", self.control_dir.path().display()));
        opt(format!("ControlPersist={}", c.control_persist.as_secs().max(1)));

        args.push("-p".to_string());
        args.push(target.port.to_string());

        if let Some(identity) = &c.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        if !target.username.is_empty() {
            args.push("-l".to_string());
            args.push(target.username.clone());
        }
        args
    }
}

impl RemoteExecutor for SshExecutor {
    fn connect<'a>(&'a self, target: &'a HostTarget) -> ConnectFuture<'a> {
        Box::pin(async move {
            let mut session = SshSession {
                hostname: target.hostname.clone(),
                program: self.config.program.clone(),
                options: self.options(target),
                open: false,
            };

            let output = run_ssh(&session.program, &session.args_for("true")).await?;
            if !output.success() {
                let message = match output.stderr.trim() {
                    "" => match output.exit_code {
                        Some(code) => format!("ssh exited with status {code}"),
                        None => "ssh terminated by signal".to_string(),
                    },
                    stderr => stderr.to_string(),
                };
                return Err(RemoteError::Connect {
                    host: target.hostname.clone(),
                    message,
                });
            }

            debug!(host = %target.hostname, port = target.port, "ssh master established");
            session.open = true;
            Ok(Box::new(session) as Box<dyn RemoteSession>)
        })
    }
}

#[derive(Debug)]
struct SshSession {
    hostname: String,
    program: PathBuf,
    options: Vec<String>,
    open: bool,
}

impl SshSession {
    fn args_for(&self, command: &str) -> Vec<String> {
        let mut args = self.options.clone();
        args.push(self.hostname.clone());
        args.push(command.to_string());
        args
    }
}

impl RemoteSession for SshSession {
    fn execute<'a>(&'a mut self, command: &'a str) -> ExecFuture<'a> {
        Box::pin(async move {
            if !self.open {
                return Err(RemoteError::NotConnected);
            }
            run_ssh(&self.program, &self.args_for(command)).await
        })
    }

    fn close(&mut self) -> CloseFuture<'_> {
        Box::pin(async move {
            if !self.open {
                return;
            }
            self.open = false;

            let mut args = self.options.clone();
            args.push("-O".to_string());
            args.push("exit".to_string());
            args.push(self.hostname.clone());

            match run_ssh(&self.program, &args).await {
                Ok(output) if output.success() => {}
                Ok(output) => {
                    debug!(host = %self.hostname, exit_code = ?output.exit_code, "ssh -O exit reported failure")
                }
                Err(e) => warn!(host = %self.hostname, error = %e, "failed to stop ssh master"),
            }
        })
    }
}

/// Run `program` with `args`, capturing stdout and stderr line by line in
/// arrival order.
async fn run_ssh(program: &Path, args: &[String]) -> RemoteResult<ExecOutput> {
    let mut child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RemoteError::Spawn(format!("{}: {e}", program.display())))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RemoteError::Io("stdout was not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| RemoteError::Io("stderr was not captured".to_string()))?;

    let mut out = BufReader::new(stdout);
    let mut err = BufReader::new(stderr);
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();
    let mut output = ExecOutput::default();
    let mut out_done = false;
    let mut err_done = false;

    let status = loop {
        tokio::select! {
            line = next_line(&mut out, &mut out_buf), if !out_done => match line {
                Some(line) => output.push_stdout(&line),
                None => out_done = true,
            },
            line = next_line(&mut err, &mut err_buf), if !err_done => match line {
                Some(line) => output.push_stderr(&line),
                None => err_done = true,
            },
            status = child.wait() => {
                break status.map_err(|e| RemoteError::Io(e.to_string()))?;
            }
        }
    };

    let drain = async {
        while !(out_done && err_done) {
            tokio::select! {
                line = next_line(&mut out, &mut out_buf), if !out_done => match line {
                    Some(line) => output.push_stdout(&line),
                    None => out_done = true,
                },
                line = next_line(&mut err, &mut err_buf), if !err_done => match line {
                    Some(line) => output.push_stderr(&line),
                    None => err_done = true,
                },
            }
        }
    };
    if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
        debug!(program = %program.display(), "output still open after exit, stopped reading");
    }

    output.exit_code = status.code();
    Ok(output)
}

/// Next line from `reader`, decoded lossily without its line ending.
/// `None` at EOF or on a read error.
///
/// Bytes of an unfinished line stay in `buf`, so a call dropped by
/// `select!` loses nothing.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    match reader.read_until(b'\n', buf).await {
        Ok(0) if buf.is_empty() => return None,
        Ok(_) => {}
        Err(e) => {
            debug!(error = %e, "stopped reading command output");
            return None;
        }
    }

    let mut end = buf.len();
    if buf[..end].ends_with(b"\n") {
        end -= 1;
    }
    if buf[..end].ends_with(b"\r") {
        end -= 1;
    }
    let line = String::from_utf8_lossy(&buf[..end]).into_owned();
    buf.clear();
    Some(line)
}
