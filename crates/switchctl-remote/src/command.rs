//! Remote commands and their records.
//!
//! Three fixed commands are sent to the `switch` agent on each host:
//!
//! | Purpose       | Command line                                |
//! |---------------|---------------------------------------------|
//! | version query | `switch -i -a <app>`                        |
//! | prefetch      | `switch -a <app> -v <version> --prefetch`   |
//! | switch        | `switch -a <app> -v <version> -y [-n]`      |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, RemoteResult};
use crate::executor::ExecOutput;

/// One remote invocation and its captured output.
///
/// Appended to the owning host's history once complete and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub command_line: String,
    pub description: String,
    pub stdout: String,
    pub stderr: String,
    pub combined: String,
    pub exit_code: Option<i32>,
    pub error: Option<RemoteError>,
}

impl Command {
    pub fn new(command_line: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            description: description.into(),
            stdout: String::new(),
            stderr: String::new(),
            combined: String::new(),
            exit_code: None,
            error: None,
        }
    }

    /// Query the deployed version of `application`.
    pub fn version_query(application: &str) -> Self {
        Self::new(
            format!("switch -i -a {}", shell_quote(application)),
            "get version information",
        )
    }

    /// Stage `version` of `application` without activating it.
    pub fn prefetch(application: &str, version: &str) -> Self {
        Self::new(
            format!(
                "switch -a {} -v {} --prefetch",
                shell_quote(application),
                shell_quote(version)
            ),
            "prefetch artifact",
        )
    }

    /// Activate `version` of `application`; `-n` makes the agent only
    /// report what it would do.
    pub fn switch(application: &str, version: &str, dryrun: bool) -> Self {
        let mut line = format!(
            "switch -a {} -v {} -y",
            shell_quote(application),
            shell_quote(version)
        );
        if dryrun {
            line.push_str(" -n");
        }
        Self::new(line, "switch application")
    }

    /// Fill in the outcome of running this command.
    pub fn complete(mut self, result: RemoteResult<ExecOutput>) -> Self {
        match result {
            Ok(output) => {
                self.error = match output.exit_code {
                    Some(0) => None,
                    Some(code) => Some(RemoteError::ExitStatus(code)),
                    None => Some(RemoteError::Terminated),
                };
                self.stdout = output.stdout;
                self.stderr = output.stderr;
                self.combined = output.combined;
                self.exit_code = output.exit_code;
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Version information reported by the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    #[serde(default)]
    pub current_version: Option<String>,
    #[serde(default)]
    pub current_version_mtime: Option<String>,
}

impl Version {
    /// Parse the first JSON document in the agent's stdout; anything the
    /// agent prints after it is ignored.
    pub fn parse(stdout: &str) -> Result<Self, serde_json::Error> {
        let mut stream = serde_json::Deserializer::from_str(stdout).into_iter::<Version>();
        match stream.next() {
            Some(version) => version,
            // Force the decoder's own "EOF while parsing" error.
            None => serde_json::from_str::<Version>(stdout),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self.current_version.as_deref().filter(|v| !v.is_empty());
        let mtime = self.current_version_mtime.as_deref().filter(|m| !m.is_empty());
        match (version, mtime) {
            (Some(v), Some(m)) => write!(f, "{v} [{m}]"),
            (Some(v), None) => f.write_str(v),
            (None, _) => f.write_str("<not_found>"),
        }
    }
}

/// Render a possibly missing version; `<error>` means none was obtained.
pub fn describe_version(version: Option<&Version>) -> String {
    match version {
        Some(v) => v.to_string(),
        None => "<error>".to_string(),
    }
}

/// A recorded failure, with the command that produced it if any.
///
/// Used for reporting only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub message: String,
    pub command: Option<Command>,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            command: None,
        }
    }

    pub fn with_command(message: impl Into<String>, command: Command) -> Self {
        Self {
            message: message.into(),
            command: Some(command),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Quote `arg` for the remote shell. Plain words pass through unchanged.
fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ':' | '+' | '/'));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
