//! Application pipeline — drives one `name:version` pair through
//! Load (resolve, connect, version query, prefetch) and Switch.
//!
//! ```text
//!  Pending ─► Resolved ─► Connecting ─┬─► Connected ─► Prefetching ─┬─► Ready ─► Switching ─┬─► Switched
//!                                     └─► ConnectFailed             └─► PrefetchFailed      └─► SwitchFailed
//! ```
//!
//! Hosts live in three named lists. `pending` holds resolved hosts that
//! the current phase has not attempted yet; each phase drains it (or the
//! previous phase's `successful` list) into `successful` and `failed`.
//! Under the strict policy a phase stops at the first failing host and
//! the hosts it never reached stay in `pending`.

use std::fmt;
use std::mem;

use switchctl_core::ApplicationRequest;
use switchctl_remote::{ErrorRecord, RemoteHost};
use tracing::{debug, info, warn};

use crate::context::RolloutContext;
use crate::error::{RolloutError, RolloutResult};
use crate::events::Phase;

/// Pipeline state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationState {
    Pending,
    Resolved,
    Connecting,
    Connected,
    ConnectFailed,
    Prefetching,
    Ready,
    PrefetchFailed,
    Switching,
    Switched,
    SwitchFailed,
}

impl ApplicationState {
    pub fn is_failed(self) -> bool {
        matches!(
            self,
            Self::ConnectFailed | Self::PrefetchFailed | Self::SwitchFailed
        )
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::ConnectFailed => "connect-failed",
            Self::Prefetching => "prefetching",
            Self::Ready => "ready",
            Self::PrefetchFailed => "prefetch-failed",
            Self::Switching => "switching",
            Self::Switched => "switched",
            Self::SwitchFailed => "switch-failed",
        };
        f.write_str(s)
    }
}

/// One requested application and the instances that run it.
#[derive(Debug)]
pub struct Application {
    name: String,
    version: String,
    state: ApplicationState,
    pending: Vec<RemoteHost>,
    successful: Vec<RemoteHost>,
    failed: Vec<RemoteHost>,
    errors: Vec<ErrorRecord>,
}

impl Application {
    pub fn new(request: &ApplicationRequest) -> Self {
        Self {
            name: request.name.clone(),
            version: request.version.clone(),
            state: ApplicationState::Pending,
            pending: Vec::new(),
            successful: Vec::new(),
            failed: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target version.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> ApplicationState {
        self.state
    }

    pub fn successful_instances(&self) -> &[RemoteHost] {
        &self.successful
    }

    pub fn failed_instances(&self) -> &[RemoteHost] {
        &self.failed
    }

    /// Resolved hosts no phase has attempted yet.
    pub fn unattempted_instances(&self) -> &[RemoteHost] {
        &self.pending
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Resolve, connect, query versions, then prefetch.
    pub async fn load(&mut self, ctx: &RolloutContext) -> RolloutResult<()> {
        self.resolve(ctx).await?;
        self.connect_all(ctx).await?;
        self.query_versions().await;
        self.prefetch_all(ctx).await
    }

    /// Discover the instances of this application.
    pub async fn resolve(&mut self, ctx: &RolloutContext) -> RolloutResult<()> {
        self.expect_state(ApplicationState::Pending, "resolve")?;

        let hostnames = ctx.resolver.resolve(&self.name, &ctx.environment).await;
        info!(
            application = %self.name,
            environment = %ctx.environment,
            instances = hostnames.len(),
            "resolved instances"
        );

        self.pending = hostnames
            .into_iter()
            .map(|hostname| RemoteHost::new(ctx.target(hostname), ctx.dryrun))
            .collect();
        self.state = ApplicationState::Resolved;
        Ok(())
    }

    /// Connect to every resolved instance, in resolution order.
    pub async fn connect_all(&mut self, ctx: &RolloutContext) -> RolloutResult<()> {
        self.expect_state(ApplicationState::Resolved, "connect")?;
        self.state = ApplicationState::Connecting;

        let policy = ctx.policy();
        let mut hosts = mem::take(&mut self.pending).into_iter();

        while let Some(mut host) = hosts.next() {
            let result = host.connect(ctx.executor.as_ref()).await;
            ctx.events.on_instance_completed(
                &self.name,
                host.hostname(),
                Phase::Connect,
                result.is_err(),
            );

            let Err(source) = result else {
                self.successful.push(host);
                continue;
            };

            let hostname = host.hostname().to_string();
            self.errors
                .push(ErrorRecord::new(format!("{hostname}: {source}")));
            self.failed.push(host);

            if policy.aborts_on_failure() {
                self.pending.extend(hosts);
                self.state = ApplicationState::ConnectFailed;
                warn!(
                    application = %self.name,
                    host = %hostname,
                    unattempted = self.pending.len(),
                    "connect failed, aborting phase"
                );
                return Err(RolloutError::ConnectFailure {
                    host: hostname,
                    source,
                });
            }
        }

        if self.successful.is_empty() {
            return Err(self.no_successful_instance(ApplicationState::ConnectFailed));
        }

        self.state = ApplicationState::Connected;
        debug!(
            application = %self.name,
            connected = self.successful.len(),
            failed = self.failed.len(),
            "connect phase finished"
        );
        Ok(())
    }

    /// Best-effort version query on every connected instance. Failures are
    /// recorded on the host.
    async fn query_versions(&mut self) {
        for host in self.successful.iter_mut() {
            if let Err(e) = host.get_version(&self.name).await {
                debug!(
                    application = %self.name,
                    host = %host.hostname(),
                    error = %e,
                    "version query failed"
                );
            }
        }
    }

    /// Stage the target version on every connected instance.
    pub async fn prefetch_all(&mut self, ctx: &RolloutContext) -> RolloutResult<()> {
        self.expect_state(ApplicationState::Connected, "prefetch")?;
        self.state = ApplicationState::Prefetching;

        let policy = ctx.policy();
        let mut hosts = mem::take(&mut self.successful).into_iter();

        while let Some(mut host) = hosts.next() {
            let command = host.prefetch(&self.name, &self.version).await;
            ctx.events.on_instance_completed(
                &self.name,
                host.hostname(),
                Phase::Prefetch,
                command.failed(),
            );

            let Some(source) = command.error.clone() else {
                self.successful.push(host);
                continue;
            };

            let hostname = host.hostname().to_string();
            let message = format!(
                "{hostname}: Failed to prefetch artifact {} ({})",
                self.name, self.version
            );
            self.errors.push(ErrorRecord::with_command(message, command));
            self.failed.push(host);

            if policy.aborts_on_failure() {
                self.pending.extend(hosts);
                self.state = ApplicationState::PrefetchFailed;
                warn!(
                    application = %self.name,
                    host = %hostname,
                    unattempted = self.pending.len(),
                    "prefetch failed, aborting phase"
                );
                return Err(RolloutError::PrefetchFailure {
                    host: hostname,
                    application: self.name.clone(),
                    version: self.version.clone(),
                    source,
                });
            }
        }

        if self.successful.is_empty() {
            return Err(self.no_successful_instance(ApplicationState::PrefetchFailed));
        }

        self.state = ApplicationState::Ready;
        info!(
            application = %self.name,
            version = %self.version,
            ready = self.successful.len(),
            failed = self.failed.len(),
            "application loaded"
        );
        Ok(())
    }

    /// Switch every ready instance, one at a time and in resolution order.
    ///
    /// Instances carrying an error from an earlier phase are skipped. The
    /// first failing instance stops the switch for this application.
    pub async fn switch(&mut self, ctx: &RolloutContext) -> RolloutResult<()> {
        self.expect_state(ApplicationState::Ready, "switch")?;
        self.state = ApplicationState::Switching;

        let hostnames: Vec<String> = self
            .successful
            .iter()
            .map(|h| h.hostname().to_string())
            .collect();
        ctx.events.on_switch_started(&self.name, &hostnames);
        info!(application = %self.name, version = %self.version, dryrun = ctx.dryrun, "switching");

        let mut outcome = Ok(());
        let mut switched = 0usize;

        for host in self.successful.iter_mut() {
            if !host.is_connected() || host.has_errors() {
                let reason = host
                    .errors()
                    .last()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "not connected".to_string());
                info!(
                    application = %self.name,
                    host = %host.hostname(),
                    %reason,
                    "skipping instance"
                );
                ctx.events
                    .on_instance_skipped(&self.name, host.hostname(), &reason);
                continue;
            }

            let command = host.switch_version(&self.name, &self.version).await;
            ctx.events.on_instance_completed(
                &self.name,
                host.hostname(),
                Phase::Switch,
                command.failed(),
            );

            if let Some(source) = command.error.clone() {
                let hostname = host.hostname().to_string();
                let message = format!(
                    "{hostname}: Failed to switch {} to {}",
                    self.name, self.version
                );
                self.errors.push(ErrorRecord::with_command(message, command));
                outcome = Err(RolloutError::SwitchFailure {
                    host: hostname,
                    application: self.name.clone(),
                    version: self.version.clone(),
                    source,
                });
                break;
            }
            switched += 1;
        }

        self.log_command_history();

        match &outcome {
            Ok(()) => {
                if switched == 0 {
                    warn!(application = %self.name, "no instance was switched");
                }
                self.state = ApplicationState::Switched;
                info!(application = %self.name, version = %self.version, switched, "switch finished");
            }
            Err(e) => {
                self.state = ApplicationState::SwitchFailed;
                warn!(application = %self.name, error = %e, "switch failed");
            }
        }
        outcome
    }

    /// Release every session, whatever state the hosts are in.
    pub async fn close(&mut self) {
        for host in self
            .pending
            .iter_mut()
            .chain(self.successful.iter_mut())
            .chain(self.failed.iter_mut())
        {
            host.close().await;
        }
    }

    fn log_command_history(&self) {
        for host in self.successful.iter().chain(self.failed.iter()) {
            for command in host.commands() {
                debug!(
                    application = %self.name,
                    host = %host.hostname(),
                    command = %command.command_line,
                    description = %command.description,
                    exit_code = ?command.exit_code,
                    output = %command.combined.trim_end(),
                    "command history"
                );
            }
        }
    }

    fn expect_state(&self, expected: ApplicationState, operation: &'static str) -> RolloutResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RolloutError::InvalidState {
                application: self.name.clone(),
                operation,
                state: self.state.to_string(),
            })
        }
    }

    fn no_successful_instance(&mut self, state: ApplicationState) -> RolloutError {
        let err = RolloutError::NoSuccessfulInstance(self.name.clone());
        self.errors.push(ErrorRecord::new(err.to_string()));
        self.state = state;
        warn!(application = %self.name, failed = self.failed.len(), "no successful instance found");
        err
    }
}
