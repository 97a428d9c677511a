//! Collaborators shared by every application in a run.

use std::fmt;
use std::sync::Arc;

use switchctl_remote::{HostTarget, RemoteExecutor};
use switchctl_resolve::ConfigResolver;

use crate::events::{NoopEvents, RolloutEvents};
use crate::policy::FailurePolicy;

/// Default ssh port for instances.
pub const DEFAULT_PORT: u16 = 22;

/// Everything an application pipeline needs besides its own state.
#[derive(Clone)]
pub struct RolloutContext {
    pub resolver: ConfigResolver,
    pub executor: Arc<dyn RemoteExecutor>,
    pub events: Arc<dyn RolloutEvents>,
    pub environment: String,
    pub dryrun: bool,
    pub username: String,
    pub port: u16,
}

impl RolloutContext {
    pub fn new(
        resolver: ConfigResolver,
        executor: Arc<dyn RemoteExecutor>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            executor,
            events: Arc::new(NoopEvents),
            environment: environment.into(),
            dryrun: false,
            username: String::new(),
            port: DEFAULT_PORT,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn RolloutEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn with_dryrun(mut self, dryrun: bool) -> Self {
        self.dryrun = dryrun;
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        FailurePolicy::for_environment(&self.environment)
    }

    /// Connection target for a resolved hostname.
    pub fn target(&self, hostname: String) -> HostTarget {
        HostTarget {
            hostname,
            port: self.port,
            username: self.username.clone(),
        }
    }
}

impl fmt::Debug for RolloutContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RolloutContext")
            .field("environment", &self.environment)
            .field("dryrun", &self.dryrun)
            .field("username", &self.username)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}
