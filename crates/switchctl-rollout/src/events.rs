//! Progress observer.
//!
//! The pipeline reports per-instance and per-application outcomes to a
//! [`RolloutEvents`] sink synchronously, from whichever task is running the
//! application. Rendering (spinners, progress lines) stays in the caller.

use std::fmt;

/// Pipeline phase an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Connect,
    Prefetch,
    Switch,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => f.write_str("connect"),
            Self::Prefetch => f.write_str("prefetch"),
            Self::Switch => f.write_str("switch"),
        }
    }
}

/// Receives rollout progress. Every method defaults to a no-op.
pub trait RolloutEvents: Send + Sync {
    /// An application finished its Load phase.
    fn on_application_loaded(&self, _application: &str, _failed: bool) {}

    /// An application is about to switch `hostnames`, in order.
    fn on_switch_started(&self, _application: &str, _hostnames: &[String]) {}

    /// One instance finished `phase`.
    fn on_instance_completed(&self, _application: &str, _hostname: &str, _phase: Phase, _failed: bool) {}

    /// An instance was left out of the switch because of an earlier error.
    fn on_instance_skipped(&self, _application: &str, _hostname: &str, _reason: &str) {}

    /// An application finished its Switch phase.
    fn on_application_switched(&self, _application: &str, _failed: bool) {}
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl RolloutEvents for NoopEvents {}
