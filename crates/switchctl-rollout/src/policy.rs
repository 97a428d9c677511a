//! Partial-failure policy.

use std::fmt;

/// Environment whose rollouts tolerate partial host failure.
pub const STAGING: &str = "staging";

/// How a phase reacts to a failing host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and continue with the remaining hosts. The phase
    /// fails only if no host is left.
    Tolerant,
    /// Abort the phase on the first failing host.
    Strict,
}

impl FailurePolicy {
    /// `staging` is tolerant; every other environment is strict.
    pub fn for_environment(environment: &str) -> Self {
        if environment == STAGING {
            Self::Tolerant
        } else {
            Self::Strict
        }
    }

    pub fn aborts_on_failure(self) -> bool {
        self == Self::Strict
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tolerant => f.write_str("tolerant"),
            Self::Strict => f.write_str("strict"),
        }
    }
}
