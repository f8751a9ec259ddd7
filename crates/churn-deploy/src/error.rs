//! Reconciler error types

use std::time::Duration;

use thiserror::Error;

use crate::provider::ProviderError;
use crate::resource::ResourceKind;

/// Reasons a reconcile pass stops
///
/// Every provider-facing variant names the phase it failed in so the
/// operator can tell a model failure from an endpoint failure.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Required identity or configuration is missing; nothing was called
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The desired-state file could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// The provider refused because another operation holds the resource
    #[error("{phase} phase: {operation} '{name}' conflicts with an in-flight operation: {source}")]
    Conflict {
        /// Phase the conflict happened in
        phase: ResourceKind,
        /// Provider call that was refused
        operation: &'static str,
        /// Resource name
        name: String,
        /// Provider error, verbatim
        #[source]
        source: ProviderError,
    },

    /// Any other provider failure
    #[error("{phase} phase: {operation} '{name}' failed: {source}")]
    Provider {
        /// Phase the failure happened in
        phase: ResourceKind,
        /// Provider call that failed
        operation: &'static str,
        /// Resource name
        name: String,
        /// Provider error, verbatim
        #[source]
        source: ProviderError,
    },

    /// A bounded wait expired
    #[error("{phase} phase: timed out after {waited:?} waiting for '{name}' to be deleted (last status: {last_observed})")]
    Timeout {
        /// Phase that was waiting
        phase: ResourceKind,
        /// Resource name
        name: String,
        /// Configured wait
        waited: Duration,
        /// Last status seen before the deadline
        last_observed: String,
    },
}

impl DeployError {
    /// Create a precondition error with the given message
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Wrap a provider error with its phase, classifying conflicts
    pub fn provider(
        phase: ResourceKind,
        operation: &'static str,
        name: impl Into<String>,
        source: ProviderError,
    ) -> Self {
        let name = name.into();
        if source.is_conflict() {
            Self::Conflict {
                phase,
                operation,
                name,
                source,
            }
        } else {
            Self::Provider {
                phase,
                operation,
                name,
                source,
            }
        }
    }

    /// Phase the error belongs to, if it came from a provider interaction
    pub fn phase(&self) -> Option<ResourceKind> {
        match self {
            DeployError::Conflict { phase, .. }
            | DeployError::Provider { phase, .. }
            | DeployError::Timeout { phase, .. } => Some(*phase),
            DeployError::Precondition(_) | DeployError::Config(_) => None,
        }
    }
}
