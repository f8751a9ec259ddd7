//! Managed-inference provider abstraction
//!
//! The reconciler only needs create/delete/describe per resource kind plus
//! an in-place endpoint update. Keeping this behind a trait lets the phase
//! logic be tested against a mock while production uses the SageMaker
//! client.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use crate::resource::{ManagedResource, ObservedState, ResourceKind};

/// Error codes the provider uses for "busy with another operation"
const CONFLICT_CODES: &[&str] = &["ResourceInUse", "ConflictException"];

/// Failure reported by the provider
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ProviderError {
    /// The named resource does not exist
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Resource kind
        kind: ResourceKind,
        /// Resource name
        name: String,
    },

    /// The provider rejected the call
    #[error("{code} (HTTP {status}): {message}")]
    Api {
        /// Provider error code, e.g. `ValidationException`
        code: String,
        /// Provider message, verbatim
        message: String,
        /// HTTP status of the response
        status: u16,
    },

    /// The call never produced a provider response
    #[error("transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Create an API error
    pub fn api(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    /// True for "resource does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }

    /// True when the provider is busy with a conflicting operation
    pub fn is_conflict(&self) -> bool {
        match self {
            ProviderError::Api { code, .. } => CONFLICT_CODES.contains(&code.as_str()),
            _ => false,
        }
    }
}

/// Operations the reconciler issues against the provider
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Create a resource and return its provider identifier (ARN)
    async fn create(&self, resource: &ManagedResource) -> Result<String, ProviderError>;

    /// Delete a resource by kind and name
    ///
    /// Returns [`ProviderError::NotFound`] when it does not exist.
    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), ProviderError>;

    /// Read the current state of a resource
    ///
    /// A missing resource is [`ObservedState::Absent`], not an error. Kinds
    /// without a provider status report [`ObservedState::InService`] when
    /// they exist.
    async fn describe(&self, kind: ResourceKind, name: &str)
        -> Result<ObservedState, ProviderError>;

    /// Point an existing endpoint at a different serving config
    async fn update_endpoint(
        &self,
        endpoint_name: &str,
        serving_config_name: &str,
    ) -> Result<(), ProviderError>;
}
