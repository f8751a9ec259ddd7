//! Endpoint lifecycle reconciler for the churn predictor
//!
//! Converges the managed inference provider toward a desired deployment:
//! a model bound to the serving image, a single-variant serving config and
//! an endpoint pointing at it.
//!
//! # Modules
//!
//! - [`config`] - Desired state, identity and validation
//! - [`resource`] - Resource kinds and observed states
//! - [`provider`] - Provider trait and its error type
//! - [`sagemaker`] - SageMaker client implementing the provider trait
//! - [`reconciler`] - The reconcile pass itself
//! - [`polling`] - Bounded waits on provider state
//! - [`error`] - Reconciler errors

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod polling;
pub mod provider;
pub mod reconciler;
pub mod resource;
pub mod sagemaker;

pub use config::{DeployConfig, DeployIdentity, DeployPlan, DesiredState};
pub use error::DeployError;
pub use provider::{InferenceProvider, ProviderError};
pub use reconciler::{EndpointAction, ReconcileReport, Reconciler};
pub use resource::{ManagedResource, ObservedState, ResourceKind};
pub use sagemaker::SageMakerProvider;
