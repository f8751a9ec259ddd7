//! Endpoint lifecycle reconciliation
//!
//! One pass drives the provider toward the desired state in three phases:
//! - Model: delete (if present) then create
//! - Serving config: delete (if present) then create
//! - Endpoint: act on the observed state
//!   - `Absent` → create
//!   - `InService` → update to the fresh serving config
//!   - `Failed` → delete, wait until absent (bounded), create
//!   - `Creating`/`Updating`/`Deleting` → leave alone
//!   - unrecognized → report, take no destructive action
//!
//! Nothing is retried. The first provider failure ends the pass with an
//! error naming its phase.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{DeployConfig, DeployPlan};
use crate::error::DeployError;
use crate::polling::{wait_for, Poll, WaitError};
use crate::provider::InferenceProvider;
use crate::resource::{ManagedResource, ObservedState, ResourceKind};

/// What the endpoint phase did
#[derive(Clone, Debug, PartialEq)]
pub enum EndpointAction {
    /// The endpoint did not exist and was created
    Created,
    /// The endpoint was switched to the named serving config
    Updated {
        /// Serving config the endpoint now references
        serving_config: String,
    },
    /// The failed endpoint was deleted and created again
    Recreated,
    /// A provider operation was in flight; nothing was done
    Deferred(ObservedState),
    /// The status was not recognized; nothing was done
    Skipped(String),
}

impl fmt::Display for EndpointAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointAction::Created => f.write_str("created"),
            EndpointAction::Updated { serving_config } => {
                write!(f, "updated to serving config '{}'", serving_config)
            }
            EndpointAction::Recreated => f.write_str("recreated after failure"),
            EndpointAction::Deferred(state) => {
                write!(f, "left alone while {} (re-run once it settles)", state)
            }
            EndpointAction::Skipped(raw) => {
                write!(f, "skipped: unrecognized status '{}'", raw)
            }
        }
    }
}

/// Result of a successful reconcile pass
#[derive(Clone, Debug, PartialEq)]
pub struct ReconcileReport {
    /// Identifier of the created model
    pub model_arn: String,
    /// Identifier of the created serving config
    pub serving_config_arn: String,
    /// Endpoint name
    pub endpoint_name: String,
    /// Endpoint phase outcome
    pub endpoint: EndpointAction,
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model:          {}", self.model_arn)?;
        writeln!(f, "serving config: {}", self.serving_config_arn)?;
        write!(f, "endpoint:       {} {}", self.endpoint_name, self.endpoint)
    }
}

/// Drives the provider toward the configured deployment
pub struct Reconciler {
    provider: Arc<dyn InferenceProvider>,
    config: DeployConfig,
    running: Mutex<()>,
}

impl Reconciler {
    /// Create a reconciler for one deployment
    pub fn new(provider: Arc<dyn InferenceProvider>, config: DeployConfig) -> Self {
        Self {
            provider,
            config,
            running: Mutex::new(()),
        }
    }

    /// Run one reconcile pass.
    ///
    /// Preconditions are checked before any provider call. Overlapping
    /// calls on the same reconciler run one after the other.
    pub async fn reconcile(&self) -> Result<ReconcileReport, DeployError> {
        let _guard = self.running.lock().await;

        let plan = self.config.resolve()?;
        info!(
            endpoint = %plan.endpoint_name(),
            region = %plan.region,
            "Reconciling deployment"
        );

        let model_arn = self.replace(&plan.model).await?;
        let serving_config_arn = self.replace(&plan.serving_config).await?;
        let endpoint = self.reconcile_endpoint(&plan).await?;

        info!(endpoint = %plan.endpoint_name(), action = %endpoint, "Reconcile complete");
        Ok(ReconcileReport {
            model_arn,
            serving_config_arn,
            endpoint_name: plan.endpoint_name().to_string(),
            endpoint,
        })
    }

    /// Model and serving config: delete whatever is there, then create.
    async fn replace(&self, resource: &ManagedResource) -> Result<String, DeployError> {
        let kind = resource.kind();
        let name = resource.name();

        self.delete_if_present(kind, name).await?;

        let arn = self
            .provider
            .create(resource)
            .await
            .map_err(|e| DeployError::provider(kind, "create", name, e))?;
        info!(kind = %kind, resource = %name, arn = %arn, "Created");
        Ok(arn)
    }

    /// Delete, treating "not found" as already done
    async fn delete_if_present(&self, kind: ResourceKind, name: &str) -> Result<(), DeployError> {
        match self.provider.delete(kind, name).await {
            Ok(()) => {
                info!(kind = %kind, resource = %name, "Deleted existing resource");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(kind = %kind, resource = %name, "Nothing to delete");
                Ok(())
            }
            Err(e) => Err(DeployError::provider(kind, "delete", name, e)),
        }
    }

    async fn reconcile_endpoint(&self, plan: &DeployPlan) -> Result<EndpointAction, DeployError> {
        let name = plan.endpoint_name();
        let state = self
            .provider
            .describe(ResourceKind::Endpoint, name)
            .await
            .map_err(|e| DeployError::provider(ResourceKind::Endpoint, "describe", name, e))?;

        info!(endpoint = %name, status = %state, "Observed endpoint");

        match state {
            ObservedState::Absent => self.create_endpoint(plan).await.map(|()| EndpointAction::Created),
            ObservedState::InService => self.update_endpoint(plan).await,
            ObservedState::Failed => self.recreate_endpoint(plan).await,
            ObservedState::Creating | ObservedState::Updating | ObservedState::Deleting => {
                warn!(
                    endpoint = %name,
                    status = %state,
                    "Endpoint is busy; leaving it alone for this pass"
                );
                Ok(EndpointAction::Deferred(state))
            }
            ObservedState::Unknown(raw) => {
                warn!(
                    endpoint = %name,
                    status = %raw,
                    "Unrecognized endpoint status; taking no action"
                );
                Ok(EndpointAction::Skipped(raw))
            }
        }
    }

    async fn create_endpoint(&self, plan: &DeployPlan) -> Result<(), DeployError> {
        let name = plan.endpoint_name();
        let arn = self
            .provider
            .create(&plan.endpoint)
            .await
            .map_err(|e| DeployError::provider(ResourceKind::Endpoint, "create", name, e))?;
        info!(endpoint = %name, arn = %arn, "Created endpoint");
        Ok(())
    }

    async fn update_endpoint(&self, plan: &DeployPlan) -> Result<EndpointAction, DeployError> {
        let name = plan.endpoint_name();
        let serving_config = plan.serving_config_name();
        self.provider
            .update_endpoint(name, serving_config)
            .await
            .map_err(|e| DeployError::provider(ResourceKind::Endpoint, "update", name, e))?;
        info!(endpoint = %name, serving_config = %serving_config, "Updated endpoint");
        Ok(EndpointAction::Updated {
            serving_config: serving_config.to_string(),
        })
    }

    /// Failed endpoints cannot be updated: delete, wait for it to go, create.
    async fn recreate_endpoint(&self, plan: &DeployPlan) -> Result<EndpointAction, DeployError> {
        let name = plan.endpoint_name();
        warn!(endpoint = %name, "Endpoint failed; deleting and recreating");

        self.delete_if_present(ResourceKind::Endpoint, name).await?;

        let provider = &self.provider;
        let waited = wait_for(
            &format!("endpoint {} to be deleted", name),
            plan.deletion_timeout,
            plan.poll_interval,
            || async move {
                provider
                    .describe(ResourceKind::Endpoint, name)
                    .await
                    .map(|state| match state {
                        ObservedState::Absent => Poll::Ready(()),
                        other => Poll::Pending(other.to_string()),
                    })
            },
        )
        .await;

        match waited {
            Ok(()) => {}
            Err(WaitError::Poll(e)) => {
                return Err(DeployError::provider(ResourceKind::Endpoint, "describe", name, e));
            }
            Err(WaitError::Timeout {
                waited,
                last_observed,
            }) => {
                return Err(DeployError::Timeout {
                    phase: ResourceKind::Endpoint,
                    name: name.to_string(),
                    waited,
                    last_observed: last_observed.unwrap_or_else(|| "none".to_string()),
                });
            }
        }

        self.create_endpoint(plan).await?;
        Ok(EndpointAction::Recreated)
    }
}
