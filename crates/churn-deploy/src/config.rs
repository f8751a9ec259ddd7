//! Desired state and deployment identity
//!
//! The desired state comes from an optional YAML file; anything it omits
//! falls back to the defaults below. The identity (account, region and
//! execution role) always comes from the environment.

use std::path::Path;
use std::time::Duration;

use churn_common::{
    DEFAULT_ENDPOINT_NAME, DEFAULT_MODEL_NAME, DEFAULT_SERVING_CONFIG_NAME, IMAGE_REPOSITORY,
};
use serde::{Deserialize, Serialize};

use crate::error::DeployError;
use crate::polling::{DEFAULT_DELETION_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::resource::ManagedResource;

/// Default instance type for the single serving variant
pub const DEFAULT_INSTANCE_TYPE: &str = "ml.t2.medium";

/// Default variant name
pub const DEFAULT_VARIANT_NAME: &str = "AllTraffic";

/// Who deploys and where
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeployIdentity {
    /// Cloud account id
    pub account_id: Option<String>,
    /// Region the resources live in
    pub region: Option<String>,
    /// Execution role the serving container runs as
    pub role_arn: Option<String>,
}

/// Desired deployment, as written in the YAML file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct DesiredState {
    /// Container image; derived from account and region when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Instance type of the serving variant
    pub instance_type: String,
    /// Instance count of the serving variant
    pub instance_count: u32,
    /// Variant name
    pub variant_name: String,
    /// Variant traffic weight
    pub initial_weight: f64,
    /// Model resource name
    pub model_name: String,
    /// Serving config resource name
    pub serving_config_name: String,
    /// Endpoint resource name
    pub endpoint_name: String,
    /// Bound on the wait for a failed endpoint to disappear
    pub deletion_timeout_secs: u64,
    /// Interval between describe calls during that wait
    pub poll_interval_secs: u64,
}

impl Default for DesiredState {
    fn default() -> Self {
        Self {
            image: None,
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            instance_count: 1,
            variant_name: DEFAULT_VARIANT_NAME.to_string(),
            initial_weight: 1.0,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            serving_config_name: DEFAULT_SERVING_CONFIG_NAME.to_string(),
            endpoint_name: DEFAULT_ENDPOINT_NAME.to_string(),
            deletion_timeout_secs: DEFAULT_DELETION_TIMEOUT.as_secs(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
        }
    }
}

impl DesiredState {
    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self, DeployError> {
        serde_yaml::from_str(yaml).map_err(|e| DeployError::Config(e.to_string()))
    }

    /// Read and parse a YAML file
    pub fn from_file(path: &Path) -> Result<Self, DeployError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| DeployError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }
}

/// Identity plus desired state, before validation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeployConfig {
    /// Deployment identity
    pub identity: DeployIdentity,
    /// Desired state
    pub desired: DesiredState,
}

/// A validated deployment: every value the reconciler needs is present
#[derive(Clone, Debug, PartialEq)]
pub struct DeployPlan {
    /// Region the resources live in
    pub region: String,
    /// Model resource
    pub model: ManagedResource,
    /// Serving config resource
    pub serving_config: ManagedResource,
    /// Endpoint resource
    pub endpoint: ManagedResource,
    /// Bound on the wait for a failed endpoint to disappear
    pub deletion_timeout: Duration,
    /// Interval between describe calls during that wait
    pub poll_interval: Duration,
}

impl DeployPlan {
    /// Endpoint name
    pub fn endpoint_name(&self) -> &str {
        self.endpoint.name()
    }

    /// Serving config name
    pub fn serving_config_name(&self) -> &str {
        self.serving_config.name()
    }
}

impl DeployConfig {
    /// Create a config from parts
    pub fn new(identity: DeployIdentity, desired: DesiredState) -> Self {
        Self { identity, desired }
    }

    /// Check every precondition and resolve defaults.
    ///
    /// All problems are reported together so one run surfaces every
    /// missing variable.
    pub fn resolve(&self) -> Result<DeployPlan, DeployError> {
        let mut problems = Vec::new();

        let account = require(&self.identity.account_id, "AWS_ACCOUNT_ID", &mut problems);
        let region = require(&self.identity.region, "AWS_REGION", &mut problems);
        let role = require(&self.identity.role_arn, "ROLE_ARN", &mut problems);

        let desired = &self.desired;
        for (field, value) in [
            ("instanceType", &desired.instance_type),
            ("variantName", &desired.variant_name),
            ("modelName", &desired.model_name),
            ("servingConfigName", &desired.serving_config_name),
            ("endpointName", &desired.endpoint_name),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{} must not be empty", field));
            }
        }
        if desired.instance_count == 0 {
            problems.push("instanceCount must be at least 1".to_string());
        }
        if !(desired.initial_weight.is_finite() && desired.initial_weight > 0.0) {
            problems.push("initialWeight must be a positive number".to_string());
        }
        if desired.deletion_timeout_secs == 0 {
            problems.push("deletionTimeoutSecs must be at least 1".to_string());
        }
        if desired.poll_interval_secs == 0 {
            problems.push("pollIntervalSecs must be at least 1".to_string());
        }
        if matches!(&desired.image, Some(image) if image.trim().is_empty()) {
            problems.push("image must not be empty".to_string());
        }

        let (Some(account), Some(region), Some(role)) = (account, region, role) else {
            return Err(DeployError::precondition(problems.join("; ")));
        };
        if !problems.is_empty() {
            return Err(DeployError::precondition(problems.join("; ")));
        }

        let image = desired
            .image
            .clone()
            .unwrap_or_else(|| default_image(account, region));

        Ok(DeployPlan {
            region: region.to_string(),
            model: ManagedResource::Model {
                name: desired.model_name.clone(),
                image,
                execution_role_arn: role.to_string(),
            },
            serving_config: ManagedResource::ServingConfig {
                name: desired.serving_config_name.clone(),
                model_name: desired.model_name.clone(),
                variant_name: desired.variant_name.clone(),
                instance_type: desired.instance_type.clone(),
                instance_count: desired.instance_count,
                initial_weight: desired.initial_weight,
            },
            endpoint: ManagedResource::Endpoint {
                name: desired.endpoint_name.clone(),
                serving_config_name: desired.serving_config_name.clone(),
            },
            deletion_timeout: Duration::from_secs(desired.deletion_timeout_secs),
            poll_interval: Duration::from_secs(desired.poll_interval_secs),
        })
    }
}

fn require<'a>(
    value: &'a Option<String>,
    var: &str,
    problems: &mut Vec<String>,
) -> Option<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            problems.push(format!("{} is not set", var));
            None
        }
    }
}

/// Registry image the serving container is pushed to
pub fn default_image(account_id: &str, region: &str) -> String {
    format!(
        "{}.dkr.ecr.{}.amazonaws.com/{}:latest",
        account_id, region, IMAGE_REPOSITORY
    )
}
