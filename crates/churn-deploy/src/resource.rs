//! Managed resources and their observed states
//!
//! The provider hosts three kinds of resource. A model binds an image to an
//! execution role, a serving config binds a model to compute, and an
//! endpoint exposes a serving config behind a stable name.

use std::fmt;

/// Kind of managed resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Image + execution role
    Model,
    /// Model + instance type/count
    ServingConfig,
    /// Stable network name bound to a serving config
    Endpoint,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Model => "model",
            ResourceKind::ServingConfig => "serving config",
            ResourceKind::Endpoint => "endpoint",
        })
    }
}

/// Snapshot of a resource as reported by the provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObservedState {
    /// Does not exist
    Absent,
    /// Creation in flight
    Creating,
    /// Serving traffic
    InService,
    /// Update (or provider-initiated maintenance) in flight
    Updating,
    /// Terminal failure; cannot be updated
    Failed,
    /// Deletion in flight
    Deleting,
    /// Any status this build does not recognize, kept verbatim
    Unknown(String),
}

impl ObservedState {
    /// Map a provider status string to a state
    pub fn from_status(status: &str) -> Self {
        match status {
            "Creating" => Self::Creating,
            "InService" => Self::InService,
            "Updating" | "SystemUpdating" | "RollingBack" => Self::Updating,
            "Failed" => Self::Failed,
            "Deleting" => Self::Deleting,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ObservedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservedState::Absent => f.write_str("Absent"),
            ObservedState::Creating => f.write_str("Creating"),
            ObservedState::InService => f.write_str("InService"),
            ObservedState::Updating => f.write_str("Updating"),
            ObservedState::Failed => f.write_str("Failed"),
            ObservedState::Deleting => f.write_str("Deleting"),
            ObservedState::Unknown(raw) => write!(f, "Unknown({})", raw),
        }
    }
}

/// Desired definition of a resource, tagged by kind
#[derive(Clone, Debug, PartialEq)]
pub enum ManagedResource {
    /// Model resource
    Model {
        /// Resource name
        name: String,
        /// Container image reference
        image: String,
        /// Role the serving container runs as
        execution_role_arn: String,
    },
    /// Serving configuration resource
    ServingConfig {
        /// Resource name
        name: String,
        /// Model this configuration serves
        model_name: String,
        /// Variant name inside the configuration
        variant_name: String,
        /// Instance type, e.g. `ml.t2.medium`
        instance_type: String,
        /// Number of instances
        instance_count: u32,
        /// Traffic weight of the single variant
        initial_weight: f64,
    },
    /// Endpoint resource
    Endpoint {
        /// Resource name
        name: String,
        /// Serving configuration to bind
        serving_config_name: String,
    },
}

impl ManagedResource {
    /// Kind of this resource
    pub fn kind(&self) -> ResourceKind {
        match self {
            ManagedResource::Model { .. } => ResourceKind::Model,
            ManagedResource::ServingConfig { .. } => ResourceKind::ServingConfig,
            ManagedResource::Endpoint { .. } => ResourceKind::Endpoint,
        }
    }

    /// Resource name
    pub fn name(&self) -> &str {
        match self {
            ManagedResource::Model { name, .. }
            | ManagedResource::ServingConfig { name, .. }
            | ManagedResource::Endpoint { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Creating", ObservedState::Creating)]
    #[case("InService", ObservedState::InService)]
    #[case("Updating", ObservedState::Updating)]
    #[case("SystemUpdating", ObservedState::Updating)]
    #[case("RollingBack", ObservedState::Updating)]
    #[case("Failed", ObservedState::Failed)]
    #[case("Deleting", ObservedState::Deleting)]
    #[case("OutOfService", ObservedState::Unknown("OutOfService".into()))]
    #[case("inservice", ObservedState::Unknown("inservice".into()))]
    #[case("UpdateRollbackFailed", ObservedState::Unknown("UpdateRollbackFailed".into()))]
    fn status_strings_map_to_states(#[case] raw: &str, #[case] expected: ObservedState) {
        assert_eq!(ObservedState::from_status(raw), expected);
    }

    #[test]
    fn resource_exposes_kind_and_name() {
        let endpoint = ManagedResource::Endpoint {
            name: "churn-predictor-endpoint".into(),
            serving_config_name: "cfg".into(),
        };
        assert_eq!(endpoint.kind(), ResourceKind::Endpoint);
        assert_eq!(endpoint.name(), "churn-predictor-endpoint");
        assert_eq!(ResourceKind::ServingConfig.to_string(), "serving config");
    }
}
