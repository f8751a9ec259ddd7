//! Shared building blocks for the churn predictor
//!
//! Both halves of the system are coupled only through the wire contract
//! (request/response JSON shape) and the resource names the reconciler
//! manages, so those live here alongside the cross-cutting helpers.
//!
//! # Modules
//!
//! - [`wire`] - Inference request/response JSON types
//! - [`telemetry`] - Tracing subscriber setup
//! - [`sigv4`] - AWS Signature Version 4 request signing
//! - [`credentials`] - Provider chain that finds signing credentials
//! - [`retry`] - Exponential backoff for transient failures

#![deny(missing_docs)]

pub mod credentials;
pub mod retry;
pub mod sigv4;
pub mod telemetry;
pub mod wire;

pub use wire::{ErrorBody, FeatureRecord, InferenceRequest, InferenceResponse};

// =============================================================================
// Shared constants
// =============================================================================

/// Content type accepted by `/invocations` and returned by every JSON response
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Default port the serving container listens on
pub const DEFAULT_SERVING_PORT: u16 = 8080;

/// Default name of the managed model resource
pub const DEFAULT_MODEL_NAME: &str = "churn-predictor-model";

/// Default name of the managed serving configuration resource
pub const DEFAULT_SERVING_CONFIG_NAME: &str = "churn-predictor-endpoint-config";

/// Default name of the managed endpoint resource
pub const DEFAULT_ENDPOINT_NAME: &str = "churn-predictor-endpoint";

/// Repository name of the serving image in the container registry
pub const IMAGE_REPOSITORY: &str = "churn-predictor";

/// Returns true when a `Content-Type` header value names the JSON media type.
///
/// The comparison ignores case and any parameters such as `charset`.
pub fn is_json_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
        .unwrap_or(false)
}
