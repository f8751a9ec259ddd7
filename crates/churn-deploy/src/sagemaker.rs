//! SageMaker implementation of [`InferenceProvider`]
//!
//! Speaks the JSON 1.1 protocol: every call is a signed `POST /` with the
//! operation named in `X-Amz-Target`.

use std::time::Duration;

use async_trait::async_trait;
use churn_common::sigv4::{self, Credentials, SignableRequest, SigningParams};
use reqwest::Url;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::{InferenceProvider, ProviderError};
use crate::resource::{ManagedResource, ObservedState, ResourceKind};

const SERVICE: &str = "sagemaker";
const TARGET_PREFIX: &str = "SageMaker";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// SageMaker control-plane client
pub struct SageMakerProvider {
    http: reqwest::Client,
    url: Url,
    host: String,
    region: String,
    credentials: Credentials,
}

impl SageMakerProvider {
    /// Client for the public regional endpoint
    pub fn new(region: &str, credentials: Credentials) -> Result<Self, ProviderError> {
        Self::with_endpoint(
            region,
            credentials,
            &format!("https://api.{}.{}.amazonaws.com/", SERVICE, region),
        )
    }

    /// Client for an explicit endpoint URL (VPC endpoint, local stub)
    pub fn with_endpoint(
        region: &str,
        credentials: Credentials,
        endpoint: &str,
    ) -> Result<Self, ProviderError> {
        let url = Url::parse(endpoint)
            .map_err(|e| ProviderError::Transport(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        let host = host_header(&url)
            .ok_or_else(|| ProviderError::Transport(format!("endpoint '{}' has no host", endpoint)))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url,
            host,
            region: region.to_string(),
            credentials,
        })
    }

    async fn call(
        &self,
        operation: &str,
        body: &Value,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Value, ProviderError> {
        let payload = serde_json::to_vec(body).map_err(|e| ProviderError::Transport(e.to_string()))?;
        let target = format!("{}.{}", TARGET_PREFIX, operation);
        let headers = [("content-type", CONTENT_TYPE), ("x-amz-target", target.as_str())];

        let signed = sigv4::sign(
            &SignableRequest {
                method: "POST",
                host: &self.host,
                path: self.url.path(),
                headers: &headers,
                body: &payload,
            },
            &SigningParams {
                credentials: &self.credentials,
                region: &self.region,
                service: SERVICE,
                time: chrono::Utc::now(),
            },
        )
        .map_err(|e| ProviderError::Transport(format!("failed to sign {}: {}", operation, e)))?;

        let mut request = self.http.post(self.url.clone()).body(payload);
        for (key, value) in headers.iter() {
            request = request.header(*key, *value);
        }
        for (key, value) in signed {
            request = request.header(key, value);
        }

        debug!(operation = %operation, resource = %name, "Calling provider");
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &bytes, kind, name));
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::Transport(format!("malformed {} response: {}", operation, e)))
    }
}

#[async_trait]
impl InferenceProvider for SageMakerProvider {
    async fn create(&self, resource: &ManagedResource) -> Result<String, ProviderError> {
        let (operation, body) = create_request(resource);
        let response = self
            .call(operation, &body, resource.kind(), resource.name())
            .await?;
        let field = arn_field(resource.kind());
        response
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::Transport(format!("{} response is missing {}", operation, field))
            })
    }

    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), ProviderError> {
        let (operation, body) = named_request("Delete", kind, name);
        self.call(&operation, &body, kind, name).await.map(|_| ())
    }

    async fn describe(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<ObservedState, ProviderError> {
        let (operation, body) = named_request("Describe", kind, name);
        match self.call(&operation, &body, kind, name).await {
            Ok(response) => Ok(observed_state(kind, &response)),
            Err(e) if e.is_not_found() => Ok(ObservedState::Absent),
            Err(e) => Err(e),
        }
    }

    async fn update_endpoint(
        &self,
        endpoint_name: &str,
        serving_config_name: &str,
    ) -> Result<(), ProviderError> {
        let body = json!({
            "EndpointName": endpoint_name,
            "EndpointConfigName": serving_config_name,
        });
        self.call("UpdateEndpoint", &body, ResourceKind::Endpoint, endpoint_name)
            .await
            .map(|_| ())
    }
}

fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn resource_noun(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Model => "Model",
        ResourceKind::ServingConfig => "EndpointConfig",
        ResourceKind::Endpoint => "Endpoint",
    }
}

fn arn_field(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Model => "ModelArn",
        ResourceKind::ServingConfig => "EndpointConfigArn",
        ResourceKind::Endpoint => "EndpointArn",
    }
}

fn name_field(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Model => "ModelName",
        ResourceKind::ServingConfig => "EndpointConfigName",
        ResourceKind::Endpoint => "EndpointName",
    }
}

/// Operation name and body for a delete/describe call
fn named_request(verb: &str, kind: ResourceKind, name: &str) -> (String, Value) {
    let mut body = serde_json::Map::new();
    body.insert(name_field(kind).to_string(), Value::String(name.to_string()));
    (format!("{}{}", verb, resource_noun(kind)), Value::Object(body))
}

/// Operation name and body for a create call
fn create_request(resource: &ManagedResource) -> (&'static str, Value) {
    match resource {
        ManagedResource::Model {
            name,
            image,
            execution_role_arn,
        } => (
            "CreateModel",
            json!({
                "ModelName": name,
                "PrimaryContainer": { "Image": image },
                "ExecutionRoleArn": execution_role_arn,
            }),
        ),
        ManagedResource::ServingConfig {
            name,
            model_name,
            variant_name,
            instance_type,
            instance_count,
            initial_weight,
        } => (
            "CreateEndpointConfig",
            json!({
                "EndpointConfigName": name,
                "ProductionVariants": [{
                    "VariantName": variant_name,
                    "ModelName": model_name,
                    "InitialInstanceCount": instance_count,
                    "InstanceType": instance_type,
                    "InitialVariantWeight": initial_weight,
                }],
            }),
        ),
        ManagedResource::Endpoint {
            name,
            serving_config_name,
        } => (
            "CreateEndpoint",
            json!({
                "EndpointName": name,
                "EndpointConfigName": serving_config_name,
            }),
        ),
    }
}

/// Models and endpoint configs carry no status; existing means usable
fn observed_state(kind: ResourceKind, response: &Value) -> ObservedState {
    match kind {
        ResourceKind::Endpoint => match response.get("EndpointStatus").and_then(Value::as_str) {
            Some(status) => ObservedState::from_status(status),
            None => ObservedState::Unknown(String::new()),
        },
        ResourceKind::Model | ResourceKind::ServingConfig => ObservedState::InService,
    }
}

/// Map an error response to a [`ProviderError`]
///
/// The code arrives in `__type`, sometimes prefixed with a namespace
/// (`com.amazonaws.sagemaker#ValidationException`), and the message under
/// `message` or `Message`.
fn parse_error(status: u16, body: &[u8], kind: ResourceKind, name: &str) -> ProviderError {
    let parsed: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let code = parsed
        .get("__type")
        .and_then(Value::as_str)
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_else(|| format!("HTTP{}", status));
    let message = parsed
        .get("message")
        .or_else(|| parsed.get("Message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    let not_found = code == "ResourceNotFound"
        || (code == "ValidationException" && message.contains("Could not find"));
    if not_found {
        ProviderError::NotFound {
            kind,
            name: name.to_string(),
        }
    } else {
        ProviderError::api(code, message, status)
    }
}
