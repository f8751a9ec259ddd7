//! Client invoker: send one customer record to a gateway and report risk
//!
//! The record starts from the dashboard defaults, then a JSON file and
//! `key=value` overrides are applied on top. Requests go either straight
//! to a gateway URL or to the provider's runtime endpoint with signed
//! requests.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use churn_common::retry::{retry_with_backoff, RetryConfig};
use churn_common::sigv4::{self, Credentials, SignableRequest, SigningError, SigningParams};
use churn_common::{FeatureRecord, InferenceRequest, InferenceResponse, JSON_CONTENT_TYPE};
use reqwest::Url;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

/// Probability above which a customer is labelled high risk
pub const HIGH_RISK_THRESHOLD: f64 = 0.5;

const RUNTIME_SERVICE: &str = "sagemaker";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Invoker failures
#[derive(Debug, Error)]
pub enum InvokeError {
    /// A `--set` argument is not `key=value`
    #[error("invalid override '{0}', expected key=value")]
    InvalidOverride(String),

    /// The input file could not be read
    #[error("failed to read {path}: {source}")]
    Input {
        /// Input path
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The input file is not a JSON object
    #[error("invalid input record: {0}")]
    InvalidRecord(String),

    /// Target URL could not be built
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The runtime call could not be signed
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// No response was received
    #[error("request failed: {0}")]
    Transport(String),

    /// The gateway answered with a non-success status
    #[error("gateway returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },

    /// The gateway answered 200 with an unusable body
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl InvokeError {
    /// Transport failures and 5xx responses may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            InvokeError::Transport(_) => true,
            InvokeError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Record the dashboard submits when nothing is changed
pub fn default_record() -> FeatureRecord {
    let record = json!({
        "customerID": "webapp-test-user",
        "gender": "Female",
        "SeniorCitizen": 0,
        "Partner": "No",
        "Dependents": "No",
        "tenure": 1,
        "PhoneService": "Yes",
        "MultipleLines": "No",
        "InternetService": "DSL",
        "OnlineSecurity": "No",
        "OnlineBackup": "No",
        "DeviceProtection": "No",
        "TechSupport": "No",
        "StreamingTV": "No",
        "StreamingMovies": "No",
        "Contract": "Month-to-month",
        "PaperlessBilling": "Yes",
        "PaymentMethod": "Electronic check",
        "MonthlyCharges": 70.7,
        "TotalCharges": 70.7,
    });
    match record {
        Value::Object(map) => map,
        _ => FeatureRecord::new(),
    }
}

/// Parse `key=value`; numeric values become JSON numbers
pub fn parse_override(arg: &str) -> Result<(String, Value), InvokeError> {
    let (key, raw) = arg
        .split_once('=')
        .filter(|(k, _)| !k.trim().is_empty())
        .ok_or_else(|| InvokeError::InvalidOverride(arg.to_string()))?;

    let value = if let Ok(i) = raw.parse::<i64>() {
        Value::from(i)
    } else if let Some(n) = raw
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(serde_json::Number::from_f64)
    {
        Value::Number(n)
    } else {
        Value::String(raw.to_string())
    };
    Ok((key.trim().to_string(), value))
}

/// Build the record to send: defaults, then file contents, then overrides
pub fn build_record(
    input: Option<&Path>,
    overrides: &[String],
) -> Result<FeatureRecord, InvokeError> {
    let mut record = default_record();

    if let Some(path) = input {
        let text = std::fs::read_to_string(path).map_err(|source| InvokeError::Input {
            path: path.display().to_string(),
            source,
        })?;
        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| InvokeError::InvalidRecord(e.to_string()))?;
        match parsed {
            Value::Object(fields) => record.extend(fields),
            other => {
                return Err(InvokeError::InvalidRecord(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        }
    }

    for arg in overrides {
        let (key, value) = parse_override(arg)?;
        record.insert(key, value);
    }
    Ok(record)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Risk bucket for a churn probability
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiskLevel {
    /// Probability above [`HIGH_RISK_THRESHOLD`]
    High,
    /// Everything else
    Low,
}

impl RiskLevel {
    /// Classify a probability
    pub fn from_probability(p: f64) -> Self {
        if p > HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::High => "high churn risk",
            RiskLevel::Low => "low churn risk",
        })
    }
}

/// A validated single-record prediction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    /// Positive-class probability in [0, 1]
    pub probability: f64,
    /// Risk bucket
    pub risk: RiskLevel,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "churn probability {:.2}% ({})", self.probability * 100.0, self.risk)
    }
}

/// Where requests are sent
#[derive(Clone, Debug)]
pub enum Target {
    /// A gateway URL (usually `http://host:8080/invocations`), unsigned
    Direct(Url),
    /// The provider runtime for a named endpoint, signed
    Runtime {
        /// Full invocation URL
        url: Url,
        /// Region used in the signature scope
        region: String,
        /// Signing credentials
        credentials: Credentials,
    },
}

impl Target {
    /// Direct target from a URL string
    pub fn direct(url: &str) -> Result<Self, InvokeError> {
        Url::parse(url)
            .map(Target::Direct)
            .map_err(|e| InvokeError::InvalidTarget(format!("{}: {}", url, e)))
    }

    /// Runtime target for an endpoint in a region
    pub fn runtime(
        region: &str,
        endpoint_name: &str,
        credentials: Credentials,
    ) -> Result<Self, InvokeError> {
        let raw = runtime_url(region, endpoint_name);
        let url = Url::parse(&raw).map_err(|e| InvokeError::InvalidTarget(format!("{}: {}", raw, e)))?;
        Ok(Target::Runtime {
            url,
            region: region.to_string(),
            credentials,
        })
    }

    fn url(&self) -> &Url {
        match self {
            Target::Direct(url) | Target::Runtime { url, .. } => url,
        }
    }
}

/// Invocation URL of a provider endpoint
pub fn runtime_url(region: &str, endpoint_name: &str) -> String {
    format!(
        "https://runtime.{}.{}.amazonaws.com/endpoints/{}/invocations",
        RUNTIME_SERVICE, region, endpoint_name
    )
}

/// Sends records and validates the answers
pub struct Invoker {
    http: reqwest::Client,
    target: Target,
    retry: RetryConfig,
}

impl Invoker {
    /// Create an invoker
    pub fn new(target: Target, retry: RetryConfig) -> Result<Self, InvokeError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InvokeError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            target,
            retry,
        })
    }

    /// Score one record, retrying transient failures
    pub async fn invoke(&self, record: FeatureRecord) -> Result<Prediction, InvokeError> {
        let body = serde_json::to_vec(&InferenceRequest::single(record))
            .map_err(|e| InvokeError::InvalidRecord(e.to_string()))?;

        info!(target_url = %self.target.url(), "Invoking churn predictor");
        let response = retry_with_backoff(
            &self.retry,
            "invoke",
            InvokeError::is_transient,
            || self.send_once(&body),
        )
        .await?;

        let prediction = validate(&response)?;
        debug!(probability = prediction.probability, "Prediction received");
        Ok(prediction)
    }

    async fn send_once(&self, body: &[u8]) -> Result<InferenceResponse, InvokeError> {
        let url = self.target.url().clone();
        let mut request = self
            .http
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, JSON_CONTENT_TYPE)
            .body(body.to_vec());

        if let Target::Runtime {
            region,
            credentials,
            ..
        } = &self.target
        {
            let host = host_header(&url).ok_or_else(|| InvokeError::InvalidTarget(url.to_string()))?;
            let signed = sigv4::sign(
                &SignableRequest {
                    method: "POST",
                    host: &host,
                    path: url.path(),
                    headers: &[("content-type", JSON_CONTENT_TYPE), ("accept", JSON_CONTENT_TYPE)],
                    body,
                },
                &SigningParams {
                    credentials,
                    region,
                    service: RUNTIME_SERVICE,
                    time: chrono::Utc::now(),
                },
            )?;
            for (key, value) in signed {
                request = request.header(key, value);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| InvokeError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| InvokeError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(InvokeError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| InvokeError::MalformedResponse(e.to_string()))
    }
}

/// Host header value as sent on the wire, port included when explicit
fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// One record in, exactly one probability in [0, 1] out
fn validate(response: &InferenceResponse) -> Result<Prediction, InvokeError> {
    if !response.is_well_formed() {
        return Err(InvokeError::MalformedResponse(
            "predictions must be finite probabilities in [0, 1]".to_string(),
        ));
    }
    match response.predictions.as_slice() {
        [p] => Ok(Prediction {
            probability: *p,
            risk: RiskLevel::from_probability(*p),
        }),
        other => Err(InvokeError::MalformedResponse(format!(
            "expected 1 prediction, got {}",
            other.len()
        ))),
    }
}
