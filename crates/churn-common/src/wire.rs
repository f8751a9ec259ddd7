//! Inference wire contract
//!
//! `POST /invocations` accepts `{"instances": [{feature: value, ...}, ...]}`
//! and answers `{"predictions": [p0, p1, ...]}` in the same order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of input: feature name to scalar value, in the caller's key order
pub type FeatureRecord = Map<String, Value>;

/// Batch prediction request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Rows to score; order is preserved in the response
    pub instances: Vec<FeatureRecord>,
}

impl InferenceRequest {
    /// Request with a single row
    pub fn single(record: FeatureRecord) -> Self {
        Self {
            instances: vec![record],
        }
    }
}

/// Batch prediction response
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    /// Positive-class probability per input row
    pub predictions: Vec<f64>,
}

impl InferenceResponse {
    /// True when every prediction is a probability in `[0, 1]`
    pub fn is_well_formed(&self) -> bool {
        self.predictions
            .iter()
            .all(|p| p.is_finite() && (0.0..=1.0).contains(p))
    }
}

/// JSON error payload returned by the gateway
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable message, preserved from the underlying failure
    pub error: String,
}

impl ErrorBody {
    /// Create an error body with the given message
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_preserves_feature_key_order() {
        let body = r#"{"instances":[{"tenure":5,"MonthlyCharges":70.0,"Contract":"One year"}]}"#;
        let req: InferenceRequest = serde_json::from_str(body).unwrap();

        let keys: Vec<&str> = req.instances[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["tenure", "MonthlyCharges", "Contract"]);
    }

    #[test]
    fn response_serializes_as_prediction_list() {
        let resp = InferenceResponse {
            predictions: vec![0.37],
        };
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"predictions":[0.37]}"#
        );
    }

    #[test]
    fn out_of_range_predictions_are_not_well_formed() {
        let ok = InferenceResponse {
            predictions: vec![0.0, 0.5, 1.0],
        };
        assert!(ok.is_well_formed());

        let bad = InferenceResponse {
            predictions: vec![0.2, 1.2],
        };
        assert!(!bad.is_well_formed());

        let nan = InferenceResponse {
            predictions: vec![f64::NAN],
        };
        assert!(!nan.is_well_formed());
    }

    #[test]
    fn missing_instances_fails_to_parse() {
        let result: Result<InferenceRequest, _> = serde_json::from_str(r#"{"rows":[]}"#);
        assert!(result.is_err());
    }
}
