//! Model artifact: a serialized preprocessing + logistic regression pipeline
//!
//! The offline training job writes the fitted pipeline as JSON. Numeric
//! columns are standardized, categorical columns are one-hot encoded with
//! unknown categories ignored, passthrough columns are used unchanged. The
//! expanded feature vector feeds a binary logistic regression whose
//! positive-class probability is what the gateway serves.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::{Cell, Frame};

/// Artifact format version understood by this build
pub const ARTIFACT_VERSION: u32 = 1;

/// Failures loading or validating an artifact file
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// No file at the configured path
    #[error("model artifact not found at {0}")]
    NotFound(PathBuf),

    /// File exists but could not be read
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        /// Artifact path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// File is not a valid artifact document
    #[error("failed to parse model artifact {path}: {source}")]
    Parse {
        /// Artifact path
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// Document parsed but is internally inconsistent
    #[error("invalid model artifact: {0}")]
    Invalid(String),
}

impl ArtifactError {
    /// Create an invalid-artifact error with the given message
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Failures raised while scoring a frame
///
/// Most variants describe a request that does not fit the model; see
/// [`PredictionError::is_input_error`]. Only [`PredictionError::NonFinite`]
/// is a fault of the model itself.
#[derive(Debug, Error, PartialEq)]
pub enum PredictionError {
    /// A feature the model needs is absent from the request
    #[error("missing feature column '{0}'")]
    MissingColumn(String),

    /// A numeric feature carried a non-numeric value
    #[error("feature '{column}' in instance {row} is not numeric")]
    NonNumeric {
        /// Feature name
        column: String,
        /// Zero-based row index
        row: usize,
    },

    /// A numeric feature was null
    #[error("feature '{column}' in instance {row} is missing a value")]
    MissingValue {
        /// Feature name
        column: String,
        /// Zero-based row index
        row: usize,
    },

    /// Positional model received the wrong number of columns
    #[error("model expects {expected} features, got {got}")]
    FeatureCount {
        /// Width the model was fitted on
        expected: usize,
        /// Width of the request
        got: usize,
    },

    /// Scoring produced NaN or infinity
    #[error("prediction for instance {row} is not finite")]
    NonFinite {
        /// Zero-based row index
        row: usize,
    },
}

impl PredictionError {
    /// Whether the request, not the model, is at fault
    pub fn is_input_error(&self) -> bool {
        match self {
            PredictionError::MissingColumn(_)
            | PredictionError::NonNumeric { .. }
            | PredictionError::MissingValue { .. }
            | PredictionError::FeatureCount { .. } => true,
            PredictionError::NonFinite { .. } => false,
        }
    }
}

/// Anything that can score a frame with positive-class probabilities
///
/// Implementations are immutable after construction and shared across
/// concurrent requests.
pub trait Predictor: Send + Sync {
    /// Positive-class probability per row, in row order
    fn predict_proba(&self, frame: &Frame) -> Result<Vec<f64>, PredictionError>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// One input column and how it is preprocessed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeatureSpec {
    /// Standardized as `(x - mean) / scale`
    Numeric {
        /// Column name
        name: String,
        /// Training mean
        mean: f64,
        /// Training standard deviation
        scale: f64,
    },
    /// One-hot encoded; unknown values encode as all zeros
    Categorical {
        /// Column name
        name: String,
        /// Known categories in encoding order
        categories: Vec<String>,
    },
    /// Used unchanged
    Passthrough {
        /// Column name
        name: String,
    },
}

impl FeatureSpec {
    /// Column name
    pub fn name(&self) -> &str {
        match self {
            FeatureSpec::Numeric { name, .. }
            | FeatureSpec::Categorical { name, .. }
            | FeatureSpec::Passthrough { name } => name,
        }
    }

    /// Number of model inputs this column expands to
    pub fn width(&self) -> usize {
        match self {
            FeatureSpec::Categorical { categories, .. } => categories.len(),
            _ => 1,
        }
    }
}

/// Fitted preprocessing + logistic regression pipeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticPipeline {
    /// Format version, must equal [`ARTIFACT_VERSION`]
    pub version: u32,
    /// Input columns in expansion order
    pub features: Vec<FeatureSpec>,
    /// One coefficient per expanded input
    pub coefficients: Vec<f64>,
    /// Bias term
    pub intercept: f64,
}

impl LogisticPipeline {
    /// Read and validate an artifact file
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = std::fs::read(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ArtifactError::NotFound(path.to_path_buf())
            } else {
                ArtifactError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let pipeline: Self = serde_json::from_slice(&bytes).map_err(|source| {
            ArtifactError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.version != ARTIFACT_VERSION {
            return Err(ArtifactError::invalid(format!(
                "unsupported version {} (expected {})",
                self.version, ARTIFACT_VERSION
            )));
        }
        if self.features.is_empty() {
            return Err(ArtifactError::invalid("no features declared"));
        }

        let mut seen = HashSet::new();
        for feature in &self.features {
            if !seen.insert(feature.name()) {
                return Err(ArtifactError::invalid(format!(
                    "feature '{}' declared twice",
                    feature.name()
                )));
            }
            match feature {
                FeatureSpec::Numeric { name, mean, scale } => {
                    if !mean.is_finite() || !scale.is_finite() {
                        return Err(ArtifactError::invalid(format!(
                            "feature '{}' has non-finite scaling",
                            name
                        )));
                    }
                }
                FeatureSpec::Categorical { name, categories } if categories.is_empty() => {
                    return Err(ArtifactError::invalid(format!(
                        "categorical feature '{}' has no categories",
                        name
                    )));
                }
                _ => {}
            }
        }

        let width: usize = self.features.iter().map(FeatureSpec::width).sum();
        if width != self.coefficients.len() {
            return Err(ArtifactError::invalid(format!(
                "features expand to {} inputs but {} coefficients are present",
                width,
                self.coefficients.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ArtifactError::invalid("non-finite coefficients"));
        }
        Ok(())
    }
}

impl Predictor for LogisticPipeline {
    fn predict_proba(&self, frame: &Frame) -> Result<Vec<f64>, PredictionError> {
        let indices = self
            .features
            .iter()
            .map(|f| {
                frame
                    .column_index(f.name())
                    .ok_or_else(|| PredictionError::MissingColumn(f.name().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        frame
            .rows()
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                let mut z = self.intercept;
                let mut offset = 0;
                for (feature, &col) in self.features.iter().zip(&indices) {
                    let cell = &cells[col];
                    match feature {
                        FeatureSpec::Numeric { name, mean, scale } => {
                            let x = numeric(cell, name, row)?;
                            let scale = if *scale == 0.0 { 1.0 } else { *scale };
                            z += self.coefficients[offset] * (x - mean) / scale;
                        }
                        FeatureSpec::Categorical { categories, .. } => {
                            if let Some(hot) = category_index(cell, categories) {
                                z += self.coefficients[offset + hot];
                            }
                        }
                        FeatureSpec::Passthrough { name } => {
                            z += self.coefficients[offset] * numeric(cell, name, row)?;
                        }
                    }
                    offset += feature.width();
                }

                let p = sigmoid(z);
                if p.is_finite() {
                    Ok(p)
                } else {
                    Err(PredictionError::NonFinite { row })
                }
            })
            .collect()
    }

    fn describe(&self) -> String {
        format!(
            "logistic pipeline v{} ({} features, {} inputs)",
            self.version,
            self.features.len(),
            self.coefficients.len()
        )
    }
}

fn numeric(cell: &Cell, column: &str, row: usize) -> Result<f64, PredictionError> {
    match cell {
        Cell::Missing => Err(PredictionError::MissingValue {
            column: column.to_string(),
            row,
        }),
        other => other.as_number().ok_or_else(|| PredictionError::NonNumeric {
            column: column.to_string(),
            row,
        }),
    }
}

fn category_index(cell: &Cell, categories: &[String]) -> Option<usize> {
    let value = match cell {
        Cell::Text(s) => s.clone(),
        Cell::Number(x) if x.fract() == 0.0 => format!("{}", *x as i64),
        Cell::Number(x) => x.to_string(),
        Cell::Missing => return None,
    };
    categories.iter().position(|c| *c == value)
}

/// Numerically stable logistic function
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use churn_common::FeatureRecord;
    use serde_json::json;
    use std::io::Write;

    fn churn_pipeline() -> LogisticPipeline {
        LogisticPipeline {
            version: ARTIFACT_VERSION,
            features: vec![
                FeatureSpec::Numeric {
                    name: "tenure".into(),
                    mean: 32.0,
                    scale: 24.0,
                },
                FeatureSpec::Numeric {
                    name: "MonthlyCharges".into(),
                    mean: 65.0,
                    scale: 30.0,
                },
                FeatureSpec::Categorical {
                    name: "Contract".into(),
                    categories: vec![
                        "Month-to-month".into(),
                        "One year".into(),
                        "Two year".into(),
                    ],
                },
                FeatureSpec::Passthrough {
                    name: "SeniorCitizen".into(),
                },
            ],
            coefficients: vec![-0.8, 0.5, 0.9, -0.4, -1.2, 0.3],
            intercept: -1.0,
        }
    }

    fn frame(value: serde_json::Value) -> Frame {
        let records: Vec<FeatureRecord> = serde_json::from_value(value).unwrap();
        Frame::from_instances(&records).unwrap()
    }

    #[test]
    fn predictions_follow_row_order() {
        let pipeline = churn_pipeline();
        let f = frame(json!([
            {"tenure": 1, "MonthlyCharges": 95.0, "Contract": "Month-to-month", "SeniorCitizen": 1},
            {"tenure": 70, "MonthlyCharges": 20.0, "Contract": "Two year", "SeniorCitizen": 0}
        ]));

        let preds = pipeline.predict_proba(&f).unwrap();

        assert_eq!(preds.len(), 2);
        assert!(preds.iter().all(|p| (0.0..=1.0).contains(p)));
        // New month-to-month customer is riskier than a long two-year one
        assert!(preds[0] > preds[1]);
    }

    #[test]
    fn probability_matches_hand_computed_logit() {
        let pipeline = churn_pipeline();
        let f = frame(json!([
            {"tenure": 32, "MonthlyCharges": 65.0, "Contract": "One year", "SeniorCitizen": 0}
        ]));

        let preds = pipeline.predict_proba(&f).unwrap();
        // Both numerics sit at their mean, so only intercept + "One year" remain
        let expected = sigmoid(-1.0 - 0.4);
        assert!((preds[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn unknown_category_encodes_as_zeros() {
        let pipeline = churn_pipeline();
        let f = frame(json!([
            {"tenure": 32, "MonthlyCharges": 65.0, "Contract": "Three year", "SeniorCitizen": 0}
        ]));
        let preds = pipeline.predict_proba(&f).unwrap();
        assert!((preds[0] - sigmoid(-1.0)).abs() < 1e-12);
    }

    #[test]
    fn extra_request_columns_are_ignored() {
        let pipeline = churn_pipeline();
        let f = frame(json!([{
            "customerID": "webapp-test-user",
            "tenure": 5, "MonthlyCharges": 70.0, "Contract": "One year", "SeniorCitizen": 0
        }]));
        assert_eq!(pipeline.predict_proba(&f).unwrap().len(), 1);
    }

    #[test]
    fn missing_column_is_rejected() {
        let pipeline = churn_pipeline();
        let f = frame(json!([{"tenure": 5, "MonthlyCharges": 70.0, "SeniorCitizen": 0}]));
        assert_eq!(
            pipeline.predict_proba(&f),
            Err(PredictionError::MissingColumn("Contract".into()))
        );
    }

    #[test]
    fn non_numeric_and_null_values_are_rejected() {
        let pipeline = churn_pipeline();

        let f = frame(json!([
            {"tenure": "long", "MonthlyCharges": 70.0, "Contract": "One year", "SeniorCitizen": 0}
        ]));
        assert!(matches!(
            pipeline.predict_proba(&f),
            Err(PredictionError::NonNumeric { row: 0, .. })
        ));

        let f = frame(json!([
            {"tenure": 3, "MonthlyCharges": null, "Contract": "One year", "SeniorCitizen": 0}
        ]));
        assert!(matches!(
            pipeline.predict_proba(&f),
            Err(PredictionError::MissingValue { row: 0, .. })
        ));
    }

    #[test]
    fn only_non_finite_scores_are_model_faults() {
        assert!(PredictionError::MissingColumn("tenure".into()).is_input_error());
        assert!(PredictionError::NonNumeric {
            column: "tenure".into(),
            row: 0
        }
        .is_input_error());
        assert!(PredictionError::MissingValue {
            column: "tenure".into(),
            row: 0
        }
        .is_input_error());
        assert!(PredictionError::FeatureCount {
            expected: 30,
            got: 20
        }
        .is_input_error());
        assert!(!PredictionError::NonFinite { row: 0 }.is_input_error());
    }

    #[test]
    fn load_reads_and_validates_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&churn_pipeline()).unwrap().as_bytes())
            .unwrap();

        let loaded = LogisticPipeline::load(file.path()).unwrap();
        assert_eq!(loaded, churn_pipeline());
    }

    #[test]
    fn load_distinguishes_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("model.json");
        assert!(matches!(
            LogisticPipeline::load(&missing),
            Err(ArtifactError::NotFound(_))
        ));

        std::fs::write(&missing, b"not json").unwrap();
        assert!(matches!(
            LogisticPipeline::load(&missing),
            Err(ArtifactError::Parse { .. })
        ));
    }

    #[test]
    fn coefficient_width_mismatch_is_invalid() {
        let mut pipeline = churn_pipeline();
        pipeline.coefficients.pop();
        let err = pipeline.validate().unwrap_err();
        assert!(err.to_string().contains("6 inputs but 5 coefficients"));
    }

    #[test]
    fn duplicate_features_and_bad_versions_are_invalid() {
        let mut pipeline = churn_pipeline();
        pipeline.features[1] = FeatureSpec::Numeric {
            name: "tenure".into(),
            mean: 0.0,
            scale: 1.0,
        };
        assert!(pipeline.validate().unwrap_err().to_string().contains("twice"));

        let mut pipeline = churn_pipeline();
        pipeline.version = 2;
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn artifact_json_uses_kind_tags() {
        let doc = json!({
            "version": 1,
            "features": [
                {"kind": "numeric", "name": "tenure", "mean": 0.0, "scale": 1.0},
                {"kind": "categorical", "name": "gender", "categories": ["Female", "Male"]},
                {"kind": "passthrough", "name": "SeniorCitizen"}
            ],
            "coefficients": [0.1, 0.2, 0.3, 0.4],
            "intercept": 0.0
        });
        let pipeline: LogisticPipeline = serde_json::from_value(doc).unwrap();
        assert!(pipeline.validate().is_ok());
        assert_eq!(pipeline.features[1].width(), 2);
    }

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!(sigmoid(-1000.0).is_finite());
    }
}
