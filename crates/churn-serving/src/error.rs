//! Error types for the inference gateway

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use churn_common::ErrorBody;
use thiserror::Error;

use crate::artifact::PredictionError;
use crate::frame::FrameError;

/// Message returned with 415 responses
pub const UNSUPPORTED_MEDIA_TYPE_MESSAGE: &str = "This predictor only supports JSON data";

/// Request-level failures, each mapped to a status code and a JSON body
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Declared content type is not JSON
    #[error("unsupported content type '{0}'")]
    UnsupportedMediaType(String),

    /// Body could not be read (too large, aborted)
    #[error("request body rejected: {0}")]
    BodyRejected(#[from] BytesRejection),

    /// Malformed, missing or non-tabular input
    #[error("invalid input: {0}")]
    ClientInput(String),

    /// The model call failed
    #[error("prediction failed: {0}")]
    Prediction(String),

    /// Startup load has not finished or failed permanently
    #[error("model not ready: {0}")]
    NotReady(String),
}

/// Failures running the HTTP server itself
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: std::net::SocketAddr,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The server loop exited with an error
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl GatewayError {
    /// Create a client input error with the given message
    pub fn client_input(msg: impl Into<String>) -> Self {
        Self::ClientInput(msg.into())
    }

    /// Create a prediction error with the given message
    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::Prediction(msg.into())
    }

    /// HTTP status for this failure class
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::BodyRejected(rejection) => rejection.status(),
            GatewayError::ClientInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::ClientInput(e.to_string())
    }
}

impl From<FrameError> for GatewayError {
    fn from(e: FrameError) -> Self {
        GatewayError::ClientInput(e.to_string())
    }
}

impl From<PredictionError> for GatewayError {
    fn from(e: PredictionError) -> Self {
        if e.is_input_error() {
            GatewayError::client_input(e.to_string())
        } else {
            GatewayError::prediction(e.to_string())
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            GatewayError::UnsupportedMediaType(_) => {
                ErrorBody::new(UNSUPPORTED_MEDIA_TYPE_MESSAGE)
            }
            other => ErrorBody::new(other.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
