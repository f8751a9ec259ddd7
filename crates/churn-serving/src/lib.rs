//! Inference serving gateway for the churn predictor
//!
//! Loads a model artifact once at startup (falling back to a deterministic
//! placeholder if the artifact is unavailable), answers health probes and
//! serves batched prediction requests.
//!
//! # Modules
//!
//! - [`artifact`] - Serialized pipeline format and the [`Predictor`] trait
//! - [`fallback`] - Placeholder predictor for degraded startup
//! - [`frame`] - Tabular view over request instances
//! - [`model`] - Write-once model handle shared by handlers
//! - [`server`] - Axum router and server lifecycle
//! - [`error`] - Request and server error types

#![deny(missing_docs)]

pub mod artifact;
pub mod error;
pub mod fallback;
pub mod frame;
pub mod model;
pub mod server;

pub use artifact::{ArtifactError, LogisticPipeline, PredictionError, Predictor};
pub use error::{GatewayError, ServeError};
pub use model::{load_or_fallback, LoadedModel, ModelHandle, ModelSource, ModelStatus};
pub use server::{router, shutdown_signal, start_server, AppState, ServerConfig};
