//! Loaded-model handle shared by every request handler
//!
//! The handle is filled exactly once, by the startup loader, and never
//! mutated afterwards. Until then every request sees [`ModelStatus::Loading`].

use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use tracing::{error, info};

use crate::artifact::{LogisticPipeline, Predictor};
use crate::fallback::FallbackModel;

/// Where the serving model came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelSource {
    /// The trained artifact loaded from disk
    Artifact,
    /// The synthetic placeholder (degraded mode)
    Fallback,
}

impl ModelSource {
    /// Value of the `x-model-source` response header
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSource::Artifact => "artifact",
            ModelSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ready-to-serve predictor and its provenance
#[derive(Clone)]
pub struct LoadedModel {
    predictor: Arc<dyn Predictor>,
    source: ModelSource,
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("predictor", &self.predictor.describe())
            .field("source", &self.source)
            .finish()
    }
}

impl LoadedModel {
    /// Wrap a predictor
    pub fn new(predictor: Arc<dyn Predictor>, source: ModelSource) -> Self {
        Self { predictor, source }
    }

    /// Shared predictor
    pub fn predictor(&self) -> Arc<dyn Predictor> {
        Arc::clone(&self.predictor)
    }

    /// Provenance
    pub fn source(&self) -> ModelSource {
        self.source
    }
}

/// Observable state of the handle
#[derive(Debug)]
pub enum ModelStatus<'a> {
    /// Startup load has not finished
    Loading,
    /// A model (real or placeholder) is installed
    Ready(&'a LoadedModel),
    /// Neither the artifact nor the placeholder could be established
    Failed(&'a str),
}

/// Write-once slot for the serving model
#[derive(Debug, Default)]
pub struct ModelHandle {
    slot: OnceLock<Result<LoadedModel, String>>,
}

impl ModelHandle {
    /// Empty handle; requests are rejected until [`ModelHandle::install`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that is ready from the start
    pub fn ready(model: LoadedModel) -> Self {
        let handle = Self::new();
        handle.install(Ok(model));
        handle
    }

    /// Install the outcome of the startup load.
    ///
    /// Returns false if an outcome was already installed; the first one wins.
    pub fn install(&self, outcome: Result<LoadedModel, String>) -> bool {
        self.slot.set(outcome).is_ok()
    }

    /// Current state
    pub fn status(&self) -> ModelStatus<'_> {
        match self.slot.get() {
            None => ModelStatus::Loading,
            Some(Ok(model)) => ModelStatus::Ready(model),
            Some(Err(reason)) => ModelStatus::Failed(reason),
        }
    }
}

/// Load the artifact at `path`, substituting the placeholder on failure.
///
/// Load failures are logged at error severity and otherwise swallowed. An
/// error is returned only when the placeholder cannot be built either.
pub fn load_or_fallback(path: &Path, fallback_features: usize) -> Result<LoadedModel, String> {
    info!(path = %path.display(), "Loading model artifact");

    match LogisticPipeline::load(path) {
        Ok(pipeline) => {
            info!(model = %pipeline.describe(), "Model artifact loaded");
            Ok(LoadedModel::new(Arc::new(pipeline), ModelSource::Artifact))
        }
        Err(load_error) => {
            error!(
                path = %path.display(),
                error = %load_error,
                fallback_features,
                "Model artifact unavailable, serving fallback placeholder (degraded mode)"
            );
            let fallback = FallbackModel::fit(fallback_features).ok_or_else(|| {
                error!(error = %load_error, "Fallback placeholder could not be built");
                format!(
                    "{}; fallback requires at least one feature",
                    load_error
                )
            })?;
            info!(model = %fallback.describe(), "Fallback placeholder ready");
            Ok(LoadedModel::new(Arc::new(fallback), ModelSource::Fallback))
        }
    }
}
