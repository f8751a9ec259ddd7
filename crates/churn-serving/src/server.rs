//! HTTP surface of the inference gateway
//!
//! - `GET /ping` - 200 when a model (real or placeholder) is installed, else 404
//! - `POST /invocations` - batch prediction over `{"instances": [...]}`
//!
//! Both responses carry `x-model-source: artifact|fallback` once a model is
//! installed, so degraded mode is visible to anything that inspects headers.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use churn_common::{is_json_content_type, InferenceRequest, InferenceResponse, DEFAULT_SERVING_PORT};
use tracing::{debug, error, info, warn};

use crate::error::{GatewayError, ServeError};
use crate::fallback::DEFAULT_FALLBACK_FEATURES;
use crate::frame::Frame;
use crate::model::{load_or_fallback, LoadedModel, ModelHandle, ModelStatus};

/// Header naming where the serving model came from
pub const MODEL_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-model-source");

/// Default artifact location inside the serving container
pub const DEFAULT_MODEL_PATH: &str = "/opt/ml/model/model.json";

/// Default request body ceiling (6 MiB, the provider's payload limit)
pub const DEFAULT_MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind
    pub addr: SocketAddr,
    /// Artifact path
    pub model_path: PathBuf,
    /// Width of the placeholder model used when the artifact is unavailable
    pub fallback_features: usize,
    /// Request body ceiling
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_SERVING_PORT)),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            fallback_features: DEFAULT_FALLBACK_FEATURES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    /// Write-once model slot
    pub model: Arc<ModelHandle>,
}

impl AppState {
    /// State around an existing handle
    pub fn new(model: Arc<ModelHandle>) -> Self {
        Self { model }
    }
}

/// Build the gateway router
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/invocations", post(invocations))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

fn with_source(mut response: Response, model: &LoadedModel) -> Response {
    response.headers_mut().insert(
        MODEL_SOURCE_HEADER,
        HeaderValue::from_static(model.source().as_str()),
    );
    response
}

async fn ping(State(state): State<AppState>) -> Response {
    match state.model.status() {
        ModelStatus::Ready(model) => {
            debug!(status = 200, source = %model.source(), "Ping");
            with_source(StatusCode::OK.into_response(), model)
        }
        ModelStatus::Loading => {
            debug!(status = 404, "Ping while model is loading");
            StatusCode::NOT_FOUND.into_response()
        }
        ModelStatus::Failed(reason) => {
            warn!(status = 404, reason = %reason, "Ping with no model available");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn invocations(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, GatewayError> {
    let result = invoke(&state, &headers, body).await;
    match &result {
        Ok(_) => {}
        Err(e @ GatewayError::Prediction(_)) => error!(error = %e, "Inference failed"),
        Err(e) => warn!(status = %e.status(), error = %e, "Inference request rejected"),
    }
    result
}

async fn invoke(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, GatewayError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !is_json_content_type(content_type) {
        return Err(GatewayError::UnsupportedMediaType(content_type.to_string()));
    }

    let model = match state.model.status() {
        ModelStatus::Ready(model) => model,
        ModelStatus::Loading => return Err(GatewayError::NotReady("model is loading".into())),
        ModelStatus::Failed(reason) => return Err(GatewayError::NotReady(reason.to_string())),
    };

    let body = body?;
    let request: InferenceRequest = serde_json::from_slice(&body)?;
    let frame = Frame::from_instances(&request.instances)?;
    let n_rows = frame.n_rows();
    info!(rows = n_rows, columns = frame.columns().len(), "Received inference request");

    let predictor = model.predictor();
    let predictions = tokio::task::spawn_blocking(move || predictor.predict_proba(&frame))
        .await
        .map_err(|e| GatewayError::prediction(format!("prediction task failed: {}", e)))??;

    let response = InferenceResponse { predictions };
    if response.predictions.len() != n_rows {
        return Err(GatewayError::prediction(format!(
            "model returned {} predictions for {} instances",
            response.predictions.len(),
            n_rows
        )));
    }
    if !response.is_well_formed() {
        return Err(GatewayError::prediction(
            "model returned a value outside [0, 1]",
        ));
    }

    debug!(rows = n_rows, source = %model.source(), "Inference succeeded");
    Ok(with_source(Json(response).into_response(), model))
}

/// Bind the listener, load the model in the background, and serve until
/// `shutdown` resolves.
///
/// The listener is bound before the model loads; until the load finishes
/// `/ping` answers 404 and `/invocations` answers 503.
pub async fn start_server(
    config: ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServeError> {
    let handle = Arc::new(ModelHandle::new());
    let app = router(AppState::new(handle.clone()), config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: config.addr,
            source,
        })?;
    info!(addr = %config.addr, "Inference gateway listening");

    let model_path = config.model_path.clone();
    let fallback_features = config.fallback_features;
    tokio::spawn(async move {
        let outcome = tokio::task::spawn_blocking(move || {
            load_or_fallback(&model_path, fallback_features)
        })
        .await
        .unwrap_or_else(|e| Err(format!("model load task failed: {}", e)));

        if let Err(reason) = &outcome {
            error!(reason = %reason, "No model could be established; health checks will fail");
        }
        handle.install(outcome);
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServeError::Serve)?;

    info!("Inference gateway stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
