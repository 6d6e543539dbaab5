//! HTTP surface: a JSON endpoint in front of the pipeline.

use std::num::NonZeroU16;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::constants::OUTPUTS_ROUTE;
use crate::error::ApiError;
use crate::pipeline::publish::PublishTarget;
use crate::pipeline::{GenerationRequest, Pipeline, PublishedResult};

#[derive(Clone)]
pub(crate) struct AppState {
    pipeline: Option<Arc<Pipeline>>,
}

impl AppState {
    fn new(pipeline: Option<Pipeline>) -> Self {
        Self {
            pipeline: pipeline.map(Arc::new),
        }
    }

    fn output_dir(&self) -> Option<PathBuf> {
        match self.pipeline.as_ref()?.publisher().target() {
            PublishTarget::Local(dir) => Some(dir.clone()),
            PublishTarget::Upload(_) => None,
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "generation": state.pipeline.is_some(),
    }))
}

async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<PublishedResult>, ApiError> {
    let pipeline = state.pipeline.ok_or(ApiError::GenerationDisabled)?;
    info!(
        "Generation {} requested for fid {}",
        request.generation_id, request.fid
    );
    let result = pipeline.run(&request).await?;
    Ok(Json(result))
}

fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", axum::routing::get(health_handler))
        .route("/generate", axum::routing::post(generate_handler));
    if let Some(dir) = state.output_dir() {
        router = router.nest_service(OUTPUTS_ROUTE, ServeDir::new(dir));
    }
    router.layer(CorsLayer::permissive()).with_state(state)
}

/// Serves the API until the listener fails.
///
/// `pipeline` is `None` when no model credential was configured; the service
/// still starts and reports generation as disabled.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    pipeline: Option<Pipeline>,
) -> Result<(), anyhow::Error> {
    let app = create_router(AppState::new(pipeline));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {}", err);
    }
    Ok(())
}
