use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::instrument;

use crate::{
    engine::ChatEngine,
    error::{Result, ServiceError},
    types::{ChatRequest, ChatResponse, HealthResponse, ServiceInfo},
};

pub(super) async fn health(State(engine): State<Arc<ChatEngine>>) -> Json<HealthResponse> {
    Json(engine.health())
}

pub(super) async fn root(State(engine): State<Arc<ChatEngine>>) -> Json<ServiceInfo> {
    Json(engine.info())
}

/// Prometheus text exposition of the chat counters
pub(super) async fn metrics(State(engine): State<Arc<ChatEngine>>) -> Result<impl IntoResponse> {
    let body = engine.metrics().render()?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

#[instrument(skip_all, fields(messages = request.messages.len()))]
pub(super) async fn chat(
    State(engine): State<Arc<ChatEngine>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    engine.chat(request).await.map(Json)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
