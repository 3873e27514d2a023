//! Readiness check for the wine recommender.

use crate::state::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_helpers::server::{HealthCheckFuture, run_health_checks};
use serde_json::json;

/// Readiness: GCP credentials must be obtainable. Also reports which optional
/// collaborators are configured and how many embeddings were loaded.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Credentials available", body = serde_json::Value),
        (status = 503, description = "Credentials unavailable", body = serde_json::Value)
    )
)]
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![(
        "credentials",
        Box::pin(async { state.auth.access_token().await.map(|_| ()) }),
    )];

    let (status, axum::Json(mut body)) = run_health_checks(checks).await;

    if let Some(map) = body.as_object_mut() {
        map.insert(
            "model_configured".to_string(),
            json!(state.service.has_user_tower()),
        );
        map.insert(
            "embeddings_loaded".to_string(),
            json!(state.service.store_size().is_some()),
        );
        map.insert(
            "embeddings_count".to_string(),
            json!(state.service.store_size().unwrap_or(0)),
        );
        map.insert("score_policy".to_string(), json!(state.service.policy()));
    }

    (status, axum::Json(body)).into_response()
}
