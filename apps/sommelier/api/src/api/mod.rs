pub mod health;

use axum::Router;
use axum::routing::get;
use axum_helpers::server::health_router;
use domain_wines::TextExtractor;
use std::sync::Arc;

use crate::openapi::ApiDoc;
use crate::state::AppState;

/// The full application router:
/// - wine and OCR routes at the root, with docs and middleware
/// - `/` and `/health`: liveness with app name/version
/// - `/ready`: credentials check plus collaborator summary
pub fn app(state: &AppState, ocr: Arc<dyn TextExtractor>) -> std::io::Result<Router> {
    let api_routes = domain_wines::router(state.service.clone(), ocr);
    let router = axum_helpers::create_router::<ApiDoc>(api_routes, &state.config.server)?;

    Ok(router
        .merge(health_router(state.config.app))
        .merge(ready_router(state.clone())))
}

/// `/ready` with its own state so it can be merged after `create_router`.
pub fn ready_router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Environment, SERVICE_NAME};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use core_config::{AppInfo, FromEnv, server::ServerConfig};
    use domain_wines::{
        EmbeddingStore, GcpAuth, Neighbor, NeighborIndex, ScorePolicy, WineResult, WineService,
        TextExtractor, WinesConfig,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    struct EmptyIndex;

    #[async_trait]
    impl NeighborIndex for EmptyIndex {
        async fn find_neighbors(&self, _vector: &[f32], _k: u32) -> WineResult<Vec<Neighbor>> {
            Ok(vec![])
        }
    }

    fn state(auth: GcpAuth, service: WineService) -> AppState {
        AppState {
            config: Config {
                app: AppInfo {
                    name: SERVICE_NAME,
                    version: "test",
                },
                server: ServerConfig::new("127.0.0.1".into(), 0),
                environment: Environment::Development,
                wines: WinesConfig::from_env().unwrap(),
            },
            auth,
            service: Arc::new(service),
        }
    }

    struct NoText;

    #[async_trait]
    impl TextExtractor for NoText {
        async fn extract_text(&self, _image: &[u8]) -> WineResult<String> {
            Ok(String::new())
        }
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_ready(state: AppState) -> (StatusCode, Value) {
        get(ready_router(state), "/ready").await
    }

    #[tokio::test]
    async fn test_ready_reports_collaborators() {
        let store = EmbeddingStore::from_ndjson("{\"id\": \"1\", \"embedding\": [1.0]}\n").unwrap();
        let service = WineService::new(Arc::new(EmptyIndex))
            .with_store(Arc::new(store))
            .with_policy(ScorePolicy::SigmoidRating);
        let auth = GcpAuth::new(reqwest::Client::new(), Some("token".into()));

        let (status, json) = get_ready(state(auth, service)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ready");
        assert_eq!(json["checks"]["credentials"], "ok");
        assert_eq!(json["model_configured"], false);
        assert_eq!(json["embeddings_loaded"], true);
        assert_eq!(json["embeddings_count"], 1);
        assert_eq!(json["score_policy"], "sigmoid");
    }

    #[tokio::test]
    async fn test_ready_without_credentials_is_503() {
        let auth = GcpAuth::new(reqwest::Client::new(), None)
            .with_metadata_url("http://127.0.0.1:9/token");

        let (status, json) = get_ready(state(auth, WineService::new(Arc::new(EmptyIndex)))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "not ready");
        assert_eq!(json["embeddings_loaded"], false);
        assert_eq!(json["embeddings_count"], 0);
    }

    #[tokio::test]
    async fn test_app_serves_health_docs_and_wine_routes() {
        let auth = GcpAuth::new(reqwest::Client::new(), Some("token".into()));
        let state = state(auth, WineService::new(Arc::new(EmptyIndex)));
        let app = app(&state, Arc::new(NoText)).unwrap();

        let (status, json) = get(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], SERVICE_NAME);

        let (status, json) = get(app.clone(), "/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["paths"]["/wines/legacy"].is_object());
        assert!(json["paths"]["/ready"].is_object());

        let (status, _) = get(app.clone(), "/ready").await;
        assert_eq!(status, StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/wines/legacy")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"type": "Red", "body": 3, "dryness": 2, "abv": 13}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
