//! Wine Recommender API

use axum_helpers::server::create_production_app;
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_wines::{
    GcpAuth, StoreLoader, VertexEndpointTower, VertexVectorSearch, VisionOcr, WineService,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    // One client for every outbound call; the timeout bounds each collaborator.
    let http = reqwest::Client::builder()
        .timeout(config.wines.http_timeout)
        .build()?;
    let auth = GcpAuth::from_env(http);

    info!(
        endpoint = %config.wines.vector_search.index_endpoint,
        deployed_index_id = %config.wines.vector_search.deployed_index_id,
        "Using Vertex AI Vector Search"
    );
    let index = VertexVectorSearch::new(auth.clone(), config.wines.vector_search.clone());

    let mut service = WineService::new(Arc::new(index))
        .with_policy(config.wines.score_policy)
        .with_neighbor_count(config.wines.vector_search.neighbor_count);

    match &config.wines.model {
        Some(model) => {
            info!(endpoint = %model.endpoint, "Two-tower model endpoint configured");
            service = service.with_user_tower(Arc::new(VertexEndpointTower::new(
                auth.clone(),
                model.clone(),
            )));
        }
        None => warn!("No model endpoint configured; only legacy search is available"),
    }

    // The store is loaded before binding so a bad file fails startup.
    match &config.wines.embeddings_uri {
        Some(uri) => {
            let store = StoreLoader::new(auth.clone())
                .load(uri)
                .await
                .map_err(|e| eyre::eyre!("Wine embeddings load failed: {}", e))?;
            service = service.with_store(Arc::new(store));
        }
        None => warn!("EMBEDDINGS_URI not set; targeted scoring is disabled"),
    }

    let ocr = Arc::new(VisionOcr::new(auth.clone()));

    let state = AppState {
        config,
        auth,
        service: Arc::new(service),
    };

    let app = api::app(&state, ocr)?;

    info!(
        policy = %state.config.wines.score_policy,
        "Starting wine recommender on {}",
        state.config.server.address()
    );

    create_production_app(app, &state.config.server, Duration::from_secs(30), async {
        info!("Shutting down: no connections to close");
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Wine recommender shutdown complete");
    Ok(())
}
