//! Nearest-neighbor queries against Vertex AI Vector Search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::GcpAuth;
use crate::config::VectorSearchConfig;
use crate::error::{WineError, WineResult};
use crate::models::Neighbor;

/// One query vector in, up to `neighbor_count` hits out, in index order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NeighborIndex: Send + Sync {
    async fn find_neighbors(&self, vector: &[f32], neighbor_count: u32)
    -> WineResult<Vec<Neighbor>>;
}

/// REST client for `indexEndpoints.findNeighbors` on a public endpoint.
pub struct VertexVectorSearch {
    auth: GcpAuth,
    config: VectorSearchConfig,
}

impl VertexVectorSearch {
    pub fn new(auth: GcpAuth, config: VectorSearchConfig) -> Self {
        Self { auth, config }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FindNeighborsRequest<'a> {
    deployed_index_id: &'a str,
    queries: [Query<'a>; 1],
    return_full_datapoint: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Query<'a> {
    datapoint: QueryDatapoint<'a>,
    neighbor_count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryDatapoint<'a> {
    datapoint_id: &'static str,
    feature_vector: &'a [f32],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindNeighborsResponse {
    #[serde(default)]
    nearest_neighbors: Vec<NearestNeighbors>,
}

#[derive(Deserialize)]
struct NearestNeighbors {
    #[serde(default)]
    neighbors: Vec<RawNeighbor>,
}

#[derive(Deserialize)]
struct RawNeighbor {
    datapoint: RawDatapoint,
    // proto3 JSON omits a zero distance
    #[serde(default)]
    distance: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDatapoint {
    datapoint_id: String,
}

#[async_trait]
impl NeighborIndex for VertexVectorSearch {
    async fn find_neighbors(
        &self,
        vector: &[f32],
        neighbor_count: u32,
    ) -> WineResult<Vec<Neighbor>> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(WineError::VectorSearch)?;

        let request = FindNeighborsRequest {
            deployed_index_id: &self.config.deployed_index_id,
            queries: [Query {
                datapoint: QueryDatapoint {
                    datapoint_id: "query",
                    feature_vector: vector,
                },
                neighbor_count,
            }],
            return_full_datapoint: false,
        };

        let response = self
            .auth
            .client()
            .post(self.config.find_neighbors_url())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| WineError::VectorSearch(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WineError::VectorSearch(format!(
                "Vector Search API error ({}): {}",
                status, body
            )));
        }

        let parsed: FindNeighborsResponse = response
            .json()
            .await
            .map_err(|e| WineError::VectorSearch(format!("Malformed response: {}", e)))?;

        let neighbors: Vec<Neighbor> = parsed
            .nearest_neighbors
            .into_iter()
            .next()
            .map(|query| {
                query
                    .neighbors
                    .into_iter()
                    .map(|n| Neighbor::new(n.datapoint.datapoint_id, n.distance))
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            dimension = vector.len(),
            requested = neighbor_count,
            returned = neighbors.len(),
            "Vector search completed"
        );

        Ok(neighbors)
    }
}
