//! User tower of the two-tower recommendation model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::auth::GcpAuth;
use crate::config::ModelConfig;
use crate::error::{WineError, WineResult};
use crate::features::UserFeatures;

/// Maps the 55 user features to a user embedding.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserTower: Send + Sync {
    async fn embed_user(&self, features: &UserFeatures) -> WineResult<Vec<f32>>;
}

/// Calls a Vertex AI prediction endpoint: `{"instances": [[55 floats]]}` in,
/// `{"predictions": [[embedding]]}` out.
pub struct VertexEndpointTower {
    auth: GcpAuth,
    config: ModelConfig,
}

impl VertexEndpointTower {
    pub fn new(auth: GcpAuth, config: ModelConfig) -> Self {
        info!(endpoint = %config.endpoint, "User tower endpoint configured");
        Self { auth, config }
    }

    async fn predict(&self, features: &UserFeatures) -> WineResult<Vec<f32>> {
        let token = self.auth.access_token().await.map_err(WineError::Model)?;

        let request = PredictRequest {
            instances: [features.as_slice()],
        };

        let response = self
            .auth
            .client()
            .post(self.config.predict_url())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| WineError::Model(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WineError::Model(format!(
                "Prediction API error ({}): {}",
                status, body
            )));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| WineError::Model(format!("Malformed response: {}", e)))?;

        let first = parsed
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| WineError::Model("No predictions returned from model endpoint".into()))?;

        parse_embedding(first)
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [&'a [f64]; 1],
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Value>,
}

fn parse_embedding(prediction: Value) -> WineResult<Vec<f32>> {
    let Value::Array(values) = prediction else {
        return Err(WineError::Model(format!(
            "Unexpected embedding format: {}",
            prediction
        )));
    };

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|x| x as f32)
                .ok_or_else(|| WineError::Model(format!("Non-numeric embedding value: {}", v)))
        })
        .collect()
}

#[async_trait]
impl UserTower for VertexEndpointTower {
    async fn embed_user(&self, features: &UserFeatures) -> WineResult<Vec<f32>> {
        info!(feature_count = features.as_slice().len(), "Generating user embedding");

        let embedding = self.predict(features).await.inspect_err(|e| {
            error!(error = %e, endpoint = %self.config.endpoint, "Failed to generate user embedding");
        })?;

        info!(embedding_dim = embedding.len(), "User embedding generated");
        Ok(embedding)
    }
}
