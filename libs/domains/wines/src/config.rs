use core_config::{env_optional, env_or_default, env_parse, ConfigError, FromEnv};
use std::time::Duration;

use crate::scoring::ScorePolicy;

const DEFAULT_API_ENDPOINT: &str = "1034142878.us-central1-438750044055.vdb.vertexai.goog";
const DEFAULT_INDEX_ENDPOINT: &str =
    "projects/438750044055/locations/us-central1/indexEndpoints/8377172494955577344";
const DEFAULT_DEPLOYED_INDEX_ID: &str = "wine_embeddings_1765502080376";
const DEFAULT_MODEL_PROJECT_ID: &str = "enhanced-layout-465420-v5";
const DEFAULT_MODEL_LOCATION: &str = "us-central1";

/// Prefixes a bare host with `https://`; full URLs are kept (local emulators, tests).
pub(crate) fn base_url(host_or_url: &str) -> String {
    let trimmed = host_or_url.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Vertex AI Vector Search deployment
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchConfig {
    /// Public endpoint host of the index endpoint
    pub api_endpoint: String,
    /// `projects/{p}/locations/{l}/indexEndpoints/{id}`
    pub index_endpoint: String,
    pub deployed_index_id: String,
    pub neighbor_count: u32,
}

impl VectorSearchConfig {
    pub fn find_neighbors_url(&self) -> String {
        format!(
            "{}/v1/{}:findNeighbors",
            base_url(&self.api_endpoint),
            self.index_endpoint
        )
    }
}

impl FromEnv for VectorSearchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_endpoint: env_or_default("API_ENDPOINT", DEFAULT_API_ENDPOINT),
            index_endpoint: env_or_default("INDEX_ENDPOINT", DEFAULT_INDEX_ENDPOINT),
            deployed_index_id: env_or_default("DEPLOYED_INDEX_ID", DEFAULT_DEPLOYED_INDEX_ID),
            neighbor_count: env_parse("DEFAULT_NEIGHBOR_COUNT", 10u32)?,
        })
    }
}

/// Vertex AI prediction endpoint serving the user tower
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// `projects/{p}/locations/{l}/endpoints/{id}`
    pub endpoint: String,
    pub location: String,
    /// Overrides `https://{location}-aiplatform.googleapis.com`
    pub api_base: Option<String>,
}

impl ModelConfig {
    pub fn new(endpoint: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            location: location.into(),
            api_base: None,
        }
    }

    pub fn from_parts(project_id: &str, location: &str, endpoint_id: &str) -> Self {
        Self::new(
            format!(
                "projects/{}/locations/{}/endpoints/{}",
                project_id, location, endpoint_id
            ),
            location,
        )
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn predict_url(&self) -> String {
        let base = match &self.api_base {
            Some(api_base) => base_url(api_base),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        };
        format!("{}/v1/{}:predict", base, self.endpoint)
    }

    /// `MODEL_ENDPOINT` wins; otherwise the endpoint is composed from
    /// `MODEL_PROJECT_ID`, `MODEL_LOCATION` and `MODEL_ENDPOINT_ID`.
    /// Returns `None` when neither is set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let location = env_or_default("MODEL_LOCATION", DEFAULT_MODEL_LOCATION);

        if let Some(endpoint) = env_optional("MODEL_ENDPOINT") {
            let location = location_of(&endpoint).unwrap_or(location);
            return Ok(Some(Self::new(endpoint, location)));
        }

        Ok(env_optional("MODEL_ENDPOINT_ID").map(|endpoint_id| {
            let project_id = env_or_default("MODEL_PROJECT_ID", DEFAULT_MODEL_PROJECT_ID);
            Self::from_parts(&project_id, &location, &endpoint_id)
        }))
    }
}

/// Region segment of a `projects/{p}/locations/{l}/...` resource name.
fn location_of(resource: &str) -> Option<String> {
    let mut segments = resource.split('/');
    while let Some(segment) = segments.next() {
        if segment == "locations" {
            return segments.next().filter(|l| !l.is_empty()).map(str::to_string);
        }
    }
    None
}

/// Everything the wine domain reads from the environment.
#[derive(Debug, Clone)]
pub struct WinesConfig {
    pub vector_search: VectorSearchConfig,
    pub model: Option<ModelConfig>,
    /// `gs://bucket/object` or a local path; `None` disables targeted scoring
    pub embeddings_uri: Option<String>,
    pub score_policy: ScorePolicy,
    /// Timeout for every outbound call
    pub http_timeout: Duration,
}

impl FromEnv for WinesConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            vector_search: VectorSearchConfig::from_env()?,
            model: ModelConfig::from_env()?,
            embeddings_uri: env_optional("EMBEDDINGS_URI"),
            score_policy: env_parse("SCORE_POLICY", ScorePolicy::default())?,
            http_timeout: Duration::from_secs(env_parse("HTTP_TIMEOUT_SECS", 30u64)?),
        })
    }
}
