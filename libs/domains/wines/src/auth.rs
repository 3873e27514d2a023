//! Google Cloud bearer tokens.
//!
//! A static `GOOGLE_ACCESS_TOKEN` wins (local development); otherwise the
//! token is fetched from the GCE/GKE metadata server on every call.

use reqwest::Client;
use serde::Deserialize;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Clone)]
pub struct GcpAuth {
    client: Client,
    static_token: Option<String>,
    metadata_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GcpAuth {
    pub fn new(client: Client, static_token: Option<String>) -> Self {
        Self {
            client,
            static_token,
            metadata_url: METADATA_TOKEN_URL.to_string(),
        }
    }

    /// Reads `GOOGLE_ACCESS_TOKEN`; unset or blank falls back to the metadata server.
    pub fn from_env(client: Client) -> Self {
        Self::new(client, core_config::env_optional("GOOGLE_ACCESS_TOKEN"))
    }

    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Returns a bearer token. The error string describes the cause; callers
    /// wrap it in their own failure variant.
    pub async fn access_token(&self) -> Result<String, String> {
        if let Some(ref token) = self.static_token {
            return Ok(token.clone());
        }

        let response = self
            .client
            .get(&self.metadata_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| {
                format!(
                    "Failed to get access token from metadata server: {}. \
                     Set GOOGLE_ACCESS_TOKEN for local development.",
                    e
                )
            })?;

        if !response.status().is_success() {
            return Err(format!(
                "Metadata server returned {}. Set GOOGLE_ACCESS_TOKEN for local development.",
                response.status()
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse token response: {}", e))?;

        Ok(token.access_token)
    }
}
