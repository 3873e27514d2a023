//! Precomputed wine embeddings, loaded once at startup and read-only after.

use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::auth::GcpAuth;
use crate::error::{WineError, WineResult};

const STORAGE_BASE_URL: &str = "https://storage.googleapis.com/";

/// Wine id → embedding.
#[derive(Debug, Default)]
pub struct EmbeddingStore {
    embeddings: HashMap<String, Vec<f32>>,
}

#[derive(Deserialize)]
struct Record {
    id: RecordId,
    embedding: Vec<f32>,
}

/// Ids appear both as strings and as bare integers in exported files.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        match id {
            RecordId::Text(text) => text,
            RecordId::Number(number) => number.to_string(),
        }
    }
}

impl EmbeddingStore {
    /// Parses newline-delimited `{"id", "embedding"}` records. Blank lines are
    /// skipped; any malformed line fails the whole load. A repeated id keeps
    /// its last embedding.
    pub fn from_ndjson(content: &str) -> WineResult<Self> {
        let mut embeddings = HashMap::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record: Record = serde_json::from_str(line)
                .map_err(|e| WineError::Storage(format!("line {}: {}", index + 1, e)))?;
            embeddings.insert(String::from(record.id), record.embedding);
        }

        info!(
            total_wines = embeddings.len(),
            memory_size_mb = content.len() as f64 / (1024.0 * 1024.0),
            "Wine embeddings loaded"
        );

        Ok(Self { embeddings })
    }

    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.embeddings.get(id).map(Vec::as_slice)
    }

    /// Looks up each id; only ids with an embedding appear in the result.
    pub fn get_many<'a, S: AsRef<str>>(&'a self, ids: &'a [S]) -> HashMap<&'a str, &'a [f32]> {
        let found: HashMap<&str, &[f32]> = ids
            .iter()
            .map(AsRef::as_ref)
            .filter_map(|id| self.get(id).map(|embedding| (id, embedding)))
            .collect();

        info!(
            requested = ids.len(),
            found = found.len(),
            missing = ids.len().saturating_sub(found.len()),
            "Retrieved embeddings"
        );

        found
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Where the embeddings file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingSource {
    Gcs { bucket: String, object: String },
    File(PathBuf),
}

impl EmbeddingSource {
    /// `gs://bucket/path/to/object` or a local path.
    pub fn parse(uri: &str) -> WineResult<Self> {
        match uri.strip_prefix("gs://") {
            Some(rest) => match rest.split_once('/') {
                Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => {
                    Ok(EmbeddingSource::Gcs {
                        bucket: bucket.to_string(),
                        object: object.to_string(),
                    })
                }
                _ => Err(WineError::Storage(format!("Invalid GCS URI: {}", uri))),
            },
            None => Ok(EmbeddingSource::File(PathBuf::from(uri))),
        }
    }
}

/// Downloads and parses the embeddings file.
#[derive(Debug, Clone)]
pub struct StoreLoader {
    auth: GcpAuth,
    storage_base: String,
}

impl StoreLoader {
    pub fn new(auth: GcpAuth) -> Self {
        Self {
            auth,
            storage_base: STORAGE_BASE_URL.to_string(),
        }
    }

    pub fn with_storage_base(mut self, base: impl Into<String>) -> Self {
        self.storage_base = base.into();
        self
    }

    pub async fn load(&self, uri: &str) -> WineResult<EmbeddingStore> {
        info!(uri, "Loading wine embeddings");

        let result = match EmbeddingSource::parse(uri)? {
            EmbeddingSource::Gcs { bucket, object } => self.download(&bucket, &object).await,
            EmbeddingSource::File(path) => tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| WineError::Storage(format!("{}: {}", path.display(), e))),
        }
        .and_then(|content| EmbeddingStore::from_ndjson(&content));

        match result {
            Ok(ref store) if store.is_empty() => {
                warn!(uri, "Embeddings file has no records; every score request will be empty")
            }
            Err(ref e) => error!(uri, error = %e, "Failed to load wine embeddings"),
            Ok(_) => {}
        }
        result
    }

    fn object_url(&self, bucket: &str, object: &str) -> WineResult<Url> {
        let mut url = Url::parse(&self.storage_base)
            .map_err(|e| WineError::Storage(format!("Invalid storage base URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| WineError::Storage("Storage base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", bucket, "o", object]);
        url.query_pairs_mut().append_pair("alt", "media");

        Ok(url)
    }

    async fn download(&self, bucket: &str, object: &str) -> WineResult<String> {
        let url = self.object_url(bucket, object)?;
        let token = self.auth.access_token().await.map_err(WineError::Storage)?;

        let response = self
            .auth
            .client()
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| WineError::Storage(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WineError::Storage(format!(
                "Cloud Storage returned {}: {}",
                status, body
            )));
        }

        response
            .text()
            .await
            .map_err(|e| WineError::Storage(e.to_string()))
    }
}
