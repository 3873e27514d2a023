//! Wine Domain Library
//!
//! Wine search and recommendation on top of Vertex AI Vector Search, with a
//! two-tower model for user embeddings and Cloud Vision for label OCR.
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────┐
//!            │ WineService  │  ← legacy search, recommend, score
//!            └──────┬───────┘
//!     ┌─────────────┼──────────────┐
//! ┌───▼──────────┐ ┌▼───────────┐ ┌▼───────────────┐
//! │NeighborIndex │ │ UserTower  │ │ EmbeddingStore │
//! │   (trait)    │ │  (trait)   │ │  (in-memory)   │
//! └───┬──────────┘ └┬───────────┘ └────────────────┘
//! ┌───▼──────────────┐ ┌▼────────────────────┐
//! │VertexVectorSearch│ │ VertexEndpointTower │
//! └──────────────────┘ └─────────────────────┘
//! ```
//!
//! Distances returned by the index become scores through a [`ScorePolicy`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_wines::{
//!     GcpAuth, ScorePolicy, SimpleWine, VectorSearchConfig, VertexVectorSearch, WineService,
//! };
//! use core_config::FromEnv;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = GcpAuth::from_env(reqwest::Client::new());
//! let index = VertexVectorSearch::new(auth, VectorSearchConfig::from_env()?);
//! let service = WineService::new(Arc::new(index)).with_policy(ScorePolicy::SigmoidRating);
//!
//! let wine = SimpleWine::from_value(&serde_json::json!({
//!     "type": "Red", "body": 4, "dryness": 2, "abv": 13.5
//! }))?;
//! let similar = service.legacy_search(&wine).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod features;
pub mod handlers;
pub mod index;
pub mod model;
pub mod models;
pub mod ocr;
pub mod scoring;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use auth::GcpAuth;
pub use config::{ModelConfig, VectorSearchConfig, WinesConfig};
pub use error::{WineError, WineResult};
pub use features::{SimpleWine, UserFeatures, WineType, USER_FEATURES, USER_FEATURE_COUNT};
pub use handlers::{router, WinesApiDoc, WinesState};
pub use index::{NeighborIndex, VertexVectorSearch};
pub use model::{UserTower, VertexEndpointTower};
pub use models::{DotProducts, Neighbor, OcrResponse, Recommendations, ScoreMap};
pub use ocr::{TextExtractor, VisionOcr};
pub use scoring::ScorePolicy;
pub use service::WineService;
pub use store::{EmbeddingSource, EmbeddingStore, StoreLoader};
