use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// One nearest-neighbor hit, in the index's ranking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Neighbor {
    pub id: String,
    /// Raw distance reported by the index (dot product for this deployment)
    pub distance: f64,
}

impl Neighbor {
    pub fn new(id: impl Into<String>, distance: f64) -> Self {
        Self {
            id: id.into(),
            distance,
        }
    }
}

/// Wine id → derived score or rating.
pub type ScoreMap = HashMap<String, f64>;

/// Ranked wine ids together with their scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Recommendations {
    /// Wine ids in the order returned by the index
    pub wines: Vec<String>,
    pub scores: ScoreMap,
}

/// Raw dot products between a user embedding and the requested wines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DotProducts {
    pub dot_products: ScoreMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OcrResponse {
    pub text: String,
}
