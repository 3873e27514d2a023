//! Distance → score transforms.
//!
//! | policy   | formula                               | range  |
//! |----------|---------------------------------------|--------|
//! | `minmax` | `(d - min) / (max - min)`, ties → 1.0 | [0, 1] |
//! | `linear` | `(1 + d) / 2`                         | [0, 1] for d in [-1, 1] |
//! | `sigmoid`| `sigmoid(d) * 4 + 1`                  | (1, 5) |

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::error::{WineError, WineResult};
use crate::models::{Neighbor, ScoreMap};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScorePolicy {
    /// Min-max normalization over the returned batch
    #[strum(serialize = "minmax")]
    #[serde(rename = "minmax")]
    MinMax,
    /// Linear remap of a dot product in [-1, 1] to [0, 1]
    #[default]
    #[strum(serialize = "linear")]
    #[serde(rename = "linear")]
    LinearDotProduct,
    /// Sigmoid remap to a 1-5 star rating
    #[strum(serialize = "sigmoid")]
    #[serde(rename = "sigmoid")]
    SigmoidRating,
}

impl ScorePolicy {
    /// Scores every neighbor. Keys are exactly the input ids; a repeated id
    /// keeps the value of its last occurrence.
    pub fn apply(&self, neighbors: &[Neighbor]) -> ScoreMap {
        match self {
            ScorePolicy::MinMax => min_max(neighbors),
            ScorePolicy::LinearDotProduct => neighbors
                .iter()
                .map(|n| (n.id.clone(), (1.0 + n.distance) / 2.0))
                .collect(),
            ScorePolicy::SigmoidRating => neighbors
                .iter()
                .map(|n| (n.id.clone(), sigmoid(n.distance) * 4.0 + 1.0))
                .collect(),
        }
    }
}

fn min_max(neighbors: &[Neighbor]) -> ScoreMap {
    let Some(first) = neighbors.first() else {
        return ScoreMap::new();
    };

    let (min, max) = neighbors
        .iter()
        .fold((first.distance, first.distance), |(lo, hi), n| {
            (lo.min(n.distance), hi.max(n.distance))
        });

    if max > min {
        let span = max - min;
        neighbors
            .iter()
            .map(|n| (n.id.clone(), (n.distance - min) / span))
            .collect()
    } else {
        neighbors.iter().map(|n| (n.id.clone(), 1.0)).collect()
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Dot product of two embeddings of equal dimensionality.
pub fn dot_product(a: &[f32], b: &[f32]) -> WineResult<f64> {
    if a.len() != b.len() {
        return Err(WineError::Internal(format!(
            "Embedding dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    Ok(a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum())
}
