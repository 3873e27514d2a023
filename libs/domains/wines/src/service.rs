use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{WineError, WineResult};
use crate::features::{SimpleWine, UserFeatures};
use crate::index::NeighborIndex;
use crate::model::UserTower;
use crate::models::{Neighbor, Recommendations, ScoreMap};
use crate::scoring::{dot_product, ScorePolicy};
use crate::store::EmbeddingStore;

/// Wine search and recommendation.
///
/// The neighbor index is always present. The user tower and the embedding
/// store are optional; operations that need a missing one fail with
/// [`WineError::Config`].
pub struct WineService {
    index: Arc<dyn NeighborIndex>,
    user_tower: Option<Arc<dyn UserTower>>,
    store: Option<Arc<EmbeddingStore>>,
    policy: ScorePolicy,
    neighbor_count: u32,
}

impl WineService {
    pub fn new(index: Arc<dyn NeighborIndex>) -> Self {
        Self {
            index,
            user_tower: None,
            store: None,
            policy: ScorePolicy::default(),
            neighbor_count: 10,
        }
    }

    pub fn with_user_tower(mut self, user_tower: Arc<dyn UserTower>) -> Self {
        self.user_tower = Some(user_tower);
        self
    }

    pub fn with_store(mut self, store: Arc<EmbeddingStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Policy for two-tower recommendations. Legacy search always uses min-max.
    pub fn with_policy(mut self, policy: ScorePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_neighbor_count(mut self, neighbor_count: u32) -> Self {
        self.neighbor_count = neighbor_count;
        self
    }

    pub fn policy(&self) -> ScorePolicy {
        self.policy
    }

    pub fn has_user_tower(&self) -> bool {
        self.user_tower.is_some()
    }

    /// Number of loaded embeddings, `None` when no store is configured.
    pub fn store_size(&self) -> Option<usize> {
        self.store.as_ref().map(|store| store.len())
    }

    // ===== Orchestrators =====

    /// Simple wine attributes → nearest wines, min-max scored.
    pub async fn legacy_search(&self, wine: &SimpleWine) -> WineResult<Recommendations> {
        let vector = wine.to_vector();
        let neighbors = self.index.find_neighbors(&vector, self.neighbor_count).await?;

        info!(count = neighbors.len(), "Wine neighbors found (legacy)");
        Ok(rank(&neighbors, ScorePolicy::MinMax))
    }

    /// User features → user embedding → nearest wines, scored by the configured policy.
    pub async fn recommend(
        &self,
        features: &UserFeatures,
        user_id: Option<&str>,
    ) -> WineResult<Recommendations> {
        let embedding = self.user_embedding(features).await?;
        let neighbors = self
            .index
            .find_neighbors(&embedding, self.neighbor_count)
            .await?;

        info!(
            count = neighbors.len(),
            user_id,
            policy = %self.policy,
            "Wine recommendations generated"
        );
        Ok(rank(&neighbors, self.policy))
    }

    /// User features → user embedding → dot product against each named wine.
    pub async fn score_wines(
        &self,
        features: &UserFeatures,
        wine_ids: &[String],
        user_id: Option<&str>,
    ) -> WineResult<ScoreMap> {
        self.require_store()?;

        let embedding = self.user_embedding(features).await?;
        let scores = self.score_against_store(&embedding, wine_ids)?;

        info!(
            requested = wine_ids.len(),
            scored = scores.len(),
            user_id,
            "Wine scores computed"
        );
        Ok(scores)
    }

    /// Dot product of `user_embedding` with every requested wine found in the
    /// store. Missing wines are omitted.
    pub fn score_against_store(
        &self,
        user_embedding: &[f32],
        wine_ids: &[String],
    ) -> WineResult<ScoreMap> {
        let store = self.require_store()?;

        store
            .get_many(wine_ids)
            .into_iter()
            .map(|(id, embedding)| {
                dot_product(user_embedding, embedding).map(|score| (id.to_string(), score))
            })
            .collect()
    }

    // ===== Helpers =====

    async fn user_embedding(&self, features: &UserFeatures) -> WineResult<Vec<f32>> {
        let tower = self.user_tower.as_ref().ok_or_else(|| {
            warn!("Two-tower request received but no model endpoint is configured");
            WineError::Config("Model endpoint not configured".to_string())
        })?;

        tower.embed_user(features).await
    }

    fn require_store(&self) -> WineResult<&EmbeddingStore> {
        self.store
            .as_deref()
            .ok_or_else(|| WineError::Config("Embedding store not loaded".to_string()))
    }
}

fn rank(neighbors: &[Neighbor], policy: ScorePolicy) -> Recommendations {
    Recommendations {
        wines: neighbors.iter().map(|n| n.id.clone()).collect(),
        scores: policy.apply(neighbors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fixtures::user_features_json;
    use crate::features::WineType;
    use crate::index::MockNeighborIndex;
    use crate::model::MockUserTower;

    fn features() -> UserFeatures {
        UserFeatures::from_map(user_features_json().as_object().unwrap()).unwrap()
    }

    fn store() -> Arc<EmbeddingStore> {
        Arc::new(
            EmbeddingStore::from_ndjson(
                "{\"id\": \"a\", \"embedding\": [1.0, 0.0]}\n{\"id\": \"b\", \"embedding\": [0.5, 0.5]}\n{\"id\": \"odd\", \"embedding\": [1.0]}\n",
            )
            .unwrap(),
        )
    }

    fn tower_returning(embedding: Vec<f32>) -> Arc<dyn UserTower> {
        let mut tower = MockUserTower::new();
        tower
            .expect_embed_user()
            .times(1)
            .returning(move |_| Ok(embedding.clone()));
        Arc::new(tower)
    }

    fn unused_index() -> Arc<dyn NeighborIndex> {
        let mut index = MockNeighborIndex::new();
        index.expect_find_neighbors().never();
        Arc::new(index)
    }

    #[tokio::test]
    async fn test_legacy_search_uses_simple_vector_and_min_max() {
        let mut index = MockNeighborIndex::new();
        index
            .expect_find_neighbors()
            .withf(|vector, k| *vector == [3.0, 12.5, 1.0, 0.0, 0.0, 2.0] && *k == 5)
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    Neighbor::new("w1", 0.9),
                    Neighbor::new("w2", 0.5),
                    Neighbor::new("w3", 0.1),
                ])
            });

        let service = WineService::new(Arc::new(index))
            .with_neighbor_count(5)
            .with_policy(ScorePolicy::SigmoidRating);
        let wine = SimpleWine {
            wine_type: WineType::Rose,
            body: 3,
            dryness: 2,
            abv: 12.5,
        };

        let result = service.legacy_search(&wine).await.unwrap();

        assert_eq!(result.wines, vec!["w1", "w2", "w3"]);
        assert_eq!(result.scores["w1"], 1.0);
        assert_eq!(result.scores["w3"], 0.0);
    }

    #[tokio::test]
    async fn test_recommend_queries_with_user_embedding() {
        let mut index = MockNeighborIndex::new();
        index
            .expect_find_neighbors()
            .withf(|vector, k| *vector == [0.6, 0.8] && *k == 10)
            .times(1)
            .returning(|_, _| Ok(vec![Neighbor::new("w7", 0.0), Neighbor::new("w2", 1.0)]));

        let service = WineService::new(Arc::new(index))
            .with_user_tower(tower_returning(vec![0.6, 0.8]))
            .with_policy(ScorePolicy::LinearDotProduct);

        let result = service.recommend(&features(), Some("user-1")).await.unwrap();

        assert_eq!(result.wines, vec!["w7", "w2"]);
        assert_eq!(result.scores["w7"], 0.5);
        assert_eq!(result.scores["w2"], 1.0);
    }

    #[tokio::test]
    async fn test_recommend_sigmoid_policy() {
        let mut index = MockNeighborIndex::new();
        index
            .expect_find_neighbors()
            .returning(|_, _| Ok(vec![Neighbor::new("w1", 0.0)]));

        let service = WineService::new(Arc::new(index))
            .with_user_tower(tower_returning(vec![1.0]))
            .with_policy(ScorePolicy::SigmoidRating);

        let result = service.recommend(&features(), None).await.unwrap();
        assert_eq!(result.scores["w1"], 3.0);
    }

    #[tokio::test]
    async fn test_recommend_empty_index_result() {
        let mut index = MockNeighborIndex::new();
        index.expect_find_neighbors().returning(|_, _| Ok(vec![]));

        let service =
            WineService::new(Arc::new(index)).with_user_tower(tower_returning(vec![1.0]));

        let result = service.recommend(&features(), None).await.unwrap();
        assert!(result.wines.is_empty());
        assert!(result.scores.is_empty());
    }

    #[tokio::test]
    async fn test_recommend_without_model_is_config_error() {
        let service = WineService::new(unused_index());

        let err = service.recommend(&features(), None).await.unwrap_err();
        assert!(matches!(err, WineError::Config(_)));
    }

    #[tokio::test]
    async fn test_model_failure_fails_whole_request() {
        let mut tower = MockUserTower::new();
        tower
            .expect_embed_user()
            .returning(|_| Err(WineError::Model("No predictions returned from model endpoint".into())));

        let service = WineService::new(unused_index()).with_user_tower(Arc::new(tower));

        let err = service.recommend(&features(), None).await.unwrap_err();
        assert!(matches!(err, WineError::Model(_)));
    }

    #[tokio::test]
    async fn test_index_failure_propagates() {
        let mut index = MockNeighborIndex::new();
        index
            .expect_find_neighbors()
            .returning(|_, _| Err(WineError::VectorSearch("deadline exceeded".into())));

        let service =
            WineService::new(Arc::new(index)).with_user_tower(tower_returning(vec![1.0]));

        let err = service.recommend(&features(), None).await.unwrap_err();
        assert!(matches!(err, WineError::VectorSearch(_)));
    }

    #[tokio::test]
    async fn test_score_wines_dot_products_and_missing_omitted() {
        let service = WineService::new(unused_index())
            .with_user_tower(tower_returning(vec![2.0, 4.0]))
            .with_store(store());

        let ids = vec!["a".to_string(), "b".to_string(), "ghost".to_string()];
        let scores = service.score_wines(&features(), &ids, Some("u")).await.unwrap();

        assert_eq!(scores.len(), 2);
        assert_eq!(scores["a"], 2.0);
        assert_eq!(scores["b"], 3.0);
    }

    #[tokio::test]
    async fn test_score_wines_without_store_is_config_error() {
        let mut tower = MockUserTower::new();
        tower.expect_embed_user().never();

        let service = WineService::new(unused_index()).with_user_tower(Arc::new(tower));

        let err = service
            .score_wines(&features(), &["a".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, WineError::Config(ref msg) if msg.contains("Embedding store")));
    }

    #[test]
    fn test_score_against_store_empty_and_unknown_ids() {
        let service = WineService::new(unused_index()).with_store(store());

        assert!(service.score_against_store(&[1.0, 0.0], &[]).unwrap().is_empty());
        assert!(
            service
                .score_against_store(&[1.0, 0.0], &["x".to_string(), "y".to_string()])
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_score_against_store_dimension_mismatch_is_failure() {
        let service = WineService::new(unused_index()).with_store(store());

        let err = service
            .score_against_store(&[1.0, 0.0], &["odd".to_string()])
            .unwrap_err();
        assert!(!err.is_validation());
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[test]
    fn test_diagnostics() {
        let bare = WineService::new(unused_index());
        assert!(!bare.has_user_tower());
        assert_eq!(bare.store_size(), None);
        assert_eq!(bare.policy(), ScorePolicy::LinearDotProduct);

        let full = bare.with_store(store());
        assert_eq!(full.store_size(), Some(3));
    }
}
