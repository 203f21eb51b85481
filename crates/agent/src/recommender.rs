use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use smartscoop_core::domain::product::{CatalogProduct, ProductId};
use smartscoop_core::domain::profile::UserId;
use smartscoop_core::recommendation::{HashingEmbedder, RecommendationEngine, ScoredProduct};
use smartscoop_db::UserProfileRepository;

/// Joins the Profile Store with the recommendation engine. Storage and
/// embedding failures are logged and yield no recommendations.
pub struct Recommender {
    engine: Arc<RecommendationEngine<HashingEmbedder>>,
    profiles: Arc<dyn UserProfileRepository>,
    catalog: BTreeMap<ProductId, CatalogProduct>,
}

impl Recommender {
    pub fn new(
        engine: Arc<RecommendationEngine<HashingEmbedder>>,
        profiles: Arc<dyn UserProfileRepository>,
        catalog: Vec<CatalogProduct>,
    ) -> Self {
        let catalog = catalog.into_iter().map(|product| (product.id, product)).collect();
        Self { engine, profiles, catalog }
    }

    pub fn engine(&self) -> &RecommendationEngine<HashingEmbedder> {
        &self.engine
    }

    pub fn product(&self, id: ProductId) -> Option<&CatalogProduct> {
        self.catalog.get(&id)
    }

    pub async fn get_recommendations(
        &self,
        user_id: &str,
        category: Option<&str>,
    ) -> Vec<ProductId> {
        self.scored_recommendations(user_id, category)
            .await
            .into_iter()
            .map(|scored| scored.product_id)
            .collect()
    }

    pub async fn scored_recommendations(
        &self,
        user_id: &str,
        category: Option<&str>,
    ) -> Vec<ScoredProduct> {
        let profile = match self.profiles.find_by_id(&UserId::from(user_id)).await {
            Ok(profile) => profile,
            Err(error) => {
                warn!(
                    event_name = "agent.recommendation.profile_lookup_failed",
                    user_id,
                    error = %error,
                    "profile lookup failed; returning no recommendations"
                );
                return Vec::new();
            }
        };

        match self.engine.recommend_scored(profile.as_ref(), category) {
            Ok(scored) => scored,
            Err(error) => {
                warn!(
                    event_name = "agent.recommendation.ranking_failed",
                    user_id,
                    error = %error,
                    "ranking failed; returning no recommendations"
                );
                Vec::new()
            }
        }
    }
}
