//! Preference-driven product ranking.
//!
//! Product descriptions and a rendering of the shopper's preferences are embedded
//! into the same vector space; products are ranked by cosine similarity to the
//! preference vector.

mod embedder;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use serde_json::{Map, Value};

use crate::domain::product::{CatalogProduct, ProductId};
use crate::domain::profile::UserProfile;
use crate::errors::ApplicationError;

pub use embedder::{cosine_similarity, Embedder, HashingEmbedder};

/// Maximum number of recommendations returned per request.
pub const DEFAULT_TOP_K: usize = 10;

const DEFAULT_SIZE: &str = "M";
const DEFAULT_COLOR: &str = "black";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredProduct {
    pub product_id: ProductId,
    pub similarity: f32,
}

/// Embedding table plus the model that fills it.
///
/// The table is process-local and rebuilt wholesale by
/// [`RecommendationEngine::update_product_embeddings`]; readers racing an update
/// observe either the previous or the new table, never a mix.
pub struct RecommendationEngine<E = HashingEmbedder> {
    embedder: E,
    top_k: usize,
    embeddings: RwLock<BTreeMap<ProductId, Vec<f32>>>,
}

impl Default for RecommendationEngine<HashingEmbedder> {
    fn default() -> Self {
        Self::new(HashingEmbedder::default())
    }
}

impl<E> RecommendationEngine<E>
where
    E: Embedder,
{
    pub fn new(embedder: E) -> Self {
        Self::with_top_k(embedder, DEFAULT_TOP_K)
    }

    pub fn with_top_k(embedder: E, top_k: usize) -> Self {
        Self { embedder, top_k, embeddings: RwLock::new(BTreeMap::new()) }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Replaces the whole embedding table with one vector per product in `products`.
    /// On failure the previous table is kept.
    pub fn update_product_embeddings(
        &self,
        products: &[CatalogProduct],
    ) -> Result<usize, ApplicationError> {
        let descriptions: Vec<&str> =
            products.iter().map(|product| product.description.as_deref().unwrap_or("")).collect();
        let vectors = self.embedder.embed_batch(&descriptions)?;

        let table: BTreeMap<ProductId, Vec<f32>> =
            products.iter().map(|product| product.id).zip(vectors).collect();
        let count = table.len();

        *self.embeddings.write().unwrap_or_else(PoisonError::into_inner) = table;
        Ok(count)
    }

    /// Stores precomputed vectors directly, replacing the table.
    pub fn replace_embeddings(&self, table: BTreeMap<ProductId, Vec<f32>>) {
        *self.embeddings.write().unwrap_or_else(PoisonError::into_inner) = table;
    }

    pub fn embedding_count(&self) -> usize {
        self.embeddings.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn has_embeddings(&self) -> bool {
        self.embedding_count() > 0
    }

    /// Top product ids for `profile`, most similar first.
    pub fn recommend(
        &self,
        profile: Option<&UserProfile>,
        category: Option<&str>,
    ) -> Result<Vec<ProductId>, ApplicationError> {
        let scored = self.recommend_scored(profile, category)?;
        Ok(scored.into_iter().map(|scored| scored.product_id).collect())
    }

    /// Like [`Self::recommend`] but keeps the similarity of each product.
    ///
    /// A missing profile or an empty embedding table yields no recommendations.
    pub fn recommend_scored(
        &self,
        profile: Option<&UserProfile>,
        category: Option<&str>,
    ) -> Result<Vec<ScoredProduct>, ApplicationError> {
        let Some(profile) = profile else {
            return Ok(Vec::new());
        };
        if !self.has_embeddings() {
            return Ok(Vec::new());
        }

        self.rank_preferences(&profile.preferences_for(category))
    }

    /// Scores the stored products against the rendered preferences and keeps the top-k.
    /// Ties are broken by ascending product id.
    pub fn rank_preferences(
        &self,
        preferences: &Map<String, Value>,
    ) -> Result<Vec<ScoredProduct>, ApplicationError> {
        let user_vector = self.embedder.embed(&preference_text(preferences))?;
        Ok(self.rank_vector(&user_vector))
    }

    pub fn rank_vector(&self, user_vector: &[f32]) -> Vec<ScoredProduct> {
        let table = self.embeddings.read().unwrap_or_else(PoisonError::into_inner);
        let mut scored: Vec<ScoredProduct> = table
            .iter()
            .map(|(product_id, vector)| ScoredProduct {
                product_id: *product_id,
                similarity: cosine_similarity(user_vector, vector),
            })
            .collect();
        drop(table);

        scored.sort_by(|left, right| {
            right
                .similarity
                .partial_cmp(&left.similarity)
                .unwrap_or(Ordering::Equal)
                .then(left.product_id.cmp(&right.product_id))
        });
        scored.truncate(self.top_k);
        scored
    }
}

/// Renders preferences as `Size: <size> Color: <color>`, defaulting to `M` and `black`.
/// Other keys do not contribute to the user vector.
pub fn preference_text(preferences: &Map<String, Value>) -> String {
    let size = preferences.get("size").map(render_value).unwrap_or_else(|| DEFAULT_SIZE.into());
    let color =
        preferences.get("color").map(render_value).unwrap_or_else(|| DEFAULT_COLOR.into());
    format!("Size: {size} Color: {color}")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
