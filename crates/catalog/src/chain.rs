use std::sync::Arc;

use async_trait::async_trait;

use smartscoop_core::domain::product::ProductRecord;

use crate::{ProductSearch, SearchFilters};

/// Queries providers in order: search results are concatenated, details come
/// from the first provider that knows the id.
pub struct ProductSearchChain {
    providers: Vec<Arc<dyn ProductSearch>>,
    name: String,
}

impl ProductSearchChain {
    pub fn new(providers: Vec<Arc<dyn ProductSearch>>) -> Self {
        let name = providers
            .iter()
            .map(|provider| provider.provider_name().to_string())
            .collect::<Vec<_>>()
            .join("+");
        Self { providers, name }
    }
}

#[async_trait]
impl ProductSearch for ProductSearchChain {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn search_products(&self, query: &str, filters: &SearchFilters) -> Vec<ProductRecord> {
        let mut results = Vec::new();
        for provider in &self.providers {
            results.extend(provider.search_products(query, filters).await);
        }
        results
    }

    async fn get_product_details(&self, product_id: &str) -> Option<ProductRecord> {
        for provider in &self.providers {
            if let Some(record) = provider.get_product_details(product_id).await {
                return Some(record);
            }
        }
        None
    }
}
