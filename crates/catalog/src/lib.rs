//! Product Search Adapter.
//!
//! Every provider normalizes its upstream shape into [`ProductRecord`]. Search
//! failures never reach the caller: they are logged and degrade to no results.

pub mod amazon;
pub mod chain;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use smartscoop_core::config::{CatalogConfig, CatalogProvider};
use smartscoop_core::domain::product::ProductRecord;
use smartscoop_core::errors::ApplicationError;

pub use amazon::AmazonProductSearch;
pub use chain::ProductSearchChain;
pub use local::LocalProductSearch;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog returned status {0}")]
    Status(u16),
    #[error("catalog response could not be decoded: {0}")]
    Decode(String),
    #[error("catalog file could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog misconfigured: {0}")]
    Configuration(String),
}

impl From<CatalogError> for ApplicationError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::Configuration(message) => ApplicationError::Configuration(message),
            other => ApplicationError::Upstream(other.to_string()),
        }
    }
}

/// Search filters forwarded to the catalog. Absent fields take the defaults;
/// an absent `country` means the provider's configured country.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub sort_by: String,
    pub page: u32,
    pub is_prime: bool,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            country: None,
            sort_by: "RELEVANCE".to_string(),
            page: 1,
            is_prime: false,
        }
    }
}

#[async_trait]
pub trait ProductSearch: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn search_products(&self, query: &str, filters: &SearchFilters) -> Vec<ProductRecord>;

    async fn get_product_details(&self, product_id: &str) -> Option<ProductRecord>;
}

/// Builds the configured provider. A local catalog configured next to the
/// amazon provider is queried after it.
pub fn build_product_search(
    config: &CatalogConfig,
) -> Result<Arc<dyn ProductSearch>, CatalogError> {
    let local = config.local_path.as_deref().map(LocalProductSearch::from_path).transpose()?;

    match config.provider {
        CatalogProvider::Local => {
            let local = local.ok_or_else(|| {
                CatalogError::Configuration("catalog.local_path is not set".to_string())
            })?;
            Ok(Arc::new(local))
        }
        CatalogProvider::Amazon => {
            let amazon: Arc<dyn ProductSearch> =
                Arc::new(AmazonProductSearch::from_config(config)?);
            match local {
                Some(local) => Ok(Arc::new(ProductSearchChain::new(vec![amazon, Arc::new(local)]))),
                None => Ok(amazon),
            }
        }
    }
}
