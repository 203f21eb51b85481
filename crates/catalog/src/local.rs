use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use async_trait::async_trait;

use smartscoop_core::domain::product::{CatalogProduct, ProductRecord};

use crate::{CatalogError, ProductSearch, SearchFilters};

const PAGE_SIZE: usize = 20;

/// Searches a JSON array of [`CatalogProduct`] held in memory.
pub struct LocalProductSearch {
    products: Vec<CatalogProduct>,
}

impl LocalProductSearch {
    pub fn new(products: Vec<CatalogProduct>) -> Self {
        Self { products }
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)?;
        let products = serde_json::from_str::<Vec<CatalogProduct>>(&raw)
            .map_err(|e| CatalogError::Decode(format!("{}: {e}", path.display())))?;
        Ok(Self::new(products))
    }

    pub fn products(&self) -> &[CatalogProduct] {
        &self.products
    }
}

#[async_trait]
impl ProductSearch for LocalProductSearch {
    fn provider_name(&self) -> &str {
        "local"
    }

    async fn search_products(&self, query: &str, filters: &SearchFilters) -> Vec<ProductRecord> {
        let terms: Vec<String> =
            query.split_whitespace().map(|term| term.to_lowercase()).collect();

        let mut hits: Vec<(usize, &CatalogProduct)> = self
            .products
            .iter()
            .filter_map(|product| {
                let haystack = format!(
                    "{} {}",
                    product.title.to_lowercase(),
                    product.description.as_deref().unwrap_or("").to_lowercase()
                );
                let matched = terms.iter().filter(|term| haystack.contains(term.as_str())).count();
                (terms.is_empty() || matched > 0).then_some((matched, product))
            })
            .collect();

        match filters.sort_by.as_str() {
            "LOWEST_PRICE" => hits.sort_by(|left, right| compare_price(left.1, right.1)),
            "HIGHEST_PRICE" => hits.sort_by(|left, right| compare_price(right.1, left.1)),
            _ => hits.sort_by(|left, right| right.0.cmp(&left.0).then(left.1.id.cmp(&right.1.id))),
        }

        let skip = (filters.page.max(1) as usize - 1) * PAGE_SIZE;
        hits.into_iter()
            .skip(skip)
            .take(PAGE_SIZE)
            .map(|(_, product)| product.to_record())
            .collect()
    }

    async fn get_product_details(&self, product_id: &str) -> Option<ProductRecord> {
        let id: i64 = product_id.trim().parse().ok()?;
        self.products.iter().find(|product| product.id.0 == id).map(CatalogProduct::to_record)
    }
}

fn compare_price(left: &CatalogProduct, right: &CatalogProduct) -> Ordering {
    match (left.price, right.price) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then(left.id.cmp(&right.id))
}
