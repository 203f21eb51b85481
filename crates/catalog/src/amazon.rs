//! Amazon catalog through the RapidAPI "real-time-amazon-data" service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use smartscoop_core::config::CatalogConfig;
use smartscoop_core::domain::product::ProductRecord;

use crate::{CatalogError, ProductSearch, SearchFilters};

pub const DEFAULT_BASE_URL: &str = "https://real-time-amazon-data.p.rapidapi.com";
const RAPIDAPI_HOST: &str = "real-time-amazon-data.p.rapidapi.com";

pub struct AmazonProductSearch {
    client: Client,
    api_key: SecretString,
    base_url: String,
    country: String,
}

impl AmazonProductSearch {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        country: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            country: country.into(),
        })
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or_else(|| {
                CatalogError::Configuration(
                    "catalog.api_key is required for the amazon provider (AMAZON_API_KEY)"
                        .to_string(),
                )
            })?;

        Self::new(
            api_key,
            config.base_url.clone(),
            config.country.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, CatalogError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-rapidapi-key", self.api_key.expose_secret())
            .header("x-rapidapi-host", RAPIDAPI_HOST)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(CatalogError::Status(status.as_u16()));
        }

        response.json::<Value>().await.map_err(|e| CatalogError::Decode(e.to_string()))
    }

    async fn try_search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<ProductRecord>, CatalogError> {
        let params = [
            ("query", query.to_string()),
            ("country", filters.country.clone().unwrap_or_else(|| self.country.clone())),
            ("sort_by", filters.sort_by.clone()),
            ("page", filters.page.to_string()),
            ("is_prime", filters.is_prime.to_string()),
        ];
        let body = self.get_json("/search", &params).await?;
        parse_search_response(&body)
    }

    async fn try_details(&self, product_id: &str) -> Result<Option<ProductRecord>, CatalogError> {
        let params = [("asin", product_id.to_string()), ("country", self.country.clone())];
        let body = self.get_json("/product-details", &params).await?;
        Ok(parse_details_response(&body))
    }
}

#[async_trait]
impl ProductSearch for AmazonProductSearch {
    fn provider_name(&self) -> &str {
        "amazon"
    }

    async fn search_products(&self, query: &str, filters: &SearchFilters) -> Vec<ProductRecord> {
        match self.try_search(query, filters).await {
            Ok(products) => {
                debug!(
                    event_name = "catalog.search.completed",
                    provider = "amazon",
                    results = products.len(),
                    "catalog search completed"
                );
                products
            }
            Err(error) => {
                warn!(
                    event_name = "catalog.search.failed",
                    provider = "amazon",
                    error = %error,
                    "catalog search failed; returning no results"
                );
                Vec::new()
            }
        }
    }

    async fn get_product_details(&self, product_id: &str) -> Option<ProductRecord> {
        match self.try_details(product_id).await {
            Ok(product) => product,
            Err(error) => {
                warn!(
                    event_name = "catalog.details.failed",
                    provider = "amazon",
                    product_id,
                    error = %error,
                    "product details lookup failed"
                );
                None
            }
        }
    }
}

/// Reads `data.products`; entries that are not objects are skipped.
pub fn parse_search_response(body: &Value) -> Result<Vec<ProductRecord>, CatalogError> {
    let products = body
        .get("data")
        .and_then(|data| data.get("products"))
        .and_then(Value::as_array)
        .ok_or_else(|| CatalogError::Decode("response has no `data.products` array".to_string()))?;

    Ok(products.iter().filter(|product| product.is_object()).map(normalize_product).collect())
}

pub fn parse_details_response(body: &Value) -> Option<ProductRecord> {
    body.get("data").filter(|data| data.is_object()).map(normalize_product)
}

pub fn normalize_product(raw: &Value) -> ProductRecord {
    ProductRecord {
        id: text_field(raw, "asin"),
        title: text_field(raw, "product_title"),
        price: text_field(raw, "product_price"),
        original_price: text_field(raw, "product_original_price"),
        rating: text_field(raw, "product_star_rating"),
        num_ratings: count_field(raw, "product_num_ratings"),
        url: text_field(raw, "product_url"),
        image: text_field(raw, "product_photo"),
        is_prime: raw.get("is_prime").and_then(Value::as_bool),
        delivery: text_field(raw, "delivery"),
        sales_volume: text_field(raw, "sales_volume"),
    }
}

fn text_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn count_field(raw: &Value, key: &str) -> Option<u64> {
    match raw.get(key)? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => {
            let digits: String = text.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}
