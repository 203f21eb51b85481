use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalized catalog search result. Fields the upstream catalog omits stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub price: Option<String>,
    pub original_price: Option<String>,
    pub rating: Option<String>,
    pub num_ratings: Option<u64>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub is_prime: Option<bool>,
    pub delivery: Option<String>,
    pub sales_volume: Option<String>,
}

impl ProductRecord {
    pub fn price_amount(&self) -> Option<Decimal> {
        self.price.as_deref().and_then(parse_price)
    }
}

/// Parses display prices such as `$1,299.99` or `1299.99`.
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let cleaned: String =
        raw.chars().filter(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == '-').collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Product shape consumed by the recommendation engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub url: Option<String>,
}

impl CatalogProduct {
    pub fn to_record(&self) -> ProductRecord {
        ProductRecord {
            id: Some(self.id.to_string()),
            title: Some(self.title.clone()),
            price: self.price.map(|price| format!("${price:.2}")),
            url: self.url.clone(),
            ..ProductRecord::default()
        }
    }
}
