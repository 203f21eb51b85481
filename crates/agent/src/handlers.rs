//! Tool handlers backing the four tool commands.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use smartscoop_catalog::ProductSearch;
use smartscoop_core::domain::product::ProductRecord;
use smartscoop_core::domain::profile::{UserId, UserProfile};
use smartscoop_core::errors::ApplicationError;
use smartscoop_core::seasonal::{SaleAdvice, SeasonalOptimizer};
use smartscoop_db::UserProfileRepository;

use crate::recommender::Recommender;
use crate::tools::{Tool, ToolCommand, ToolName};

pub const NO_PRODUCTS: &str = "No products found matching your criteria.";
pub const NO_RECOMMENDATIONS: &str = "No personalized recommendations found.";
pub const GOOD_TIME_TO_BUY: &str = "No significant sales expected soon. It's a good time to buy.";

fn unexpected(tool: ToolName, command: &ToolCommand) -> ApplicationError {
    ApplicationError::Configuration(format!("{tool} handler received {} command", command.name()))
}

pub struct ProductSearchTool {
    search: Arc<dyn ProductSearch>,
}

impl ProductSearchTool {
    pub fn new(search: Arc<dyn ProductSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for ProductSearchTool {
    fn name(&self) -> ToolName {
        ToolName::ProductSearch
    }

    async fn execute(&self, command: ToolCommand) -> Result<String, ApplicationError> {
        let ToolCommand::ProductSearch { query, filters } = &command else {
            return Err(unexpected(self.name(), &command));
        };

        let products = self.search.search_products(query, filters).await;
        info!(
            event_name = "agent.tool.product_search",
            provider = self.search.provider_name(),
            results = products.len(),
            "product search completed"
        );
        Ok(render_products(&products))
    }
}

pub fn render_products(products: &[ProductRecord]) -> String {
    if products.is_empty() {
        return NO_PRODUCTS.to_string();
    }

    let lines: Vec<String> = products
        .iter()
        .map(|product| {
            let rating = match (&product.rating, product.num_ratings) {
                (Some(rating), Some(count)) => format!("{rating}/5 ({count} ratings)"),
                (Some(rating), None) => format!("{rating}/5"),
                _ => "n/a".to_string(),
            };
            format!(
                "- {}\n  {}\n  Link: ({})\n  Rating: {}",
                product.title.as_deref().unwrap_or("Untitled product"),
                product.price.as_deref().unwrap_or("price unavailable"),
                product.url.as_deref().unwrap_or("n/a"),
                rating,
            )
        })
        .collect();
    format!("Found these products:\n{}", lines.join("\n"))
}

pub struct RecommendationTool {
    recommender: Arc<Recommender>,
}

impl RecommendationTool {
    pub fn new(recommender: Arc<Recommender>) -> Self {
        Self { recommender }
    }
}

#[async_trait]
impl Tool for RecommendationTool {
    fn name(&self) -> ToolName {
        ToolName::GetRecommendations
    }

    async fn execute(&self, command: ToolCommand) -> Result<String, ApplicationError> {
        let ToolCommand::GetRecommendations { user_id, category } = &command else {
            return Err(unexpected(self.name(), &command));
        };

        let scored = self.recommender.scored_recommendations(user_id, category.as_deref()).await;
        if scored.is_empty() {
            return Ok(NO_RECOMMENDATIONS.to_string());
        }

        let lines: Vec<String> = scored
            .iter()
            .map(|item| {
                let confidence = item.similarity.max(0.0) * 100.0;
                match self.recommender.product(item.product_id) {
                    Some(product) => {
                        let price = product
                            .price
                            .map(|price| format!("${price:.2}"))
                            .unwrap_or_else(|| "price unavailable".to_string());
                        format!(
                            "- {}: {price}\n  Recommendation Confidence: {confidence:.1}%",
                            product.title
                        )
                    }
                    None => format!(
                        "- Product {}\n  Recommendation Confidence: {confidence:.1}%",
                        item.product_id
                    ),
                }
            })
            .collect();
        Ok(format!("Here are your personalized recommendations:\n{}", lines.join("\n")))
    }
}

pub struct SeasonalDiscountTool {
    optimizer: Arc<SeasonalOptimizer>,
    search: Arc<dyn ProductSearch>,
}

impl SeasonalDiscountTool {
    pub fn new(optimizer: Arc<SeasonalOptimizer>, search: Arc<dyn ProductSearch>) -> Self {
        Self { optimizer, search }
    }

    /// Fills the price from the catalog when the model only knows the product id.
    async fn resolve_product(&self, command: &ToolCommand) -> ProductRecord {
        let ToolCommand::SeasonalDiscount { product_id, title, price } = command else {
            return ProductRecord::default();
        };

        let mut record = ProductRecord {
            id: product_id.clone(),
            title: title.clone(),
            price: price.map(|price| format!("${price:.2}")),
            ..ProductRecord::default()
        };
        if record.price.is_none() {
            if let Some(id) = product_id {
                if let Some(details) = self.search.get_product_details(id).await {
                    record.price = details.price;
                    record.title = record.title.or(details.title);
                }
            }
        }
        record
    }
}

#[async_trait]
impl Tool for SeasonalDiscountTool {
    fn name(&self) -> ToolName {
        ToolName::SeasonalDiscount
    }

    async fn execute(&self, command: ToolCommand) -> Result<String, ApplicationError> {
        if command.name() != self.name() {
            return Err(unexpected(self.name(), &command));
        }

        let product = self.resolve_product(&command).await;
        Ok(render_advice(&self.optimizer.sale_advice(&product)))
    }
}

pub fn render_advice(advice: &SaleAdvice) -> String {
    let (true, Some(event), Some(date), Some(discount)) = (
        advice.should_wait,
        advice.sale_event,
        advice.estimated_sale_date,
        advice.expected_discount,
    ) else {
        return GOOD_TIME_TO_BUY.to_string();
    };

    let mut text = format!(
        "I recommend waiting for {} on {}. Expected discount: {discount}%.",
        event.label(),
        date.format("%Y-%m-%d"),
    );
    if let (Some(current), Some(estimated)) = (advice.current_price, advice.estimated_sale_price) {
        text.push_str(&format!(
            " Current price: ${current:.2}, Estimated sale price: ${estimated:.2}"
        ));
    }
    text
}

pub struct UpdatePreferencesTool {
    profiles: Arc<dyn UserProfileRepository>,
}

impl UpdatePreferencesTool {
    pub fn new(profiles: Arc<dyn UserProfileRepository>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl Tool for UpdatePreferencesTool {
    fn name(&self) -> ToolName {
        ToolName::UpdatePreferences
    }

    async fn execute(&self, command: ToolCommand) -> Result<String, ApplicationError> {
        let (user_id, preferences) = match command {
            ToolCommand::UpdatePreferences { user_id, preferences } => (user_id, preferences),
            other => return Err(unexpected(self.name(), &other)),
        };

        let id = UserId(user_id.clone());
        let mut profile = match self.profiles.find_by_id(&id).await {
            Ok(found) => found.unwrap_or_else(|| UserProfile::new(id)),
            Err(error) => {
                warn!(
                    event_name = "agent.tool.preferences_lookup_failed",
                    user_id = %user_id,
                    error = %error,
                    "profile lookup failed"
                );
                return Err(error.into());
            }
        };
        profile.merge_preferences(preferences);

        if let Err(error) = self.profiles.save(profile).await {
            warn!(
                event_name = "agent.tool.preferences_save_failed",
                user_id = %user_id,
                error = %error,
                "profile save failed"
            );
            return Ok(format!("Could not update preferences for user {user_id} right now."));
        }

        info!(
            event_name = "agent.tool.preferences_updated",
            user_id = %user_id,
            "preferences updated"
        );
        Ok(format!("Successfully updated preferences for user {user_id}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use serde_json::{json, Map, Value};

    use smartscoop_catalog::{LocalProductSearch, ProductSearch};
    use smartscoop_core::domain::product::{CatalogProduct, ProductId, ProductRecord};
    use smartscoop_core::domain::profile::UserId;
    use smartscoop_core::seasonal::{SeasonalEvent, SeasonalOptimizer};
    use smartscoop_db::{InMemoryUserProfileRepository, UserProfileRepository};

    use super::{
        render_products, ProductSearchTool, SeasonalDiscountTool, UpdatePreferencesTool,
        GOOD_TIME_TO_BUY, NO_PRODUCTS,
    };
    use crate::tools::{Tool, ToolCommand};

    fn catalog() -> Arc<dyn ProductSearch> {
        Arc::new(LocalProductSearch::new(vec![CatalogProduct {
            id: ProductId(7),
            title: "Trail Runner".to_string(),
            description: Some("lightweight running shoe".to_string()),
            price: Some(Decimal::new(10000, 2)),
            url: Some("https://shop.example/7".to_string()),
        }]))
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn empty_search_renders_the_no_results_line() {
        assert_eq!(render_products(&[]), NO_PRODUCTS);
        let rendered = render_products(&[ProductRecord {
            title: Some("Laptop".to_string()),
            price: Some("$999.99".to_string()),
            rating: Some("4.5".to_string()),
            num_ratings: Some(12),
            ..ProductRecord::default()
        }]);
        assert!(rendered.starts_with("Found these products:\n- Laptop"));
        assert!(rendered.contains("Rating: 4.5/5 (12 ratings)"));
    }

    #[tokio::test]
    async fn search_tool_lists_matches() {
        let tool = ProductSearchTool::new(catalog());
        let output = tool
            .execute(ToolCommand::ProductSearch {
                query: "running".to_string(),
                filters: Default::default(),
            })
            .await
            .expect("execute");

        assert!(output.contains("Trail Runner"));
        assert!(output.contains("$100.00"));
    }

    #[tokio::test]
    async fn seasonal_tool_prices_the_wait() {
        let mut optimizer = SeasonalOptimizer::new();
        let start = Utc::now() + Duration::days(30);
        optimizer.register_event(SeasonalEvent::BlackFriday, start, start + Duration::days(1));
        let tool = SeasonalDiscountTool::new(Arc::new(optimizer), catalog());

        let output = tool
            .execute(ToolCommand::SeasonalDiscount {
                product_id: Some("7".to_string()),
                title: None,
                price: None,
            })
            .await
            .expect("execute");

        assert!(output.starts_with("I recommend waiting for Black Friday on "));
        assert!(output.contains("Expected discount: 40%."));
        assert!(output.contains("Current price: $100.00, Estimated sale price: $60.00"));
    }

    #[tokio::test]
    async fn seasonal_tool_without_upcoming_sales_says_buy() {
        let tool = SeasonalDiscountTool::new(Arc::new(SeasonalOptimizer::new()), catalog());
        let output = tool
            .execute(ToolCommand::SeasonalDiscount {
                product_id: None,
                title: Some("Mug".to_string()),
                price: Some(Decimal::new(999, 2)),
            })
            .await
            .expect("execute");

        assert_eq!(output, GOOD_TIME_TO_BUY);
    }

    #[tokio::test]
    async fn preferences_merge_and_create_missing_profiles() {
        let profiles = Arc::new(InMemoryUserProfileRepository::default());
        let tool = UpdatePreferencesTool::new(profiles.clone());

        let first = tool
            .execute(ToolCommand::UpdatePreferences {
                user_id: "u-1".to_string(),
                preferences: object(json!({"size": "M", "color": "black"})),
            })
            .await
            .expect("first update");
        assert_eq!(first, "Successfully updated preferences for user u-1");

        tool.execute(ToolCommand::UpdatePreferences {
            user_id: "u-1".to_string(),
            preferences: object(json!({"color": "navy"})),
        })
        .await
        .expect("second update");

        let stored =
            profiles.find_by_id(&UserId::from("u-1")).await.expect("find").expect("profile");
        assert_eq!(stored.preferences, object(json!({"size": "M", "color": "navy"})));
    }

    #[tokio::test]
    async fn mismatched_command_is_a_configuration_error() {
        let tool = ProductSearchTool::new(catalog());
        let result = tool
            .execute(ToolCommand::GetRecommendations { user_id: "u-1".to_string(), category: None })
            .await;
        assert!(matches!(result, Err(error) if error.is_fatal()));
    }
}
