use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use smartscoop_catalog::SearchFilters;
use smartscoop_core::errors::ApplicationError;

use crate::llm::ToolSpec;
use crate::AgentError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolName {
    ProductSearch,
    GetRecommendations,
    SeasonalDiscount,
    UpdatePreferences,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::ProductSearch,
        ToolName::GetRecommendations,
        ToolName::SeasonalDiscount,
        ToolName::UpdatePreferences,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProductSearch => "ProductSearch",
            Self::GetRecommendations => "GetRecommendations",
            Self::SeasonalDiscount => "SeasonalDiscount",
            Self::UpdatePreferences => "UpdatePreferences",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name.trim())
    }

    pub fn spec(self) -> ToolSpec {
        match self {
            Self::ProductSearch => ToolSpec {
                name: self.as_str(),
                description: "Search for products across the configured catalogs.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Free-text product query"},
                        "filters": {
                            "type": "object",
                            "properties": {
                                "country": {"type": "string"},
                                "sort_by": {
                                    "type": "string",
                                    "enum": [
                                        "RELEVANCE",
                                        "LOWEST_PRICE",
                                        "HIGHEST_PRICE",
                                        "REVIEWS",
                                        "NEWEST"
                                    ]
                                },
                                "page": {"type": "integer", "minimum": 1},
                                "is_prime": {"type": "boolean"}
                            }
                        }
                    },
                    "required": ["query"]
                }),
            },
            Self::GetRecommendations => ToolSpec {
                name: self.as_str(),
                description: "Get personalized product recommendations from the user's stored \
                    preferences.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "user_id": {"type": "string"},
                        "category": {
                            "type": "string",
                            "description": "Preference category to scope the recommendation"
                        }
                    },
                    "required": ["user_id"]
                }),
            },
            Self::SeasonalDiscount => ToolSpec {
                name: self.as_str(),
                description: "Check whether an upcoming seasonal sale makes it worth waiting \
                    to buy a product.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "product_id": {"type": "string"},
                        "title": {"type": "string"},
                        "price": {
                            "type": ["number", "string"],
                            "description": "Current price, e.g. 99.99 or \"$99.99\""
                        }
                    }
                }),
            },
            Self::UpdatePreferences => ToolSpec {
                name: self.as_str(),
                description: "Update the user's shopping preferences (size, color, budget, \
                    categories...).",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "user_id": {"type": "string"},
                        "preferences": {"type": "object"}
                    },
                    "required": ["user_id", "preferences"]
                }),
            },
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated tool invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolCommand {
    ProductSearch { query: String, filters: SearchFilters },
    GetRecommendations { user_id: String, category: Option<String> },
    SeasonalDiscount { product_id: Option<String>, title: Option<String>, price: Option<Decimal> },
    UpdatePreferences { user_id: String, preferences: Map<String, Value> },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolArgumentError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("arguments for {tool} are not valid JSON: {message}")]
    Malformed { tool: ToolName, message: String },
    #[error("invalid arguments for {tool}: {message}")]
    Invalid { tool: ToolName, message: String },
}

impl ToolCommand {
    pub fn name(&self) -> ToolName {
        match self {
            Self::ProductSearch { .. } => ToolName::ProductSearch,
            Self::GetRecommendations { .. } => ToolName::GetRecommendations,
            Self::SeasonalDiscount { .. } => ToolName::SeasonalDiscount,
            Self::UpdatePreferences { .. } => ToolName::UpdatePreferences,
        }
    }

    /// User the command acts on, when it names one.
    pub fn target_user(&self) -> Option<&str> {
        match self {
            Self::GetRecommendations { user_id, .. } | Self::UpdatePreferences { user_id, .. } => {
                Some(user_id)
            }
            _ => None,
        }
    }

    /// Parses raw model output. A bare string is accepted as the query of
    /// `ProductSearch`.
    pub fn parse(name: &str, raw_arguments: &str) -> Result<Self, ToolArgumentError> {
        let tool =
            ToolName::parse(name).ok_or_else(|| ToolArgumentError::UnknownTool(name.to_string()))?;
        let raw = raw_arguments.trim();
        let value = if raw.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str::<Value>(raw)
                .map_err(|e| ToolArgumentError::Malformed { tool, message: e.to_string() })?
        };
        Self::from_value(tool, value)
    }

    pub fn from_value(tool: ToolName, value: Value) -> Result<Self, ToolArgumentError> {
        let invalid = |message: String| ToolArgumentError::Invalid { tool, message };

        match tool {
            ToolName::ProductSearch => {
                let args = match value {
                    Value::String(query) => ProductSearchArgs { query, filters: None },
                    other => serde_json::from_value::<ProductSearchArgs>(other)
                        .map_err(|e| invalid(e.to_string()))?,
                };
                let query = args.query.trim().to_string();
                if query.is_empty() {
                    return Err(invalid("`query` must not be empty".to_string()));
                }
                Ok(Self::ProductSearch { query, filters: args.filters.unwrap_or_default() })
            }
            ToolName::GetRecommendations => {
                let args = serde_json::from_value::<RecommendationArgs>(value)
                    .map_err(|e| invalid(e.to_string()))?;
                Ok(Self::GetRecommendations {
                    user_id: required_text("user_id", args.user_id).map_err(invalid)?,
                    category: args.category.filter(|category| !category.trim().is_empty()),
                })
            }
            ToolName::SeasonalDiscount => {
                let args = serde_json::from_value::<SeasonalArgs>(value)
                    .map_err(|e| invalid(e.to_string()))?;
                let price = args.price.map(parse_price_value).transpose().map_err(invalid)?;
                if args.product_id.is_none() && args.title.is_none() && price.is_none() {
                    return Err(invalid(
                        "provide at least one of `product_id`, `title` or `price`".to_string(),
                    ));
                }
                Ok(Self::SeasonalDiscount { product_id: args.product_id, title: args.title, price })
            }
            ToolName::UpdatePreferences => {
                let args = serde_json::from_value::<PreferenceArgs>(value)
                    .map_err(|e| invalid(e.to_string()))?;
                Ok(Self::UpdatePreferences {
                    user_id: required_text("user_id", args.user_id).map_err(invalid)?,
                    preferences: args.preferences,
                })
            }
        }
    }
}

fn required_text(field: &str, value: String) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(format!("`{field}` must not be empty"))
    } else {
        Ok(trimmed.to_string())
    }
}

fn parse_price_value(value: Value) -> Result<Decimal, String> {
    match value {
        Value::Number(number) => number
            .to_string()
            .parse::<Decimal>()
            .map_err(|e| format!("`price` is not a valid amount: {e}")),
        Value::String(text) => smartscoop_core::domain::product::parse_price(&text)
            .ok_or_else(|| format!("`price` is not a valid amount: `{text}`")),
        other => Err(format!("`price` must be a number or string, found `{other}`")),
    }
}

#[derive(Deserialize)]
struct ProductSearchArgs {
    query: String,
    #[serde(default)]
    filters: Option<SearchFilters>,
}

#[derive(Deserialize)]
struct RecommendationArgs {
    user_id: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Deserialize)]
struct SeasonalArgs {
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    price: Option<Value>,
}

#[derive(Deserialize)]
struct PreferenceArgs {
    user_id: String,
    preferences: Map<String, Value>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;

    /// Renders the command result as text for the model.
    async fn execute(&self, command: ToolCommand) -> Result<String, ApplicationError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolName, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name(), Arc::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        ToolName::ALL.into_iter().map(ToolName::spec).collect()
    }

    /// Every advertised tool needs a handler.
    pub fn ensure_complete(&self) -> Result<(), AgentError> {
        let missing: Vec<&str> = ToolName::ALL
            .into_iter()
            .filter(|tool| !self.tools.contains_key(tool))
            .map(ToolName::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Configuration(format!(
                "no handler registered for {}",
                missing.join(", ")
            )))
        }
    }

    pub async fn dispatch(&self, command: ToolCommand) -> Result<String, AgentError> {
        let tool = self.tools.get(&command.name()).ok_or_else(|| {
            AgentError::Configuration(format!("no handler registered for {}", command.name()))
        })?;
        tool.execute(command).await.map_err(AgentError::from)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{ToolArgumentError, ToolCommand, ToolName, ToolRegistry};
    use crate::AgentError;

    #[test]
    fn bare_string_is_a_search_query() {
        let command = ToolCommand::parse("ProductSearch", r#""gaming laptop""#).expect("parse");
        assert!(matches!(command, ToolCommand::ProductSearch { ref query, ref filters }
            if query == "gaming laptop" && filters.country.is_none()));
    }

    #[test]
    fn search_filters_are_typed() {
        let command = ToolCommand::parse(
            "ProductSearch",
            r#"{"query": "laptop", "filters": {"sort_by": "LOWEST_PRICE", "is_prime": true}}"#,
        )
        .expect("parse");

        let ToolCommand::ProductSearch { filters, .. } = command else {
            panic!("expected product search");
        };
        assert_eq!(filters.sort_by, "LOWEST_PRICE");
        assert!(filters.is_prime);
        assert_eq!(filters.page, 1);
    }

    #[test]
    fn seasonal_price_accepts_numbers_and_display_strings() {
        let numeric = ToolCommand::parse("SeasonalDiscount", r#"{"price": 99.99}"#).expect("parse");
        let display =
            ToolCommand::parse("SeasonalDiscount", r#"{"product_id": "B0X", "price": "$1,299.00"}"#)
                .expect("parse");

        assert!(matches!(
            numeric,
            ToolCommand::SeasonalDiscount { price: Some(p), .. } if p == Decimal::new(9999, 2)
        ));
        assert!(matches!(
            display,
            ToolCommand::SeasonalDiscount { price: Some(p), .. } if p == Decimal::new(129_900, 2)
        ));
    }

    #[test]
    fn invalid_arguments_are_reported_per_tool() {
        assert_eq!(
            ToolCommand::parse("Checkout", "{}"),
            Err(ToolArgumentError::UnknownTool("Checkout".to_string()))
        );
        assert!(matches!(
            ToolCommand::parse("GetRecommendations", "{not json"),
            Err(ToolArgumentError::Malformed { tool: ToolName::GetRecommendations, .. })
        ));
        assert!(matches!(
            ToolCommand::parse("UpdatePreferences", r#"{"user_id": "u-1"}"#),
            Err(ToolArgumentError::Invalid { tool: ToolName::UpdatePreferences, .. })
        ));
        assert!(matches!(
            ToolCommand::parse("SeasonalDiscount", "{}"),
            Err(ToolArgumentError::Invalid { tool: ToolName::SeasonalDiscount, .. })
        ));
        assert!(matches!(
            ToolCommand::parse("GetRecommendations", r#"{"user_id": "  "}"#),
            Err(ToolArgumentError::Invalid { .. })
        ));
    }

    #[test]
    fn commands_expose_their_target_user() {
        let command = ToolCommand::from_value(
            ToolName::UpdatePreferences,
            json!({"user_id": "u-1", "preferences": {"size": "L"}}),
        )
        .expect("parse");
        assert_eq!(command.target_user(), Some("u-1"));
    }

    #[test]
    fn every_tool_advertises_an_object_schema() {
        let registry = ToolRegistry::default();
        let specs = registry.specs();
        assert_eq!(specs.len(), ToolName::ALL.len());
        assert!(specs.iter().all(|spec| spec.parameters["type"] == "object"));
    }

    #[tokio::test]
    async fn missing_handler_is_a_configuration_error() {
        let registry = ToolRegistry::default();
        assert!(matches!(registry.ensure_complete(), Err(AgentError::Configuration(_))));

        let result = registry
            .dispatch(ToolCommand::GetRecommendations {
                user_id: "u-1".to_string(),
                category: None,
            })
            .await;
        assert!(matches!(result, Err(AgentError::Configuration(_))));
    }
}
