use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use tracing::info;

use smartscoop_catalog::local::LocalProductSearch;
use smartscoop_catalog::{build_product_search, ProductSearch};
use smartscoop_core::config::AppConfig;
use smartscoop_core::domain::product::CatalogProduct;
use smartscoop_core::errors::ApplicationError;
use smartscoop_core::recommendation::{HashingEmbedder, RecommendationEngine};
use smartscoop_core::seasonal::SeasonalOptimizer;
use smartscoop_db::UserProfileRepository;

use crate::guardrails::GuardrailPolicy;
use crate::handlers::{
    ProductSearchTool, RecommendationTool, SeasonalDiscountTool, UpdatePreferencesTool,
};
use crate::llm::{GroqClient, LlmClient};
use crate::recommender::Recommender;
use crate::runtime::AgentRuntime;
use crate::session::SessionStore;
use crate::tools::ToolRegistry;
use crate::AgentError;

/// Collaborators of a [`ShoppingAssistant`], assembled by the caller.
pub struct AssistantComponents {
    pub llm: Arc<dyn LlmClient>,
    pub search: Arc<dyn ProductSearch>,
    pub profiles: Arc<dyn UserProfileRepository>,
    pub optimizer: Arc<SeasonalOptimizer>,
    pub recommender: Arc<Recommender>,
    pub sessions: SessionStore,
    pub max_tool_rounds: u32,
}

/// Entry point shared by the HTTP surface and the CLI: one conversation per
/// user id, each turn driven through the agent runtime.
pub struct ShoppingAssistant {
    runtime: AgentRuntime,
    sessions: SessionStore,
    catalog_provider: String,
}

impl ShoppingAssistant {
    pub fn build(
        config: &AppConfig,
        profiles: Arc<dyn UserProfileRepository>,
    ) -> Result<Self, AgentError> {
        let llm: Arc<dyn LlmClient> = Arc::new(GroqClient::from_config(&config.llm)?);
        let search = build_product_search(&config.catalog).map_err(ApplicationError::from)?;

        let mut optimizer = SeasonalOptimizer::new();
        if config.seasonal.use_default_calendar {
            optimizer.register_standard_year(Utc::now().year());
        }

        let engine = Arc::new(RecommendationEngine::with_top_k(
            HashingEmbedder::new(config.recommendation.dimensions),
            config.recommendation.top_k,
        ));
        let catalog = match config.recommendation.catalog_path.as_deref() {
            Some(path) => load_catalog(path)?,
            None => Vec::new(),
        };
        let embedded = engine.update_product_embeddings(&catalog)?;
        info!(
            event_name = "agent.assistant.catalog_embedded",
            products = embedded,
            seasonal_events = optimizer.len(),
            "recommendation catalog loaded"
        );

        let recommender = Arc::new(Recommender::new(engine, Arc::clone(&profiles), catalog));
        Self::with_components(AssistantComponents {
            llm,
            search,
            profiles,
            optimizer: Arc::new(optimizer),
            recommender,
            sessions: SessionStore::new(
                Duration::from_secs(config.session.ttl_secs),
                config.session.max_turns,
            ),
            max_tool_rounds: config.llm.max_tool_rounds,
        })
    }

    pub fn with_components(components: AssistantComponents) -> Result<Self, AgentError> {
        let AssistantComponents {
            llm,
            search,
            profiles,
            optimizer,
            recommender,
            sessions,
            max_tool_rounds,
        } = components;
        let catalog_provider = search.provider_name().to_string();

        let mut registry = ToolRegistry::default();
        registry.register(ProductSearchTool::new(Arc::clone(&search)));
        registry.register(RecommendationTool::new(recommender));
        registry.register(SeasonalDiscountTool::new(optimizer, search));
        registry.register(UpdatePreferencesTool::new(profiles));

        let runtime =
            AgentRuntime::new(llm, registry, GuardrailPolicy::default(), max_tool_rounds)?;
        Ok(Self { runtime, sessions, catalog_provider })
    }

    pub fn catalog_provider(&self) -> &str {
        &self.catalog_provider
    }

    /// Turns for the same user run one at a time against that user's transcript.
    pub async fn handle_message(&self, user_id: &str, message: &str) -> Result<String, AgentError> {
        let session = self.sessions.session(user_id.trim()).await;
        let mut context = session.lock().await;
        self.runtime.process_message(&mut context, user_id, message).await
    }
}

fn load_catalog(path: &Path) -> Result<Vec<CatalogProduct>, AgentError> {
    LocalProductSearch::from_path(path)
        .map(|local| local.products().to_vec())
        .map_err(|e| {
            AgentError::Configuration(format!(
                "recommendation catalog `{}` could not be loaded: {e}",
                path.display()
            ))
        })
}
