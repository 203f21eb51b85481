pub mod config;
pub mod domain;
pub mod errors;
pub mod recommendation;
pub mod seasonal;

pub use domain::product::{CatalogProduct, ProductId, ProductRecord};
pub use domain::profile::{UserId, UserProfile};
pub use errors::{ApplicationError, InterfaceError};
pub use recommendation::{Embedder, HashingEmbedder, RecommendationEngine, ScoredProduct};
pub use seasonal::{EventWindow, SaleAdvice, SeasonalEvent, SeasonalOptimizer, UpcomingSale};
