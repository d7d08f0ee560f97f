pub mod catalog;
pub mod engine;
pub mod models;

pub use catalog::{CatalogError, MaterialCatalog};
pub use engine::{PricingEngine, PricingError, PricingRates};
pub use models::{
    round_currency, BoundingBox, BreakdownCategory, CostBreakdownLine, MaterialMatch,
    MaterialProfile, ModelAnalysis, OrderOptions, Quote, QuoteResult, QuoteSummary,
};

use crate::config::Config;

/// Build a pricing engine from loaded configuration
pub fn engine_from_config(config: &Config) -> Result<PricingEngine, CatalogError> {
    let catalog = MaterialCatalog::from_config(&config.materials)?;
    Ok(PricingEngine::new(catalog, PricingRates::new(&config.pricing)))
}
