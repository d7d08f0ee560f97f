pub mod health;
pub mod materials;
pub mod metrics_handler;
pub mod payment;
pub mod quote;
pub mod upload;

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::analysis::ModelAnalyzer;
use crate::config::Config;
use crate::payment::PaymentGateway;
use crate::pricing::PricingEngine;
use crate::store::{OrderLedger, QuoteStore};
use crate::uploads::UploadStore;

/// Shared state for the API routes
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<Config>>,
    pub engine: Arc<ArcSwap<PricingEngine>>,
    pub analyzer: Arc<dyn ModelAnalyzer>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub uploads: Arc<UploadStore>,
    pub quotes: Arc<QuoteStore>,
    pub orders: Arc<OrderLedger>,
}
