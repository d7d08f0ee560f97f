//! Payment gateway adapters
//!
//! Handlers talk to a [`PaymentGateway`]; which implementation sits behind it
//! is decided by `payment.provider` in the configuration.

pub mod paypal;
pub mod sandbox;
pub mod webhook;

use crate::config::{PaymentConfig, PaymentProvider};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub use paypal::PayPalGateway;
pub use sandbox::SandboxGateway;
pub use webhook::{verify_transmission_headers, WebhookEvent, WebhookOutcome};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway returned {status}: {message}")]
    Gateway {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("payment gateway authentication failed: {0}")]
    Auth(String),
    #[error("payment order not found: {0}")]
    OrderNotFound(String),
    #[error("unexpected payment gateway response: {0}")]
    InvalidResponse(String),
    #[error("payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateOrderRequest {
    pub quote_id: String,
    pub amount: f64,
    pub currency: String,
    pub description: String,
    /// Customer reference forwarded to the gateway (email)
    pub customer_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedOrder {
    pub order_id: String,
    pub approval_url: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapturedPayment {
    pub order_id: String,
    pub transaction_id: String,
    pub captured_amount: f64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetails {
    pub order_id: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Gateway name used in logs and metrics ("paypal", "sandbox")
    fn name(&self) -> &str;

    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreatedOrder, PaymentError>;

    async fn capture(&self, order_id: &str) -> Result<CapturedPayment, PaymentError>;

    async fn get_order(&self, order_id: &str) -> Result<OrderDetails, PaymentError>;
}

/// Build the gateway selected by configuration
pub fn gateway_from_config(
    config: &PaymentConfig,
) -> Result<Arc<dyn PaymentGateway>, PaymentError> {
    match config.provider {
        PaymentProvider::Sandbox => Ok(Arc::new(SandboxGateway::new())),
        PaymentProvider::Paypal => Ok(Arc::new(PayPalGateway::new(config.paypal.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_selection() {
        let gateway = gateway_from_config(&PaymentConfig::default()).unwrap();
        assert_eq!(gateway.name(), "sandbox");

        let mut config = PaymentConfig::default();
        config.provider = PaymentProvider::Paypal;
        config.paypal.client_id = "id".to_string();
        config.paypal.client_secret = "secret".to_string();
        let gateway = gateway_from_config(&config).unwrap();
        assert_eq!(gateway.name(), "paypal");
    }

    #[test]
    fn test_gateway_error_display() {
        let err = PaymentError::Gateway {
            status: reqwest::StatusCode::UNPROCESSABLE_ENTITY,
            message: "INVALID_AMOUNT".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "payment gateway returned 422 Unprocessable Entity: INVALID_AMOUNT"
        );
    }
}
