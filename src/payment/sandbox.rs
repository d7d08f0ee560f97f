use crate::payment::{
    CapturedPayment, CreateOrderRequest, CreatedOrder, OrderDetails, PaymentError, PaymentGateway,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

#[derive(Debug, Clone)]
struct SandboxOrder {
    amount: f64,
    currency: String,
    status: String,
    transaction_id: Option<String>,
}

/// In-process gateway that approves every order.
///
/// Order ids are `SANDBOX-{n}` and transaction ids `SANDBOX-TX-{n}`, numbered
/// from 1 in creation order.
#[derive(Debug, Default)]
pub struct SandboxGateway {
    orders: DashMap<String, SandboxOrder>,
    next_id: AtomicU64,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    fn name(&self) -> &str {
        "sandbox"
    }

    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreatedOrder, PaymentError> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let order_id = format!("SANDBOX-{}", n);

        self.orders.insert(
            order_id.clone(),
            SandboxOrder {
                amount: request.amount,
                currency: request.currency.clone(),
                status: "CREATED".to_string(),
                transaction_id: None,
            },
        );

        info!(
            order_id = %order_id,
            quote_id = %request.quote_id,
            amount = request.amount,
            "Sandbox order created"
        );

        Ok(CreatedOrder {
            approval_url: Some(format!("https://sandbox.invalid/checkout?token={}", order_id)),
            order_id,
            status: "CREATED".to_string(),
        })
    }

    async fn capture(&self, order_id: &str) -> Result<CapturedPayment, PaymentError> {
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))?;

        if order.transaction_id.is_some() {
            return Err(PaymentError::Gateway {
                status: reqwest::StatusCode::UNPROCESSABLE_ENTITY,
                message: "ORDER_ALREADY_CAPTURED".to_string(),
            });
        }

        let transaction_id = format!("SANDBOX-TX-{}", order_id.trim_start_matches("SANDBOX-"));
        order.status = "COMPLETED".to_string();
        order.transaction_id = Some(transaction_id.clone());

        Ok(CapturedPayment {
            order_id: order_id.to_string(),
            transaction_id,
            captured_amount: order.amount,
            currency: order.currency.clone(),
            status: order.status.clone(),
        })
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderDetails, PaymentError> {
        self.orders
            .get(order_id)
            .map(|order| OrderDetails {
                order_id: order_id.to_string(),
                status: order.status.clone(),
            })
            .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))
    }
}
