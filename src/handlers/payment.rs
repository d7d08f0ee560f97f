use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::AppState;
use crate::metrics;
use crate::payment::{
    verify_transmission_headers, CreateOrderRequest, PaymentError, WebhookEvent, WebhookOutcome,
};
use crate::pricing::round_currency;
use crate::store::{OrderRecord, OrderStatus};

#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub quote_id: Option<String>,
    pub customer_email: Option<String>,
}

impl CreateOrderBody {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.quote_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            errors.push("quote_id is required".to_string());
        }
        match self.customer_email.as_deref() {
            None => errors.push("customer_email is required".to_string()),
            Some(email) if !email.contains('@') => errors.push("Invalid email format".to_string()),
            Some(_) => {}
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct CaptureOrderBody {
    pub order_id: Option<String>,
}

/// Gateway failures during checkout are reported as 422 unless the order is unknown
fn checkout_error(err: PaymentError) -> AppError {
    match err {
        PaymentError::OrderNotFound(_) => AppError::from(err),
        other => AppError::Rejected {
            message: "Payment processing failed".to_string(),
            details: vec![other.to_string()],
        },
    }
}

/// Handle POST /api/v1/payment/create-order
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderBody>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;

    let errors = body.validate();
    if !errors.is_empty() {
        return Err(AppError::Rejected {
            message: "Invalid payment request".to_string(),
            details: errors,
        });
    }
    let quote_id = body.quote_id.unwrap_or_default();
    let customer_email = body.customer_email.unwrap_or_default();

    let stored = Uuid::parse_str(quote_id.trim())
        .ok()
        .and_then(|id| state.quotes.get(&id))
        .ok_or_else(|| AppError::NotFound(format!("Quote {} not found", quote_id)))?;

    let now = Utc::now();
    if stored.is_expired(now) {
        return Err(AppError::QuoteExpired(format!(
            "Quote {} expired at {}",
            stored.id,
            stored.valid_until.to_rfc3339()
        )));
    }

    let amount = round_currency(stored.total_cost);
    let request = CreateOrderRequest {
        quote_id: stored.id.to_string(),
        amount,
        currency: stored.currency.clone(),
        description: format!(
            "3D Print Order - {} x{} (Quote {})",
            stored.material_key, stored.quantity, stored.id
        ),
        customer_ref: customer_email.clone(),
    };

    let created = match state.gateway.create_order(&request).await {
        Ok(created) => {
            metrics::record_payment("create", "success");
            created
        }
        Err(e) => {
            warn!(
                quote_id = %stored.id,
                gateway = state.gateway.name(),
                error = %e,
                "Payment order creation failed"
            );
            metrics::record_payment("create", "failure");
            return Err(checkout_error(e));
        }
    };

    state.orders.insert(OrderRecord {
        order_id: created.order_id.clone(),
        quote_id: stored.id,
        customer_email,
        amount,
        currency: stored.currency.clone(),
        status: OrderStatus::Created,
        transaction_id: None,
        created_at: now,
        updated_at: now,
    });

    info!(order_id = %created.order_id, quote_id = %stored.id, amount, "Payment order created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "order_id": created.order_id,
            "approval_url": created.approval_url,
            "status": created.status,
            "quote_id": stored.id,
            "amount": amount,
            "currency": stored.currency,
        })),
    ))
}

/// Handle POST /api/v1/payment/capture-order
pub async fn capture_order(
    State(state): State<AppState>,
    payload: Result<Json<CaptureOrderBody>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;
    let order_id = body
        .order_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Rejected {
            message: "Invalid capture request".to_string(),
            details: vec!["order_id is required".to_string()],
        })?;

    let captured = match state.gateway.capture(&order_id).await {
        Ok(captured) => {
            metrics::record_payment("capture", "success");
            captured
        }
        Err(e) => {
            warn!(
                order_id = %order_id,
                gateway = state.gateway.name(),
                error = %e,
                "Payment capture failed"
            );
            metrics::record_payment("capture", "failure");
            return Err(checkout_error(e));
        }
    };

    if !state.orders.update_status(
        &order_id,
        OrderStatus::Completed,
        Some(captured.transaction_id.clone()),
        Utc::now(),
    ) {
        warn!(order_id = %order_id, "Captured order is not in the ledger");
    }

    info!(
        order_id = %order_id,
        transaction_id = %captured.transaction_id,
        amount = captured.captured_amount,
        "Payment captured"
    );

    Ok(Json(json!({
        "success": true,
        "order_id": captured.order_id,
        "transaction_id": captured.transaction_id,
        "amount": captured.captured_amount,
        "currency": captured.currency,
        "status": captured.status,
    })))
}

/// Handle POST /api/v1/payment/webhook
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let webhook_id = state.config.load().payment.paypal.webhook_id.clone();
    if !verify_transmission_headers(&webhook_id, &headers, &body) {
        metrics::record_payment("webhook", "rejected");
        return Err(AppError::Unauthorized("Invalid webhook signature".to_string()));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::validation("Invalid webhook payload", vec![e.to_string()]))?;

    let outcome = event.classify();
    info!(
        event_id = ?event.id,
        event_type = %event.event_type,
        handled = outcome.is_handled(),
        "Webhook received"
    );

    let now = Utc::now();
    let applied = match &outcome {
        WebhookOutcome::Approved { order_id: Some(id) } => {
            state.orders.update_status(id, OrderStatus::Approved, None, now)
        }
        WebhookOutcome::Completed {
            transaction_id,
            order_id,
            ..
        } => match order_id {
            Some(id) => state.orders.update_status(
                id,
                OrderStatus::Completed,
                transaction_id.clone(),
                now,
            ),
            None => false,
        },
        WebhookOutcome::Denied {
            transaction_id,
            order_id,
        } => {
            let target = order_id.clone().or_else(|| {
                transaction_id
                    .as_deref()
                    .and_then(|tx| state.orders.find_by_transaction(tx))
                    .map(|record| record.order_id)
            });
            match target {
                Some(id) => state.orders.update_status(
                    &id,
                    OrderStatus::Denied,
                    transaction_id.clone(),
                    now,
                ),
                None => false,
            }
        }
        _ => false,
    };

    metrics::record_payment("webhook", if outcome.is_handled() { "handled" } else { "ignored" });

    Ok(Json(json!({
        "success": true,
        "handled": outcome.is_handled(),
        "ledger_updated": applied,
        "outcome": outcome,
    })))
}

/// Handle GET /api/v1/payment/order/{order_id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .orders
        .get(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

    let gateway_status = match state.gateway.get_order(&order_id).await {
        Ok(details) => {
            metrics::record_payment("get", "success");
            Some(details.status)
        }
        Err(e) => {
            warn!(order_id = %order_id, error = %e, "Could not refresh order status from gateway");
            metrics::record_payment("get", "failure");
            None
        }
    };

    Ok(Json(json!({
        "success": true,
        "order": record,
        "gateway_status": gateway_status,
    })))
}

/// Handle GET /api/v1/payment/receipt/{transaction_id}
///
/// Receipts exist only for captured payments still held in the ledger.
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .orders
        .find_by_transaction(&transaction_id)
        .filter(|record| matches!(record.status, OrderStatus::Completed | OrderStatus::Refunded))
        .ok_or_else(|| {
            AppError::NotFound(format!("No transaction found with ID: {}", transaction_id))
        })?;

    let config = state.config.load();
    info!(transaction_id = %transaction_id, order_id = %record.order_id, "Receipt generated");

    Ok(Json(json!({
        "success": true,
        "receipt_number": receipt_number(&transaction_id),
        "transaction_id": transaction_id,
        "order_id": record.order_id,
        "quote_id": record.quote_id,
        "date": record.updated_at.to_rfc3339(),
        "status": record.status,
        "customer_info": {
            "email": record.customer_email,
        },
        "payment_details": {
            "amount": round_currency(record.amount),
            "currency": record.currency,
            "payment_method": state.gateway.name(),
            "transaction_id": transaction_id,
        },
        "company_info": {
            "name": config.payment.paypal.brand_name,
        },
    })))
}

/// `3DP-` followed by the first eight characters of the transaction id
fn receipt_number(transaction_id: &str) -> String {
    format!("3DP-{}", transaction_id.chars().take(8).collect::<String>())
}
