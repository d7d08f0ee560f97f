//! Gateway webhook notifications

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

pub const TRANSMISSION_HEADERS: [&str; 5] = [
    "paypal-auth-algo",
    "paypal-transmission-id",
    "paypal-cert-id",
    "paypal-transmission-sig",
    "paypal-transmission-time",
];

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub resource: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Approved {
        order_id: Option<String>,
    },
    Completed {
        transaction_id: Option<String>,
        order_id: Option<String>,
        amount: Option<String>,
    },
    Denied {
        transaction_id: Option<String>,
        order_id: Option<String>,
    },
    Refunded {
        refund_id: Option<String>,
        amount: Option<String>,
    },
    Unhandled {
        event_type: String,
    },
}

impl WebhookOutcome {
    pub fn is_handled(&self) -> bool {
        !matches!(self, WebhookOutcome::Unhandled { .. })
    }
}

impl WebhookEvent {
    pub fn classify(&self) -> WebhookOutcome {
        let id = string_at(&self.resource, &["id"]);
        let amount = string_at(&self.resource, &["amount", "value"]);
        let related_order =
            string_at(&self.resource, &["supplementary_data", "related_ids", "order_id"]);

        match self.event_type.as_str() {
            "CHECKOUT.ORDER.APPROVED" => WebhookOutcome::Approved { order_id: id },
            "PAYMENT.CAPTURE.COMPLETED" => WebhookOutcome::Completed {
                transaction_id: id,
                order_id: related_order,
                amount,
            },
            "PAYMENT.CAPTURE.DENIED" => WebhookOutcome::Denied {
                transaction_id: id,
                order_id: related_order,
            },
            "PAYMENT.CAPTURE.REFUNDED" => WebhookOutcome::Refunded { refund_id: id, amount },
            other => WebhookOutcome::Unhandled {
                event_type: other.to_string(),
            },
        }
    }
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Check the transmission headers PayPal attaches to every webhook.
///
/// An empty `webhook_id` turns verification off. Signature cryptography is
/// not checked; only header presence is enforced.
pub fn verify_transmission_headers(webhook_id: &str, headers: &HeaderMap, body: &[u8]) -> bool {
    if webhook_id.is_empty() {
        debug!("Webhook verification skipped, no webhook id configured");
        return true;
    }

    let missing: Vec<&str> = TRANSMISSION_HEADERS
        .iter()
        .copied()
        .filter(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map_or(true, |v| v.trim().is_empty())
        })
        .collect();

    if !missing.is_empty() {
        warn!(?missing, "Webhook rejected, transmission headers missing");
        return false;
    }

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default();
    debug!(
        transmission_id = %header("paypal-transmission-id"),
        expected_signature_input = %signature_input(
            header("paypal-transmission-id"),
            header("paypal-transmission-time"),
            webhook_id,
            body
        ),
        "Webhook transmission headers present"
    );
    true
}

/// `{transmission_id}|{transmission_time}|{webhook_id}|{sha256(body)}`
pub fn signature_input(
    transmission_id: &str,
    transmission_time: &str,
    webhook_id: &str,
    body: &[u8],
) -> String {
    format!(
        "{}|{}|{}|{:x}",
        transmission_id,
        transmission_time,
        webhook_id,
        Sha256::digest(body)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn event(event_type: &str, resource: Value) -> WebhookEvent {
        serde_json::from_value(json!({ "event_type": event_type, "resource": resource })).unwrap()
    }

    #[test]
    fn test_classify_events() {
        let approved = event("CHECKOUT.ORDER.APPROVED", json!({ "id": "ORDER-1" }));
        assert_eq!(
            approved.classify(),
            WebhookOutcome::Approved {
                order_id: Some("ORDER-1".to_string())
            }
        );

        let completed = event(
            "PAYMENT.CAPTURE.COMPLETED",
            json!({
                "id": "TX-1",
                "amount": { "value": "17.29", "currency_code": "USD" },
                "supplementary_data": { "related_ids": { "order_id": "ORDER-1" } }
            }),
        );
        assert_eq!(
            completed.classify(),
            WebhookOutcome::Completed {
                transaction_id: Some("TX-1".to_string()),
                order_id: Some("ORDER-1".to_string()),
                amount: Some("17.29".to_string()),
            }
        );

        let refunded = event("PAYMENT.CAPTURE.REFUNDED", json!({ "id": "R-1" }));
        assert!(matches!(refunded.classify(), WebhookOutcome::Refunded { amount: None, .. }));

        let other = event("CUSTOMER.DISPUTE.CREATED", json!({}));
        let outcome = other.classify();
        assert!(!outcome.is_handled());
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "status": "unhandled", "event_type": "CUSTOMER.DISPUTE.CREATED" })
        );
    }

    #[test]
    fn test_missing_resource_is_tolerated() {
        let event: WebhookEvent =
            serde_json::from_value(json!({ "event_type": "PAYMENT.CAPTURE.DENIED" })).unwrap();
        assert_eq!(
            event.classify(),
            WebhookOutcome::Denied {
                transaction_id: None,
                order_id: None
            }
        );
    }

    #[test]
    fn test_header_verification() {
        let mut headers = HeaderMap::new();
        assert!(verify_transmission_headers("", &headers, b"{}"));
        assert!(!verify_transmission_headers("WH-1", &headers, b"{}"));

        for name in TRANSMISSION_HEADERS {
            headers.insert(name, HeaderValue::from_static("value"));
        }
        assert!(verify_transmission_headers("WH-1", &headers, b"{}"));

        headers.insert("paypal-cert-id", HeaderValue::from_static(" "));
        assert!(!verify_transmission_headers("WH-1", &headers, b"{}"));
    }

    #[test]
    fn test_signature_input() {
        let input = signature_input("T-1", "2024-01-01T00:00:00Z", "WH-1", b"");
        assert_eq!(
            input,
            "T-1|2024-01-01T00:00:00Z|WH-1|e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
