use crate::config::PayPalConfig;
use crate::payment::{
    CapturedPayment, CreateOrderRequest, CreatedOrder, OrderDetails, PaymentError, PaymentGateway,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Tokens are refreshed this long before PayPal says they expire
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    id: String,
    status: String,
    #[serde(default)]
    purchase_units: Vec<CapturedUnit>,
}

#[derive(Debug, Deserialize)]
struct CapturedUnit {
    payments: CapturedPayments,
}

#[derive(Debug, Deserialize)]
struct CapturedPayments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
    amount: Amount,
}

#[derive(Debug, Deserialize)]
struct Amount {
    currency_code: String,
    value: String,
}

/// PayPal Orders v2 client
pub struct PayPalGateway {
    client: Client,
    config: PayPalConfig,
    token: RwLock<Option<CachedToken>>,
}

impl PayPalGateway {
    pub fn new(config: PayPalConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        info!(
            base_url = %config.api_base_url(),
            sandbox = config.sandbox,
            webhook_verification = !config.webhook_id.is_empty(),
            "PayPal gateway initialized"
        );

        Ok(Self {
            client,
            config,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url(), path)
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        let now = Utc::now();
        if let Some(token) = self.token.read().await.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.access_token.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = slot.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.access_token.clone());
            }
        }

        let credentials = STANDARD.encode(format!(
            "{}:{}",
            self.config.client_id, self.config.client_secret
        ));
        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .header("Authorization", format!("Basic {}", credentials))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "PayPal authentication failed");
            return Err(PaymentError::Auth(format!("{}: {}", status, error_text)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(format!("token response: {}", e)))?;

        debug!(expires_in = token.expires_in, "PayPal access token obtained");

        let cached = CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        };
        let access_token = cached.access_token.clone();
        *slot = Some(cached);
        Ok(access_token)
    }

    async fn check_status(
        response: reqwest::Response,
        order_id: Option<&str>,
    ) -> Result<reqwest::Response, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        match order_id {
            Some(id) if status == reqwest::StatusCode::NOT_FOUND => {
                Err(PaymentError::OrderNotFound(id.to_string()))
            }
            _ => Err(PaymentError::Gateway { status, message }),
        }
    }

    fn order_payload(&self, request: &CreateOrderRequest) -> serde_json::Value {
        let description = if request.description.is_empty() {
            format!("3D Print Order - Quote {}", request.quote_id)
        } else {
            request.description.clone()
        };

        let mut payload = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.quote_id,
                "custom_id": request.quote_id,
                "description": description,
                "amount": {
                    "currency_code": request.currency,
                    "value": format!("{:.2}", request.amount),
                },
            }],
            "application_context": {
                "brand_name": self.config.brand_name,
                "landing_page": "BILLING",
                "shipping_preference": "NO_SHIPPING",
                "user_action": "PAY_NOW",
                "return_url": self.config.return_url,
                "cancel_url": self.config.cancel_url,
            },
        });

        // Prefills the PayPal checkout form
        if !request.customer_ref.is_empty() {
            payload["payer"] = json!({ "email_address": request.customer_ref });
        }
        payload
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    fn name(&self) -> &str {
        "paypal"
    }

    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreatedOrder, PaymentError> {
        let token = self.access_token().await?;
        let request_id = format!("quote-{}-{}", request.quote_id, Utc::now().timestamp());

        info!(quote_id = %request.quote_id, amount = request.amount, "Creating PayPal order");

        let response = self
            .client
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(&token)
            .header("PayPal-Request-Id", request_id)
            .json(&self.order_payload(request))
            .send()
            .await?;
        let response = Self::check_status(response, None).await?;

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(format!("order response: {}", e)))?;

        let approval_url = order
            .links
            .into_iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href);

        info!(order_id = %order.id, quote_id = %request.quote_id, "PayPal order created");

        Ok(CreatedOrder {
            order_id: order.id,
            approval_url,
            status: order.status,
        })
    }

    async fn capture(&self, order_id: &str) -> Result<CapturedPayment, PaymentError> {
        let token = self.access_token().await?;

        info!(order_id = %order_id, "Capturing PayPal payment");

        let response = self
            .client
            .post(self.url(&format!("/v2/checkout/orders/{}/capture", order_id)))
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .send()
            .await?;
        let response = Self::check_status(response, Some(order_id)).await?;

        let captured: CaptureResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(format!("capture response: {}", e)))?;

        let capture = captured
            .purchase_units
            .into_iter()
            .next()
            .and_then(|unit| unit.payments.captures.into_iter().next())
            .ok_or_else(|| {
                PaymentError::InvalidResponse("capture response has no captures".to_string())
            })?;

        let captured_amount: f64 = capture
            .amount
            .value
            .parse()
            .map_err(|_| {
                PaymentError::InvalidResponse(format!("invalid amount: {}", capture.amount.value))
            })?;

        info!(
            order_id = %captured.id,
            transaction_id = %capture.id,
            amount = captured_amount,
            "PayPal payment captured"
        );

        Ok(CapturedPayment {
            order_id: captured.id,
            transaction_id: capture.id,
            captured_amount,
            currency: capture.amount.currency_code,
            status: captured.status,
        })
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderDetails, PaymentError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .get(self.url(&format!("/v2/checkout/orders/{}", order_id)))
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = Self::check_status(response, Some(order_id)).await?;

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(format!("order response: {}", e)))?;

        Ok(OrderDetails {
            order_id: order.id,
            status: order.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> PayPalConfig {
        PayPalConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            base_url: Some("http://127.0.0.1:1/".to_string()),
            ..PayPalConfig::default()
        }
    }

    #[test]
    fn test_token_freshness_margin() {
        let now = Utc::now();
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: now + Duration::seconds(600),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + Duration::seconds(301)));
    }

    #[test]
    fn test_order_payload_format() {
        let gateway = PayPalGateway::new(create_test_config()).unwrap();
        let payload = gateway.order_payload(&CreateOrderRequest {
            quote_id: "q-1".to_string(),
            amount: 17.2917,
            currency: "USD".to_string(),
            description: String::new(),
            customer_ref: "maker@example.com".to_string(),
        });

        assert_eq!(payload["intent"], "CAPTURE");
        let unit = &payload["purchase_units"][0];
        assert_eq!(unit["amount"]["value"], "17.29");
        assert_eq!(unit["amount"]["currency_code"], "USD");
        assert_eq!(unit["custom_id"], "q-1");
        assert_eq!(unit["description"], "3D Print Order - Quote q-1");
        assert_eq!(payload["application_context"]["user_action"], "PAY_NOW");
        assert_eq!(payload["payer"]["email_address"], "maker@example.com");
    }

    #[test]
    fn test_order_payload_without_customer() {
        let gateway = PayPalGateway::new(create_test_config()).unwrap();
        let payload = gateway.order_payload(&CreateOrderRequest {
            quote_id: "q-2".to_string(),
            amount: 5.0,
            currency: "USD".to_string(),
            description: "Bracket".to_string(),
            customer_ref: String::new(),
        });

        assert!(payload.get("payer").is_none());
        assert_eq!(payload["purchase_units"][0]["description"], "Bracket");
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let gateway = PayPalGateway::new(create_test_config()).unwrap();
        assert_eq!(gateway.url("/v2/checkout/orders"), "http://127.0.0.1:1/v2/checkout/orders");
    }
}
