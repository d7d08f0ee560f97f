//! In-memory records of issued quotes and payment orders.
//!
//! Nothing here survives a restart.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::pricing::Quote;

#[derive(Debug, Clone, Serialize)]
pub struct StoredQuote {
    pub id: Uuid,
    pub material_key: String,
    pub quantity: u32,
    pub total_cost: f64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl StoredQuote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_until
    }
}

#[derive(Debug)]
pub struct QuoteStore {
    quotes: DashMap<Uuid, StoredQuote>,
    validity: Duration,
}

impl QuoteStore {
    pub fn new(validity_hours: i64) -> Self {
        Self {
            quotes: DashMap::new(),
            validity: Duration::hours(validity_hours),
        }
    }

    /// Record a quote issued at `now` and return the stored entry
    pub fn insert(&self, quote: &Quote, currency: &str, now: DateTime<Utc>) -> StoredQuote {
        let stored = StoredQuote {
            id: Uuid::new_v4(),
            material_key: quote.material_key.clone(),
            quantity: quote.quantity,
            total_cost: quote.total_cost,
            currency: currency.to_string(),
            created_at: now,
            valid_until: now + self.validity,
        };
        self.quotes.insert(stored.id, stored.clone());
        stored
    }

    pub fn get(&self, id: &Uuid) -> Option<StoredQuote> {
        self.quotes.get(id).map(|entry| entry.value().clone())
    }

    /// Drop quotes whose validity window has passed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.quotes.len();
        self.quotes.retain(|_, quote| !quote.is_expired(now));
        before - self.quotes.len()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Approved,
    Completed,
    Denied,
    Refunded,
}

impl OrderStatus {
    /// No further gateway activity is expected
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Completed | Self::Denied | Self::Refunded)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub quote_id: Uuid,
    pub customer_email: String,
    pub amount: f64,
    pub currency: String,
    pub status: OrderStatus,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment orders keyed by gateway order id
#[derive(Debug, Default)]
pub struct OrderLedger {
    orders: DashMap<String, OrderRecord>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: OrderRecord) {
        self.orders.insert(record.order_id.clone(), record);
    }

    pub fn get(&self, order_id: &str) -> Option<OrderRecord> {
        self.orders.get(order_id).map(|entry| entry.value().clone())
    }

    /// Update status (and transaction id when given). Returns false for unknown orders.
    pub fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        transaction_id: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        match self.orders.get_mut(order_id) {
            Some(mut record) => {
                record.status = status;
                if transaction_id.is_some() {
                    record.transaction_id = transaction_id;
                }
                record.updated_at = now;
                true
            }
            None => false,
        }
    }

    /// Drop settled orders last updated at or before `cutoff`. Open orders are kept.
    pub fn purge_settled(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.orders.len();
        self.orders
            .retain(|_, record| !(record.status.is_settled() && record.updated_at <= cutoff));
        before - self.orders.len()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Find the order a captured transaction belongs to
    pub fn find_by_transaction(&self, transaction_id: &str) -> Option<OrderRecord> {
        self.orders
            .iter()
            .find(|entry| entry.transaction_id.as_deref() == Some(transaction_id))
            .map(|entry| entry.value().clone())
    }
}
