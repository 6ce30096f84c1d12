//! Order submission payloads and the gateway seam.
//!
//! The cart is flattened into the `POST /submitorder` body: one product id
//! per cart line and every line's ingredient ids in line order, so quantity
//! is implied by repetition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::cart::CartLedger;
use crate::error::{KioskError, KioskResult};
use crate::loyalty::{Customer, Settlement};
use crate::money;
use crate::pricing::Totals;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub products: Vec<String>,
    pub ingredients: Vec<String>,
    pub employee_id: String,
    /// Amount due after discount, in dollars rounded to cents.
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
}

impl OrderRequest {
    pub fn from_cart(
        cart: &CartLedger,
        totals: &Totals,
        employee_id: &str,
        customer: Option<&Customer>,
    ) -> KioskResult<Self> {
        if cart.is_empty() {
            return Err(KioskError::EmptyCart);
        }
        Ok(Self {
            products: cart.product_ids(),
            ingredients: cart.ingredient_ids(),
            employee_id: employee_id.to_string(),
            total: money::round_cents(totals.final_total()),
            discount: money::round_cents(totals.discount),
            customer: customer.map(|c| c.id.clone()),
        })
    }
}

/// A submission that has been started but not yet acknowledged.
///
/// Holds the totals the order was priced with; settlement reads these, not
/// whatever the cart looks like when the backend answers.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub submission_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub request: OrderRequest,
    pub totals: Totals,
    /// Customer as signed in when the order was sent.
    pub customer: Option<Customer>,
}

impl PendingSubmission {
    pub(crate) fn new(request: OrderRequest, totals: Totals, customer: Option<Customer>) -> Self {
        Self {
            submission_id: Uuid::new_v4(),
            started_at: Utc::now(),
            request,
            totals,
            customer,
        }
    }

    pub fn idempotency_key(&self) -> String {
        format!("order:{}", self.submission_id)
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderReceipt {
    /// Backend order id when the acknowledgement carried one.
    pub order_id: Option<String>,
    pub submission_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub totals: Totals,
    pub settlement: Settlement,
}

/// Pull the created order id out of a `submitorder` acknowledgement
/// (`{"data": {"id": ...}}`).
pub fn order_id_from_ack(ack: &Value) -> Option<String> {
    let id = ack.get("data").unwrap_or(ack).get("id")?;
    match id {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Backend that accepts orders. Implemented by [`crate::api::ApiClient`].
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn submit_order(&self, request: &OrderRequest, idempotency_key: &str) -> KioskResult<Value>;
}
