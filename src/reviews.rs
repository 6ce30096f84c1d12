//! Product reviews left by signed-in customers from the customization screen.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::catalog::{Catalog, Review};
use crate::error::{KioskError, KioskResult};
use crate::loyalty::Customer;

/// Longest review the kiosk will send.
pub const MAX_REVIEW_CHARS: usize = 1000;

/// `POST /addreview` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewRequest {
    pub product_id: String,
    pub customer_id: String,
    pub review_text: String,
}

/// `POST /deletereview` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewDeletion {
    pub review_id: String,
    pub customer_id: String,
}

#[async_trait]
pub trait ReviewGateway: Send + Sync {
    async fn add_review(&self, request: &ReviewRequest) -> KioskResult<Value>;
    async fn delete_review(&self, request: &ReviewDeletion) -> KioskResult<Value>;
}

/// Validate and build a review for `product_id`.
pub fn draft(
    product_id: &str,
    customer: Option<&Customer>,
    text: &str,
) -> KioskResult<ReviewRequest> {
    let customer = customer.ok_or(KioskError::MissingCustomer)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(KioskError::InvalidReview("review text is empty".into()));
    }
    if text.chars().count() > MAX_REVIEW_CHARS {
        return Err(KioskError::InvalidReview(format!(
            "review text exceeds {MAX_REVIEW_CHARS} characters"
        )));
    }
    Ok(ReviewRequest {
        product_id: product_id.to_string(),
        customer_id: customer.id.clone(),
        review_text: text.to_string(),
    })
}

/// Read the created review from the `addreview` acknowledgement. The
/// backend echoes the review id in `product_id`, so the product id is taken
/// from the request instead.
fn posted_review(ack: &Value, request: &ReviewRequest) -> KioskResult<Review> {
    let data = ack.get("data").unwrap_or(ack);
    let id = data
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| KioskError::InvalidResponse("addreview response missing review id".into()))?;
    let review_text = data
        .get("review_text")
        .and_then(Value::as_str)
        .unwrap_or(&request.review_text);

    Ok(Review {
        id: id.to_string(),
        product_id: request.product_id.clone(),
        customer_id: request.customer_id.clone(),
        review_text: review_text.to_string(),
    })
}

/// Post a review and add it to the catalog copy of the product.
pub async fn post_review<G: ReviewGateway>(
    gateway: &G,
    catalog: &mut Catalog,
    customer: Option<&Customer>,
    product_id: &str,
    text: &str,
) -> KioskResult<Review> {
    let request = draft(product_id, customer, text)?;
    let ack = gateway.add_review(&request).await?;
    let review = posted_review(&ack, &request)?;

    info!(review_id = %review.id, product_id, "review posted");
    catalog.add_review(review.clone());
    Ok(review)
}

/// Delete one of the signed-in customer's reviews.
pub async fn delete_review<G: ReviewGateway>(
    gateway: &G,
    catalog: &mut Catalog,
    customer: Option<&Customer>,
    review_id: &str,
) -> KioskResult<()> {
    let customer = customer.ok_or(KioskError::MissingCustomer)?;
    if let Some(existing) = catalog.find_review(review_id) {
        if existing.customer_id != customer.id {
            return Err(KioskError::NotReviewOwner);
        }
    }

    let request = ReviewDeletion {
        review_id: review_id.to_string(),
        customer_id: customer.id.clone(),
    };
    gateway.delete_review(&request).await?;

    catalog.remove_review(review_id);
    info!(review_id, "review deleted");
    Ok(())
}
