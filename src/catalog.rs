//! Catalog cache for the kiosk.
//!
//! Holds an in-memory snapshot of the products and ingredients served by the
//! store backend (`GET /getproducts`, `GET /getingredients`). The cart never
//! mutates catalog entries; customization works on copies.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{KioskError, KioskResult};
use crate::money;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An ingredient / topping as stocked by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub supplier: String,
    /// Raw expiration value as sent by the backend (ISO date or HTTP date).
    #[serde(default)]
    pub expiration: Option<String>,
}

impl Ingredient {
    /// Parse `expiration` as a calendar date. Accepts `YYYY-MM-DD`, RFC 3339
    /// and RFC 2822 (`Wed, 01 Jan 2025 00:00:00 GMT`).
    pub fn expiration_date(&self) -> Option<NaiveDate> {
        let raw = self.expiration.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
            .or_else(|| DateTime::parse_from_rfc2822(raw).ok().map(|d| d.date_naive()))
    }

    pub fn in_stock(&self) -> bool {
        self.quantity > 0
    }
}

/// A customer review attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    #[serde(default)]
    pub product_id: String,
    pub customer_id: String,
    pub review_text: String,
}

/// A menu product in catalog form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProductRecord")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub customizations: Option<String>,
    pub alerts: Option<String>,
    pub has_boba: bool,
    pub seasonal: bool,
    /// Ingredient ids this drink comes with by default.
    pub ingredient_ids: Vec<String>,
    pub image: Option<String>,
    pub reviews: Vec<Review>,
}

impl Product {
    pub fn display_price(&self) -> String {
        money::format_usd(self.price)
    }

    pub fn includes_ingredient(&self, ingredient_id: &str) -> bool {
        self.ingredient_ids.iter().any(|id| id == ingredient_id)
    }
}

// Wire shape. The backend lists default ingredients either as full
// ingredient objects or as product_ingredients join rows.
#[derive(Deserialize)]
struct ProductRecord {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    price: Decimal,
    #[serde(default)]
    customizations: Option<String>,
    #[serde(default)]
    alerts: Option<String>,
    #[serde(default)]
    has_boba: bool,
    #[serde(default, alias = "is_seasonal")]
    seasonal: bool,
    #[serde(default)]
    ingredients: Vec<IngredientRef>,
    #[serde(default)]
    product_ingredients: Vec<ProductIngredientRef>,
    #[serde(default, alias = "image_url")]
    image: Option<String>,
    #[serde(default)]
    reviews: Vec<Review>,
}

#[derive(Deserialize)]
struct IngredientRef {
    id: String,
}

#[derive(Deserialize)]
struct ProductIngredientRef {
    ingredientid: String,
}

impl TryFrom<ProductRecord> for Product {
    type Error = String;

    fn try_from(r: ProductRecord) -> Result<Self, Self::Error> {
        if r.price.is_sign_negative() && !r.price.is_zero() {
            return Err(format!("product {} has negative price {}", r.id, r.price));
        }

        let mut ingredient_ids: Vec<String> = Vec::new();
        let refs = r
            .ingredients
            .into_iter()
            .map(|i| i.id)
            .chain(r.product_ingredients.into_iter().map(|pi| pi.ingredientid));
        for id in refs {
            if !ingredient_ids.contains(&id) {
                ingredient_ids.push(id);
            }
        }

        Ok(Product {
            id: r.id,
            name: r.name,
            description: r.description,
            price: r.price,
            customizations: r.customizations.filter(|s| !s.trim().is_empty()),
            alerts: r.alerts.filter(|s| !s.trim().is_empty()),
            has_boba: r.has_boba,
            seasonal: r.seasonal,
            ingredient_ids,
            image: r.image.filter(|s| !s.trim().is_empty()),
            reviews: r.reviews,
        })
    }
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

/// Extract the record array from a backend response. Accepts `{"data": [...]}`
/// and bare arrays.
fn records(payload: &Value) -> Option<&Vec<Value>> {
    payload
        .get("data")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array())
}

fn parse_records<T: serde::de::DeserializeOwned>(payload: &Value, kind: &str) -> KioskResult<Vec<T>> {
    let rows = records(payload)
        .ok_or_else(|| KioskError::InvalidResponse(format!("{kind} response missing data array")))?;

    let mut parsed = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<T>(row.clone()) {
            Ok(item) => parsed.push(item),
            Err(e) => warn!(kind, error = %e, "skipping malformed catalog row"),
        }
    }
    Ok(parsed)
}

pub fn parse_products(payload: &Value) -> KioskResult<Vec<Product>> {
    parse_records(payload, "products")
}

pub fn parse_ingredients(payload: &Value) -> KioskResult<Vec<Ingredient>> {
    parse_records(payload, "ingredients")
}

// ---------------------------------------------------------------------------
// Source + cache
// ---------------------------------------------------------------------------

/// Where catalog payloads come from. Implemented by [`crate::api::ApiClient`].
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_products(&self) -> KioskResult<Value>;
    async fn fetch_ingredients(&self) -> KioskResult<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub products: usize,
    pub ingredients: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    ingredients: Vec<Ingredient>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl Catalog {
    pub fn new(products: Vec<Product>, ingredients: Vec<Ingredient>) -> Self {
        Self {
            products,
            ingredients,
            refreshed_at: None,
        }
    }

    /// Fetch products and ingredients and replace the snapshot. The previous
    /// snapshot is kept when either request fails.
    pub async fn refresh<S: CatalogSource>(&mut self, source: &S) -> KioskResult<CatalogCounts> {
        let products_payload = source.fetch_products().await?;
        let ingredients_payload = source.fetch_ingredients().await?;

        let products = parse_products(&products_payload)?;
        let ingredients = parse_ingredients(&ingredients_payload)?;

        let counts = CatalogCounts {
            products: products.len(),
            ingredients: ingredients.len(),
        };
        self.products = products;
        self.ingredients = ingredients;
        self.refreshed_at = Some(Utc::now());

        info!(
            products = counts.products,
            ingredients = counts.ingredients,
            "catalog refreshed"
        );
        Ok(counts)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.ingredients
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn ingredient(&self, id: &str) -> Option<&Ingredient> {
        self.ingredients.iter().find(|i| i.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub(crate) fn add_review(&mut self, review: Review) {
        if let Some(product) = self.products.iter_mut().find(|p| p.id == review.product_id) {
            product.reviews.push(review);
        }
    }

    pub(crate) fn remove_review(&mut self, review_id: &str) -> Option<Review> {
        for product in &mut self.products {
            if let Some(pos) = product.reviews.iter().position(|r| r.id == review_id) {
                return Some(product.reviews.remove(pos));
            }
        }
        None
    }

    pub(crate) fn find_review(&self, review_id: &str) -> Option<&Review> {
        self.products
            .iter()
            .flat_map(|p| p.reviews.iter())
            .find(|r| r.id == review_id)
    }
}
