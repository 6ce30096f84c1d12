//! Drink customization: size tier and topping selection.
//!
//! A [`CustomizationSession`] is opened for one catalog product, edited by the
//! size picker and topping toggles, and finalized into a [`CustomizedProduct`]
//! that goes into the cart. Finalize copies everything it needs, so the
//! catalog product is never touched.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::catalog::{Ingredient, Product};
use crate::money;

// ---------------------------------------------------------------------------
// Size tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeTier {
    #[default]
    Small,
    Medium,
    Large,
}

impl SizeTier {
    /// Picker order.
    pub const ALL: [SizeTier; 3] = [SizeTier::Small, SizeTier::Medium, SizeTier::Large];

    /// Amount added to the product base price.
    pub fn price_delta(self) -> Decimal {
        match self {
            SizeTier::Small => Decimal::ZERO,
            SizeTier::Medium => Decimal::new(150, 2),
            SizeTier::Large => Decimal::new(200, 2),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SizeTier::Small => "small",
            SizeTier::Medium => "medium",
            SizeTier::Large => "large",
        }
    }

    /// Picker caption, e.g. `+ $1.50`.
    pub fn delta_caption(self) -> String {
        format!("+ {}", money::format_usd(self.price_delta()))
    }
}

impl std::fmt::Display for SizeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for SizeTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(SizeTier::Small),
            "medium" => Ok(SizeTier::Medium),
            "large" => Ok(SizeTier::Large),
            other => Err(format!("Unknown size tier: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Cart-line product
// ---------------------------------------------------------------------------

/// A product as it sits in the cart: sized, with its final topping list and
/// price. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomizedProduct {
    pub product_id: String,
    pub name: String,
    pub base_price: Decimal,
    pub size: SizeTier,
    pub price: Decimal,
    pub ingredients: Vec<Ingredient>,
}

impl CustomizedProduct {
    pub fn display_price(&self) -> String {
        money::format_usd(self.price)
    }

    pub fn ingredient_ids(&self) -> impl Iterator<Item = &str> {
        self.ingredients.iter().map(|i| i.id.as_str())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// In-progress customization of one product.
///
/// Selected toppings are kept in catalog order regardless of the order they
/// were toggled in.
#[derive(Debug, Clone)]
pub struct CustomizationSession {
    product: Product,
    toppings: Vec<Ingredient>,
    size: SizeTier,
    selected: HashSet<String>,
}

impl CustomizationSession {
    /// Open with defaults: `small`, and every catalog ingredient the product
    /// normally comes with pre-selected.
    pub fn open(product: &Product, catalog_ingredients: &[Ingredient]) -> Self {
        let selected = catalog_ingredients
            .iter()
            .filter(|ing| product.includes_ingredient(&ing.id))
            .map(|ing| ing.id.clone())
            .collect();
        Self {
            product: product.clone(),
            toppings: catalog_ingredients.to_vec(),
            size: SizeTier::default(),
            selected,
        }
    }

    /// Re-open with a previous selection. Topping ids missing from the
    /// catalog are dropped.
    pub fn resume<'a>(
        product: &Product,
        catalog_ingredients: &[Ingredient],
        size: SizeTier,
        topping_ids: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let known: HashSet<&str> = catalog_ingredients.iter().map(|i| i.id.as_str()).collect();
        let selected = topping_ids
            .into_iter()
            .filter(|id| known.contains(id))
            .map(str::to_string)
            .collect();
        Self {
            product: product.clone(),
            toppings: catalog_ingredients.to_vec(),
            size,
            selected,
        }
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn size(&self) -> SizeTier {
        self.size
    }

    pub fn select_size(&mut self, size: SizeTier) {
        self.size = size;
    }

    /// Flip a topping in or out of the selection. Returns whether it is
    /// selected afterwards; ids that are not in the catalog are ignored.
    pub fn toggle_topping(&mut self, ingredient_id: &str) -> bool {
        if !self.toppings.iter().any(|i| i.id == ingredient_id) {
            debug!(ingredient_id, "ignoring toggle for ingredient not in catalog");
            return false;
        }
        if self.selected.remove(ingredient_id) {
            false
        } else {
            self.selected.insert(ingredient_id.to_string());
            true
        }
    }

    pub fn is_selected(&self, ingredient_id: &str) -> bool {
        self.selected.contains(ingredient_id)
    }

    /// Current selection in catalog order.
    pub fn selected_toppings(&self) -> Vec<Ingredient> {
        self.toppings
            .iter()
            .filter(|i| self.selected.contains(&i.id))
            .cloned()
            .collect()
    }

    /// Price the current selection would finalize at.
    pub fn quoted_price(&self) -> Decimal {
        self.product.price + self.size.price_delta()
    }

    /// Produce the cart line. The selection replaces the product's default
    /// ingredients outright, including when nothing is selected.
    pub fn finalize(&self) -> CustomizedProduct {
        CustomizedProduct {
            product_id: self.product.id.clone(),
            name: self.product.name.clone(),
            base_price: self.product.price,
            size: self.size,
            price: self.quoted_price(),
            ingredients: self.selected_toppings(),
        }
    }
}
