//! Pricing engine: subtotal, flat tax, gross total and loyalty discount.
//!
//! Totals are always re-derived from the whole cart ledger; nothing is
//! patched incrementally. Amounts keep full precision and are rounded only
//! through [`Totals::display`] or when serialised for the backend.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cart::CartLedger;
use crate::loyalty::{self, Customer};
use crate::money;

/// What happens to an applied loyalty discount when the cart changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountPolicy {
    /// Discount survives cart changes until the order is reset or submitted.
    #[default]
    Sticky,
    /// Any change to the cart composition drops the discount.
    ClearOnChange,
}

impl std::fmt::Display for DiscountPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountPolicy::Sticky => f.write_str("sticky"),
            DiscountPolicy::ClearOnChange => f.write_str("clear_on_change"),
        }
    }
}

impl std::str::FromStr for DiscountPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sticky" => Ok(DiscountPolicy::Sticky),
            "clear_on_change" | "clear" => Ok(DiscountPolicy::ClearOnChange),
            other => Err(format!("Unknown discount policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub gross_total: Decimal,
    pub discount: Decimal,
}

impl Totals {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Amount due after the loyalty discount.
    pub fn final_total(&self) -> Decimal {
        self.gross_total - self.discount
    }

    pub fn has_discount(&self) -> bool {
        self.discount > Decimal::ZERO
    }

    /// Cents-rounded strings for the order summary panel.
    pub fn display(&self) -> TotalsDisplay {
        TotalsDisplay {
            subtotal: money::format_usd(self.subtotal),
            tax: money::format_usd(self.tax),
            discount: self
                .has_discount()
                .then(|| money::format_usd(self.discount)),
            total: money::format_usd(self.final_total()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TotalsDisplay {
    pub subtotal: String,
    pub tax: String,
    pub discount: Option<String>,
    pub total: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingEngine {
    tax_rate: Decimal,
    policy: DiscountPolicy,
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(money::DEFAULT_TAX_RATE, DiscountPolicy::default())
    }
}

impl PricingEngine {
    pub fn new(tax_rate: Decimal, policy: DiscountPolicy) -> Self {
        Self { tax_rate, policy }
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn policy(&self) -> DiscountPolicy {
        self.policy
    }

    /// Tax line label, e.g. `Tax 8.25%`.
    pub fn tax_label(&self) -> String {
        format!("Tax {}%", (self.tax_rate * Decimal::ONE_HUNDRED).normalize())
    }

    /// Derive totals for `ledger`. Called whenever the cart composition
    /// changes; `prior` supplies the discount, which is kept or dropped
    /// according to the policy and never exceeds the new gross total. An
    /// empty ledger always yields zero totals.
    pub fn recompute(&self, ledger: &CartLedger, prior: &Totals) -> Totals {
        if ledger.is_empty() {
            return Totals::zero();
        }

        let subtotal = ledger.total();
        let tax = subtotal * self.tax_rate;
        let gross_total = subtotal + tax;
        let discount = match self.policy {
            DiscountPolicy::Sticky => prior.discount.clamp(Decimal::ZERO, gross_total),
            DiscountPolicy::ClearOnChange => Decimal::ZERO,
        };

        Totals {
            subtotal,
            tax,
            gross_total,
            discount,
        }
    }

    /// Redeem the customer's points against the order: 10 points per dollar,
    /// capped at the gross total. Unchanged when there is no customer or the
    /// gross total is zero or less; this checks the amount, not the cart, so
    /// a cart of $0.00 lines is also left as is.
    pub fn apply_loyalty_discount(&self, customer: Option<&Customer>, totals: &Totals) -> Totals {
        let Some(customer) = customer else {
            return *totals;
        };
        if totals.gross_total <= Decimal::ZERO {
            return *totals;
        }

        let discount = loyalty::redeemable_value(customer.points).min(totals.gross_total);
        debug!(
            customer_id = %customer.id,
            points = customer.points,
            discount = %discount,
            "loyalty discount computed"
        );
        Totals { discount, ..*totals }
    }
}
