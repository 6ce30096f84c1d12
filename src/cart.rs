//! Cart ledger: the ordered lines of the order being built.
//!
//! Lines are shared (`Arc`) and the ledger is persistent: `append` returns a
//! new ledger one line longer and leaves the original untouched. There is no
//! per-line removal and no quantity field; two identical drinks are two lines.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::customization::CustomizedProduct;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartLedger {
    lines: Vec<Arc<CustomizedProduct>>,
}

impl CartLedger {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn append(&self, item: CustomizedProduct) -> CartLedger {
        let mut lines = Vec::with_capacity(self.lines.len() + 1);
        lines.extend(self.lines.iter().cloned());
        lines.push(Arc::new(item));
        CartLedger { lines }
    }

    #[must_use]
    pub fn reset(&self) -> CartLedger {
        CartLedger::new()
    }

    /// Sum of line prices at full precision.
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(|line| line.price).sum()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[Arc<CustomizedProduct>] {
        &self.lines
    }

    /// Product ids, one per line.
    pub fn product_ids(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.product_id.clone()).collect()
    }

    /// Ingredient ids of every line, flattened in line order. An id repeats
    /// once for each line that includes it.
    pub fn ingredient_ids(&self) -> Vec<String> {
        self.lines
            .iter()
            .flat_map(|l| l.ingredient_ids().map(str::to_string))
            .collect()
    }
}
