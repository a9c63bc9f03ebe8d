//! Cart lines and the derived cart snapshot.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{Money, ProductId};

/// One product entry in a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Catalog product identifier, unique within a cart.
    pub product_id: ProductId,

    /// Product name shown to the user.
    pub name: String,

    /// Catalog unit price, before conversion.
    pub unit_price: Money,

    /// Units of the product, always at least 1.
    pub quantity: u32,

    /// Image URL or other image reference.
    pub image_ref: String,
}

impl CartLine {
    /// Creates a cart line, rejecting a zero quantity or a negative price.
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
        image_ref: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        if unit_price.is_negative() {
            return Err(DomainError::InvalidPrice {
                price: unit_price.amount(),
            });
        }

        Ok(Self {
            product_id: product_id.into(),
            name: name.into(),
            unit_price,
            quantity,
            image_ref: image_ref.into(),
        })
    }

    /// Returns `unit_price * quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Derived view of a cart: its lines plus totals.
///
/// Totals are recomputed from the lines every time a snapshot is built and
/// never adjusted incrementally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    lines: Vec<CartLine>,
    total_price: Money,
    total_quantity: u64,
}

impl CartSnapshot {
    /// Builds a snapshot from the full set of lines.
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let total_price = lines.iter().map(CartLine::line_total).sum();
        let total_quantity = lines.iter().map(|l| u64::from(l.quantity)).sum();

        Self {
            lines,
            total_price,
            total_quantity,
        }
    }

    /// An empty cart.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Sum of every line's `unit_price * quantity`.
    pub fn total_price(&self) -> Money {
        self.total_price
    }

    /// Sum of every line's quantity. Wider than a line quantity so any
    /// number of stored lines fits.
    pub fn total_quantity(&self) -> u64 {
        self.total_quantity
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Finds the line for a product.
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }
}
