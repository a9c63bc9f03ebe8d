//! Order records and the inputs used to build them.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

use super::OrderStatus;
use crate::address::Address;
use crate::value_objects::{Money, ProductId};

/// Charge used when no delivery charge is configured.
pub const DEFAULT_DELIVERY_CHARGE: i64 = 50;

/// Charge used when no other charges are configured.
pub const DEFAULT_OTHER_CHARGES: i64 = 20;

/// Flat charges added to every order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charges {
    pub delivery_charge: Money,
    pub other_charges: Money,
}

impl Charges {
    pub fn new(delivery_charge: Money, other_charges: Money) -> Self {
        Self {
            delivery_charge,
            other_charges,
        }
    }

    /// No extra charges at all.
    pub fn none() -> Self {
        Self::new(Money::zero(), Money::zero())
    }

    /// Sum of both charges.
    pub fn sum(&self) -> Money {
        self.delivery_charge + self.other_charges
    }
}

impl Default for Charges {
    fn default() -> Self {
        Self::new(
            Money::from_units(DEFAULT_DELIVERY_CHARGE),
            Money::from_units(DEFAULT_OTHER_CHARGES),
        )
    }
}

/// A catalog product bought directly, bypassing the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub title: String,
    pub unit_price: Money,
    pub image_ref: String,
}

impl Product {
    pub fn new(
        product_id: impl Into<ProductId>,
        title: impl Into<String>,
        unit_price: Money,
        image_ref: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            title: title.into(),
            unit_price,
            image_ref: image_ref.into(),
        }
    }
}

/// A persisted (or about to be persisted) order for one product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub product_id: ProductId,
    pub product_title: String,
    pub image_ref: String,

    /// Unit price after conversion and rounding to whole units.
    pub unit_price: Money,

    pub quantity: u32,
    pub delivery_charge: Money,
    pub other_charges: Money,

    /// `unit_price * quantity + delivery_charge + other_charges`.
    pub total: Money,

    pub user_id: UserId,

    /// The user's default address at composition time, if one existed.
    pub address: Option<Address>,

    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
}

impl OrderRecord {
    /// `unit_price * quantity`, without the flat charges.
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    /// Returns true while the order has not been delivered.
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}
