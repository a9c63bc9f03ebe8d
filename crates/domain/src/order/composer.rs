//! Turns carts and buy-now products into priced draft orders.

use chrono::Utc;
use common::UserId;
use rust_decimal::Decimal;

use super::{Charges, OrderRecord, OrderStatus, Product};
use crate::address::{Address, select_default_address};
use crate::cart::{CartLine, CartSnapshot};
use crate::error::DomainError;
use crate::value_objects::Money;

/// Exchange factor applied to catalog prices when none is configured.
pub const DEFAULT_EXCHANGE_FACTOR: i64 = 85;

/// Builds draft [`OrderRecord`]s.
///
/// Each unit price is multiplied by the exchange factor and rounded half-up
/// to a whole unit before it is multiplied by the quantity and the charges
/// are added:
///
/// ```text
/// total = round(unit_price * exchange_factor) * quantity + delivery + other
/// ```
///
/// Rounding the summed total instead gives different results on carts with
/// several fractional prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderComposer {
    exchange_factor: Decimal,
}

impl OrderComposer {
    pub fn new(exchange_factor: Decimal) -> Self {
        Self { exchange_factor }
    }

    pub fn exchange_factor(&self) -> Decimal {
        self.exchange_factor
    }

    /// Converts a catalog unit price and rounds it to whole units.
    pub fn converted_unit_price(&self, unit_price: Money) -> Money {
        unit_price.convert(self.exchange_factor).round_half_up()
    }

    /// One draft order per cart line, in cart order.
    ///
    /// The address attached is the one flagged default in `addresses`, or
    /// none when no address carries the flag.
    pub fn compose_from_cart(
        &self,
        user_id: &UserId,
        cart: &CartSnapshot,
        addresses: &[Address],
        charges: &Charges,
    ) -> Vec<OrderRecord> {
        let address = select_default_address(addresses);
        cart.lines()
            .iter()
            .map(|line| self.compose_line(user_id, line, address, charges))
            .collect()
    }

    /// A single draft order for a "buy now" purchase.
    pub fn compose_from_product(
        &self,
        user_id: &UserId,
        product: &Product,
        quantity: u32,
        addresses: &[Address],
        charges: &Charges,
    ) -> Result<OrderRecord, DomainError> {
        let line = CartLine::new(
            product.product_id.clone(),
            product.title.clone(),
            product.unit_price,
            quantity,
            product.image_ref.clone(),
        )?;
        Ok(self.compose_line(
            user_id,
            &line,
            select_default_address(addresses),
            charges,
        ))
    }

    fn compose_line(
        &self,
        user_id: &UserId,
        line: &CartLine,
        address: Option<&Address>,
        charges: &Charges,
    ) -> OrderRecord {
        let unit_price = self.converted_unit_price(line.unit_price);
        let total = unit_price.multiply(line.quantity) + charges.sum();

        OrderRecord {
            product_id: line.product_id.clone(),
            product_title: line.name.clone(),
            image_ref: line.image_ref.clone(),
            unit_price,
            quantity: line.quantity,
            delivery_charge: charges.delivery_charge,
            other_charges: charges.other_charges,
            total,
            user_id: user_id.clone(),
            address: address.cloned(),
            created_at: Utc::now(),
            status: OrderStatus::Pending,
        }
    }
}

impl Default for OrderComposer {
    fn default() -> Self {
        Self::new(Decimal::from(DEFAULT_EXCHANGE_FACTOR))
    }
}

/// Amount to charge for a set of draft orders paid together.
///
/// Every record carries the flat charges, but a checkout pays them once:
/// the line subtotals plus `charges`. Nothing is due for no orders.
pub fn amount_due(orders: &[OrderRecord], charges: &Charges) -> Money {
    if orders.is_empty() {
        return Money::zero();
    }
    orders.iter().map(OrderRecord::subtotal).sum::<Money>() + charges.sum()
}
