//! Order records and the composer that prices them.

mod composer;
mod record;
mod status;

pub use composer::{DEFAULT_EXCHANGE_FACTOR, OrderComposer, amount_due};
pub use record::{Charges, DEFAULT_DELIVERY_CHARGE, DEFAULT_OTHER_CHARGES, OrderRecord, Product};
pub use status::OrderStatus;
