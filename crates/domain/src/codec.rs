//! Translation between domain entities and store documents.
//!
//! Stored documents are loosely typed: numbers may arrive as strings,
//! `isDefault` may be a boolean or the string `"true"`/`"false"`, and
//! product IDs may be numeric. Decoding normalizes all of that here so the
//! rest of the system only sees validated values. Encoding always writes
//! the canonical form: JSON numbers for amounts, a boolean `isDefault`.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use common::UserId;
use document_store::{Document, Fields};
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use crate::address::Address;
use crate::cart::CartLine;
use crate::order::{OrderRecord, OrderStatus};
use crate::value_objects::{Money, ProductId};

/// Stored field names.
pub mod field {
    pub const PRODUCT_ID: &str = "productId";
    pub const NAME: &str = "name";
    pub const PRICE: &str = "price";
    pub const QUANTITY: &str = "quantity";
    pub const IMAGE_URL: &str = "imageUrl";

    pub const ADDRESS_LINE: &str = "addressLine";
    pub const CITY: &str = "city";
    pub const STATE: &str = "state";
    pub const POSTAL_CODE: &str = "postalCode";
    pub const COUNTRY: &str = "country";
    pub const IS_DEFAULT: &str = "isDefault";

    pub const PRODUCT_TITLE: &str = "productTitle";
    pub const DELIVERY_CHARGE: &str = "deliveryCharge";
    pub const OTHER_CHARGES: &str = "otherCharges";
    pub const TOTAL: &str = "total";
    pub const USER_ID: &str = "userId";
    pub const ADDRESS: &str = "address";
    pub const DATE: &str = "date";
    pub const STATUS: &str = "status";
}

/// A stored document that could not be turned into a domain value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing field `{field}`")]
    MissingField { field: &'static str },

    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl DecodeError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Two-way mapping between an entity and its document fields.
pub trait DocumentCodec: Sized {
    /// Decodes and validates stored fields.
    fn from_fields(fields: &Fields) -> Result<Self, DecodeError>;

    /// Encodes into the canonical stored form.
    fn to_fields(&self) -> Fields;

    fn from_document(document: &Document) -> Result<Self, DecodeError> {
        Self::from_fields(&document.fields)
    }
}

impl DocumentCodec for CartLine {
    fn from_fields(fields: &Fields) -> Result<Self, DecodeError> {
        let quantity = read_quantity(fields, field::QUANTITY)?;
        let unit_price = read_money(fields, field::PRICE)?;
        if unit_price.is_negative() {
            return Err(DecodeError::invalid(field::PRICE, "negative price"));
        }

        Ok(CartLine {
            product_id: read_product_id(fields)?,
            name: read_text_or_empty(fields, field::NAME)?,
            unit_price,
            quantity,
            image_ref: read_text_or_empty(fields, field::IMAGE_URL)?,
        })
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::PRODUCT_ID.into(), self.product_id.as_str().into());
        fields.insert(field::NAME.into(), self.name.clone().into());
        fields.insert(field::PRICE.into(), money_value(self.unit_price));
        fields.insert(field::QUANTITY.into(), self.quantity.into());
        fields.insert(field::IMAGE_URL.into(), self.image_ref.clone().into());
        fields
    }
}

impl DocumentCodec for Address {
    fn from_fields(fields: &Fields) -> Result<Self, DecodeError> {
        Ok(Address {
            address_line: read_text_or_empty(fields, field::ADDRESS_LINE)?,
            city: read_text_or_empty(fields, field::CITY)?,
            state: read_text_or_empty(fields, field::STATE)?,
            postal_code: read_text_or_empty(fields, field::POSTAL_CODE)?,
            country: read_text_or_empty(fields, field::COUNTRY)?,
            is_default: read_flag(fields, field::IS_DEFAULT)?,
        })
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::ADDRESS_LINE.into(), self.address_line.clone().into());
        fields.insert(field::CITY.into(), self.city.clone().into());
        fields.insert(field::STATE.into(), self.state.clone().into());
        fields.insert(field::POSTAL_CODE.into(), self.postal_code.clone().into());
        fields.insert(field::COUNTRY.into(), self.country.clone().into());
        fields.insert(field::IS_DEFAULT.into(), self.is_default.into());
        fields
    }
}

impl DocumentCodec for OrderRecord {
    fn from_fields(fields: &Fields) -> Result<Self, DecodeError> {
        let address = match fields.get(field::ADDRESS) {
            None | Some(Value::Null) => None,
            Some(Value::Object(inner)) => Some(Address::from_fields(inner)?),
            Some(other) => {
                return Err(DecodeError::invalid(
                    field::ADDRESS,
                    format!("expected object, found {other}"),
                ));
            }
        };

        let status = read_text(fields, field::STATUS)?;
        let status = OrderStatus::from_str(&status)
            .map_err(|e| DecodeError::invalid(field::STATUS, e.to_string()))?;

        let date = read_text(fields, field::DATE)?;
        let created_at = DateTime::parse_from_rfc3339(&date)
            .map_err(|e| DecodeError::invalid(field::DATE, e.to_string()))?
            .with_timezone(&Utc);

        Ok(OrderRecord {
            product_id: read_product_id(fields)?,
            product_title: read_text_or_empty(fields, field::PRODUCT_TITLE)?,
            image_ref: read_text_or_empty(fields, field::IMAGE_URL)?,
            unit_price: read_money(fields, field::PRICE)?,
            quantity: read_quantity(fields, field::QUANTITY)?,
            delivery_charge: read_money(fields, field::DELIVERY_CHARGE)?,
            other_charges: read_money(fields, field::OTHER_CHARGES)?,
            total: read_money(fields, field::TOTAL)?,
            user_id: UserId::new(read_text(fields, field::USER_ID)?),
            address,
            created_at,
            status,
        })
    }

    fn to_fields(&self) -> Fields {
        let address = self
            .address
            .as_ref()
            .map(|a| Value::Object(a.to_fields()))
            .unwrap_or(Value::Null);

        let mut fields = Fields::new();
        fields.insert(field::PRODUCT_ID.into(), self.product_id.as_str().into());
        fields.insert(field::PRODUCT_TITLE.into(), self.product_title.clone().into());
        fields.insert(field::IMAGE_URL.into(), self.image_ref.clone().into());
        fields.insert(field::PRICE.into(), money_value(self.unit_price));
        fields.insert(field::QUANTITY.into(), self.quantity.into());
        fields.insert(field::DELIVERY_CHARGE.into(), money_value(self.delivery_charge));
        fields.insert(field::OTHER_CHARGES.into(), money_value(self.other_charges));
        fields.insert(field::TOTAL.into(), money_value(self.total));
        fields.insert(field::USER_ID.into(), self.user_id.as_str().into());
        fields.insert(field::ADDRESS.into(), address);
        fields.insert(
            field::DATE.into(),
            self.created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .into(),
        );
        fields.insert(field::STATUS.into(), self.status.as_str().into());
        fields
    }
}

/// Encodes an amount as a JSON number, falling back to a string.
pub fn money_value(money: Money) -> Value {
    let text = money.amount().normalize().to_string();
    match serde_json::Number::from_str(&text) {
        Ok(number) => Value::Number(number),
        Err(_) => Value::String(text),
    }
}

fn read_text(fields: &Fields, name: &'static str) -> Result<String, DecodeError> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(DecodeError::MissingField { field: name }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(DecodeError::invalid(
            name,
            format!("expected string, found {other}"),
        )),
    }
}

fn read_text_or_empty(fields: &Fields, name: &'static str) -> Result<String, DecodeError> {
    match read_text(fields, name) {
        Err(DecodeError::MissingField { .. }) => Ok(String::new()),
        other => other,
    }
}

fn read_product_id(fields: &Fields) -> Result<ProductId, DecodeError> {
    match fields.get(field::PRODUCT_ID) {
        Some(Value::Number(n)) => Ok(ProductId::new(n.to_string())),
        _ => read_text(fields, field::PRODUCT_ID).map(ProductId::new),
    }
}

fn read_money(fields: &Fields, name: &'static str) -> Result<Money, DecodeError> {
    let parsed = match fields.get(name) {
        None | Some(Value::Null) => return Err(DecodeError::MissingField { field: name }),
        Some(Value::Number(n)) => {
            let text = n.to_string();
            Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text))
        }
        Some(Value::String(s)) => Decimal::from_str(s.trim()),
        Some(other) => {
            return Err(DecodeError::invalid(
                name,
                format!("expected number, found {other}"),
            ));
        }
    };

    parsed
        .map(Money::new)
        .map_err(|e| DecodeError::invalid(name, e.to_string()))
}

fn read_quantity(fields: &Fields, name: &'static str) -> Result<u32, DecodeError> {
    let quantity = match fields.get(name) {
        None | Some(Value::Null) => return Err(DecodeError::MissingField { field: name }),
        Some(Value::Number(n)) => match (n.as_u64(), n.as_f64()) {
            (Some(q), _) => q,
            (None, Some(f)) if f.fract() == 0.0 && f >= 0.0 => f as u64,
            _ => return Err(DecodeError::invalid(name, format!("not a whole count: {n}"))),
        },
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| DecodeError::invalid(name, e.to_string()))?,
        Some(other) => {
            return Err(DecodeError::invalid(
                name,
                format!("expected number, found {other}"),
            ));
        }
    };

    match u32::try_from(quantity) {
        Ok(q) if q >= 1 => Ok(q),
        _ => Err(DecodeError::invalid(
            name,
            format!("quantity must be between 1 and {}, found {quantity}", u32::MAX),
        )),
    }
}

/// Reads a boolean stored either natively or as `"true"`/`"false"`.
/// Absent means `false`.
fn read_flag(fields: &Fields, name: &'static str) -> Result<bool, DecodeError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
        Some(other) => Err(DecodeError::invalid(
            name,
            format!("expected boolean, found {other}"),
        )),
    }
}
