//! Shipping addresses.

use serde::{Deserialize, Serialize};

/// A shipping address from the user's address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,

    /// At most one address per user should carry this flag.
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    /// Creates a non-default address.
    pub fn new(
        address_line: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            address_line: address_line.into(),
            city: city.into(),
            state: state.into(),
            postal_code: postal_code.into(),
            country: country.into(),
            is_default: false,
        }
    }

    /// Returns the same address flagged as default.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Two addresses are the same location when line and postal code match.
    pub fn same_location(&self, other: &Address) -> bool {
        self.address_line == other.address_line && self.postal_code == other.postal_code
    }
}

/// Picks the address flagged as default, if any.
pub fn select_default_address(addresses: &[Address]) -> Option<&Address> {
    addresses.iter().find(|a| a.is_default)
}
