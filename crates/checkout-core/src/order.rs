//! Orders
//!
//! An order is fetched once by the embedded surface and is read-only for the
//! rest of the flow.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order as returned by `GET /orders/public/{orderId}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,

    /// Amount in minor units (paise for INR)
    pub amount: i64,

    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "INR".into()
}

impl Order {
    pub fn new(id: impl Into<String>, amount: i64, currency: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            amount,
            currency: currency.into(),
        }
    }

    /// Amount in major units with two decimal places
    pub fn major_amount(&self) -> Decimal {
        major_units(self.amount)
    }

    /// Human-readable amount, e.g. `₹500.00` or `USD 12.50`
    pub fn formatted_amount(&self) -> String {
        format_amount(self.amount, &self.currency)
    }
}

/// Convert minor units to a two-decimal amount
pub fn major_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

pub fn format_amount(minor: i64, currency: &str) -> String {
    let major = major_units(minor);
    match currency.to_uppercase().as_str() {
        "INR" => format!("₹{major:.2}"),
        other => format!("{other} {major:.2}"),
    }
}
