//! Form Validation
//!
//! Field checks run before a payment is submitted. A failing check keeps the
//! flow in `Input` and never reaches the service.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::payment::{CardDetails, PaymentMethod, PaymentRequest};

const MIN_CARD_NUMBER_LEN: usize = 13;
const MIN_CVV_LEN: usize = 3;

/// Form field an error is attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    #[serde(rename = "number")]
    CardNumber,
    HolderName,
    ExpiryMonth,
    ExpiryYear,
    Cvv,
    Vpa,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::CardNumber => "number",
            Field::HolderName => "holder_name",
            Field::ExpiryMonth => "expiry_month",
            Field::ExpiryYear => "expiry_year",
            Field::Cvv => "cvv",
            Field::Vpa => "vpa",
        }
    }
}

/// Field-level errors, one message per field
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }

    fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self
            .iter()
            .map(|(field, msg)| format!("{}: {}", field.as_str(), msg))
            .collect();
        f.write_str(&joined.join(", "))
    }
}

/// Raw card form input as typed by the user
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CardForm {
    pub number: String,
    pub holder_name: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
}

impl fmt::Debug for CardForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardForm")
            .field("number_len", &self.number.len())
            .field("holder_name", &self.holder_name)
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .finish_non_exhaustive()
    }
}

impl CardForm {
    /// Fill month and year from a combined `MM/YY` input
    pub fn with_expiry(mut self, expiry: &str) -> Self {
        let (month, year) = parse_expiry(expiry);
        self.expiry_month = month;
        self.expiry_year = year;
        self
    }

    /// Trimmed copy with separators removed and a two-digit year expanded
    pub fn normalized(&self) -> Self {
        Self {
            number: self
                .number
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '-')
                .collect(),
            holder_name: self.holder_name.trim().to_string(),
            expiry_month: self.expiry_month.trim().to_string(),
            expiry_year: normalize_year(self.expiry_year.trim(), current_year()),
            cvv: self.cvv.trim().to_string(),
        }
    }

    /// Check every field and produce the card payload
    pub fn validate(&self) -> Result<CardDetails, FieldErrors> {
        let form = self.normalized();
        let mut errors = FieldErrors::new();

        if form.number.len() < MIN_CARD_NUMBER_LEN {
            errors.insert(Field::CardNumber, "Invalid card number");
        }
        if form.holder_name.is_empty() {
            errors.insert(Field::HolderName, "Holder name is required");
        }
        let month_digits = !form.expiry_month.is_empty()
            && form.expiry_month.chars().all(|c| c.is_ascii_digit());
        if !month_digits || !matches!(form.expiry_month.parse::<u32>(), Ok(1..=12)) {
            errors.insert(Field::ExpiryMonth, "Invalid month");
        }
        if form.expiry_year.len() != 4 || !form.expiry_year.chars().all(|c| c.is_ascii_digit()) {
            errors.insert(Field::ExpiryYear, "Invalid year");
        }
        if form.cvv.len() < MIN_CVV_LEN {
            errors.insert(Field::Cvv, "Invalid CVV");
        }

        errors.into_result(CardDetails {
            number: form.number,
            expiry_month: form.expiry_month,
            expiry_year: form.expiry_year,
            cvv: form.cvv,
            holder_name: form.holder_name,
        })
    }
}

/// Check a VPA has the `local-part@domain` shape
pub fn validate_vpa(vpa: &str) -> Result<String, FieldErrors> {
    let vpa = vpa.trim();
    let allowed = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    };

    let mut errors = FieldErrors::new();
    match vpa.split_once('@') {
        Some((local, domain)) if allowed(local) && allowed(domain) => {}
        _ => errors.insert(Field::Vpa, "Invalid VPA format (e.g. user@bank)"),
    }
    errors.into_result(vpa.to_string())
}

/// Method-specific form payload submitted by the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentInput {
    Card(CardForm),
    Upi { vpa: String },
}

impl PaymentInput {
    pub fn upi(vpa: impl Into<String>) -> Self {
        PaymentInput::Upi { vpa: vpa.into() }
    }

    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentInput::Card(_) => PaymentMethod::Card,
            PaymentInput::Upi { .. } => PaymentMethod::Upi,
        }
    }

    /// Validate and build the service request
    pub fn into_request(&self, order_id: &str) -> Result<PaymentRequest, FieldErrors> {
        match self {
            PaymentInput::Card(form) => form.validate().map(|card| PaymentRequest::card(order_id, card)),
            PaymentInput::Upi { vpa } => validate_vpa(vpa).map(|vpa| PaymentRequest::upi(order_id, vpa)),
        }
    }
}

/// Split `MM/YY` into a month and a century-expanded year
pub fn parse_expiry(input: &str) -> (String, String) {
    let (month, year) = input.split_once('/').unwrap_or((input, ""));
    (
        month.trim().to_string(),
        normalize_year(year.trim(), current_year()),
    )
}

/// Expand a two-digit year by prefixing the century of `current_year`
pub fn normalize_year(year: &str, current_year: i32) -> String {
    if year.len() == 2 && year.chars().all(|c| c.is_ascii_digit()) {
        format!("{}{}", current_year / 100, year)
    } else {
        year.to_string()
    }
}

fn current_year() -> i32 {
    chrono::Utc::now().year()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_card() -> CardForm {
        CardForm {
            number: "4111 1111 1111 1111".into(),
            holder_name: "Asha Rao".into(),
            cvv: "123".into(),
            ..Default::default()
        }
        .with_expiry("09/27")
    }

    #[test]
    fn test_every_bad_card_field_is_reported() {
        let form = CardForm {
            number: "4111".into(),
            holder_name: String::new(),
            expiry_month: "13".into(),
            expiry_year: "202".into(),
            cvv: "1".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 5);
        assert_eq!(errors.get(Field::CardNumber), Some("Invalid card number"));
        assert_eq!(errors.get(Field::HolderName), Some("Holder name is required"));
        assert_eq!(errors.get(Field::ExpiryMonth), Some("Invalid month"));
        assert_eq!(errors.get(Field::ExpiryYear), Some("Invalid year"));
        assert_eq!(errors.get(Field::Cvv), Some("Invalid CVV"));
    }

    #[test]
    fn test_month_must_be_plain_digits() {
        for month in ["+9", "-1", " ", "1a", "0", "13"] {
            let form = CardForm {
                expiry_month: month.into(),
                ..valid_card()
            };
            let errors = form.validate().unwrap_err();
            assert_eq!(errors.get(Field::ExpiryMonth), Some("Invalid month"), "{month:?}");
            assert_eq!(errors.len(), 1, "{month:?}");
        }

        let form = CardForm {
            expiry_month: "9".into(),
            ..valid_card()
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_expiry_normalization() {
        let (month, year) = parse_expiry("09/27");
        assert_eq!(month, "09");
        assert_eq!(year, "2027");
        assert_eq!(normalize_year("27", 2199), "2127");
        assert_eq!(normalize_year("2031", 2026), "2031");
    }

    #[test]
    fn test_valid_card_produces_details() {
        let card = valid_card().validate().unwrap();
        assert_eq!(card.number, "4111111111111111");
        assert_eq!(card.expiry_month, "09");
        assert_eq!(card.expiry_year, "2027");
    }

    #[test]
    fn test_vpa_shape() {
        assert_eq!(validate_vpa("user@bank").unwrap(), "user@bank");
        assert!(validate_vpa("first.last-1@ok.axis").is_ok());
        assert!(validate_vpa("userbank").is_err());
        assert!(validate_vpa("@bank").is_err());
        assert!(validate_vpa("a@b@c").is_err());
        assert!(validate_vpa("user@").is_err());
    }

    #[test]
    fn test_input_builds_method_specific_request() {
        let request = PaymentInput::upi("user@bank").into_request("o1").unwrap();
        assert_eq!(request.method, PaymentMethod::Upi);
        assert!(request.card.is_none());

        let request = PaymentInput::Card(valid_card()).into_request("o1").unwrap();
        assert_eq!(request.method, PaymentMethod::Card);
        assert!(request.vpa.is_none());
    }
}
