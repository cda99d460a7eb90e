//! Payment Types
//!
//! Request and record shapes exchanged with the Checkout Service.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Payment method selected by the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Upi,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side payment status as seen by the client
///
/// Only `Success` and `Failed` are terminal. Anything else the service
/// reports (`processing`, `created`, unknown values) reads as `Pending`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    /// Case-insensitive parse
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "success" => PaymentStatus::Success,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(PaymentStatus::Pending, PaymentStatus::parse))
    }
}

/// Card fields sent to the service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
    pub holder_name: String,
}

impl CardDetails {
    pub fn last4(&self) -> &str {
        let digits = self.number.trim();
        digits.get(digits.len().saturating_sub(4)..).unwrap_or(digits)
    }

    pub fn network(&self) -> CardNetwork {
        CardNetwork::detect(&self.number)
    }
}

// Never print the PAN or CVV, even at trace level.
impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &format_args!("****{}", self.last4()))
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cvv", &"***")
            .field("holder_name", &self.holder_name)
            .finish()
    }
}

/// Body of `POST /payments/public`
///
/// Exactly one of `card` / `vpa` is present, selected by `method`. Use the
/// constructors to keep that true.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: String,
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<CardDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpa: Option<String>,
}

impl PaymentRequest {
    pub fn card(order_id: impl Into<String>, card: CardDetails) -> Self {
        Self {
            order_id: order_id.into(),
            method: PaymentMethod::Card,
            card: Some(card),
            vpa: None,
        }
    }

    pub fn upi(order_id: impl Into<String>, vpa: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            method: PaymentMethod::Upi,
            card: None,
            vpa: Some(vpa.into()),
        }
    }
}

/// Payment as reported by the service
///
/// The client only reads `status` after creation. Field names are accepted in
/// snake_case or camelCase.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,

    #[serde(default)]
    pub status: PaymentStatus,

    #[serde(default)]
    pub amount: i64,

    #[serde(default)]
    pub currency: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<PaymentMethod>,

    #[serde(default, alias = "orderId", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpa: Option<String>,

    #[serde(default, alias = "cardNetwork", skip_serializing_if = "Option::is_none")]
    pub card_network: Option<String>,

    #[serde(default, alias = "cardLast4", skip_serializing_if = "Option::is_none")]
    pub card_last4: Option<String>,

    #[serde(default, alias = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default, alias = "errorDescription", skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl PaymentRecord {
    /// Placeholder for a payment the service has no record of yet
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Card network detected from the number prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardNetwork {
    Visa,
    Mastercard,
    Amex,
    Rupay,
    Unknown,
}

impl CardNetwork {
    pub fn detect(number: &str) -> Self {
        let digits: String = number.chars().filter(char::is_ascii_digit).collect();
        let prefix2 = digits.get(..2).and_then(|p| p.parse::<u8>().ok());

        if digits.starts_with('4') {
            return CardNetwork::Visa;
        }
        match prefix2 {
            Some(51..=55) => CardNetwork::Mastercard,
            Some(34 | 37) => CardNetwork::Amex,
            Some(60 | 65 | 81..=89) => CardNetwork::Rupay,
            _ => CardNetwork::Unknown,
        }
    }
}
