//! Error Types
//!
//! One enum covers the whole protocol. The variants follow the lifecycle of a
//! checkout: construction failures are fatal, everything after that is
//! captured by the state machine and rendered as a terminal state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::FieldErrors;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout error types
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// A required widget option was missing or unusable
    #[error("Construction error: {0}")]
    Construction(String),

    /// Client-side field checks failed; the flow stays in `Input`
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// The order does not exist on the Checkout Service
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The Checkout Service rejected the request (its own validation)
    #[error("Request rejected [{code}]: {description}")]
    Rejected { code: String, description: String },

    /// Network or service failure on order fetch or payment creation
    #[error("Transport error: {0}")]
    Transport(String),

    /// A status check failed during polling; retried on the next tick
    #[error("Status check failed: {0}")]
    PollingTransient(String),

    /// A configured polling bound was reached without a terminal status
    #[error("Status polling gave up after {attempts} attempts")]
    PollingExhausted { attempts: u32 },

    /// Malformed, unrecognized or untrusted cross-context message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation not allowed in the current flow state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CheckoutError {
    /// Check if the user can reasonably retry after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::Transport(_)
                | CheckoutError::PollingTransient(_)
                | CheckoutError::PollingExhausted { .. }
        )
    }

    /// Machine-readable code used in the `payment_failed` payload
    pub fn code(&self) -> &str {
        match self {
            CheckoutError::Construction(_) => "CONSTRUCTION_ERROR",
            CheckoutError::Validation(_) => "VALIDATION_ERROR",
            CheckoutError::OrderNotFound(_) => "NOT_FOUND_ERROR",
            CheckoutError::Rejected { code, .. } => code,
            CheckoutError::Transport(_) => "TRANSPORT_ERROR",
            CheckoutError::PollingTransient(_) => "POLLING_ERROR",
            CheckoutError::PollingExhausted { .. } => "POLLING_TIMEOUT",
            CheckoutError::Protocol(_) => "PROTOCOL_ERROR",
            CheckoutError::InvalidState(_) => "INVALID_STATE",
            CheckoutError::Config(_) => "CONFIG_ERROR",
            CheckoutError::Json(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Validation(_) => "Please correct the highlighted fields.".into(),
            CheckoutError::OrderNotFound(_) => "This order could not be found.".into(),
            CheckoutError::Rejected { description, .. } => description.clone(),
            CheckoutError::Transport(_) => {
                "We could not reach the payment service. Please try again.".into()
            }
            CheckoutError::PollingExhausted { .. } => {
                "We could not confirm your payment in time. Please check again later.".into()
            }
            _ => "Something went wrong. Please try again.".into(),
        }
    }

    /// Build the payload reported to the hosting page on failure
    pub fn to_failure(&self, payment_id: Option<&str>) -> FailurePayload {
        FailurePayload {
            code: self.code().to_string(),
            description: self.user_message(),
            payment_id: payment_id.map(str::to_string),
        }
    }
}

impl From<anyhow::Error> for CheckoutError {
    fn from(err: anyhow::Error) -> Self {
        CheckoutError::Transport(err.to_string())
    }
}

/// Data carried by a `payment_failed` message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePayload {
    pub code: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

/// Error body returned by the Checkout Service: `{"error": {"code", "description"}}`
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceErrorBody {
    pub error: ServiceErrorDetail,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServiceErrorDetail {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

impl From<ServiceErrorBody> for CheckoutError {
    fn from(body: ServiceErrorBody) -> Self {
        CheckoutError::Rejected {
            code: body.error.code,
            description: body.error.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_payload_from_transport_error() {
        let err = CheckoutError::Transport("connection refused".into());
        let payload = err.to_failure(None);
        assert_eq!(payload.code, "TRANSPORT_ERROR");
        assert!(payload.payment_id.is_none());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_service_error_body_maps_to_rejected() {
        let body: ServiceErrorBody = serde_json::from_str(
            r#"{"error":{"code":"INVALID_VPA","description":"VPA format invalid"}}"#,
        )
        .unwrap();
        let err = CheckoutError::from(body);
        assert_eq!(err.code(), "INVALID_VPA");
        assert_eq!(err.user_message(), "VPA format invalid");
        assert!(!err.is_retryable());
    }
}
