//! HTTP Checkout Service
//!
//! reqwest implementation of `CheckoutService` against the public endpoints
//! under `/api/v1`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use checkout_core::error::ServiceErrorBody;
use checkout_core::{
    CheckoutError, MerchantCredentials, Order, PaymentRecord, PaymentRequest, Result,
};

use crate::service::CheckoutService;

/// HTTP client configuration
#[derive(Clone, Debug)]
pub struct HttpServiceConfig {
    /// Base of the public API, e.g. `http://localhost:8000/api/v1`
    pub api_base: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpServiceConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000/api/v1".into(),
            timeout_secs: 30,
        }
    }
}

impl HttpServiceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_base = std::env::var("CHECKOUT_API_URL").unwrap_or(defaults.api_base);
        let timeout_secs = std::env::var("CHECKOUT_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        Self {
            api_base,
            timeout_secs,
        }
    }
}

/// Checkout Service over HTTP
pub struct HttpCheckoutService {
    client: reqwest::Client,
    base: Url,
    credentials: Option<MerchantCredentials>,
}

impl HttpCheckoutService {
    pub fn new(config: HttpServiceConfig) -> Result<Self> {
        let base = Url::parse(&config.api_base)
            .map_err(|e| CheckoutError::Config(format!("invalid CHECKOUT_API_URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(CheckoutError::Config(format!(
                "CHECKOUT_API_URL {} cannot be a base",
                config.api_base
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CheckoutError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            credentials: None,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(HttpServiceConfig::from_env())
    }

    /// Send merchant API credentials with every request
    pub fn with_credentials(mut self, credentials: MerchantCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `new` rejects cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some(creds) => builder
                .header("X-Api-Key", &creds.api_key)
                .header("X-Api-Secret", &creds.api_secret),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Response> {
        builder
            .send()
            .await
            .map_err(|e| CheckoutError::Transport(e.to_string()))
    }
}

async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| CheckoutError::Transport(format!("invalid {what} body: {e}")))
}

/// Map a non-success response to the error taxonomy
async fn rejection(response: Response) -> CheckoutError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.is_client_error() {
        match serde_json::from_str::<ServiceErrorBody>(&body) {
            Ok(parsed) => parsed.into(),
            Err(_) => CheckoutError::Rejected {
                code: format!("HTTP_{}", status.as_u16()),
                description: status.canonical_reason().unwrap_or("Request failed").into(),
            },
        }
    } else {
        CheckoutError::Transport(format!("service returned {status}"))
    }
}

#[async_trait]
impl CheckoutService for HttpCheckoutService {
    async fn get_order(&self, order_id: &str) -> Result<Order> {
        let url = self.endpoint(&["orders", "public", order_id]);
        let response = self.send(self.request(reqwest::Method::GET, url)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(CheckoutError::OrderNotFound(order_id.to_string())),
            s if s.is_success() => decode(response, "order").await,
            _ => match rejection(response).await {
                CheckoutError::Rejected { description, .. } => Err(CheckoutError::Transport(description)),
                other => Err(other),
            },
        }
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentRecord> {
        let url = self.endpoint(&["payments", "public"]);
        tracing::debug!(order_id = %request.order_id, method = %request.method, "Creating payment");

        let response = self
            .send(self.request(reqwest::Method::POST, url).json(request))
            .await?;

        if response.status().is_success() {
            decode(response, "payment").await
        } else {
            Err(rejection(response).await)
        }
    }

    async fn get_payment_status(&self, payment_id: &str) -> Result<PaymentRecord> {
        let url = self.endpoint(&["payments", "public", payment_id]);
        let response = self.send(self.request(reqwest::Method::GET, url)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(PaymentRecord::pending(payment_id)),
            s if s.is_success() => decode(response, "payment").await,
            s => Err(CheckoutError::Transport(format!("status check returned {s}"))),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let service = HttpCheckoutService::new(HttpServiceConfig {
            api_base: "http://localhost:8000/api/v1/".into(),
            timeout_secs: 5,
        })
        .unwrap();
        let url = service.endpoint(&["payments", "public", "pay 1/x"]);
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/payments/public/pay%201%2Fx");
    }

    #[test]
    fn test_rejects_unusable_base() {
        let config = HttpServiceConfig {
            api_base: "mailto:ops@example.com".into(),
            ..Default::default()
        };
        assert!(matches!(
            HttpCheckoutService::new(config),
            Err(CheckoutError::Config(_))
        ));
    }
}
