//! Widget Options
//!
//! Merchant-supplied configuration. `key` and `order_id` are checked when
//! the options are built, never later at open time.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use checkout_core::{CheckoutError, OriginPolicy, Result, SurfaceAddress};

/// Checkout origin used when none is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Callback receiving the `data` of an outcome message
pub type OutcomeCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Callback run after the surface is closed
pub type CloseCallback = Arc<dyn Fn() + Send + Sync>;

/// Immutable widget configuration
#[derive(Clone)]
pub struct WidgetOptions {
    key: String,
    order_id: String,
    address: SurfaceAddress,
    origin_policy: OriginPolicy,
    on_success: OutcomeCallback,
    on_failure: OutcomeCallback,
    on_close: CloseCallback,
}

impl WidgetOptions {
    pub fn builder() -> WidgetOptionsBuilder {
        WidgetOptionsBuilder::default()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn base_url(&self) -> &str {
        self.address.base_url.as_str()
    }

    /// Address the surface is loaded from, always with `embedded=true`
    pub fn address(&self) -> &SurfaceAddress {
        &self.address
    }

    pub fn origin_policy(&self) -> &OriginPolicy {
        &self.origin_policy
    }

    pub(crate) fn success(&self, data: &Value) {
        (self.on_success)(data);
    }

    pub(crate) fn failure(&self, data: &Value) {
        (self.on_failure)(data);
    }

    pub(crate) fn closed(&self) {
        (self.on_close)();
    }
}

impl fmt::Debug for WidgetOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetOptions")
            .field("key", &self.key)
            .field("order_id", &self.order_id)
            .field("base_url", &self.base_url())
            .field("origin_policy", &self.origin_policy)
            .finish_non_exhaustive()
    }
}

/// Builder for `WidgetOptions`
#[derive(Default)]
pub struct WidgetOptionsBuilder {
    key: Option<String>,
    order_id: Option<String>,
    base_url: Option<String>,
    origin_policy: Option<OriginPolicy>,
    on_success: Option<OutcomeCallback>,
    on_failure: Option<OutcomeCallback>,
    on_close: Option<CloseCallback>,
}

impl WidgetOptionsBuilder {
    /// Builder with `base_url` from `CHECKOUT_BASE_URL`
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("CHECKOUT_BASE_URL").ok(),
            ..Self::default()
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Origins accepted on inbound messages. Defaults to the origin of
    /// `base_url`.
    pub fn origin_policy(mut self, policy: OriginPolicy) -> Self {
        self.origin_policy = Some(policy);
        self
    }

    pub fn on_success(mut self, callback: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_failure(mut self, callback: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    pub fn on_close(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Result<WidgetOptions> {
        let key = required(self.key, "key")?;
        let order_id = required(self.order_id, "orderId")?;
        let base_url = self
            .base_url
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let address = SurfaceAddress::new(base_url.trim(), order_id.clone(), key.clone())?;
        let origin_policy = match self.origin_policy {
            Some(policy) => policy,
            None => OriginPolicy::only(&address.origin())
                .map_err(|e| CheckoutError::Construction(e.to_string()))?,
        };

        Ok(WidgetOptions {
            key,
            order_id,
            address,
            origin_policy,
            on_success: self.on_success.unwrap_or_else(|| Arc::new(|_: &Value| {})),
            on_failure: self.on_failure.unwrap_or_else(|| Arc::new(|_: &Value| {})),
            on_close: self.on_close.unwrap_or_else(|| Arc::new(|| {})),
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CheckoutError::Construction(format!("{name} is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_fails_fast() {
        let err = WidgetOptions::builder().order_id("o1").build().unwrap_err();
        assert!(matches!(err, CheckoutError::Construction(ref m) if m == "key is required"));

        let err = WidgetOptions::builder().key("k").order_id("  ").build().unwrap_err();
        assert!(matches!(err, CheckoutError::Construction(ref m) if m == "orderId is required"));
    }

    #[test]
    fn test_defaults() {
        let options = WidgetOptions::builder().key("key_test").order_id("o1").build().unwrap();
        assert_eq!(options.base_url(), "http://localhost:3001/");
        assert!(options.origin_policy().permits("http://localhost:3001"));
        assert!(!options.origin_policy().permits("https://evil.example.com"));
        assert_eq!(
            options.address().to_string(),
            "http://localhost:3001/checkout?order_id=o1&embedded=true&key=key_test"
        );

        // no-op callbacks
        options.success(&Value::Null);
        options.failure(&Value::Null);
        options.closed();
    }

    #[test]
    fn test_invalid_base_url_is_construction_error() {
        let err = WidgetOptions::builder()
            .key("k")
            .order_id("o1")
            .base_url("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Construction(_)));
    }
}
