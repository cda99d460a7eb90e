//! Surface Address and Origins
//!
//! The embedded surface is loaded from
//! `{baseUrl}/checkout?order_id={id}&embedded={true|false}&key={merchantKey}`.
//! `embedded=true` only changes presentation and enables messages to the
//! parent; it does not change payment semantics.

use std::fmt;

use url::Url;

use crate::error::{CheckoutError, Result};

/// Address of the embedded checkout surface
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceAddress {
    pub base_url: Url,
    pub order_id: String,
    pub key: String,
    pub embedded: bool,
}

impl SurfaceAddress {
    pub fn new(base_url: &str, order_id: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            order_id: order_id.into(),
            key: key.into(),
            embedded: true,
        })
    }

    pub fn with_embedded(mut self, embedded: bool) -> Self {
        self.embedded = embedded;
        self
    }

    /// Full address of the checkout page
    pub fn to_url(&self) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}/checkout", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.query_pairs_mut()
            .clear()
            .append_pair("order_id", &self.order_id)
            .append_pair("embedded", if self.embedded { "true" } else { "false" })
            .append_pair("key", &self.key);
        url
    }

    /// Origin the surface's messages will come from
    pub fn origin(&self) -> String {
        self.base_url.origin().ascii_serialization()
    }

    /// Recover the address from the URL the surface was loaded with
    pub fn parse(address: &str) -> Result<Self> {
        let url = Url::parse(address)
            .map_err(|e| CheckoutError::Protocol(format!("invalid surface address: {e}")))?;

        let mut order_id = None;
        let mut key = None;
        let mut embedded = false;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "order_id" => order_id = Some(value.into_owned()),
                "key" => key = Some(value.into_owned()),
                "embedded" => embedded = value == "true",
                _ => {}
            }
        }

        let order_id = order_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CheckoutError::Protocol("surface address has no order_id".into()))?;

        let mut base_url = url.clone();
        base_url.set_query(None);
        let path = base_url.path().trim_end_matches('/');
        let base_path = path.strip_suffix("/checkout").unwrap_or(path).to_string();
        base_url.set_path(&base_path);

        Ok(Self {
            base_url,
            order_id,
            key: key.unwrap_or_default(),
            embedded,
        })
    }
}

impl fmt::Display for SurfaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_url())
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url)
        .map_err(|e| CheckoutError::Construction(format!("invalid baseUrl {base_url:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(CheckoutError::Construction(format!(
            "baseUrl {base_url:?} cannot be a base"
        )));
    }
    Ok(url)
}

/// Normalize anything URL-shaped to its `scheme://host[:port]` origin
pub fn normalize_origin(value: &str) -> Result<String> {
    let url = Url::parse(value)
        .map_err(|e| CheckoutError::Config(format!("invalid origin {value:?}: {e}")))?;
    Ok(url.origin().ascii_serialization())
}
