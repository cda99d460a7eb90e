//! # checkout-client
//!
//! Thin request layer over the external Checkout Service.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_client::{CheckoutService, HttpCheckoutService};
//!
//! let service = HttpCheckoutService::from_env()?;
//! let order = service.get_order("order_abc").await?;
//! ```

mod http;
mod mock;
mod service;

pub use http::{HttpCheckoutService, HttpServiceConfig};
pub use mock::{MockCheckoutService, ScriptedError, ScriptedReply};
pub use service::CheckoutService;
