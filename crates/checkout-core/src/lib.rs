//! # checkout-core
//!
//! Shared vocabulary of the embedded checkout protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐   CrossContextMessage   ┌──────────────────────────┐
//! │   Hosting page       │ ◀────────────────────── │   Embedded surface       │
//! │   (checkout-widget)  │                         │   (checkout-flow)        │
//! │                      │ ── SurfaceAddress ────▶ │                          │
//! └──────────────────────┘                         └────────────┬─────────────┘
//!                                                               │ CheckoutService
//!                                                               ▼
//!                                                   (checkout-client)
//! ```
//!
//! The two contexts share no memory. Everything they agree on lives here:
//! the order and payment shapes, the message envelope, the surface address,
//! origin checks and form validation.

pub mod address;
pub mod channel;
pub mod error;
pub mod message;
pub mod order;
pub mod payment;
pub mod session;
pub mod validation;

pub use address::SurfaceAddress;
pub use channel::{InboundMessage, OriginPolicy, ParentChannel, TargetOrigin};
pub use error::{CheckoutError, FailurePayload, Result};
pub use message::CrossContextMessage;
pub use order::Order;
pub use payment::{CardDetails, CardNetwork, PaymentMethod, PaymentRecord, PaymentRequest, PaymentStatus};
pub use session::{MemorySessionStore, MerchantCredentials, MerchantSession, SessionId, SessionStore};
pub use validation::{CardForm, Field, FieldErrors, PaymentInput};
