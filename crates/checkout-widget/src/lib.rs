//! Checkout Widget
//!
//! Runs in the merchant's page. Opens the embedded checkout surface for
//! one order and turns the surface's messages into merchant callbacks.
//!
//! ```text
//! merchant page                      embedded surface
//! ┌─────────────────┐  message   ┌──────────────────────┐
//! │ Widget          │◀───────────│ CrossContextMessenger │
//! │  on_success     │            │ PaymentFlow           │
//! │  on_failure     │            └──────────────────────┘
//! │  on_close       │
//! └─────────────────┘
//! ```

pub mod controller;
pub mod host;
pub mod options;

#[cfg(feature = "browser")]
pub mod browser;

pub use controller::Widget;
pub use host::{
    DismissTarget, EventSink, HostDocument, HostEvent, ListenerId, MemoryDocument, MemoryParent,
    SurfaceId,
};
pub use options::{
    CloseCallback, OutcomeCallback, WidgetOptions, WidgetOptionsBuilder, DEFAULT_BASE_URL,
};

#[cfg(feature = "browser")]
pub use browser::{open_in_browser, BrowserDocument, BrowserParent};
