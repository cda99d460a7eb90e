//! Checkout Flow
//!
//! Everything that runs inside the embedded checkout surface:
//!
//! - [`PaymentFlow`]: the payment state machine (`Input` → `Processing` →
//!   `Success | Failed`)
//! - [`StatusPoller`]: fixed-interval status observation for one payment
//! - [`CrossContextMessenger`]: outcome reporting to the parent context
//! - [`present`]: pure mapping from flow state to what is shown

pub mod machine;
pub mod messenger;
pub mod poller;
pub mod view;

pub use machine::{FlowSnapshot, FlowState, PaymentFlow, PaymentFlowBuilder};
pub use messenger::{CrossContextMessenger, MessengerConfig, RecordingChannel};
pub use poller::{
    PollerConfig, PollingObserver, StatusObserver, StatusPoller, DEFAULT_POLL_INTERVAL,
    MIN_POLL_INTERVAL,
};
pub use view::{present, Action, Layout, Presentation, Screen};
