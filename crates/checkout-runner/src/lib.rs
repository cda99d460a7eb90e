//! Checkout Runner
//!
//! Plays both sides of the embedded checkout in one process: a merchant
//! page hosting the widget, and the embedded surface running the payment
//! flow. The two sides only talk through the in-memory document's message
//! channel, the same way they would across an iframe boundary.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

use checkout_client::{CheckoutService, HttpCheckoutService, HttpServiceConfig};
use checkout_core::{
    CheckoutError, PaymentInput, Result, SessionStore, SurfaceAddress, TargetOrigin,
};
use checkout_flow::{
    present, CrossContextMessenger, FlowState, MessengerConfig, PaymentFlow, PollerConfig,
    Presentation,
};
use checkout_widget::{MemoryDocument, Widget, WidgetOptions};

/// Inputs for one run
#[derive(Debug)]
pub struct RunSettings {
    pub order_id: String,
    pub key: String,
    pub base_url: String,
    /// Origin of the simulated merchant page
    pub merchant_origin: String,
    pub poller: PollerConfig,
    pub input: PaymentInput,
}

/// What the merchant page observed
#[derive(Debug, Default)]
struct Observed {
    success: Option<Value>,
    failure: Option<Value>,
    closes: u32,
}

/// Result of a run, printed by the binary
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub state: FlowState,
    pub payment_id: Option<String>,
    pub presentation: Presentation,
    pub on_success: Option<Value>,
    pub on_failure: Option<Value>,
    pub closes: u32,
}

/// HTTP service using the credentials of the current merchant session, if any
pub fn http_service(config: HttpServiceConfig, sessions: &dyn SessionStore) -> Result<HttpCheckoutService> {
    let service = HttpCheckoutService::new(config)?;
    match sessions.current()? {
        Some(session) => {
            tracing::info!(session = %session.id, "Using merchant session credentials");
            Ok(service.with_credentials(session.credentials))
        }
        None => Ok(service),
    }
}

/// Open the widget, pay, and wait for the widget to close
///
/// Only validation errors and wiring failures are returned as `Err`.
/// Payment failures end up in the report.
pub async fn run_checkout(service: Arc<dyn CheckoutService>, settings: RunSettings) -> Result<RunReport> {
    let observed = Arc::new(Mutex::new(Observed::default()));
    let options = {
        let (s, f, c) = (observed.clone(), observed.clone(), observed.clone());
        WidgetOptions::builder()
            .key(settings.key)
            .order_id(settings.order_id)
            .base_url(settings.base_url)
            .on_success(move |data| {
                s.lock().unwrap_or_else(PoisonError::into_inner).success = Some(data.clone());
            })
            .on_failure(move |data| {
                f.lock().unwrap_or_else(PoisonError::into_inner).failure = Some(data.clone());
            })
            .on_close(move || {
                c.lock().unwrap_or_else(PoisonError::into_inner).closes += 1;
            })
            .build()?
    };

    // Merchant page
    let host = MemoryDocument::new(settings.merchant_origin);
    let mut widget = Widget::new(options, host.clone());
    widget.open()?;

    // Embedded surface, bootstrapped from the address it was loaded with
    let src = host
        .surface_url()
        .ok_or_else(|| CheckoutError::InvalidState("surface not mounted".into()))?;
    let address = SurfaceAddress::parse(src.as_str())?;
    let messenger = CrossContextMessenger::new(
        Arc::new(host.parent_channel(address.origin())),
        MessengerConfig {
            target_origin: TargetOrigin::exact(host.origin())?,
        },
    );
    let flow = PaymentFlow::builder(service)
        .poller(settings.poller)
        .messenger(messenger)
        .build();

    if flow.load_order(&address.order_id).await.is_ok() {
        if let Err(err) = flow.submit(settings.input).await {
            flow.teardown();
            widget.close();
            return Err(err);
        }
    }

    let mut states = flow.subscribe();
    let state = *states
        .wait_for(FlowState::is_terminal)
        .await
        .map_err(|_| CheckoutError::InvalidState("payment flow went away".into()))?;

    // A failed surface stays up for a retry; the runner does not retry.
    if state == FlowState::Failed {
        flow.dismiss()?;
    }
    widget.run_until_closed().await;
    flow.teardown();

    let snapshot = flow.snapshot();
    let observed = std::mem::take(&mut *observed.lock().unwrap_or_else(PoisonError::into_inner));
    Ok(RunReport {
        state: snapshot.state,
        payment_id: snapshot.payment.as_ref().map(|p| p.id.clone()),
        presentation: present(&snapshot),
        on_success: observed.success,
        on_failure: observed.failure,
        closes: observed.closes,
    })
}
