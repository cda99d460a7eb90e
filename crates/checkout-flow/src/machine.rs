//! Payment State Machine
//!
//! Drives one checkout attempt inside the embedded surface:
//!
//! ```text
//! Input ──submit──▶ Processing ──poll: success──▶ Success
//!                       │
//!                       ├──poll: failed──────────▶ Failed
//!                       └──create fails──────────▶ Failed
//! ```
//!
//! The machine is the sole owner of `FlowState` and of the poller handle.
//! Every terminal transition goes through `FlowShared::settle`, which is
//! also the only place a poller is stopped. Late or repeated outcomes are
//! dropped there, so transitions are idempotent.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use checkout_client::CheckoutService;
use checkout_core::{
    CheckoutError, FailurePayload, FieldErrors, Order, PaymentInput, PaymentMethod, PaymentRecord,
    PaymentStatus, Result,
};

use crate::messenger::CrossContextMessenger;
use crate::poller::{PollerConfig, PollingObserver, StatusObserver, StatusPoller};

/// State of the current checkout attempt
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowState {
    #[default]
    Input,
    Processing,
    Success,
    Failed,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Success | FlowState::Failed)
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowState::Input => "input",
            FlowState::Processing => "processing",
            FlowState::Success => "success",
            FlowState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Read-only view of the machine, for presentation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowSnapshot {
    pub state: FlowState,
    pub order: Option<Order>,
    pub method: Option<PaymentMethod>,
    pub payment: Option<PaymentRecord>,
    pub field_errors: FieldErrors,
    pub failure: Option<FailurePayload>,
    pub embedded: bool,
}

#[derive(Default)]
struct FlowCore {
    state: FlowState,
    order: Option<Order>,
    method: Option<PaymentMethod>,
    payment: Option<PaymentRecord>,
    field_errors: FieldErrors,
    failure: Option<FailurePayload>,
    attempt: u64,
    poller: Option<StatusPoller>,
    torn_down: bool,
}

/// Outcome handed to the messenger after a terminal transition
enum Notice {
    Success(PaymentRecord),
    Failure(FailurePayload),
}

struct FlowShared {
    service: Arc<dyn CheckoutService>,
    observer: Arc<dyn StatusObserver>,
    messenger: Option<CrossContextMessenger>,
    core: Mutex<FlowCore>,
    state_tx: watch::Sender<FlowState>,
}

impl FlowShared {
    fn lock(&self) -> MutexGuard<'_, FlowCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the outcome of attempt `attempt`. The single exit from
    /// `Processing`.
    fn settle(&self, attempt: u64, outcome: Result<PaymentRecord>) {
        let (state, notice) = {
            let mut core = self.lock();
            if core.torn_down || core.attempt != attempt || core.state != FlowState::Processing {
                tracing::debug!(attempt, state = %core.state, "Ignoring outcome for settled attempt");
                return;
            }
            if matches!(&outcome, Ok(record) if !record.is_terminal()) {
                return;
            }

            let poller = core.poller.take();
            let payment_id = core.payment.as_ref().map(|p| p.id.clone());

            let notice = match outcome {
                Ok(record) if record.status == PaymentStatus::Success => {
                    core.state = FlowState::Success;
                    core.payment = Some(record.clone());
                    Notice::Success(record)
                }
                Ok(record) => {
                    let failure = FailurePayload {
                        code: record
                            .error_code
                            .clone()
                            .unwrap_or_else(|| "PAYMENT_FAILED".into()),
                        description: record
                            .error_description
                            .clone()
                            .unwrap_or_else(|| "Payment failed".into()),
                        payment_id: Some(record.id.clone()),
                    };
                    core.state = FlowState::Failed;
                    core.payment = Some(record);
                    core.failure = Some(failure.clone());
                    Notice::Failure(failure)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Payment attempt failed");
                    let failure = err.to_failure(payment_id.as_deref());
                    core.state = FlowState::Failed;
                    core.failure = Some(failure.clone());
                    Notice::Failure(failure)
                }
            };

            if let Some(poller) = poller {
                poller.stop();
            }
            (core.state, notice)
        };

        tracing::info!(attempt, state = %state, "Payment attempt settled");
        self.publish(state);
        self.notify(notice);
    }

    fn publish(&self, state: FlowState) {
        self.state_tx.send_replace(state);
    }

    fn notify(&self, notice: Notice) {
        let Some(messenger) = &self.messenger else {
            return;
        };
        let sent = match &notice {
            Notice::Success(record) => messenger.notify_success(record),
            Notice::Failure(failure) => messenger.notify_failure(failure),
        };
        if let Err(e) = sent {
            tracing::warn!(error = %e, "Could not notify parent context");
        }
    }
}

impl Drop for FlowShared {
    fn drop(&mut self) {
        let core = self.core.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(poller) = core.poller.take() {
            poller.stop();
        }
    }
}

/// Builder for `PaymentFlow`
pub struct PaymentFlowBuilder {
    service: Arc<dyn CheckoutService>,
    observer: Option<Arc<dyn StatusObserver>>,
    poller: PollerConfig,
    messenger: Option<CrossContextMessenger>,
}

impl PaymentFlowBuilder {
    /// Polling configuration for the default observer
    pub fn poller(mut self, config: PollerConfig) -> Self {
        self.poller = config;
        self
    }

    /// Replace polling with another status transport
    pub fn observer(mut self, observer: Arc<dyn StatusObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run embedded: report outcomes to the parent context
    pub fn messenger(mut self, messenger: CrossContextMessenger) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn build(self) -> PaymentFlow {
        let observer = self
            .observer
            .unwrap_or_else(|| Arc::new(PollingObserver::new(self.service.clone(), self.poller)));
        let (state_tx, _) = watch::channel(FlowState::Input);

        PaymentFlow {
            shared: Arc::new(FlowShared {
                service: self.service,
                observer,
                messenger: self.messenger,
                core: Mutex::new(FlowCore::default()),
                state_tx,
            }),
        }
    }
}

/// One checkout attempt, from order display to terminal outcome
///
/// Dropping the flow stops any running poller.
pub struct PaymentFlow {
    shared: Arc<FlowShared>,
}

impl PaymentFlow {
    /// Standalone flow with the default 2 s polling
    pub fn new(service: Arc<dyn CheckoutService>) -> Self {
        Self::builder(service).build()
    }

    pub fn builder(service: Arc<dyn CheckoutService>) -> PaymentFlowBuilder {
        PaymentFlowBuilder {
            service,
            observer: None,
            poller: PollerConfig::default(),
            messenger: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.shared.lock().state
    }

    pub fn is_embedded(&self) -> bool {
        self.shared.messenger.is_some()
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        let core = self.shared.lock();
        FlowSnapshot {
            state: core.state,
            order: core.order.clone(),
            method: core.method,
            payment: core.payment.clone(),
            field_errors: core.field_errors.clone(),
            failure: core.failure.clone(),
            embedded: self.is_embedded(),
        }
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.shared.state_tx.subscribe()
    }

    pub fn has_active_poller(&self) -> bool {
        self.shared
            .lock()
            .poller
            .as_ref()
            .is_some_and(StatusPoller::is_active)
    }

    /// Fetch the order this surface was opened for
    ///
    /// A missing order or unreachable service moves the flow to `Failed`.
    pub async fn load_order(&self, order_id: &str) -> Result<Order> {
        match self.shared.service.get_order(order_id).await {
            Ok(order) => {
                tracing::info!(order_id = %order.id, amount = order.amount, currency = %order.currency, "Order loaded");
                self.shared.lock().order = Some(order.clone());
                Ok(order)
            }
            Err(err) => {
                tracing::warn!(order_id = %order_id, error = %err, "Order load failed");
                let failure = err.to_failure(None);
                {
                    let mut core = self.shared.lock();
                    if core.torn_down || core.state != FlowState::Input {
                        return Err(err);
                    }
                    core.state = FlowState::Failed;
                    core.failure = Some(failure.clone());
                }
                self.shared.publish(FlowState::Failed);
                self.shared.notify(Notice::Failure(failure));
                Err(err)
            }
        }
    }

    /// Submit the selected method and form payload
    ///
    /// Validation failures and calls in the wrong state return `Err` and
    /// leave the state untouched. Everything after that is captured: the
    /// returned state is `Processing` while polling, or terminal.
    pub async fn submit(&self, input: PaymentInput) -> Result<FlowState> {
        let (request, attempt) = {
            let mut core = self.shared.lock();
            if core.torn_down {
                return Err(CheckoutError::InvalidState("flow has been torn down".into()));
            }
            if core.state != FlowState::Input {
                return Err(CheckoutError::InvalidState(format!(
                    "cannot submit while {}",
                    core.state
                )));
            }
            let order_id = core
                .order
                .as_ref()
                .map(|o| o.id.clone())
                .ok_or_else(|| CheckoutError::InvalidState("order not loaded".into()))?;

            let request = match input.into_request(&order_id) {
                Ok(request) => request,
                Err(errors) => {
                    tracing::debug!(errors = %errors, "Payment form rejected");
                    core.field_errors = errors.clone();
                    return Err(CheckoutError::Validation(errors));
                }
            };

            core.field_errors = FieldErrors::new();
            core.failure = None;
            core.payment = None;
            core.method = Some(request.method);
            core.state = FlowState::Processing;
            core.attempt += 1;
            (request, core.attempt)
        };

        self.shared.publish(FlowState::Processing);
        tracing::info!(order_id = %request.order_id, method = %request.method, attempt, "Submitting payment");

        let record = match self.shared.service.create_payment(&request).await {
            Ok(record) => record,
            Err(err) => {
                self.shared.settle(attempt, Err(err));
                return Ok(self.state());
            }
        };

        {
            let mut core = self.shared.lock();
            if core.torn_down || core.attempt != attempt || core.state != FlowState::Processing {
                return Ok(core.state);
            }
            core.payment = Some(record.clone());

            if !record.is_terminal() {
                let weak: Weak<FlowShared> = Arc::downgrade(&self.shared);
                core.poller = Some(StatusPoller::spawn(
                    self.shared.observer.clone(),
                    record.id.clone(),
                    move |outcome| {
                        if let Some(shared) = weak.upgrade() {
                            shared.settle(attempt, outcome);
                        }
                    },
                ));
                tracing::info!(payment_id = %record.id, "Payment created, polling for status");
                return Ok(FlowState::Processing);
            }
        }

        // The service may answer with a terminal status straight away.
        self.shared.settle(attempt, Ok(record));
        Ok(self.state())
    }

    /// Go back to `Input` after a failure so the user can try again
    pub fn retry(&self) -> Result<()> {
        {
            let mut core = self.shared.lock();
            if core.state != FlowState::Failed || core.torn_down {
                return Err(CheckoutError::InvalidState(format!(
                    "cannot retry while {}",
                    core.state
                )));
            }
            core.state = FlowState::Input;
            core.failure = None;
            core.payment = None;
            core.field_errors = FieldErrors::new();
        }
        self.shared.publish(FlowState::Input);
        Ok(())
    }

    /// Explicit "Done" inside the surface; asks the host to close it
    pub fn dismiss(&self) -> Result<()> {
        match &self.shared.messenger {
            Some(messenger) => messenger.close_modal(),
            None => Ok(()),
        }
    }

    /// Stop everything this flow owns. Safe to call more than once.
    pub fn teardown(&self) {
        let poller = {
            let mut core = self.shared.lock();
            if core.torn_down {
                return;
            }
            core.torn_down = true;
            core.poller.take()
        };
        if let Some(poller) = poller {
            poller.stop();
        }
        tracing::debug!("Payment flow torn down");
    }
}
