//! Mock Checkout Service
//!
//! For tests and demos. Orders are registered up front; payment creation and
//! status checks play back scripted replies and count every call.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use checkout_core::{
    CheckoutError, Order, PaymentRecord, PaymentRequest, PaymentStatus, Result,
};

use crate::service::CheckoutService;

/// Scripted failure, converted to a `CheckoutError` when replayed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptedError {
    Transport(String),
    Rejected { code: String, description: String },
}

impl From<ScriptedError> for CheckoutError {
    fn from(err: ScriptedError) -> Self {
        match err {
            ScriptedError::Transport(msg) => CheckoutError::Transport(msg),
            ScriptedError::Rejected { code, description } => {
                CheckoutError::Rejected { code, description }
            }
        }
    }
}

/// Scripted reply to a create or status call
pub type ScriptedReply = std::result::Result<PaymentRecord, ScriptedError>;

#[derive(Default)]
struct MockState {
    orders: HashMap<String, Order>,
    create_replies: VecDeque<ScriptedReply>,
    status_replies: HashMap<String, VecDeque<ScriptedReply>>,
    last_status: HashMap<String, PaymentRecord>,
    requests: Vec<PaymentRequest>,
    order_calls: u32,
    status_calls: HashMap<String, u32>,
    next_id: u32,
}

/// Mock Checkout Service with scripted replies
#[derive(Default)]
pub struct MockCheckoutService {
    state: Mutex<MockState>,
    latency: Option<Duration>,
}

impl MockCheckoutService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply (runs on tokio time, so paused clocks apply)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_order(self, order: Order) -> Self {
        self.lock().orders.insert(order.id.clone(), order);
        self
    }

    /// Queue the reply to the next `create_payment`
    pub fn on_create(&self, reply: ScriptedReply) -> &Self {
        self.lock().create_replies.push_back(reply);
        self
    }

    /// Queue status replies for a payment, in order. The last record
    /// keeps being returned once the script runs out.
    pub fn script_status<I>(&self, payment_id: &str, replies: I) -> &Self
    where
        I: IntoIterator<Item = ScriptedReply>,
    {
        self.lock()
            .status_replies
            .entry(payment_id.to_string())
            .or_default()
            .extend(replies);
        self
    }

    /// Shorthand for scripting plain status transitions
    pub fn script_statuses<I>(&self, payment_id: &str, statuses: I) -> &Self
    where
        I: IntoIterator<Item = PaymentStatus>,
    {
        let id = payment_id.to_string();
        self.script_status(
            payment_id,
            statuses.into_iter().map(|status| {
                Ok(PaymentRecord {
                    status,
                    ..PaymentRecord::pending(id.clone())
                })
            }),
        )
    }

    pub fn create_calls(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn last_request(&self) -> Option<PaymentRequest> {
        self.lock().requests.last().cloned()
    }

    pub fn order_calls(&self) -> u32 {
        self.lock().order_calls
    }

    pub fn status_calls(&self, payment_id: &str) -> u32 {
        self.lock().status_calls.get(payment_id).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl CheckoutService for MockCheckoutService {
    async fn get_order(&self, order_id: &str) -> Result<Order> {
        self.delay().await;
        let mut state = self.lock();
        state.order_calls += 1;
        state
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| CheckoutError::OrderNotFound(order_id.to_string()))
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentRecord> {
        self.delay().await;
        let mut state = self.lock();
        state.requests.push(request.clone());

        if let Some(reply) = state.create_replies.pop_front() {
            return reply.map_err(Into::into);
        }

        let order = state
            .orders
            .get(&request.order_id)
            .cloned()
            .ok_or_else(|| CheckoutError::Rejected {
                code: "NOT_FOUND_ERROR".into(),
                description: "Order not found".into(),
            })?;

        state.next_id += 1;
        Ok(PaymentRecord {
            amount: order.amount,
            currency: order.currency,
            method: Some(request.method),
            order_id: Some(order.id),
            ..PaymentRecord::pending(format!("pay_mock_{:04}", state.next_id))
        })
    }

    async fn get_payment_status(&self, payment_id: &str) -> Result<PaymentRecord> {
        self.delay().await;
        let mut state = self.lock();
        *state.status_calls.entry(payment_id.to_string()).or_default() += 1;

        let next = state
            .status_replies
            .get_mut(payment_id)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Ok(record)) => {
                state.last_status.insert(payment_id.to_string(), record.clone());
                Ok(record)
            }
            Some(Err(err)) => Err(err.into()),
            None => Ok(state
                .last_status
                .get(payment_id)
                .cloned()
                .unwrap_or_else(|| PaymentRecord::pending(payment_id))),
        }
    }

    fn name(&self) -> &str {
        "MockCheckoutService"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_order() {
        let service = MockCheckoutService::new();
        let err = service.get_order("missing").await.unwrap_err();
        assert!(matches!(err, CheckoutError::OrderNotFound(_)));
        assert_eq!(service.order_calls(), 1);
    }

    #[tokio::test]
    async fn test_default_create_uses_order_amount() {
        let service = MockCheckoutService::new().with_order(Order::new("o1", 50000, "INR"));
        let record = service
            .create_payment(&PaymentRequest::upi("o1", "user@bank"))
            .await
            .unwrap();
        assert_eq!(record.amount, 50000);
        assert_eq!(record.status, PaymentStatus::Pending);
        assert_eq!(service.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_status_script_repeats_last_record() {
        let service = MockCheckoutService::new();
        service.script_statuses("p1", [PaymentStatus::Pending, PaymentStatus::Success]);

        assert_eq!(service.get_payment_status("p1").await.unwrap().status, PaymentStatus::Pending);
        assert_eq!(service.get_payment_status("p1").await.unwrap().status, PaymentStatus::Success);
        assert_eq!(service.get_payment_status("p1").await.unwrap().status, PaymentStatus::Success);
        assert_eq!(service.status_calls("p1"), 3);
    }

    #[tokio::test]
    async fn test_unscripted_payment_reads_pending() {
        let service = MockCheckoutService::new();
        let record = service.get_payment_status("nobody").await.unwrap();
        assert_eq!(record.id, "nobody");
        assert_eq!(record.status, PaymentStatus::Pending);
    }
}
