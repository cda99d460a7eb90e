//! Cross-Context Messenger
//!
//! The only sanctioned way for the embedded surface to report outcomes to
//! its host. Messages go out through a `ParentChannel` addressed to a
//! configured target origin.

use std::sync::{Arc, Mutex, PoisonError};

use checkout_core::{
    CrossContextMessage, FailurePayload, ParentChannel, PaymentRecord, Result, TargetOrigin,
};

/// Messenger configuration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessengerConfig {
    pub target_origin: TargetOrigin,
}

impl MessengerConfig {
    /// Read `CHECKOUT_PARENT_ORIGIN`; unset means any origin
    pub fn from_env() -> Result<Self> {
        let target_origin = match std::env::var("CHECKOUT_PARENT_ORIGIN") {
            Ok(origin) if !origin.trim().is_empty() && origin.trim() != "*" => {
                TargetOrigin::exact(origin.trim())?
            }
            _ => TargetOrigin::Any,
        };
        Ok(Self { target_origin })
    }
}

/// Sends terminal outcomes and dismissals to the parent context
#[derive(Clone)]
pub struct CrossContextMessenger {
    channel: Arc<dyn ParentChannel>,
    target: TargetOrigin,
}

impl CrossContextMessenger {
    pub fn new(channel: Arc<dyn ParentChannel>, config: MessengerConfig) -> Self {
        if config.target_origin == TargetOrigin::Any {
            tracing::warn!("Parent origin not configured, outcome messages are readable by any origin");
        }
        Self {
            channel,
            target: config.target_origin,
        }
    }

    pub fn target(&self) -> &TargetOrigin {
        &self.target
    }

    /// `payment_success` with the payment record
    pub fn notify_success(&self, record: &PaymentRecord) -> Result<()> {
        self.send(&CrossContextMessage::payment_success(record)?)
    }

    /// `payment_failed` with the error payload
    pub fn notify_failure(&self, failure: &FailurePayload) -> Result<()> {
        self.send(&CrossContextMessage::payment_failed(failure)?)
    }

    /// `close_modal`, after an explicit dismissal inside the surface
    pub fn close_modal(&self) -> Result<()> {
        self.send(&CrossContextMessage::close_modal())
    }

    fn send(&self, message: &CrossContextMessage) -> Result<()> {
        tracing::info!(kind = message.kind(), target = %self.target, "Posting message to parent");
        self.channel.post(message, &self.target)
    }
}

/// Channel that records every post, for tests and dry runs
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(CrossContextMessage, TargetOrigin)>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(CrossContextMessage, TargetOrigin)> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent().iter().map(|(m, _)| m.kind()).collect()
    }
}

impl ParentChannel for RecordingChannel {
    fn post(&self, message: &CrossContextMessage, target: &TargetOrigin) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((message.clone(), target.clone()));
        Ok(())
    }
}
