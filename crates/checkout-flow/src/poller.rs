//! Status Poller
//!
//! Observes a payment's server-side status until it is terminal. The
//! baseline observer re-requests the status on a fixed interval; the
//! `StatusObserver` trait lets a push-based transport replace it without
//! touching the state machine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use checkout_client::CheckoutService;
use checkout_core::{CheckoutError, PaymentRecord, Result};

/// Fixed interval between status requests
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Shortest interval the observer will tick at
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polling configuration
///
/// Both bounds default to `None`, meaning the poller waits for a terminal
/// status for as long as its owner lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub max_duration: Option<Duration>,

    /// Issue the first request right away instead of after one interval
    pub poll_immediately: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            max_duration: None,
            poll_immediately: false,
        }
    }
}

impl PollerConfig {
    pub fn from_env() -> Self {
        let env_u64 = |name: &str| std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok());

        Self {
            interval: env_u64("CHECKOUT_POLL_INTERVAL_MS")
                .filter(|ms| *ms > 0)
                .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis),
            max_attempts: env_u64("CHECKOUT_POLL_MAX_ATTEMPTS").and_then(|n| u32::try_from(n).ok()),
            max_duration: env_u64("CHECKOUT_POLL_MAX_SECS").map(Duration::from_secs),
            poll_immediately: false,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }
}

/// Waits for a payment to reach a terminal status
#[async_trait]
pub trait StatusObserver: Send + Sync {
    /// Resolve with the first terminal record observed.
    ///
    /// Transient failures are absorbed by the observer. An error means the
    /// observer gave up (`PollingExhausted`).
    async fn wait_terminal(&self, payment_id: &str) -> Result<PaymentRecord>;
}

/// Fixed-interval polling against the Checkout Service
pub struct PollingObserver {
    service: Arc<dyn CheckoutService>,
    config: PollerConfig,
}

impl PollingObserver {
    /// Intervals below `MIN_POLL_INTERVAL` are raised to it.
    pub fn new(service: Arc<dyn CheckoutService>, mut config: PollerConfig) -> Self {
        if config.interval < MIN_POLL_INTERVAL {
            tracing::warn!(interval = ?config.interval, min = ?MIN_POLL_INTERVAL, "Poll interval too short, clamping");
            config.interval = MIN_POLL_INTERVAL;
        }
        Self { service, config }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }
}

#[async_trait]
impl StatusObserver for PollingObserver {
    async fn wait_terminal(&self, payment_id: &str) -> Result<PaymentRecord> {
        let started = Instant::now();
        let first_tick = if self.config.poll_immediately {
            started
        } else {
            started + self.config.interval
        };

        let mut ticker = tokio::time::interval_at(first_tick, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts: u32 = 0;
        loop {
            if self.config.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(CheckoutError::PollingExhausted { attempts });
            }

            ticker.tick().await;

            if self
                .config
                .max_duration
                .is_some_and(|max| started.elapsed() > max)
            {
                return Err(CheckoutError::PollingExhausted { attempts });
            }

            attempts += 1;
            match self.service.get_payment_status(payment_id).await {
                Ok(record) if record.is_terminal() => {
                    tracing::info!(
                        payment_id = %payment_id,
                        status = %record.status,
                        attempt = attempts,
                        "Payment reached terminal status"
                    );
                    return Ok(record);
                }
                Ok(record) => {
                    tracing::debug!(payment_id = %payment_id, status = %record.status, attempt = attempts, "Payment still pending");
                }
                Err(e) => {
                    let err = CheckoutError::PollingTransient(e.to_string());
                    tracing::warn!(payment_id = %payment_id, attempt = attempts, error = %err, "Status check failed, retrying next tick");
                }
            }
        }
    }
}

/// Handle to a running observation
///
/// Dropping the handle cancels the observation, so an owner that goes away
/// never leaves a timer running.
pub struct StatusPoller {
    payment_id: String,
    task: JoinHandle<()>,
}

impl StatusPoller {
    /// Start observing `payment_id`; `on_settled` runs once with the outcome
    /// unless the poller is stopped first.
    pub fn spawn<F>(observer: Arc<dyn StatusObserver>, payment_id: impl Into<String>, on_settled: F) -> Self
    where
        F: FnOnce(Result<PaymentRecord>) + Send + 'static,
    {
        let payment_id = payment_id.into();
        let id = payment_id.clone();
        let task = tokio::spawn(async move {
            let outcome = observer.wait_terminal(&id).await;
            on_settled(outcome);
        });

        tracing::debug!(payment_id = %payment_id, "Status poller started");
        Self { payment_id, task }
    }

    pub fn payment_id(&self) -> &str {
        &self.payment_id
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancel the observation. Consumes the handle, so it cannot run twice.
    pub fn stop(self) {
        tracing::debug!(payment_id = %self.payment_id, "Status poller stopped");
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
