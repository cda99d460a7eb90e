//! Widget Controller
//!
//! Owns one embedded checkout session from the hosting page's side:
//! mounts the surface, listens for its messages and calls the merchant
//! back. `open` and `close` are the only mutators of the open state and
//! both are idempotent.

use tokio::sync::mpsc;

use checkout_core::{CheckoutError, CrossContextMessage, InboundMessage, Result};

use crate::host::{DismissTarget, EventSink, HostDocument, HostEvent, ListenerId, SurfaceId};
use crate::options::WidgetOptions;

#[derive(Clone, Copy)]
struct OpenSurface {
    surface: SurfaceId,
    listener: ListenerId,
}

/// One embedded checkout session
pub struct Widget<D: HostDocument> {
    options: WidgetOptions,
    document: D,
    events_tx: EventSink,
    events_rx: mpsc::UnboundedReceiver<HostEvent>,
    open: Option<OpenSurface>,
}

impl<D: HostDocument> Widget<D> {
    pub fn new(options: WidgetOptions, document: D) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            options,
            document,
            events_tx,
            events_rx,
            open: None,
        }
    }

    pub fn options(&self) -> &WidgetOptions {
        &self.options
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Mount the surface and start listening. No-op when already open.
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            tracing::debug!(order_id = %self.options.order_id(), "Widget already open");
            return Ok(());
        }

        let src = self.options.address().to_url();
        let surface = self.document.attach(&src, self.events_tx.clone())?;
        let listener = match self.document.add_message_listener(self.events_tx.clone()) {
            Ok(listener) => listener,
            Err(e) => {
                if let Err(detach) = self.document.detach(surface) {
                    tracing::warn!(error = %detach, "Could not detach surface after failed open");
                }
                return Err(e);
            }
        };

        self.open = Some(OpenSurface { surface, listener });
        tracing::info!(order_id = %self.options.order_id(), src = %src, "Checkout surface opened");
        Ok(())
    }

    /// Stop listening, unmount, then run `on_close`. No-op when closed.
    pub fn close(&mut self) {
        let Some(open) = self.open else {
            return;
        };
        self.release(open);
        self.open = None;

        // Anything still queued belongs to the session that just ended.
        while self.events_rx.try_recv().is_ok() {}

        tracing::info!(order_id = %self.options.order_id(), "Checkout surface closed");
        self.options.closed();
    }

    /// Handle one event from the document. Never fails: anything
    /// unexpected is logged and dropped.
    pub fn dispatch(&mut self, event: HostEvent) {
        if !self.is_open() {
            tracing::debug!(?event, "Widget closed, event ignored");
            return;
        }

        match event {
            HostEvent::Message(message) => self.on_message(message),
            HostEvent::Dismiss(DismissTarget::CloseButton | DismissTarget::Overlay) => self.close(),
            HostEvent::Dismiss(DismissTarget::Content) => {}
        }
    }

    /// Dispatch every event queued so far; returns how many were handled
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    /// Dispatch events as they arrive until the surface closes
    pub async fn run_until_closed(&mut self) {
        while self.is_open() {
            match self.events_rx.recv().await {
                Some(event) => self.dispatch(event),
                None => break,
            }
        }
    }

    fn on_message(&mut self, message: InboundMessage) {
        if !self.options.origin_policy().permits(&message.origin) {
            let err = CheckoutError::Protocol(format!("unexpected origin {}", message.origin));
            tracing::debug!(origin = %message.origin, error = %err, "Message discarded");
            return;
        }

        let decoded = match CrossContextMessage::decode(&message.data) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::debug!(origin = %message.origin, error = %err, "Message discarded");
                return;
            }
        };

        tracing::info!(kind = decoded.kind(), order_id = %self.options.order_id(), "Message from checkout surface");
        match decoded {
            CrossContextMessage::PaymentSuccess { data } => {
                self.options.success(&data);
                self.close();
            }
            CrossContextMessage::PaymentFailed { data } => self.options.failure(&data),
            CrossContextMessage::CloseModal {} => self.close(),
        }
    }

    fn release(&self, open: OpenSurface) {
        // Listener first, so nothing is delivered to a half-removed surface.
        if let Err(e) = self.document.remove_message_listener(open.listener) {
            tracing::warn!(error = %e, "Could not remove message listener");
        }
        if let Err(e) = self.document.detach(open.surface) {
            tracing::warn!(error = %e, "Could not detach checkout surface");
        }
    }
}

impl<D: HostDocument> Drop for Widget<D> {
    fn drop(&mut self) {
        if let Some(open) = self.open.take() {
            self.release(open);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{json, Value};

    use crate::host::MemoryDocument;

    const SURFACE: &str = "http://localhost:3001";

    #[derive(Default)]
    struct Calls {
        success: AtomicUsize,
        failure: AtomicUsize,
        close: AtomicUsize,
    }

    fn widget() -> (Widget<MemoryDocument>, MemoryDocument, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let (s, f, c) = (calls.clone(), calls.clone(), calls.clone());
        let options = WidgetOptions::builder()
            .key("key_test")
            .order_id("o1")
            .base_url(SURFACE)
            .on_success(move |_| {
                s.success.fetch_add(1, Ordering::SeqCst);
            })
            .on_failure(move |_| {
                f.failure.fetch_add(1, Ordering::SeqCst);
            })
            .on_close(move || {
                c.close.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        let document = MemoryDocument::new("https://shop.example.com");
        (Widget::new(options, document.clone()), document, calls)
    }

    fn success() -> Value {
        json!({"type": "payment_success", "data": {"id": "p1", "status": "success"}})
    }

    #[test]
    fn test_open_twice_attaches_once() {
        let (mut widget, document, _) = widget();
        widget.open().unwrap();
        widget.open().unwrap();

        assert!(widget.is_open());
        assert_eq!(document.surface_count(), 1);
        assert_eq!(document.listener_count(), 1);
        assert_eq!(
            document.surface_url().unwrap().as_str(),
            "http://localhost:3001/checkout?order_id=o1&embedded=true&key=key_test"
        );
    }

    #[test]
    fn test_close_twice_tears_down_once() {
        let (mut widget, document, calls) = widget();
        widget.open().unwrap();
        widget.close();
        widget.close();

        assert!(!widget.is_open());
        assert_eq!(calls.close.load(Ordering::SeqCst), 1);
        assert_eq!(document.surface_count(), 0);
        assert_eq!(document.operations(), ["attach", "listen", "unlisten", "detach"]);
    }

    #[test]
    fn test_close_before_open_is_noop() {
        let (mut widget, document, calls) = widget();
        widget.close();
        assert_eq!(calls.close.load(Ordering::SeqCst), 0);
        assert!(document.operations().is_empty());
    }

    #[test]
    fn test_success_calls_back_then_closes() {
        let (mut widget, document, calls) = widget();
        widget.open().unwrap();

        document.post(SURFACE, success());
        document.post(SURFACE, success());
        widget.pump();

        assert_eq!(calls.success.load(Ordering::SeqCst), 1);
        assert_eq!(calls.close.load(Ordering::SeqCst), 1);
        assert!(!widget.is_open());

        widget.dispatch(HostEvent::Message(InboundMessage::new(SURFACE, success())));
        assert_eq!(calls.success.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_keeps_surface_open() {
        let (mut widget, document, calls) = widget();
        widget.open().unwrap();

        document.post(
            SURFACE,
            json!({"type": "payment_failed", "data": {"code": "PAYMENT_FAILED", "description": "declined"}}),
        );
        widget.pump();

        assert_eq!(calls.failure.load(Ordering::SeqCst), 1);
        assert_eq!(calls.close.load(Ordering::SeqCst), 0);
        assert!(widget.is_open());

        document.post(SURFACE, json!({"type": "close_modal"}));
        widget.pump();
        assert!(!widget.is_open());
        assert_eq!(calls.close.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeated_failure_reports_each_time() {
        let (mut widget, document, calls) = widget();
        widget.open().unwrap();

        let failed = json!({"type": "payment_failed", "data": {"code": "PAYMENT_FAILED", "description": "declined"}});
        document.post(SURFACE, failed.clone());
        document.post(SURFACE, failed);
        assert_eq!(widget.pump(), 2);

        assert_eq!(calls.failure.load(Ordering::SeqCst), 2);
        assert_eq!(calls.success.load(Ordering::SeqCst), 0);
        assert_eq!(calls.close.load(Ordering::SeqCst), 0);
        assert!(widget.is_open());
        assert_eq!(document.surface_count(), 1);
    }

    #[test]
    fn test_on_close_runs_after_surface_detached() {
        let document = MemoryDocument::new("https://shop.example.com");
        let seen = Arc::new(std::sync::Mutex::new(None));
        let (observer, record) = (document.clone(), seen.clone());
        let options = WidgetOptions::builder()
            .key("key_test")
            .order_id("o1")
            .base_url(SURFACE)
            .on_close(move || {
                *record.lock().unwrap() =
                    Some((observer.surface_count(), observer.listener_count()));
            })
            .build()
            .unwrap();
        let mut widget = Widget::new(options, document.clone());
        widget.open().unwrap();
        widget.close();

        assert!(!widget.is_open());
        assert_eq!(*seen.lock().unwrap(), Some((0, 0)));
        assert_eq!(document.operations(), ["attach", "listen", "unlisten", "detach"]);
    }

    #[test]
    fn test_malformed_and_foreign_messages_are_dropped() {
        let (mut widget, document, calls) = widget();
        widget.open().unwrap();

        document.post(SURFACE, json!("not json"));
        document.post(SURFACE, json!(42));
        document.post(SURFACE, json!({"type": "payment_refunded"}));
        document.post("https://evil.example.com", success());
        assert_eq!(widget.pump(), 4);

        assert!(widget.is_open());
        assert_eq!(calls.success.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dismiss_targets() {
        let (mut widget, document, calls) = widget();
        widget.open().unwrap();

        document.click(DismissTarget::Content);
        widget.pump();
        assert!(widget.is_open());

        document.click(DismissTarget::Overlay);
        widget.pump();
        assert!(!widget.is_open());

        widget.open().unwrap();
        document.click(DismissTarget::CloseButton);
        widget.pump();
        assert!(!widget.is_open());
        assert_eq!(calls.close.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_until_closed() {
        let (mut widget, document, calls) = widget();
        widget.open().unwrap();

        let poster = document.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            poster.post(SURFACE, success());
        });

        widget.run_until_closed().await;
        assert_eq!(calls.success.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_document() {
        let (mut widget, document, calls) = widget();
        widget.open().unwrap();
        drop(widget);

        assert_eq!(document.surface_count(), 0);
        assert_eq!(document.listener_count(), 0);
        assert_eq!(calls.close.load(Ordering::SeqCst), 0);
    }
}
