//! Checkout Service Trait
//!
//! The three operations the embedded flow needs from the external Checkout
//! Service. Orders and payments are owned by the service; the client only
//! reads them, except for creating a payment.

use async_trait::async_trait;

use checkout_core::{Order, PaymentRecord, PaymentRequest, Result};

/// Checkout Service client trait (Strategy pattern)
///
/// `HttpCheckoutService` talks to the real service, `MockCheckoutService`
/// plays back scripted responses.
#[async_trait]
pub trait CheckoutService: Send + Sync {
    /// `GET /orders/public/{orderId}`
    ///
    /// Fails with `OrderNotFound` or `Transport`.
    async fn get_order(&self, order_id: &str) -> Result<Order>;

    /// `POST /payments/public`
    ///
    /// Fails with `Rejected` (service-side validation) or `Transport`.
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentRecord>;

    /// `GET /payments/public/{paymentId}`
    ///
    /// A payment the service does not know yet reads as pending. Fails only
    /// with `Transport`.
    async fn get_payment_status(&self, payment_id: &str) -> Result<PaymentRecord>;

    /// Service name, for logs
    fn name(&self) -> &str;
}
