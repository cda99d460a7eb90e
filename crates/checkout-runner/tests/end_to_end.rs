//! Both sides of the embedded checkout wired together over the in-memory
//! document, with a scripted Checkout Service.

use std::sync::{Arc, Mutex};

use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};
use serde_json::{json, Value};

use checkout_client::{CheckoutService, HttpServiceConfig, MockCheckoutService, ScriptedError};
use checkout_core::{
    CardForm, CheckoutError, MemorySessionStore, MerchantCredentials, MerchantSession, Order,
    PaymentInput, PaymentRecord, PaymentStatus, SessionStore,
};
use checkout_flow::{FlowState, PollerConfig, Screen};
use checkout_runner::{http_service, run_checkout, RunSettings};

fn settings(input: PaymentInput) -> RunSettings {
    RunSettings {
        order_id: "o1".into(),
        key: "key_test".into(),
        base_url: "http://localhost:3001".into(),
        merchant_origin: "https://shop.example.com".into(),
        poller: PollerConfig::default(),
        input,
    }
}

fn service() -> Arc<MockCheckoutService> {
    Arc::new(MockCheckoutService::new().with_order(Order::new("o1", 50000, "INR")))
}

#[tokio::test(start_paused = true)]
async fn test_upi_payment_succeeds_and_closes_widget() {
    let service = service();
    service.on_create(Ok(PaymentRecord {
        amount: 50000,
        ..PaymentRecord::pending("p1")
    }));
    service.script_statuses("p1", [PaymentStatus::Pending, PaymentStatus::Success]);

    let report = run_checkout(service.clone(), settings(PaymentInput::upi("user@bank")))
        .await
        .unwrap();

    assert_eq!(report.state, FlowState::Success);
    assert_eq!(report.payment_id.as_deref(), Some("p1"));
    assert_eq!(report.presentation.screen, Screen::Success);
    assert_eq!(report.on_success.unwrap()["id"], "p1");
    assert!(report.on_failure.is_none());
    assert_eq!(report.closes, 1);
    assert_eq!(service.status_calls("p1"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_reports_and_closes() {
    let service = service();
    service.on_create(Err(ScriptedError::Transport("connection refused".into())));

    let report = run_checkout(service.clone(), settings(PaymentInput::upi("user@bank")))
        .await
        .unwrap();

    assert_eq!(report.state, FlowState::Failed);
    assert_eq!(report.on_failure.unwrap()["code"], "TRANSPORT_ERROR");
    assert!(report.on_success.is_none());
    assert_eq!(report.closes, 1);
    assert_eq!(service.status_calls("pay_mock_0001"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_declined_payment_carries_service_error() {
    let service = service();
    service.on_create(Ok(PaymentRecord::pending("p1")));
    service.script_status(
        "p1",
        [Ok(PaymentRecord {
            status: PaymentStatus::Failed,
            error_code: Some("PAYMENT_FAILED".into()),
            error_description: Some("Insufficient funds".into()),
            ..PaymentRecord::pending("p1")
        })],
    );

    let report = run_checkout(service, settings(PaymentInput::upi("user@bank")))
        .await
        .unwrap();

    let failure = report.on_failure.unwrap();
    assert_eq!(failure["description"], "Insufficient funds");
    assert_eq!(failure["payment_id"], "p1");
    assert_eq!(report.presentation.screen, Screen::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_card_never_reaches_service() {
    let service = service();
    let form = CardForm {
        number: "4111".into(),
        holder_name: String::new(),
        expiry_month: "13".into(),
        expiry_year: "202".into(),
        cvv: "1".into(),
    };

    let err = run_checkout(service.clone(), settings(PaymentInput::Card(form)))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Validation(ref errors) if errors.len() == 5));
    assert_eq!(service.create_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_order_fails_without_payment() {
    let service = Arc::new(MockCheckoutService::new());
    let report = run_checkout(service.clone(), settings(PaymentInput::upi("user@bank")))
        .await
        .unwrap();

    assert_eq!(report.state, FlowState::Failed);
    assert_eq!(report.on_failure.unwrap()["code"], "NOT_FOUND_ERROR");
    assert_eq!(service.create_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_polling_gives_up() {
    let service = service();
    service.on_create(Ok(PaymentRecord::pending("p1")));

    let mut run = settings(PaymentInput::upi("user@bank"));
    run.poller = PollerConfig::default().with_max_attempts(3);
    let report = run_checkout(service.clone(), run).await.unwrap();

    assert_eq!(report.state, FlowState::Failed);
    assert_eq!(report.on_failure.unwrap()["code"], "POLLING_TIMEOUT");
    assert_eq!(service.status_calls("p1"), 3);
}

type SeenHeaders = Arc<Mutex<Vec<(Option<String>, Option<String>)>>>;

async fn order_with_headers(State(seen): State<SeenHeaders>, headers: HeaderMap) -> Json<Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    seen.lock().unwrap().push((header("x-api-key"), header("x-api-secret")));
    Json(json!({"id": "o1", "amount": 50000, "currency": "INR", "status": "created"}))
}

#[tokio::test]
async fn test_http_service_uses_session_credentials() {
    let seen = SeenHeaders::default();
    let app = Router::new()
        .route("/api/v1/orders/public/{id}", get(order_with_headers))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let config = HttpServiceConfig {
        api_base: format!("http://{addr}/api/v1"),
        timeout_secs: 5,
    };

    let sessions = MemorySessionStore::new();
    let anonymous = http_service(config.clone(), &sessions).unwrap();
    anonymous.get_order("o1").await.unwrap();
    assert_eq!(seen.lock().unwrap().as_slice(), [(None, None)]);

    sessions
        .save(&MerchantSession::new(MerchantCredentials::new("key_test", "secret_test")))
        .unwrap();
    let merchant = http_service(config, &sessions).unwrap();
    merchant.get_order("o1").await.unwrap();
    assert_eq!(
        seen.lock().unwrap()[1],
        (Some("key_test".to_string()), Some("secret_test".to_string()))
    );
}
