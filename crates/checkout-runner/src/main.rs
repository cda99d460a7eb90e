//! checkout-runner
//!
//! Smoke-tests the embedded checkout protocol against a running Checkout
//! Service, or against a scripted mock with `--mock`.

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_client::{CheckoutService, HttpServiceConfig, MockCheckoutService};
use checkout_core::{
    CardForm, MemorySessionStore, MerchantCredentials, MerchantSession, Order, PaymentInput,
    PaymentStatus, SessionStore,
};
use checkout_flow::PollerConfig;
use checkout_runner::{http_service, run_checkout, RunSettings};
use checkout_widget::DEFAULT_BASE_URL;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Order to pay
    #[arg(long)]
    order_id: String,

    /// Merchant key passed to the checkout surface
    #[arg(long, env = "CHECKOUT_MERCHANT_KEY")]
    key: String,

    /// Checkout origin the surface is served from
    #[arg(long, env = "CHECKOUT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Origin of the simulated merchant page
    #[arg(long, default_value = "http://localhost:3000")]
    merchant_origin: String,

    #[command(flatten)]
    payment: PaymentArgs,

    /// Stop polling after this many status checks
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Stop polling after this many seconds
    #[arg(long)]
    max_secs: Option<u64>,

    /// Use a scripted in-process service instead of HTTP
    #[arg(long)]
    mock: bool,
}

#[derive(Args)]
struct PaymentArgs {
    /// Pay by UPI with this VPA
    #[arg(long, conflicts_with = "card_number")]
    vpa: Option<String>,

    /// Pay by card
    #[arg(long, requires_all = ["expiry", "cvv", "holder"])]
    card_number: Option<String>,

    /// Card expiry, MM/YY
    #[arg(long)]
    expiry: Option<String>,

    #[arg(long)]
    cvv: Option<String>,

    #[arg(long)]
    holder: Option<String>,
}

impl PaymentArgs {
    fn into_input(self) -> anyhow::Result<PaymentInput> {
        if let Some(vpa) = self.vpa {
            return Ok(PaymentInput::upi(vpa));
        }
        let Some(number) = self.card_number else {
            anyhow::bail!("either --vpa or --card-number is required");
        };
        let form = CardForm {
            number,
            holder_name: self.holder.unwrap_or_default(),
            cvv: self.cvv.unwrap_or_default(),
            ..CardForm::default()
        }
        .with_expiry(self.expiry.as_deref().unwrap_or_default());
        Ok(PaymentInput::Card(form))
    }
}

fn mock_service(order_id: &str) -> MockCheckoutService {
    let service = MockCheckoutService::new()
        .with_latency(Duration::from_millis(150))
        .with_order(Order::new(order_id, 50000, "INR"));
    service.script_statuses("pay_mock_0001", [PaymentStatus::Pending, PaymentStatus::Success]);
    service
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let service: Arc<dyn CheckoutService> = if cli.mock {
        tracing::warn!("Using scripted mock service");
        Arc::new(mock_service(&cli.order_id))
    } else {
        let sessions = MemorySessionStore::new();
        match MerchantCredentials::from_env() {
            Some(credentials) => sessions.save(&MerchantSession::new(credentials))?,
            None => tracing::warn!("CHECKOUT_API_KEY/CHECKOUT_API_SECRET not set, calling public endpoints only"),
        }
        let config = HttpServiceConfig::from_env();
        tracing::info!(api = %config.api_base, "Checkout Service");
        Arc::new(http_service(config, &sessions)?)
    };

    let mut poller = PollerConfig::from_env();
    if let Some(attempts) = cli.max_attempts {
        poller = poller.with_max_attempts(attempts);
    }
    if let Some(secs) = cli.max_secs {
        poller = poller.with_max_duration(Duration::from_secs(secs));
    }

    let settings = RunSettings {
        order_id: cli.order_id,
        key: cli.key,
        base_url: cli.base_url,
        merchant_origin: cli.merchant_origin,
        poller,
        input: cli.payment.into_input()?,
    };

    let report = tokio::select! {
        report = run_checkout(service, settings) => report?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            return Ok(());
        }
    };

    tracing::info!(state = %report.state, closes = report.closes, "Checkout finished");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
