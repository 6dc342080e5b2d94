// tests/common/mod.rs
#![allow(dead_code)]

use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use actix_web::web::Bytes;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;
use waypoint::{Ctx, Outcome};

use storefront::config::{AppConfig, LogFormat, ProcessorConfig, ReconcileConfig, StorageBackend};
use storefront::errors::AppError;
use storefront::models::address::ShippingAddress;
use storefront::models::payment::PaymentMethod;
use storefront::models::settlement::{ProcessorReport, SettleResult};
use storefront::pipelines::contexts::{
  CancelCtxData, CheckoutCtxData, CheckoutItemInput, ConfirmCtxData, IntentCtxData, WebhookCtxData,
};
use storefront::pipelines::register_all_pipelines;
use storefront::seed;
use storefront::services::payment::{
  signature, IntentRequest, MockCardProcessor, MockWalletProcessor, PaymentIntent, PaymentProcessor, ProcessorError,
  ProcessorRegistry, RefundReceipt, WebhookEvent,
};
use storefront::state::AppState;
use storefront::store::memory::{MemoryCatalogStore, MemoryOrderStore};
use storefront::store::OrderAggregate;

pub const CARD_SECRET: &str = "whsec_test_card";
pub const WALLET_SECRET: &str = "whsec_test_wallet";

pub const ESPRESSO_CUP: Uuid = Uuid::from_u128(0x6f1c1e0a_3b1d_4c55_9d0e_1a2b3c4d5e01);
pub const KETTLE: Uuid = Uuid::from_u128(0x6f1c1e0a_3b1d_4c55_9d0e_1a2b3c4d5e02);
pub const FILTER_PAPERS: Uuid = Uuid::from_u128(0x6f1c1e0a_3b1d_4c55_9d0e_1a2b3c4d5e03);
pub const HAND_GRINDER: Uuid = Uuid::from_u128(0x6f1c1e0a_3b1d_4c55_9d0e_1a2b3c4d5e04);

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  let default_filter_level = Level::WARN;
  let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter_level.to_string()));

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// Wraps a processor and counts how often it is contacted.
pub struct CountingProcessor {
  inner: Arc<dyn PaymentProcessor>,
  pub calls: AtomicUsize,
}

impl CountingProcessor {
  pub fn new(inner: Arc<dyn PaymentProcessor>) -> Self {
    Self {
      inner,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn call_count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl PaymentProcessor for CountingProcessor {
  fn method(&self) -> PaymentMethod {
    self.inner.method()
  }

  fn signature_header(&self) -> &'static str {
    self.inner.signature_header()
  }

  fn webhook_secret(&self) -> &str {
    self.inner.webhook_secret()
  }

  async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, ProcessorError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.inner.create_intent(request).await
  }

  async fn confirm(&self, reference: &str, payment_data: &Value) -> Result<ProcessorReport, ProcessorError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.inner.confirm(reference, payment_data).await
  }

  async fn refund(&self, transaction_id: &str, amount_cents: i64) -> Result<RefundReceipt, ProcessorError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.inner.refund(transaction_id, amount_cents).await
  }

  fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, ProcessorError> {
    self.inner.parse_event(payload)
  }
}

pub struct TestApp {
  pub state: AppState,
  pub orders: Arc<MemoryOrderStore>,
  pub catalog: Arc<MemoryCatalogStore>,
  pub card: Arc<CountingProcessor>,
  pub wallet: Arc<CountingProcessor>,
}

pub fn test_config() -> AppConfig {
  AppConfig {
    server_host: "127.0.0.1".to_string(),
    server_port: 0,
    storage_backend: StorageBackend::Memory,
    database_url: None,
    catalog_database_url: None,
    currency: "USD".to_string(),
    card: ProcessorConfig {
      account_id: "acct_test_card".to_string(),
      webhook_secret: CARD_SECRET.to_string(),
    },
    wallet: ProcessorConfig {
      account_id: "acct_test_wallet".to_string(),
      webhook_secret: WALLET_SECRET.to_string(),
    },
    reconcile: ReconcileConfig {
      interval: Duration::from_secs(1),
      max_attempts: 3,
      batch_size: 50,
    },
    seed_db: true,
    log_format: LogFormat::Pretty,
  }
}

/// Memory-backed state with the demo catalog and both mock processors.
pub async fn spawn_app() -> TestApp {
  setup_tracing();
  let config = Arc::new(test_config());
  let orders = Arc::new(MemoryOrderStore::new());
  let catalog = Arc::new(MemoryCatalogStore::new());
  seed::seed_catalog(catalog.as_ref()).await.expect("seed catalog");

  let card = Arc::new(CountingProcessor::new(Arc::new(
    MockCardProcessor::new(&config.card.account_id, CARD_SECRET).with_latency(Duration::ZERO),
  )));
  let wallet = Arc::new(CountingProcessor::new(Arc::new(
    MockWalletProcessor::new(&config.wallet.account_id, WALLET_SECRET).with_latency(Duration::ZERO),
  )));
  let processors = ProcessorRegistry::new().with(card.clone()).with(wallet.clone());

  let state = AppState::new(config, orders.clone(), catalog.clone(), processors);
  register_all_pipelines(&state.flows, &state);
  TestApp {
    state,
    orders,
    catalog,
    card,
    wallet,
  }
}

pub fn shipping_address() -> ShippingAddress {
  ShippingAddress {
    recipient: "Ada Lovelace".to_string(),
    line1: "12 Analytical Row".to_string(),
    line2: None,
    city: "London".to_string(),
    region: None,
    postal_code: "N1 9GU".to_string(),
    country: "GB".to_string(),
  }
}

pub fn item(product_id: Uuid, quantity: i64) -> CheckoutItemInput {
  CheckoutItemInput { product_id, quantity }
}

pub async fn checkout(
  app: &TestApp,
  user_id: Uuid,
  items: Vec<CheckoutItemInput>,
  method: Option<&str>,
) -> Result<(OrderAggregate, usize), AppError> {
  let ctx = Ctx::new(CheckoutCtxData::new(
    app.state.clone(),
    user_id,
    items,
    shipping_address(),
    method.map(str::to_string),
  ));
  app.state.flows.run(ctx.clone()).await?;
  let guard = ctx.read();
  let aggregate = guard.aggregate.clone().expect("checkout produced an order");
  Ok((aggregate, guard.deferred_inventory_updates))
}

pub async fn create_intent(app: &TestApp, user_id: Uuid, order_id: Uuid, method: &str) -> Result<PaymentIntent, AppError> {
  let ctx = Ctx::new(IntentCtxData::new(app.state.clone(), user_id, order_id, method.to_string()));
  app.state.flows.run(ctx.clone()).await?;
  let intent = ctx.read().intent.clone().expect("intent flow produced an intent");
  Ok(intent)
}

pub struct Confirmation {
  pub outcome: Outcome,
  pub result: SettleResult,
  pub failure_details: Option<Value>,
}

pub async fn confirm(
  app: &TestApp,
  user_id: Uuid,
  order_id: Uuid,
  method: &str,
  payment_data: Value,
) -> Result<Confirmation, AppError> {
  let ctx = Ctx::new(ConfirmCtxData::new(
    app.state.clone(),
    user_id,
    order_id,
    method.to_string(),
    payment_data,
  ));
  let outcome = app.state.flows.run(ctx.clone()).await?;
  let guard = ctx.read();
  Ok(Confirmation {
    outcome,
    result: guard.result.expect("confirmation produced a result"),
    failure_details: guard.failure_details.clone(),
  })
}

pub async fn cancel(app: &TestApp, user_id: Uuid, order_id: Uuid) -> Result<CancelCtxData, AppError> {
  let ctx = Ctx::new(CancelCtxData::new(app.state.clone(), user_id, order_id));
  app.state.flows.run(ctx.clone()).await?;
  Ok(ctx.snapshot())
}

pub fn signed_headers(header: &'static str, secret: &str, payload: &[u8]) -> HeaderMap {
  let mut headers = HeaderMap::new();
  headers.insert(
    HeaderName::from_static(header),
    HeaderValue::from_str(&signature::sign(secret, payload)).expect("hex is a valid header value"),
  );
  headers
}

pub async fn deliver_webhook(
  app: &TestApp,
  processor: &str,
  headers: HeaderMap,
  payload: Vec<u8>,
) -> Result<Option<SettleResult>, AppError> {
  let ctx = Ctx::new(WebhookCtxData::new(
    app.state.clone(),
    processor.to_string(),
    headers,
    Bytes::from(payload),
  ));
  app.state.flows.run(ctx.clone()).await?;
  let result = ctx.read().result;
  Ok(result)
}

pub fn card_succeeded_event(event_id: &str, order_id: Uuid, intent_id: &str, amount_cents: i64) -> Vec<u8> {
  json!({
    "id": event_id,
    "type": "payment_intent.succeeded",
    "data": {"object": {
      "id": intent_id,
      "amount": amount_cents,
      "latest_charge": format!("ch_{}", event_id),
      "metadata": {"order_id": order_id}
    }}
  })
  .to_string()
  .into_bytes()
}

pub fn card_failed_event(event_id: &str, order_id: Uuid, intent_id: &str, amount_cents: i64) -> Vec<u8> {
  json!({
    "id": event_id,
    "type": "payment_intent.payment_failed",
    "data": {"object": {
      "id": intent_id,
      "amount": amount_cents,
      "metadata": {"order_id": order_id},
      "last_payment_error": {"message": "insufficient_funds"}
    }}
  })
  .to_string()
  .into_bytes()
}

pub fn wallet_completed_event(event_id: &str, order_id: Uuid, capture_id: &str, amount_cents: i64) -> Vec<u8> {
  json!({
    "id": event_id,
    "event_type": "PAYMENT.CAPTURE.COMPLETED",
    "resource": {
      "id": capture_id,
      "custom_id": order_id,
      "amount": {"value_cents": amount_cents}
    }
  })
  .to_string()
  .into_bytes()
}

/// Checkout for 2 cups and 1 pack of filters (2500 cents) followed by a card intent.
pub async fn order_with_card_intent(app: &TestApp, user_id: Uuid) -> (OrderAggregate, PaymentIntent) {
  let (aggregate, _) = checkout(
    app,
    user_id,
    vec![item(ESPRESSO_CUP, 2), item(FILTER_PAPERS, 1)],
    Some("card"),
  )
  .await
  .expect("checkout succeeds");
  let intent = create_intent(app, user_id, aggregate.order.id, "card")
    .await
    .expect("intent succeeds");
  (aggregate, intent)
}
