// storefront/src/services/payment/mod.rs

//! Payment processor seam.
//!
//! Each processor turns its own wire format into [`ProcessorReport`]s and
//! [`WebhookEvent`]s so the settlement path never sees processor specifics.

mod card;
mod ledger;
pub mod signature;
mod wallet;

pub use card::MockCardProcessor;
pub use wallet::MockWalletProcessor;

use crate::config::AppConfig;
use crate::models::payment::PaymentMethod;
use crate::models::settlement::ProcessorReport;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProcessorError {
  #[error("request rejected by processor: {0}")]
  Rejected(String),

  #[error("webhook signature verification failed: {0}")]
  InvalidSignature(String),

  #[error("malformed webhook event: {0}")]
  MalformedEvent(String),
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
  pub order_id: Uuid,
  pub amount_cents: i64,
  pub currency: String,
}

/// Processor-specific intent payload handed back to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
  pub processor: PaymentMethod,
  pub reference: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub client_secret: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub approval_url: Option<String>,
  pub amount_cents: i64,
  pub currency: String,
}

#[derive(Debug, Clone)]
pub struct RefundReceipt {
  pub refund_id: String,
  pub amount_cents: i64,
  pub details: Value,
}

/// A verified, normalised webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
  pub event_id: String,
  pub event_type: String,
  pub order_id: Option<Uuid>,
  /// `None` for event types that do not affect settlement.
  pub report: Option<ProcessorReport>,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
  fn method(&self) -> PaymentMethod;

  /// Request header carrying the webhook signature.
  fn signature_header(&self) -> &'static str;

  fn webhook_secret(&self) -> &str;

  async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, ProcessorError>;

  /// Completes the attempt started by `create_intent`. A decline is a
  /// `ProcessorReport::Failed`, not an error.
  async fn confirm(&self, reference: &str, payment_data: &Value) -> Result<ProcessorReport, ProcessorError>;

  async fn refund(&self, transaction_id: &str, amount_cents: i64) -> Result<RefundReceipt, ProcessorError>;

  /// Parses an already verified payload.
  fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, ProcessorError>;

  fn verify_webhook(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookEvent, ProcessorError> {
    let signature = signature
      .ok_or_else(|| ProcessorError::InvalidSignature(format!("missing {} header", self.signature_header())))?;
    if !signature::verify(self.webhook_secret(), payload, signature) {
      return Err(ProcessorError::InvalidSignature("signature mismatch".to_string()));
    }
    self.parse_event(payload)
  }
}

/// Processors by payment method.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
  processors: HashMap<PaymentMethod, Arc<dyn PaymentProcessor>>,
}

impl ProcessorRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Card and wallet mocks configured from `config`.
  pub fn from_config(config: &AppConfig) -> Self {
    Self::new()
      .with(Arc::new(MockCardProcessor::new(
        &config.card.account_id,
        &config.card.webhook_secret,
      )))
      .with(Arc::new(MockWalletProcessor::new(
        &config.wallet.account_id,
        &config.wallet.webhook_secret,
      )))
  }

  pub fn with(mut self, processor: Arc<dyn PaymentProcessor>) -> Self {
    self.processors.insert(processor.method(), processor);
    self
  }

  pub fn get(&self, method: PaymentMethod) -> Option<Arc<dyn PaymentProcessor>> {
    self.processors.get(&method).cloned()
  }

  /// Looks a processor up by the name used in webhook routes.
  pub fn by_name(&self, name: &str) -> Option<Arc<dyn PaymentProcessor>> {
    name.parse::<PaymentMethod>().ok().and_then(|method| self.get(method))
  }
}
