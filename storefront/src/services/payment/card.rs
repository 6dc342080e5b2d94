// storefront/src/services/payment/card.rs

use super::ledger::MockLedger;
use super::{IntentRequest, PaymentIntent, PaymentProcessor, ProcessorError, RefundReceipt, WebhookEvent};
use crate::models::payment::PaymentMethod;
use crate::models::settlement::ProcessorReport;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

pub const SIGNATURE_HEADER: &str = "card-signature";
/// Token that always declines.
pub const DECLINED_TOKEN: &str = "tok_declined";

/// Card processor stand-in. Intents are `pi_…`, charges `ch_…`.
///
/// A confirmation declines when the token is [`DECLINED_TOKEN`] or when the
/// amount ends in `123` (modulo 1000).
pub struct MockCardProcessor {
  account_id: String,
  webhook_secret: String,
  latency: Duration,
  ledger: MockLedger,
}

impl MockCardProcessor {
  pub fn new(account_id: &str, webhook_secret: &str) -> Self {
    Self {
      account_id: account_id.to_string(),
      webhook_secret: webhook_secret.to_string(),
      latency: Duration::from_millis(20),
      ledger: MockLedger::default(),
    }
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }
}

#[derive(Deserialize)]
struct CardEvent {
  id: String,
  #[serde(rename = "type")]
  event_type: String,
  data: CardEventData,
}

#[derive(Deserialize)]
struct CardEventData {
  object: CardEventObject,
}

#[derive(Deserialize)]
struct CardEventObject {
  id: String,
  amount: i64,
  #[serde(default)]
  latest_charge: Option<String>,
  #[serde(default)]
  metadata: CardMetadata,
  #[serde(default)]
  last_payment_error: Option<CardPaymentError>,
}

#[derive(Deserialize, Default)]
struct CardMetadata {
  #[serde(default)]
  order_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct CardPaymentError {
  message: String,
}

#[async_trait]
impl PaymentProcessor for MockCardProcessor {
  fn method(&self) -> PaymentMethod {
    PaymentMethod::Card
  }

  fn signature_header(&self) -> &'static str {
    SIGNATURE_HEADER
  }

  fn webhook_secret(&self) -> &str {
    &self.webhook_secret
  }

  #[instrument(name = "card::create_intent", skip(self, request), fields(order_id = %request.order_id, amount = request.amount_cents))]
  async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, ProcessorError> {
    if request.amount_cents <= 0 {
      return Err(ProcessorError::Rejected("Amount must be greater than zero".to_string()));
    }
    tokio::time::sleep(self.latency).await;

    let reference = format!("pi_{}", Uuid::new_v4().simple());
    self
      .ledger
      .open_intent(&reference, request.order_id, request.amount_cents, &request.currency);
    info!(reference = %reference, account = %self.account_id, "Card intent created.");
    Ok(PaymentIntent {
      processor: PaymentMethod::Card,
      client_secret: Some(format!("{}_secret_{}", reference, Uuid::new_v4().simple())),
      reference,
      approval_url: None,
      amount_cents: request.amount_cents,
      currency: request.currency.clone(),
    })
  }

  #[instrument(name = "card::confirm", skip(self, payment_data))]
  async fn confirm(&self, reference: &str, payment_data: &Value) -> Result<ProcessorReport, ProcessorError> {
    let intent = self.ledger.intent(reference)?;
    tokio::time::sleep(self.latency).await;

    let token = payment_data
      .get("paymentMethodToken")
      .and_then(Value::as_str)
      .unwrap_or("tok_visa");
    if token == DECLINED_TOKEN || intent.amount_cents % 1000 == 123 {
      info!(reference, "Card payment declined.");
      return Ok(ProcessorReport::Failed {
        transaction_id: None,
        reason: "card_declined".to_string(),
        details: json!({
          "processor": "card",
          "intentId": reference,
          "declineCode": "generic_decline",
          "account": self.account_id,
        }),
      });
    }

    let charge_id = self
      .ledger
      .capture(reference, format!("ch_{}", Uuid::new_v4().simple()))?;
    info!(reference, charge_id = %charge_id, "Card payment succeeded.");
    Ok(ProcessorReport::Succeeded {
      transaction_id: charge_id.clone(),
      amount_cents: intent.amount_cents,
      details: json!({
        "processor": "card",
        "intentId": reference,
        "chargeId": charge_id,
        "orderId": intent.order_id,
        "amountCents": intent.amount_cents,
        "currency": intent.currency,
        "status": "succeeded",
        "account": self.account_id,
      }),
    })
  }

  #[instrument(name = "card::refund", skip(self))]
  async fn refund(&self, transaction_id: &str, amount_cents: i64) -> Result<RefundReceipt, ProcessorError> {
    tokio::time::sleep(self.latency).await;
    self.ledger.refund(transaction_id, amount_cents)?;
    let refund_id = format!("re_{}", Uuid::new_v4().simple());
    Ok(RefundReceipt {
      details: json!({
        "processor": "card",
        "refundId": refund_id,
        "chargeId": transaction_id,
        "amountCents": amount_cents,
        "status": "succeeded",
      }),
      refund_id,
      amount_cents,
    })
  }

  fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, ProcessorError> {
    let raw: Value = serde_json::from_slice(payload).map_err(|e| ProcessorError::MalformedEvent(e.to_string()))?;
    let event: CardEvent = serde_json::from_value(raw.clone()).map_err(|e| ProcessorError::MalformedEvent(e.to_string()))?;
    let object = &event.data.object;

    let report = match event.event_type.as_str() {
      "payment_intent.succeeded" => Some(ProcessorReport::Succeeded {
        transaction_id: object.latest_charge.clone().unwrap_or_else(|| object.id.clone()),
        amount_cents: object.amount,
        details: raw,
      }),
      "payment_intent.payment_failed" => Some(ProcessorReport::Failed {
        transaction_id: None,
        reason: object
          .last_payment_error
          .as_ref()
          .map(|e| e.message.clone())
          .unwrap_or_else(|| "payment_failed".to_string()),
        details: raw,
      }),
      _ => None,
    };
    if report.is_some() && object.metadata.order_id.is_none() {
      return Err(ProcessorError::MalformedEvent(format!(
        "event {} carries no metadata.order_id",
        event.id
      )));
    }

    Ok(WebhookEvent {
      event_id: event.id,
      event_type: event.event_type,
      order_id: object.metadata.order_id,
      report,
    })
  }
}
