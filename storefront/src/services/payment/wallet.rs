// storefront/src/services/payment/wallet.rs

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

pub const SIGNATURE_HEADER: &str = "wallet-transmission-sig";
/// Payer id that always declines.
pub const DECLINED_PAYER: &str = "PAYER-DECLINED";

/// Wallet processor stand-in. Orders are `WAL-…`, captures `CAPTURE-…`.
/// Confirmation needs the `payerId` returned by the wallet's approval page.
pub struct MockWalletProcessor {
  account_id: String,
  webhook_secret: String,
  latency: Duration,
  ledger: MockLedger,
}

impl MockWalletProcessor {
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
struct WalletEvent {
  id: String,
  event_type: String,
  resource: WalletResource,
}

#[derive(Deserialize)]
struct WalletResource {
  id: String,
  #[serde(default)]
  custom_id: Option<Uuid>,
  #[serde(default)]
  amount: Option<WalletAmount>,
  #[serde(default)]
  status_details: Option<WalletStatusDetails>,
}

#[derive(Deserialize)]
struct WalletAmount {
  value_cents: i64,
}

#[derive(Deserialize)]
struct WalletStatusDetails {
  reason: String,
}

#[async_trait]
impl PaymentProcessor for MockWalletProcessor {
  fn method(&self) -> PaymentMethod {
    PaymentMethod::Wallet
  }

  fn signature_header(&self) -> &'static str {
    SIGNATURE_HEADER
  }

  fn webhook_secret(&self) -> &str {
    &self.webhook_secret
  }

  #[instrument(name = "wallet::create_intent", skip(self, request), fields(order_id = %request.order_id, amount = request.amount_cents))]
  async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, ProcessorError> {
    if request.amount_cents <= 0 {
      return Err(ProcessorError::Rejected("Amount must be greater than zero".to_string()));
    }
    tokio::time::sleep(self.latency).await;

    let reference = format!("WAL-{}", Uuid::new_v4().simple().to_string().to_uppercase());
    self
      .ledger
      .open_intent(&reference, request.order_id, request.amount_cents, &request.currency);
    info!(reference = %reference, account = %self.account_id, "Wallet order created.");
    Ok(PaymentIntent {
      processor: PaymentMethod::Wallet,
      approval_url: Some(format!("https://wallet.example/checkoutnow?token={}", reference)),
      reference,
      client_secret: None,
      amount_cents: request.amount_cents,
      currency: request.currency.clone(),
    })
  }

  #[instrument(name = "wallet::confirm", skip(self, payment_data))]
  async fn confirm(&self, reference: &str, payment_data: &Value) -> Result<ProcessorReport, ProcessorError> {
    let intent = self.ledger.intent(reference)?;
    let payer_id = payment_data
      .get("payerId")
      .and_then(Value::as_str)
      .filter(|p| !p.trim().is_empty())
      .ok_or_else(|| ProcessorError::Rejected("payerId is required to capture a wallet payment".to_string()))?;
    tokio::time::sleep(self.latency).await;

    if payer_id == DECLINED_PAYER {
      info!(reference, "Wallet capture declined.");
      return Ok(ProcessorReport::Failed {
        transaction_id: None,
        reason: "payer_action_declined".to_string(),
        details: json!({
          "processor": "wallet",
          "orderReference": reference,
          "payerId": payer_id,
          "account": self.account_id,
        }),
      });
    }

    let capture_id = self.ledger.capture(
      reference,
      format!("CAPTURE-{}", Uuid::new_v4().simple().to_string().to_uppercase()),
    )?;
    info!(reference, capture_id = %capture_id, "Wallet capture completed.");
    Ok(ProcessorReport::Succeeded {
      transaction_id: capture_id.clone(),
      amount_cents: intent.amount_cents,
      details: json!({
        "processor": "wallet",
        "orderReference": reference,
        "captureId": capture_id,
        "payerId": payer_id,
        "orderId": intent.order_id,
        "amountCents": intent.amount_cents,
        "currency": intent.currency,
        "status": "COMPLETED",
        "account": self.account_id,
      }),
    })
  }

  #[instrument(name = "wallet::refund", skip(self))]
  async fn refund(&self, transaction_id: &str, amount_cents: i64) -> Result<RefundReceipt, ProcessorError> {
    tokio::time::sleep(self.latency).await;
    self.ledger.refund(transaction_id, amount_cents)?;
    let refund_id = format!("REFUND-{}", Uuid::new_v4().simple().to_string().to_uppercase());
    Ok(RefundReceipt {
      details: json!({
        "processor": "wallet",
        "refundId": refund_id,
        "captureId": transaction_id,
        "amountCents": amount_cents,
        "status": "COMPLETED",
      }),
      refund_id,
      amount_cents,
    })
  }

  fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, ProcessorError> {
    let raw: Value = serde_json::from_slice(payload).map_err(|e| ProcessorError::MalformedEvent(e.to_string()))?;
    let event: WalletEvent =
      serde_json::from_value(raw.clone()).map_err(|e| ProcessorError::MalformedEvent(e.to_string()))?;
    let resource = &event.resource;

    let report = match event.event_type.as_str() {
      "PAYMENT.CAPTURE.COMPLETED" => {
        let amount = resource.amount.as_ref().ok_or_else(|| {
          ProcessorError::MalformedEvent(format!("event {} has no resource.amount", event.id))
        })?;
        Some(ProcessorReport::Succeeded {
          transaction_id: resource.id.clone(),
          amount_cents: amount.value_cents,
          details: raw,
        })
      }
      "PAYMENT.CAPTURE.DENIED" | "PAYMENT.CAPTURE.DECLINED" => Some(ProcessorReport::Failed {
        transaction_id: Some(resource.id.clone()),
        reason: resource
          .status_details
          .as_ref()
          .map(|d| d.reason.clone())
          .unwrap_or_else(|| "capture_denied".to_string()),
        details: raw,
      }),
      _ => None,
    };
    if report.is_some() && resource.custom_id.is_none() {
      return Err(ProcessorError::MalformedEvent(format!(
        "event {} carries no resource.custom_id",
        event.id
      )));
    }

    Ok(WebhookEvent {
      event_id: event.id,
      event_type: event.event_type,
      order_id: resource.custom_id,
      report,
    })
  }
}
