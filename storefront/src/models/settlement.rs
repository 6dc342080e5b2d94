// storefront/src/models/settlement.rs

//! The settlement decision shared by synchronous confirmation and webhooks.
//!
//! [`decide`] is pure: it looks at the current order and payment and at what
//! the processor reported, and says what should change. Stores apply the
//! decision inside their own transaction.

use crate::models::order::OrderStatus;
use crate::models::payment::PaymentStatus;
use serde::Serialize;
use serde_json::{json, Value};

/// What a processor said about a payment attempt, normalised across processors.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorReport {
  Succeeded {
    transaction_id: String,
    amount_cents: i64,
    details: Value,
  },
  Failed {
    transaction_id: Option<String>,
    reason: String,
    details: Value,
  },
}

impl ProcessorReport {
  pub fn transaction_id(&self) -> Option<&str> {
    match self {
      ProcessorReport::Succeeded { transaction_id, .. } => Some(transaction_id),
      ProcessorReport::Failed { transaction_id, .. } => transaction_id.as_deref(),
    }
  }
}

/// The change a store has to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
  /// Payment -> completed. The order is confirmed only when `confirm_order`.
  Complete {
    transaction_id: String,
    details: Value,
    confirm_order: bool,
  },
  /// Payment -> failed; the order stays as it is.
  Fail {
    transaction_id: Option<String>,
    details: Value,
  },
  /// Nothing to change.
  NoOp(NoOpReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
  AlreadyCompleted,
  AlreadyRefunded,
  StaleFailure,
}

/// Snapshot of the rows a decision is made against.
#[derive(Debug, Clone, Copy)]
pub struct SettlementInput<'a> {
  pub order_status: OrderStatus,
  pub payment_status: PaymentStatus,
  pub payment_amount_cents: i64,
  pub payment_transaction_id: Option<&'a str>,
}

pub fn decide(input: SettlementInput<'_>, report: &ProcessorReport) -> Settlement {
  let reported = match report {
    ProcessorReport::Succeeded { .. } => PaymentStatus::Completed,
    ProcessorReport::Failed { .. } => PaymentStatus::Failed,
  };
  if !input.payment_status.can_transition_to(reported) {
    return Settlement::NoOp(match (input.payment_status, reported) {
      (PaymentStatus::Completed, PaymentStatus::Completed) => NoOpReason::AlreadyCompleted,
      (PaymentStatus::Completed, _) => NoOpReason::StaleFailure,
      _ => NoOpReason::AlreadyRefunded,
    });
  }

  match report {
    ProcessorReport::Succeeded {
      transaction_id,
      amount_cents,
      details,
    } => {
      if *amount_cents != input.payment_amount_cents {
        return Settlement::Fail {
          transaction_id: Some(transaction_id.clone()),
          details: json!({
            "reason": "amount_mismatch",
            "expectedAmountCents": input.payment_amount_cents,
            "reportedAmountCents": amount_cents,
            "processor": details,
          }),
        };
      }
      Settlement::Complete {
        transaction_id: transaction_id.clone(),
        details: details.clone(),
        confirm_order: input.order_status.can_transition_to(OrderStatus::Confirmed),
      }
    }
    ProcessorReport::Failed {
      transaction_id,
      reason,
      details,
    } => Settlement::Fail {
      transaction_id: transaction_id.clone().or_else(|| input.payment_transaction_id.map(str::to_string)),
      details: json!({ "reason": reason, "processor": details }),
    },
  }
}

/// How a settlement request ended, as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleOutcome {
  Completed,
  Failed,
  NoOp(NoOpReason),
  DuplicateEvent,
}

/// State after a settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleResult {
  pub outcome: SettleOutcome,
  pub order_status: OrderStatus,
  pub payment_status: PaymentStatus,
}

/// Identifies a webhook delivery for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WebhookEventKey {
  pub processor: String,
  pub event_id: String,
}
