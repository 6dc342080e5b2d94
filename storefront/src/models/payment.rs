// storefront/src/models/payment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type as SqlxType};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
  Card,
  Wallet,
}

impl PaymentMethod {
  pub fn as_str(self) -> &'static str {
    match self {
      PaymentMethod::Card => "card",
      PaymentMethod::Wallet => "wallet",
    }
  }
}

impl FromStr for PaymentMethod {
  type Err = String;

  /// Unknown names come back as the `Err` value, untouched, so callers can
  /// name the rejected method.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "card" => Ok(PaymentMethod::Card),
      "wallet" => Ok(PaymentMethod::Wallet),
      _ => Err(s.to_string()),
    }
  }
}

impl std::fmt::Display for PaymentMethod {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Completed,
  Failed,
  Refunded,
}

impl PaymentStatus {
  /// Nothing ever returns to pending. A failed attempt may be retried.
  pub fn can_transition_to(self, next: PaymentStatus) -> bool {
    use PaymentStatus::*;
    matches!(
      (self, next),
      (Pending, Completed) | (Pending, Failed) | (Failed, Completed) | (Failed, Failed) | (Completed, Refunded)
    )
  }

  pub fn is_open(self) -> bool {
    matches!(self, PaymentStatus::Pending | PaymentStatus::Failed)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Completed => "completed",
      PaymentStatus::Failed => "failed",
      PaymentStatus::Refunded => "refunded",
    }
  }
}

impl std::fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
  pub id: Uuid,
  pub order_id: Uuid,
  pub payment_method: Option<PaymentMethod>,
  pub amount_cents: i64,
  pub status: PaymentStatus,
  /// Intent reference until the payment settles, then the processor's
  /// transaction id.
  pub transaction_id: Option<String>,
  pub payment_details: Option<Json<serde_json::Value>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_known_methods_case_insensitively() {
    assert_eq!("card".parse::<PaymentMethod>(), Ok(PaymentMethod::Card));
    assert_eq!(" Wallet ".parse::<PaymentMethod>(), Ok(PaymentMethod::Wallet));
    assert_eq!("crypto".parse::<PaymentMethod>(), Err("crypto".to_string()));
  }

  #[test]
  fn payment_status_never_returns_to_pending() {
    for from in [
      PaymentStatus::Pending,
      PaymentStatus::Completed,
      PaymentStatus::Failed,
      PaymentStatus::Refunded,
    ] {
      assert!(!from.can_transition_to(PaymentStatus::Pending));
    }
  }

  #[test]
  fn retry_after_failure_is_allowed() {
    assert!(PaymentStatus::Failed.can_transition_to(PaymentStatus::Completed));
    assert!(PaymentStatus::Failed.can_transition_to(PaymentStatus::Failed));
    assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Failed));
    assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Completed));
  }
}
