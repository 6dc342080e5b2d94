// storefront/src/models/outbox.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SqlxType)]
#[sqlx(type_name = "outbox_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
  Pending,
  Resolved,
  Abandoned,
  /// Withdrawn because the order was cancelled before the decrement applied.
  Cancelled,
}

/// A catalog decrement that did not apply after checkout and still has to be
/// reconciled.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DecrementOutboxEntry {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub reason: String,
  pub attempts: i32,
  pub last_error: Option<String>,
  pub status: OutboxStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDecrementFailure {
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub reason: String,
}
