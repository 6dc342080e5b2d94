// storefront/src/models/order.rs

use crate::models::address::ShippingAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  /// pending -> confirmed -> shipped -> delivered, with cancelled reachable
  /// from pending or confirmed only.
  pub fn can_transition_to(self, next: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
      (self, next),
      (Pending, Confirmed) | (Confirmed, Shipped) | (Shipped, Delivered) | (Pending, Cancelled) | (Confirmed, Cancelled)
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Confirmed => "confirmed",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Cancelled => "cancelled",
    }
  }
}

impl std::fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub user_id: Uuid,
  pub total_amount_cents: i64,
  pub currency: String,
  pub status: OrderStatus,
  pub shipping_address: Json<ShippingAddress>,
  pub tracking_number: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::OrderStatus::*;

  #[test]
  fn forward_transitions_are_legal() {
    assert!(Pending.can_transition_to(Confirmed));
    assert!(Confirmed.can_transition_to(Shipped));
    assert!(Shipped.can_transition_to(Delivered));
  }

  #[test]
  fn cancellation_only_before_shipping() {
    assert!(Pending.can_transition_to(Cancelled));
    assert!(Confirmed.can_transition_to(Cancelled));
    assert!(!Shipped.can_transition_to(Cancelled));
    assert!(!Delivered.can_transition_to(Cancelled));
  }

  #[test]
  fn no_backward_or_skipping_transitions() {
    assert!(!Confirmed.can_transition_to(Pending));
    assert!(!Pending.can_transition_to(Shipped));
    assert!(!Delivered.can_transition_to(Shipped));
    assert!(!Cancelled.can_transition_to(Pending));
    assert!(!Pending.can_transition_to(Pending));
  }
}
