// storefront/src/models/order_item.rs

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  /// Catalog reference, not a foreign key.
  pub product_id: Uuid,
  pub quantity: i32,
  /// Unit price captured by the inventory check.
  pub price_cents: i64,
}

impl OrderItem {
  pub fn line_total_cents(&self) -> Option<i64> {
    self.price_cents.checked_mul(i64::from(self.quantity))
  }
}
