// storefront/src/store/mod.rs

//! Storage seams for the order workflow.
//!
//! [`OrderStore`] is the relational store (orders, items, payments and the
//! bookkeeping tables). [`CatalogStore`] is the product catalog, which the
//! workflow reads and decrements but never writes transactionally with orders.

pub mod memory;
pub mod postgres;

use crate::errors::Result;
use crate::models::address::ShippingAddress;
use crate::models::order::Order;
use crate::models::order_item::OrderItem;
use crate::models::outbox::{DecrementOutboxEntry, NewDecrementFailure, OutboxStatus};
use crate::models::payment::{Payment, PaymentMethod};
use crate::models::product::{Decrement, Product};
use crate::models::settlement::{ProcessorReport, SettleResult, WebhookEventKey};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewOrderLine {
  pub product_id: Uuid,
  pub quantity: i32,
  pub price_cents: i64,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
  pub user_id: Uuid,
  pub currency: String,
  pub total_amount_cents: i64,
  pub shipping_address: ShippingAddress,
  pub payment_method: Option<PaymentMethod>,
  pub lines: Vec<NewOrderLine>,
}

/// A cancelled order and the outbox rows withdrawn with it. Those
/// decrements never reached the catalog, so their stock must not be returned.
#[derive(Debug, Clone)]
pub struct CancelledOrder {
  pub order: Order,
  pub withdrawn_decrements: Vec<DecrementOutboxEntry>,
}

/// Rows written together at checkout.
#[derive(Debug, Clone, Serialize)]
pub struct OrderAggregate {
  pub order: Order,
  pub items: Vec<OrderItem>,
  pub payment: Payment,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Inserts the order, its items and its payment atomically. Any failure
  /// leaves no rows behind and is reported as `AppError::Integrity`.
  async fn create_order_aggregate(&self, new_order: NewOrder) -> Result<OrderAggregate>;

  async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>>;

  /// Newest first.
  async fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;

  async fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>>;

  async fn find_payment(&self, order_id: Uuid) -> Result<Option<Payment>>;

  /// Stores the processor reference and method on an open payment.
  /// Fails with `InvalidState` if the payment is no longer pending or failed.
  async fn attach_payment_intent(&self, payment_id: Uuid, method: PaymentMethod, reference: &str) -> Result<Payment>;

  /// Applies [`crate::models::settlement::decide`] under a row lock. When
  /// `event` is given it is recorded in the same transaction and a repeated
  /// key yields `SettleOutcome::DuplicateEvent` without any change.
  async fn settle_payment(
    &self,
    order_id: Uuid,
    report: &ProcessorReport,
    event: Option<&WebhookEventKey>,
  ) -> Result<SettleResult>;

  /// Cancels an order. Without `refund` the order must be pending; with it
  /// the order must be confirmed and its payment completed, and the payment
  /// becomes refunded with `refund` stored as its details. The order's pending
  /// and abandoned outbox rows move to `cancelled` in the same transaction.
  async fn cancel_order(&self, order_id: Uuid, refund: Option<Value>) -> Result<CancelledOrder>;

  async fn record_decrement_failure(&self, failure: NewDecrementFailure) -> Result<DecrementOutboxEntry>;

  /// Pending outbox rows, oldest first.
  async fn pending_decrements(&self, limit: i64) -> Result<Vec<DecrementOutboxEntry>>;

  /// Marks a pending row resolved. Returns false if the row had already left
  /// `pending`, e.g. because its order was cancelled meanwhile.
  async fn resolve_decrement(&self, entry_id: Uuid) -> Result<bool>;

  /// Counts a failed retry on a pending row. The row is abandoned once
  /// `attempts` reaches `max_attempts`. Returns the row's resulting status;
  /// rows no longer pending are returned unchanged.
  async fn fail_decrement_attempt(&self, entry_id: Uuid, error: &str, max_attempts: i32) -> Result<OutboxStatus>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
  async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>>;

  /// Products for the ids that exist; unknown ids are simply absent.
  async fn find_products(&self, product_ids: &[Uuid]) -> Result<Vec<Product>>;

  async fn list_products(&self) -> Result<Vec<Product>>;

  /// `inventory -= quantity` only if at least `quantity` is available.
  async fn decrement_inventory(&self, product_id: Uuid, quantity: i32) -> Result<Decrement>;

  /// Returns false if the product no longer exists.
  async fn restock(&self, product_id: Uuid, quantity: i32) -> Result<bool>;

  async fn upsert_product(&self, product: &Product) -> Result<()>;
}
