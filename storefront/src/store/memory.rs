// storefront/src/store/memory.rs

//! In-process stores selected with `STORAGE_BACKEND=memory`. They follow the
//! same contracts as the Postgres stores, with one mutex standing in for the
//! transaction.

use crate::errors::{AppError, Result};
use crate::models::order::{Order, OrderStatus};
use crate::models::order_item::OrderItem;
use crate::models::outbox::{DecrementOutboxEntry, NewDecrementFailure, OutboxStatus};
use crate::models::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::models::product::{Decrement, Product};
use crate::models::settlement::{
  decide, ProcessorReport, SettleOutcome, SettleResult, Settlement, SettlementInput, WebhookEventKey,
};
use crate::store::{CancelledOrder, CatalogStore, NewOrder, OrderAggregate, OrderStore};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use sqlx::types::Json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Default)]
struct OrderTables {
  orders: HashMap<Uuid, Order>,
  items: Vec<OrderItem>,
  payments: HashMap<Uuid, Payment>,
  processed_events: HashSet<WebhookEventKey>,
  outbox: Vec<DecrementOutboxEntry>,
}

#[derive(Default)]
pub struct MemoryOrderStore {
  tables: Mutex<OrderTables>,
  fail_next_write: AtomicBool,
}

impl MemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes the next `create_order_aggregate` call fail as a rolled back
  /// transaction would.
  pub fn fail_next_write(&self) {
    self.fail_next_write.store(true, Ordering::SeqCst);
  }

  /// Moves an order along its fulfilment path, e.g. to `shipped`.
  pub fn set_order_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order> {
    let mut tables = self.tables.lock();
    let order = tables
      .orders
      .get_mut(&order_id)
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
    if !order.status.can_transition_to(status) {
      return Err(AppError::InvalidState(format!("{} -> {} is not allowed", order.status, status)));
    }
    order.status = status;
    order.updated_at = Utc::now();
    Ok(order.clone())
  }

  pub fn order_count(&self) -> usize {
    self.tables.lock().orders.len()
  }

  pub fn item_count(&self) -> usize {
    self.tables.lock().items.len()
  }

  pub fn payment_count(&self) -> usize {
    self.tables.lock().payments.len()
  }

  pub fn processed_event_count(&self) -> usize {
    self.tables.lock().processed_events.len()
  }

  /// Every outbox row regardless of status.
  pub fn decrement_outbox(&self) -> Vec<DecrementOutboxEntry> {
    self.tables.lock().outbox.clone()
  }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
  async fn create_order_aggregate(&self, new_order: NewOrder) -> Result<OrderAggregate> {
    if self.fail_next_write.swap(false, Ordering::SeqCst) {
      return Err(AppError::Integrity("Failed to persist order: simulated write failure".to_string()));
    }
    if let Some(line) = new_order.lines.iter().find(|l| l.quantity <= 0 || l.price_cents < 0) {
      return Err(AppError::Integrity(format!(
        "Failed to persist order: invalid line for product {}",
        line.product_id
      )));
    }

    let now = Utc::now();
    let order = Order {
      id: Uuid::new_v4(),
      user_id: new_order.user_id,
      total_amount_cents: new_order.total_amount_cents,
      currency: new_order.currency,
      status: OrderStatus::Pending,
      shipping_address: Json(new_order.shipping_address),
      tracking_number: None,
      created_at: now,
      updated_at: now,
    };
    let items: Vec<OrderItem> = new_order
      .lines
      .iter()
      .map(|line| OrderItem {
        id: Uuid::new_v4(),
        order_id: order.id,
        product_id: line.product_id,
        quantity: line.quantity,
        price_cents: line.price_cents,
      })
      .collect();
    let payment = Payment {
      id: Uuid::new_v4(),
      order_id: order.id,
      payment_method: new_order.payment_method,
      amount_cents: order.total_amount_cents,
      status: PaymentStatus::Pending,
      transaction_id: None,
      payment_details: None,
      created_at: now,
      updated_at: now,
    };

    let mut tables = self.tables.lock();
    tables.orders.insert(order.id, order.clone());
    tables.items.extend(items.iter().cloned());
    tables.payments.insert(order.id, payment.clone());
    Ok(OrderAggregate { order, items, payment })
  }

  async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>> {
    Ok(self.tables.lock().orders.get(&order_id).cloned())
  }

  async fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    let mut orders: Vec<Order> = self
      .tables
      .lock()
      .orders
      .values()
      .filter(|o| o.user_id == user_id)
      .cloned()
      .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(orders)
  }

  async fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
    Ok(
      self
        .tables
        .lock()
        .items
        .iter()
        .filter(|i| i.order_id == order_id)
        .cloned()
        .collect(),
    )
  }

  async fn find_payment(&self, order_id: Uuid) -> Result<Option<Payment>> {
    Ok(self.tables.lock().payments.get(&order_id).cloned())
  }

  async fn attach_payment_intent(&self, payment_id: Uuid, method: PaymentMethod, reference: &str) -> Result<Payment> {
    let mut tables = self.tables.lock();
    let payment = tables
      .payments
      .values_mut()
      .find(|p| p.id == payment_id && p.status.is_open())
      .ok_or_else(|| AppError::InvalidState(format!("Payment {} is no longer open", payment_id)))?;
    payment.payment_method = Some(method);
    payment.transaction_id = Some(reference.to_string());
    payment.updated_at = Utc::now();
    Ok(payment.clone())
  }

  async fn settle_payment(
    &self,
    order_id: Uuid,
    report: &ProcessorReport,
    event: Option<&WebhookEventKey>,
  ) -> Result<SettleResult> {
    let mut guard = self.tables.lock();
    let tables = &mut *guard;
    let order = tables
      .orders
      .get_mut(&order_id)
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
    let payment = tables
      .payments
      .get_mut(&order_id)
      .ok_or_else(|| AppError::NotFound(format!("Payment for order {} not found", order_id)))?;

    if let Some(key) = event {
      if !tables.processed_events.insert(key.clone()) {
        return Ok(SettleResult {
          outcome: SettleOutcome::DuplicateEvent,
          order_status: order.status,
          payment_status: payment.status,
        });
      }
    }

    let decision = decide(
      SettlementInput {
        order_status: order.status,
        payment_status: payment.status,
        payment_amount_cents: payment.amount_cents,
        payment_transaction_id: payment.transaction_id.as_deref(),
      },
      report,
    );

    let now = Utc::now();
    let outcome = match decision {
      Settlement::Complete {
        transaction_id,
        details,
        confirm_order,
      } => {
        payment.status = PaymentStatus::Completed;
        payment.transaction_id = Some(transaction_id);
        payment.payment_details = Some(Json(details));
        payment.updated_at = now;
        if confirm_order {
          order.status = OrderStatus::Confirmed;
          order.updated_at = now;
        }
        SettleOutcome::Completed
      }
      Settlement::Fail {
        transaction_id,
        details,
      } => {
        payment.status = PaymentStatus::Failed;
        payment.transaction_id = transaction_id;
        payment.payment_details = Some(Json(details));
        payment.updated_at = now;
        SettleOutcome::Failed
      }
      Settlement::NoOp(reason) => SettleOutcome::NoOp(reason),
    };

    Ok(SettleResult {
      outcome,
      order_status: order.status,
      payment_status: payment.status,
    })
  }

  async fn cancel_order(&self, order_id: Uuid, refund: Option<Value>) -> Result<CancelledOrder> {
    let mut guard = self.tables.lock();
    let tables = &mut *guard;
    let order = tables
      .orders
      .get_mut(&order_id)
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
    let payment = tables
      .payments
      .get_mut(&order_id)
      .ok_or_else(|| AppError::NotFound(format!("Payment for order {} not found", order_id)))?;

    let now = Utc::now();
    match refund {
      None if order.status == OrderStatus::Pending => {}
      Some(details) if order.status == OrderStatus::Confirmed && payment.status == PaymentStatus::Completed => {
        payment.status = PaymentStatus::Refunded;
        payment.payment_details = Some(Json(details));
        payment.updated_at = now;
      }
      _ => {
        return Err(AppError::InvalidState(format!(
          "Order {} cannot be cancelled while {} with payment {}",
          order_id, order.status, payment.status
        )));
      }
    }
    order.status = OrderStatus::Cancelled;
    order.updated_at = now;
    let order = order.clone();

    let mut withdrawn_decrements = Vec::new();
    for entry in tables.outbox.iter_mut().filter(|e| e.order_id == order_id) {
      if matches!(entry.status, OutboxStatus::Pending | OutboxStatus::Abandoned) {
        entry.status = OutboxStatus::Cancelled;
        entry.updated_at = now;
        withdrawn_decrements.push(entry.clone());
      }
    }
    Ok(CancelledOrder {
      order,
      withdrawn_decrements,
    })
  }

  async fn record_decrement_failure(&self, failure: NewDecrementFailure) -> Result<DecrementOutboxEntry> {
    let now = Utc::now();
    let entry = DecrementOutboxEntry {
      id: Uuid::new_v4(),
      order_id: failure.order_id,
      product_id: failure.product_id,
      quantity: failure.quantity,
      reason: failure.reason,
      attempts: 0,
      last_error: None,
      status: OutboxStatus::Pending,
      created_at: now,
      updated_at: now,
    };
    self.tables.lock().outbox.push(entry.clone());
    Ok(entry)
  }

  async fn pending_decrements(&self, limit: i64) -> Result<Vec<DecrementOutboxEntry>> {
    let limit = usize::try_from(limit).unwrap_or(0);
    Ok(
      self
        .tables
        .lock()
        .outbox
        .iter()
        .filter(|e| e.status == OutboxStatus::Pending)
        .take(limit)
        .cloned()
        .collect(),
    )
  }

  async fn resolve_decrement(&self, entry_id: Uuid) -> Result<bool> {
    let mut tables = self.tables.lock();
    match tables.outbox.iter_mut().find(|e| e.id == entry_id) {
      Some(entry) if entry.status == OutboxStatus::Pending => {
        entry.status = OutboxStatus::Resolved;
        entry.updated_at = Utc::now();
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn fail_decrement_attempt(&self, entry_id: Uuid, error: &str, max_attempts: i32) -> Result<OutboxStatus> {
    let mut tables = self.tables.lock();
    let entry = tables
      .outbox
      .iter_mut()
      .find(|e| e.id == entry_id)
      .ok_or_else(|| AppError::NotFound(format!("Outbox entry {} not found", entry_id)))?;
    if entry.status != OutboxStatus::Pending {
      return Ok(entry.status);
    }
    entry.attempts += 1;
    entry.last_error = Some(error.to_string());
    entry.updated_at = Utc::now();
    if entry.attempts >= max_attempts {
      entry.status = OutboxStatus::Abandoned;
    }
    Ok(entry.status)
  }
}

#[derive(Default)]
pub struct MemoryCatalogStore {
  products: Mutex<HashMap<Uuid, Product>>,
  unavailable: AtomicBool,
}

impl MemoryCatalogStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// While set, inventory decrements fail the way a lost catalog
  /// connection would.
  pub fn set_unavailable(&self, unavailable: bool) {
    self.unavailable.store(unavailable, Ordering::SeqCst);
  }

  pub fn inventory_of(&self, product_id: Uuid) -> Option<i32> {
    self.products.lock().get(&product_id).map(|p| p.inventory)
  }

  pub fn remove_product(&self, product_id: Uuid) -> Option<Product> {
    self.products.lock().remove(&product_id)
  }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
  async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>> {
    Ok(self.products.lock().get(&product_id).cloned())
  }

  async fn find_products(&self, product_ids: &[Uuid]) -> Result<Vec<Product>> {
    let products = self.products.lock();
    Ok(product_ids.iter().filter_map(|id| products.get(id).cloned()).collect())
  }

  async fn list_products(&self) -> Result<Vec<Product>> {
    let mut products: Vec<Product> = self.products.lock().values().cloned().collect();
    products.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(products)
  }

  async fn decrement_inventory(&self, product_id: Uuid, quantity: i32) -> Result<Decrement> {
    if self.unavailable.load(Ordering::SeqCst) {
      return Err(AppError::Internal("catalog store unavailable".to_string()));
    }
    let mut products = self.products.lock();
    let Some(product) = products.get_mut(&product_id) else {
      return Ok(Decrement::NotFound);
    };
    if product.inventory < quantity {
      return Ok(Decrement::Insufficient {
        available: product.inventory,
      });
    }
    product.inventory -= quantity;
    product.updated_at = Utc::now();
    Ok(Decrement::Applied {
      remaining: product.inventory,
    })
  }

  async fn restock(&self, product_id: Uuid, quantity: i32) -> Result<bool> {
    let mut products = self.products.lock();
    match products.get_mut(&product_id) {
      Some(product) => {
        product.inventory += quantity;
        product.updated_at = Utc::now();
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn upsert_product(&self, product: &Product) -> Result<()> {
    self.products.lock().insert(product.id, product.clone());
    Ok(())
  }
}
