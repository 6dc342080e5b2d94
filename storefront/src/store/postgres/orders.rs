// storefront/src/store/postgres/orders.rs

use crate::errors::{AppError, Result};
use crate::models::order::{Order, OrderStatus};
use crate::models::order_item::OrderItem;
use crate::models::outbox::{DecrementOutboxEntry, NewDecrementFailure, OutboxStatus};
use crate::models::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::models::settlement::{
  decide, ProcessorReport, SettleOutcome, SettleResult, Settlement, SettlementInput, WebhookEventKey,
};
use crate::store::{CancelledOrder, NewOrder, OrderAggregate, OrderStore};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const ORDER_COLUMNS: &str =
  "id, user_id, total_amount_cents, currency, status, shipping_address, tracking_number, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, price_cents";
const PAYMENT_COLUMNS: &str =
  "id, order_id, payment_method, amount_cents, status, transaction_id, payment_details, created_at, updated_at";
const OUTBOX_COLUMNS: &str =
  "id, order_id, product_id, quantity, reason, attempts, last_error, status, created_at, updated_at";

#[derive(Clone)]
pub struct PgOrderStore {
  pool: PgPool,
}

impl PgOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  async fn insert_aggregate(&self, new_order: &NewOrder) -> std::result::Result<OrderAggregate, sqlx::Error> {
    let mut tx = self.pool.begin().await?;

    let order: Order = sqlx::query_as(&format!(
      "INSERT INTO orders (id, user_id, total_amount_cents, currency, status, shipping_address) \
       VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
      ORDER_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(new_order.user_id)
    .bind(new_order.total_amount_cents)
    .bind(&new_order.currency)
    .bind(OrderStatus::Pending)
    .bind(Json(&new_order.shipping_address))
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(new_order.lines.len());
    for line in &new_order.lines {
      let item: OrderItem = sqlx::query_as(&format!(
        "INSERT INTO order_items (id, order_id, product_id, quantity, price_cents) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {}",
        ITEM_COLUMNS
      ))
      .bind(Uuid::new_v4())
      .bind(order.id)
      .bind(line.product_id)
      .bind(line.quantity)
      .bind(line.price_cents)
      .fetch_one(&mut *tx)
      .await?;
      items.push(item);
    }

    let payment: Payment = sqlx::query_as(&format!(
      "INSERT INTO payments (id, order_id, payment_method, amount_cents, status) \
       VALUES ($1, $2, $3, $4, $5) RETURNING {}",
      PAYMENT_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(order.id)
    .bind(new_order.payment_method)
    .bind(order.total_amount_cents)
    .bind(PaymentStatus::Pending)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(OrderAggregate { order, items, payment })
  }

  async fn lock_payment(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> Result<Payment> {
    let payment: Option<Payment> = sqlx::query_as(&format!(
      "SELECT {} FROM payments WHERE order_id = $1 FOR UPDATE",
      PAYMENT_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?;
    payment.ok_or_else(|| AppError::NotFound(format!("Payment for order {} not found", order_id)))
  }

  async fn lock_order_status(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> Result<OrderStatus> {
    let status: Option<OrderStatus> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
      .bind(order_id)
      .fetch_optional(&mut **tx)
      .await?;
    status.ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))
  }
}

#[async_trait]
impl OrderStore for PgOrderStore {
  #[instrument(name = "pg::create_order_aggregate", skip(self, new_order), fields(user_id = %new_order.user_id, lines = new_order.lines.len()))]
  async fn create_order_aggregate(&self, new_order: NewOrder) -> Result<OrderAggregate> {
    match self.insert_aggregate(&new_order).await {
      Ok(aggregate) => {
        info!(order_id = %aggregate.order.id, "Order aggregate committed.");
        Ok(aggregate)
      }
      Err(e) => {
        error!(error = %e, "Order aggregate transaction rolled back.");
        Err(AppError::Integrity(format!("Failed to persist order: {}", e)))
      }
    }
  }

  async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>> {
    let order = sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(order)
  }

  async fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    let orders = sqlx::query_as(&format!(
      "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
      ORDER_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(orders)
  }

  async fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
    let items = sqlx::query_as(&format!(
      "SELECT {} FROM order_items WHERE order_id = $1 ORDER BY product_id",
      ITEM_COLUMNS
    ))
    .bind(order_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(items)
  }

  async fn find_payment(&self, order_id: Uuid) -> Result<Option<Payment>> {
    let payment = sqlx::query_as(&format!("SELECT {} FROM payments WHERE order_id = $1", PAYMENT_COLUMNS))
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(payment)
  }

  #[instrument(name = "pg::attach_payment_intent", skip(self, reference), fields(payment_id = %payment_id, method = %method))]
  async fn attach_payment_intent(&self, payment_id: Uuid, method: PaymentMethod, reference: &str) -> Result<Payment> {
    let payment: Option<Payment> = sqlx::query_as(&format!(
      "UPDATE payments SET payment_method = $2, transaction_id = $3, updated_at = now() \
       WHERE id = $1 AND status IN ('pending', 'failed') RETURNING {}",
      PAYMENT_COLUMNS
    ))
    .bind(payment_id)
    .bind(method)
    .bind(reference)
    .fetch_optional(&self.pool)
    .await?;
    payment.ok_or_else(|| AppError::InvalidState(format!("Payment {} is no longer open", payment_id)))
  }

  #[instrument(name = "pg::settle_payment", skip(self, report, event), fields(order_id = %order_id))]
  async fn settle_payment(
    &self,
    order_id: Uuid,
    report: &ProcessorReport,
    event: Option<&WebhookEventKey>,
  ) -> Result<SettleResult> {
    let mut tx = self.pool.begin().await?;
    let order_status = Self::lock_order_status(&mut tx, order_id).await?;
    let payment = Self::lock_payment(&mut tx, order_id).await?;

    if let Some(key) = event {
      let inserted = sqlx::query(
        "INSERT INTO processed_webhook_events (processor, event_id, order_id) VALUES ($1, $2, $3) \
         ON CONFLICT (processor, event_id) DO NOTHING",
      )
      .bind(&key.processor)
      .bind(&key.event_id)
      .bind(order_id)
      .execute(&mut *tx)
      .await?
      .rows_affected();
      if inserted == 0 {
        info!(processor = %key.processor, event_id = %key.event_id, "Webhook event already processed.");
        return Ok(SettleResult {
          outcome: SettleOutcome::DuplicateEvent,
          order_status,
          payment_status: payment.status,
        });
      }
    }

    let decision = decide(
      SettlementInput {
        order_status,
        payment_status: payment.status,
        payment_amount_cents: payment.amount_cents,
        payment_transaction_id: payment.transaction_id.as_deref(),
      },
      report,
    );

    let result = match decision {
      Settlement::Complete {
        transaction_id,
        details,
        confirm_order,
      } => {
        sqlx::query(
          "UPDATE payments SET status = $2, transaction_id = $3, payment_details = $4, updated_at = now() WHERE id = $1",
        )
        .bind(payment.id)
        .bind(PaymentStatus::Completed)
        .bind(&transaction_id)
        .bind(Json(&details))
        .execute(&mut *tx)
        .await?;

        let mut new_order_status = order_status;
        if confirm_order {
          sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
            .bind(order_id)
            .bind(OrderStatus::Confirmed)
            .execute(&mut *tx)
            .await?;
          new_order_status = OrderStatus::Confirmed;
        }
        SettleResult {
          outcome: SettleOutcome::Completed,
          order_status: new_order_status,
          payment_status: PaymentStatus::Completed,
        }
      }
      Settlement::Fail {
        transaction_id,
        details,
      } => {
        sqlx::query(
          "UPDATE payments SET status = $2, transaction_id = $3, payment_details = $4, updated_at = now() WHERE id = $1",
        )
        .bind(payment.id)
        .bind(PaymentStatus::Failed)
        .bind(&transaction_id)
        .bind(Json(&details))
        .execute(&mut *tx)
        .await?;
        SettleResult {
          outcome: SettleOutcome::Failed,
          order_status,
          payment_status: PaymentStatus::Failed,
        }
      }
      Settlement::NoOp(reason) => SettleResult {
        outcome: SettleOutcome::NoOp(reason),
        order_status,
        payment_status: payment.status,
      },
    };

    tx.commit().await?;
    Ok(result)
  }

  #[instrument(name = "pg::cancel_order", skip(self, refund), fields(order_id = %order_id, refunded = refund.is_some()))]
  async fn cancel_order(&self, order_id: Uuid, refund: Option<Value>) -> Result<CancelledOrder> {
    let mut tx = self.pool.begin().await?;
    let order_status = Self::lock_order_status(&mut tx, order_id).await?;
    let payment = Self::lock_payment(&mut tx, order_id).await?;

    match &refund {
      None if order_status == OrderStatus::Pending => {}
      Some(details) if order_status == OrderStatus::Confirmed && payment.status == PaymentStatus::Completed => {
        sqlx::query("UPDATE payments SET status = $2, payment_details = $3, updated_at = now() WHERE id = $1")
          .bind(payment.id)
          .bind(PaymentStatus::Refunded)
          .bind(Json(details))
          .execute(&mut *tx)
          .await?;
      }
      _ => {
        warn!(status = %order_status, payment_status = %payment.status, "Order cannot be cancelled in its current state.");
        return Err(AppError::InvalidState(format!(
          "Order {} cannot be cancelled while {} with payment {}",
          order_id, order_status, payment.status
        )));
      }
    }

    let order: Order = sqlx::query_as(&format!(
      "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    ))
    .bind(order_id)
    .bind(OrderStatus::Cancelled)
    .fetch_one(&mut *tx)
    .await?;

    let withdrawn_decrements: Vec<DecrementOutboxEntry> = sqlx::query_as(&format!(
      "UPDATE inventory_decrement_outbox SET status = $2, updated_at = now() \
       WHERE order_id = $1 AND status IN ('pending', 'abandoned') RETURNING {}",
      OUTBOX_COLUMNS
    ))
    .bind(order_id)
    .bind(OutboxStatus::Cancelled)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    if !withdrawn_decrements.is_empty() {
      info!(withdrawn = withdrawn_decrements.len(), "Unapplied decrements withdrawn with the order.");
    }
    Ok(CancelledOrder {
      order,
      withdrawn_decrements,
    })
  }

  async fn record_decrement_failure(&self, failure: NewDecrementFailure) -> Result<DecrementOutboxEntry> {
    let entry = sqlx::query_as(&format!(
      "INSERT INTO inventory_decrement_outbox (id, order_id, product_id, quantity, reason, status) \
       VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
      OUTBOX_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(failure.order_id)
    .bind(failure.product_id)
    .bind(failure.quantity)
    .bind(&failure.reason)
    .bind(OutboxStatus::Pending)
    .fetch_one(&self.pool)
    .await?;
    Ok(entry)
  }

  async fn pending_decrements(&self, limit: i64) -> Result<Vec<DecrementOutboxEntry>> {
    let entries = sqlx::query_as(&format!(
      "SELECT {} FROM inventory_decrement_outbox WHERE status = $1 ORDER BY created_at ASC LIMIT $2",
      OUTBOX_COLUMNS
    ))
    .bind(OutboxStatus::Pending)
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;
    Ok(entries)
  }

  async fn resolve_decrement(&self, entry_id: Uuid) -> Result<bool> {
    let updated = sqlx::query(
      "UPDATE inventory_decrement_outbox SET status = $2, updated_at = now() WHERE id = $1 AND status = $3",
    )
    .bind(entry_id)
    .bind(OutboxStatus::Resolved)
    .bind(OutboxStatus::Pending)
    .execute(&self.pool)
    .await?;
    Ok(updated.rows_affected() == 1)
  }

  async fn fail_decrement_attempt(&self, entry_id: Uuid, error: &str, max_attempts: i32) -> Result<OutboxStatus> {
    let status: Option<OutboxStatus> = sqlx::query_scalar(
      "UPDATE inventory_decrement_outbox \
       SET attempts = attempts + 1, last_error = $2, updated_at = now(), \
           status = CASE WHEN attempts + 1 >= $3 THEN 'abandoned'::outbox_status ELSE status END \
       WHERE id = $1 AND status = 'pending'::outbox_status RETURNING status",
    )
    .bind(entry_id)
    .bind(error)
    .bind(max_attempts)
    .fetch_optional(&self.pool)
    .await?;
    if let Some(status) = status {
      return Ok(status);
    }

    let current: Option<OutboxStatus> = sqlx::query_scalar("SELECT status FROM inventory_decrement_outbox WHERE id = $1")
      .bind(entry_id)
      .fetch_optional(&self.pool)
      .await?;
    current.ok_or_else(|| AppError::NotFound(format!("Outbox entry {} not found", entry_id)))
  }
}
