// storefront/src/pipelines/common_steps.rs

//! Lookups and the settlement step shared by several flows.

use crate::errors::{AppError, Result as AppResult};
use crate::models::order::{Order, OrderStatus};
use crate::models::payment::{Payment, PaymentMethod};
use crate::models::settlement::{ProcessorReport, SettleOutcome, SettleResult, WebhookEventKey};
use crate::services::payment::PaymentProcessor;
use crate::state::AppState;
use crate::store::OrderStore;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Maps a client-supplied method name to a configured processor. Unknown and
/// unconfigured methods are both rejected before any processor is contacted.
pub fn resolve_processor(app_state: &AppState, requested: &str) -> AppResult<(PaymentMethod, Arc<dyn PaymentProcessor>)> {
  let method: PaymentMethod = requested
    .parse()
    .map_err(AppError::UnsupportedPaymentMethod)?;
  let processor = app_state
    .processors
    .get(method)
    .ok_or_else(|| AppError::UnsupportedPaymentMethod(method.to_string()))?;
  Ok((method, processor))
}

/// Loads an order and its payment on behalf of `user_id`. Orders owned by
/// someone else look exactly like missing ones.
#[instrument(name = "common_step::load_owned_order", skip(orders))]
pub async fn load_owned_order(orders: &dyn OrderStore, user_id: Uuid, order_id: Uuid) -> AppResult<(Order, Payment)> {
  let not_found = || AppError::NotFound(format!("Order {} not found", order_id));
  let order = orders.find_order(order_id).await?.ok_or_else(not_found)?;
  if order.user_id != user_id {
    warn!(owner = %order.user_id, "Order requested by a user who does not own it.");
    return Err(not_found());
  }
  let payment = orders
    .find_payment(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Payment for order {} not found", order_id)))?;
  Ok((order, payment))
}

/// Applies a processor report to an order's payment.
#[instrument(name = "common_step::apply_settlement", skip(orders, report, event), fields(event_id = event.map(|e| e.event_id.as_str())))]
pub async fn apply_settlement(
  orders: &dyn OrderStore,
  order_id: Uuid,
  report: &ProcessorReport,
  event: Option<&WebhookEventKey>,
) -> AppResult<SettleResult> {
  let result = orders.settle_payment(order_id, report, event).await.map_err(|e| {
    error!(error = %e, "Settlement could not be applied.");
    e
  })?;

  match result.outcome {
    SettleOutcome::Completed if result.order_status == OrderStatus::Cancelled => {
      warn!(
        transaction_id = ?report.transaction_id(),
        "Payment completed for a cancelled order; a refund has to be issued manually."
      );
    }
    SettleOutcome::Completed => info!(order_status = %result.order_status, "Payment completed."),
    SettleOutcome::Failed => info!("Payment attempt failed; order stays open for retry."),
    SettleOutcome::NoOp(reason) => info!(?reason, payment_status = %result.payment_status, "Settlement was a no-op."),
    SettleOutcome::DuplicateEvent => info!("Duplicate webhook delivery ignored."),
  }
  Ok(result)
}
