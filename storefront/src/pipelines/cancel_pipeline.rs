// storefront/src/pipelines/cancel_pipeline.rs

//! Order cancellation. Pending orders are simply cancelled; confirmed orders
//! are refunded first. Stock is returned afterwards, except for decrements
//! that were still waiting in the outbox.

use crate::errors::AppError;
use crate::models::order::OrderStatus;
use crate::models::payment::PaymentStatus;
use crate::pipelines::common_steps;
use crate::pipelines::contexts::CancelCtxData;
use crate::state::AppState;
use serde_json::json;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;
use waypoint::{Control, Ctx, Flow, Registry, StepPolicy};

pub fn register_cancel_pipeline(registry: &Registry<AppError>, _app_state: &AppState) {
  let mut p = Flow::<CancelCtxData, AppError>::new(
    "order_cancellation",
    &[
      ("load_order", StepPolicy::Required),
      ("refund_payment", StepPolicy::Required),
      ("cancel_order", StepPolicy::Required),
      ("restock_items", StepPolicy::BestEffort),
    ],
  );

  p.skip_when(
    "refund_payment",
    std::sync::Arc::new(|ctx: Ctx<CancelCtxData>| {
      ctx.read().order.as_ref().map(|o| o.status) == Some(OrderStatus::Pending)
    }),
  );

  p.on("load_order", |ctx: Ctx<CancelCtxData>| {
    Box::pin(async move {
      let (orders, user_id, order_id) = {
        let guard = ctx.read();
        (guard.app_state.orders.clone(), guard.user_id, guard.order_id)
      };
      let (order, payment) = common_steps::load_owned_order(orders.as_ref(), user_id, order_id).await?;

      let refundable = order.status == OrderStatus::Confirmed && payment.status == PaymentStatus::Completed;
      if order.status != OrderStatus::Pending && !refundable {
        return Err(AppError::InvalidState(format!(
          "Order {} is {} with payment {} and cannot be cancelled",
          order.id, order.status, payment.status
        )));
      }
      let mut guard = ctx.write();
      guard.order = Some(order);
      guard.payment = Some(payment);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("refund_payment", |ctx: Ctx<CancelCtxData>| {
    Box::pin(async move {
      let (processor, transaction_id, amount_cents, method) = {
        let guard = ctx.read();
        let Some(payment) = &guard.payment else {
          return Err(AppError::Internal("refund_payment ran before load_order".to_string()));
        };
        let (Some(method), Some(transaction_id)) = (payment.payment_method, payment.transaction_id.clone()) else {
          return Err(AppError::InvalidState(format!(
            "Completed payment {} has no processor reference to refund",
            payment.id
          )));
        };
        let processor = guard
          .app_state
          .processors
          .get(method)
          .ok_or_else(|| AppError::UnsupportedPaymentMethod(method.to_string()))?;
        (processor, transaction_id, payment.amount_cents, method)
      };

      let receipt = processor.refund(&transaction_id, amount_cents).await.map_err(|e| {
        warn!(transaction_id = %transaction_id, error = %e, "Refund refused by processor.");
        AppError::PaymentProcessor(e.to_string())
      })?;
      info!(refund_id = %receipt.refund_id, amount_cents = receipt.amount_cents, "Payment refunded.");
      ctx.write().refund_details = Some(json!({
        "method": method,
        "refundId": receipt.refund_id,
        "refundedAmountCents": receipt.amount_cents,
        "processor": receipt.details,
      }));
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("cancel_order", |ctx: Ctx<CancelCtxData>| {
    Box::pin(async move {
      let (orders, order_id, refund) = {
        let guard = ctx.read();
        (guard.app_state.orders.clone(), guard.order_id, guard.refund_details.clone())
      };
      let cancelled = orders.cancel_order(order_id, refund).await?;
      info!(%order_id, withdrawn = cancelled.withdrawn_decrements.len(), "Order cancelled.");
      let mut guard = ctx.write();
      guard.cancelled = Some(cancelled.order);
      guard.withdrawn_decrements = cancelled.withdrawn_decrements;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("restock_items", |ctx: Ctx<CancelCtxData>| {
    Box::pin(async move {
      let (orders, catalog, order_id, mut never_taken) = {
        let guard = ctx.read();
        let mut never_taken: HashMap<Uuid, i32> = HashMap::new();
        for entry in &guard.withdrawn_decrements {
          *never_taken.entry(entry.product_id).or_default() += entry.quantity;
        }
        (guard.app_state.orders.clone(), guard.app_state.catalog.clone(), guard.order_id, never_taken)
      };
      let mut failures = 0;
      for item in orders.find_items(order_id).await? {
        let withheld = never_taken.get_mut(&item.product_id).map(|q| {
          let taken = (*q).min(item.quantity);
          *q -= taken;
          taken
        });
        let quantity = item.quantity - withheld.unwrap_or(0);
        if quantity <= 0 {
          continue;
        }
        match catalog.restock(item.product_id, quantity).await {
          Ok(true) => {}
          Ok(false) => {
            failures += 1;
            warn!(%order_id, product_id = %item.product_id, quantity, "Restock skipped: product no longer exists.");
          }
          Err(e) => {
            failures += 1;
            warn!(%order_id, product_id = %item.product_id, quantity, error = %e, "Restock failed.");
          }
        }
      }
      ctx.write().restock_failures = failures;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  registry.register(p);
}
