// storefront/src/pipelines/confirmation_pipeline.rs

//! Client-submitted payment confirmation.

use crate::errors::AppError;
use crate::models::order::OrderStatus;
use crate::models::payment::PaymentStatus;
use crate::models::settlement::{NoOpReason, ProcessorReport, SettleOutcome, SettleResult};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::ConfirmCtxData;
use crate::state::AppState;
use std::sync::Arc;
use tracing::{info, warn};
use waypoint::{Control, Ctx, Flow, Registry, StepPolicy};

pub fn register_confirmation_pipeline(registry: &Registry<AppError>, _app_state: &AppState) {
  let mut p = Flow::<ConfirmCtxData, AppError>::new(
    "payment_confirmation",
    &[
      ("resolve_method", StepPolicy::Required),
      ("load_order", StepPolicy::Required),
      ("short_circuit_if_settled", StepPolicy::Required),
      ("check_intent", StepPolicy::Required),
      ("confirm_and_settle", StepPolicy::Required),
    ],
  );

  p.on("resolve_method", |ctx: Ctx<ConfirmCtxData>| {
    Box::pin(async move {
      let (method, processor) = {
        let guard = ctx.read();
        common_steps::resolve_processor(&guard.app_state, &guard.requested_method)?
      };
      let mut guard = ctx.write();
      guard.method = Some(method);
      guard.processor = Some(processor);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("load_order", |ctx: Ctx<ConfirmCtxData>| {
    Box::pin(async move {
      let (orders, user_id, order_id) = {
        let guard = ctx.read();
        (guard.app_state.orders.clone(), guard.user_id, guard.order_id)
      };
      let (order, payment) = common_steps::load_owned_order(orders.as_ref(), user_id, order_id).await?;
      let mut guard = ctx.write();
      guard.order = Some(order);
      guard.payment = Some(payment);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  // A completed payment answers every repeat confirmation with its current state.
  p.on("short_circuit_if_settled", |ctx: Ctx<ConfirmCtxData>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      let (Some(order), Some(payment)) = (&guard.order, &guard.payment) else {
        return Err(AppError::Internal("short_circuit_if_settled ran before load_order".to_string()));
      };
      if payment.status != PaymentStatus::Completed {
        return Ok(Control::Continue);
      }
      info!(order_id = %order.id, "Payment already completed; confirmation is a no-op.");
      let result = SettleResult {
        outcome: SettleOutcome::NoOp(NoOpReason::AlreadyCompleted),
        order_status: order.status,
        payment_status: payment.status,
      };
      guard.result = Some(result);
      Ok::<_, AppError>(Control::Stop)
    })
  });

  p.on("check_intent", |ctx: Ctx<ConfirmCtxData>| {
    Box::pin(async move {
      let guard = ctx.read();
      let (Some(order), Some(payment), Some(method)) = (&guard.order, &guard.payment, guard.method) else {
        return Err(AppError::Internal("check_intent ran before load_order".to_string()));
      };
      if order.status != OrderStatus::Pending {
        return Err(AppError::InvalidState(format!(
          "Order {} is {} and can no longer be paid",
          order.id, order.status
        )));
      }
      if !payment.status.is_open() {
        return Err(AppError::InvalidState(format!(
          "Payment for order {} is {}",
          order.id, payment.status
        )));
      }
      if payment.transaction_id.is_none() {
        return Err(AppError::InvalidState(format!(
          "No payment intent exists for order {}",
          order.id
        )));
      }
      if payment.payment_method != Some(method) {
        return Err(AppError::Validation(format!(
          "Payment for order {} was started with {}, not {}",
          order.id,
          payment.payment_method.map(|m| m.as_str()).unwrap_or("no method"),
          method
        )));
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("confirm_and_settle", |ctx: Ctx<ConfirmCtxData>| {
    Box::pin(async move {
      let (orders, processor, order_id, reference, payment_data) = {
        let guard = ctx.read();
        let (Some(processor), Some(payment)) = (&guard.processor, &guard.payment) else {
          return Err(AppError::Internal("confirm_and_settle ran before check_intent".to_string()));
        };
        (
          guard.app_state.orders.clone(),
          Arc::clone(processor),
          guard.order_id,
          payment.transaction_id.clone().unwrap_or_default(),
          guard.payment_data.clone(),
        )
      };

      // A refused confirmation is a failed attempt, recorded like a decline.
      let report = match processor.confirm(&reference, &payment_data).await {
        Ok(report) => report,
        Err(e) => {
          warn!(%order_id, error = %e, "Processor rejected the confirmation.");
          ProcessorReport::Failed {
            transaction_id: None,
            reason: "processor_rejected".to_string(),
            details: serde_json::json!({ "message": e.to_string() }),
          }
        }
      };
      let failure_details = match &report {
        ProcessorReport::Failed { reason, details, .. } => Some(serde_json::json!({
          "reason": reason,
          "processor": details,
        })),
        ProcessorReport::Succeeded { .. } => None,
      };

      let result = common_steps::apply_settlement(orders.as_ref(), order_id, &report, None).await?;
      let mut guard = ctx.write();
      guard.result = Some(result);
      if result.outcome == SettleOutcome::Failed && failure_details.is_none() {
        guard.failure_details = Some(serde_json::json!({ "reason": "amount_mismatch" }));
      } else {
        guard.failure_details = failure_details;
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  registry.register(p);
}
