// storefront/src/pipelines/intent_pipeline.rs

//! Payment intent initiation for an existing order.

use crate::errors::AppError;
use crate::models::order::OrderStatus;
use crate::pipelines::common_steps;
use crate::pipelines::contexts::IntentCtxData;
use crate::services::payment::IntentRequest;
use crate::state::AppState;
use tracing::{info, warn};
use waypoint::{Control, Ctx, Flow, Registry, StepPolicy};

pub fn register_intent_pipeline(registry: &Registry<AppError>, _app_state: &AppState) {
  let mut p = Flow::<IntentCtxData, AppError>::new(
    "payment_intent",
    &[
      ("resolve_method", StepPolicy::Required),
      ("load_order", StepPolicy::Required),
      ("check_state", StepPolicy::Required),
      ("create_intent", StepPolicy::Required),
      ("persist_reference", StepPolicy::Required),
    ],
  );

  // Unsupported methods are rejected before anything else is touched.
  p.on("resolve_method", |ctx: Ctx<IntentCtxData>| {
    Box::pin(async move {
      let resolved = {
        let guard = ctx.read();
        common_steps::resolve_processor(&guard.app_state, &guard.requested_method)
      };
      let (method, processor) = resolved.map_err(|e| {
        warn!(error = %e, "Intent requested with an unsupported payment method.");
        e
      })?;
      let mut guard = ctx.write();
      guard.method = Some(method);
      guard.processor = Some(processor);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("load_order", |ctx: Ctx<IntentCtxData>| {
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

  p.on("check_state", |ctx: Ctx<IntentCtxData>| {
    Box::pin(async move {
      let guard = ctx.read();
      let (Some(order), Some(payment)) = (&guard.order, &guard.payment) else {
        return Err(AppError::Internal("check_state ran before load_order".to_string()));
      };
      if order.status != OrderStatus::Pending {
        return Err(AppError::InvalidState(format!(
          "Order {} is {}; payment can only be started for pending orders",
          order.id, order.status
        )));
      }
      if !payment.status.is_open() {
        return Err(AppError::InvalidState(format!(
          "Payment for order {} is already {}",
          order.id, payment.status
        )));
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("create_intent", |ctx: Ctx<IntentCtxData>| {
    Box::pin(async move {
      let (processor, request) = {
        let guard = ctx.read();
        let (Some(processor), Some(order), Some(payment)) = (&guard.processor, &guard.order, &guard.payment) else {
          return Err(AppError::Internal("create_intent ran before its inputs were loaded".to_string()));
        };
        let request = IntentRequest {
          order_id: order.id,
          amount_cents: payment.amount_cents,
          currency: order.currency.clone(),
        };
        (processor.clone(), request)
      };

      let intent = processor.create_intent(&request).await.map_err(|e| {
        warn!(order_id = %request.order_id, error = %e, "Processor refused to create an intent.");
        AppError::PaymentInitiationFailed(e.to_string())
      })?;
      ctx.write().intent = Some(intent);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("persist_reference", |ctx: Ctx<IntentCtxData>| {
    Box::pin(async move {
      let (orders, payment_id, method, reference) = {
        let guard = ctx.read();
        let (Some(payment), Some(method), Some(intent)) = (&guard.payment, guard.method, &guard.intent) else {
          return Err(AppError::Internal("persist_reference ran before create_intent".to_string()));
        };
        (guard.app_state.orders.clone(), payment.id, method, intent.reference.clone())
      };

      let payment = orders.attach_payment_intent(payment_id, method, &reference).await?;
      info!(payment_id = %payment.id, method = %method, reference = %reference, "Payment intent attached.");
      ctx.write().payment = Some(payment);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  registry.register(p);
}
