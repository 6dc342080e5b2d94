// storefront/src/pipelines/webhook_pipeline.rs

//! Processor webhooks. The signature is checked before anything in the
//! payload is trusted.

use crate::errors::AppError;
use crate::models::settlement::WebhookEventKey;
use crate::pipelines::common_steps;
use crate::pipelines::contexts::WebhookCtxData;
use crate::services::payment::ProcessorError;
use crate::state::AppState;
use std::sync::Arc;
use tracing::{info, warn};
use waypoint::{Control, Ctx, Flow, Registry, StepPolicy};

pub fn register_webhook_pipeline(registry: &Registry<AppError>, _app_state: &AppState) {
  let mut p = Flow::<WebhookCtxData, AppError>::new(
    "payment_webhook",
    &[
      ("resolve_processor", StepPolicy::Required),
      ("verify_signature", StepPolicy::Required),
      ("apply_settlement", StepPolicy::Required),
      ("acknowledge", StepPolicy::BestEffort),
    ],
  );

  // Events that do not report a payment outcome are acknowledged untouched.
  p.skip_when(
    "apply_settlement",
    Arc::new(|ctx: Ctx<WebhookCtxData>| ctx.read().event.as_ref().is_some_and(|e| e.report.is_none())),
  );

  p.on("resolve_processor", |ctx: Ctx<WebhookCtxData>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      let processor = guard.app_state.processors.by_name(&guard.processor_name).ok_or_else(|| {
        warn!(processor = %guard.processor_name, "Webhook for an unknown processor.");
        AppError::NotFound(format!("Unknown payment processor '{}'", guard.processor_name))
      })?;
      guard.processor = Some(processor);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("verify_signature", |ctx: Ctx<WebhookCtxData>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      let Some(processor) = guard.processor.clone() else {
        return Err(AppError::Internal("verify_signature ran before resolve_processor".to_string()));
      };
      let signature = guard
        .headers
        .get(processor.signature_header())
        .and_then(|v| v.to_str().ok());

      let event = processor.verify_webhook(&guard.payload, signature).map_err(|e| {
        warn!(processor = %processor.method(), error = %e, "Webhook rejected.");
        match e {
          ProcessorError::InvalidSignature(m) => AppError::InvalidSignature(m),
          other => AppError::Validation(other.to_string()),
        }
      })?;
      info!(event_id = %event.event_id, event_type = %event.event_type, "Webhook verified.");
      guard.event = Some(event);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("apply_settlement", |ctx: Ctx<WebhookCtxData>| {
    Box::pin(async move {
      let (orders, key, order_id, report) = {
        let guard = ctx.read();
        let (Some(processor), Some(event)) = (&guard.processor, &guard.event) else {
          return Err(AppError::Internal("apply_settlement ran before verify_signature".to_string()));
        };
        let (Some(order_id), Some(report)) = (event.order_id, event.report.clone()) else {
          return Err(AppError::Validation(format!(
            "Event {} does not reference an order",
            event.event_id
          )));
        };
        let key = WebhookEventKey {
          processor: processor.method().to_string(),
          event_id: event.event_id.clone(),
        };
        (guard.app_state.orders.clone(), key, order_id, report)
      };

      let result = common_steps::apply_settlement(orders.as_ref(), order_id, &report, Some(&key)).await?;
      ctx.write().result = Some(result);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("acknowledge", |ctx: Ctx<WebhookCtxData>| {
    Box::pin(async move {
      let guard = ctx.read();
      match (&guard.event, &guard.result) {
        (Some(event), Some(result)) => info!(
          event_id = %event.event_id,
          outcome = ?result.outcome,
          order_status = %result.order_status,
          payment_status = %result.payment_status,
          "Webhook processed."
        ),
        (Some(event), None) => info!(event_id = %event.event_id, event_type = %event.event_type, "Webhook event ignored."),
        _ => {}
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  registry.register(p);
}
