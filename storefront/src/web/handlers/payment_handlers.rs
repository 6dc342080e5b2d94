// storefront/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use waypoint::{Ctx, Outcome};

use crate::errors::AppError;
use crate::models::payment::PaymentStatus;
use crate::models::settlement::SettleOutcome;
use crate::pipelines::contexts::{ConfirmCtxData, IntentCtxData};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
  pub order_id: Uuid,
  pub payment_method: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
  pub order_id: Uuid,
  pub payment_method: String,
  #[serde(default)]
  pub payment_data: Value,
}

#[instrument(
  name = "handler::create_intent",
  skip(app_state, req_payload, auth_user),
  fields(user_id = %auth_user.user_id, order_id = %req_payload.order_id, method = %req_payload.payment_method)
)]
pub async fn create_intent_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CreateIntentRequest>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let req = req_payload.into_inner();
  let ctx = Ctx::new(IntentCtxData::new(
    app_state.get_ref().clone(),
    auth_user.user_id,
    req.order_id,
    req.payment_method,
  ));

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Completed) => {
      let guard = ctx.read();
      let (Some(intent), Some(payment)) = (&guard.intent, &guard.payment) else {
        return Err(AppError::Internal("Intent flow completed without an intent.".to_string()));
      };
      info!(reference = %intent.reference, "Payment intent ready.");
      Ok(HttpResponse::Ok().json(json!({
        "orderId": req.order_id,
        "paymentId": payment.id,
        "intent": intent,
      })))
    }
    Ok(Outcome::Stopped) => Err(AppError::Internal("Intent creation was halted unexpectedly.".to_string())),
    Err(app_err) => {
      warn!("Intent creation for order {} failed: {}", req.order_id, app_err);
      Err(app_err)
    }
  }
}

#[instrument(
  name = "handler::confirm_payment",
  skip(app_state, req_payload, auth_user),
  fields(user_id = %auth_user.user_id, order_id = %req_payload.order_id, method = %req_payload.payment_method)
)]
pub async fn confirm_payment_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<ConfirmPaymentRequest>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let req = req_payload.into_inner();
  let ctx = Ctx::new(ConfirmCtxData::new(
    app_state.get_ref().clone(),
    auth_user.user_id,
    req.order_id,
    req.payment_method,
    req.payment_data,
  ));

  // Stopped means the payment was already completed.
  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Completed) | Ok(Outcome::Stopped) => {
      let guard = ctx.read();
      let result = guard
        .result
        .ok_or_else(|| AppError::Internal("Confirmation finished without a result.".to_string()))?;

      let succeeded = result.payment_status == PaymentStatus::Completed
        && !matches!(result.outcome, SettleOutcome::Failed | SettleOutcome::DuplicateEvent);
      if succeeded {
        info!(order_status = %result.order_status, outcome = ?result.outcome, "Payment confirmed.");
        Ok(HttpResponse::Ok().json(json!({
          "success": true,
          "order": { "id": req.order_id, "status": result.order_status },
          "payment": { "status": result.payment_status },
        })))
      } else {
        info!(payment_status = %result.payment_status, "Payment was not completed.");
        Ok(HttpResponse::BadRequest().json(json!({
          "success": false,
          "error": "Payment failed",
          "details": guard.failure_details.clone().unwrap_or(Value::Null),
          "order": { "id": req.order_id, "status": result.order_status },
          "payment": { "status": result.payment_status },
        })))
      }
    }
    Err(app_err) => {
      warn!("Confirmation for order {} failed: {}", req.order_id, app_err);
      Err(app_err)
    }
  }
}
