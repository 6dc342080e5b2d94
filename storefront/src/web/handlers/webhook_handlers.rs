// storefront/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::{error, info, instrument};
use waypoint::{Ctx, Outcome};

use crate::errors::AppError;
use crate::pipelines::contexts::WebhookCtxData;
use crate::state::AppState;

pub const PROCESSOR_HEADER: &str = "X-Payment-Processor";

#[instrument(name = "handler::webhook_by_path", skip(app_state, req, body), fields(processor = %processor.as_str(), bytes = body.len()))]
pub async fn webhook_by_path_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  processor: web::Path<String>,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  process_webhook(app_state, req, processor.into_inner(), body).await
}

#[instrument(name = "handler::webhook_by_header", skip(app_state, req, body), fields(bytes = body.len()))]
pub async fn webhook_by_header_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let processor = req
    .headers()
    .get(PROCESSOR_HEADER)
    .and_then(|h| h.to_str().ok())
    .map(|s| s.trim().to_string())
    .ok_or_else(|| AppError::Validation(format!("Missing {} header", PROCESSOR_HEADER)))?;
  process_webhook(app_state, req, processor, body).await
}

async fn process_webhook(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  processor_name: String,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  info!("Received webhook for '{}'. Payload size: {} bytes.", processor_name, body.len());
  let ctx = Ctx::new(WebhookCtxData::new(
    app_state.get_ref().clone(),
    processor_name.clone(),
    req.headers().clone(),
    body,
  ));

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Completed) | Ok(Outcome::Stopped) => Ok(HttpResponse::Ok().json(json!({ "received": true }))),
    Err(app_err) => {
      error!("Webhook for '{}' failed: {}", processor_name, app_err);
      Err(app_err)
    }
  }
}
