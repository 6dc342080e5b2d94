// storefront/src/errors.rs

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;
use waypoint::WaypointError;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Unsupported payment method: {0}")]
  UnsupportedPaymentMethod(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Insufficient stock for product '{product_name}': {available} available, {requested} requested")]
  OutOfStock {
    product_id: Uuid,
    product_name: String,
    available: i32,
    requested: i32,
  },

  #[error("Product not found: {0}")]
  ProductNotFound(Uuid),

  #[error("Invalid State: {0}")]
  InvalidState(String),

  #[error("Payment initiation failed: {0}")]
  PaymentInitiationFailed(String),

  #[error("Payment Processor Error: {0}")]
  PaymentProcessor(String),

  #[error("Webhook signature rejected: {0}")]
  InvalidSignature(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Integrity Error: {0}")]
  Integrity(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: WaypointError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl From<sqlx::migrate::MigrateError> for AppError {
  fn from(err: sqlx::migrate::MigrateError) -> Self {
    AppError::Internal(format!("Migration failed: {}", err))
  }
}

impl ResponseError for AppError {
  fn error_response(&self) -> HttpResponse {
    tracing::error!(application_error = %self, "Responding with error");
    match self {
      AppError::Validation(m) => HttpResponse::BadRequest().json(json!({"error": m})),
      AppError::UnsupportedPaymentMethod(_) => HttpResponse::BadRequest().json(json!({"error": self.to_string()})),
      AppError::NotFound(m) => HttpResponse::NotFound().json(json!({"error": m})),
      AppError::OutOfStock {
        product_id,
        available,
        requested,
        ..
      } => HttpResponse::BadRequest().json(json!({
        "error": self.to_string(),
        "productId": product_id,
        "available": available,
        "requested": requested,
      })),
      AppError::ProductNotFound(id) => {
        HttpResponse::BadRequest().json(json!({"error": self.to_string(), "productId": id}))
      }
      AppError::InvalidState(m) => HttpResponse::Conflict().json(json!({"error": m})),
      AppError::PaymentInitiationFailed(m) => {
        HttpResponse::BadRequest().json(json!({"error": "Payment initiation failed", "detail": m}))
      }
      AppError::PaymentProcessor(m) => {
        HttpResponse::BadRequest().json(json!({"error": "Payment processor error", "detail": m}))
      }
      AppError::InvalidSignature(m) => {
        HttpResponse::BadRequest().json(json!({"error": "Invalid webhook signature", "detail": m}))
      }
      AppError::Auth(m) => HttpResponse::Unauthorized().json(json!({"error": m})),
      AppError::Integrity(_) | AppError::Sqlx(_) => {
        HttpResponse::InternalServerError().json(json!({"error": "Database operation failed"}))
      }
      AppError::Config(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "Configuration issue", "detail": m}))
      }
      AppError::Workflow { source } => {
        tracing::error!(workflow_error_source = ?source, "Workflow error details");
        HttpResponse::InternalServerError().json(json!({"error": "Workflow processing error"}))
      }
      AppError::Internal(_) => HttpResponse::InternalServerError().json(json!({"error": "An internal error occurred"})),
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
