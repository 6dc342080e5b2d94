// storefront/src/web/routes.rs

use crate::web::handlers::{order_handlers, payment_handlers, product_handlers, webhook_handlers};
use crate::errors::AppError;
use actix_web::web;

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Malformed JSON bodies are answered like any other validation failure.
fn json_config() -> web::JsonConfig {
  web::JsonConfig::default()
    .error_handler(|err, _req| AppError::Validation(format!("Invalid request body: {}", err)).into())
}

/// So are path segments that do not parse, such as a malformed UUID.
fn path_config() -> web::PathConfig {
  web::PathConfig::default()
    .error_handler(|err, _req| AppError::Validation(format!("Invalid path: {}", err)).into())
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.app_data(json_config()).app_data(path_config()).service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/orders")
          .route("", web::post().to(order_handlers::create_order_handler))
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/cancel", web::post().to(order_handlers::cancel_order_handler)),
      )
      .service(
        web::scope("/payments")
          .route("/intent", web::post().to(payment_handlers::create_intent_handler))
          .route("/confirm", web::post().to(payment_handlers::confirm_payment_handler))
          .route("/webhook", web::post().to(webhook_handlers::webhook_by_header_handler))
          .route("/webhook/{processor}", web::post().to(webhook_handlers::webhook_by_path_handler)),
      )
      .service(
        web::scope("/products")
          .route("", web::get().to(product_handlers::list_products_handler))
          .route("/{product_id}", web::get().to(product_handlers::get_product_handler)),
      ),
  );
}
