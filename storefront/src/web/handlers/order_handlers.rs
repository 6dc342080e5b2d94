// storefront/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use waypoint::{Ctx, Outcome};

use crate::errors::AppError;
use crate::models::address::ShippingAddress;
use crate::models::order::Order;
use crate::models::order_item::OrderItem;
use crate::models::payment::Payment;
use crate::pipelines::common_steps;
use crate::pipelines::contexts::{CancelCtxData, CheckoutCtxData, CheckoutItemInput};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
  pub items: Vec<CheckoutItemInput>,
  pub shipping_address: ShippingAddress,
  #[serde(default)]
  pub payment_method: Option<String>,
}

#[instrument(
  name = "handler::create_order",
  skip(app_state, req_payload, auth_user),
  fields(user_id = %auth_user.user_id, items = req_payload.items.len())
)]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CreateOrderRequest>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let req = req_payload.into_inner();
  let ctx = Ctx::new(CheckoutCtxData::new(
    app_state.get_ref().clone(),
    auth_user.user_id,
    req.items,
    req.shipping_address,
    req.payment_method,
  ));

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Completed) => {
      let guard = ctx.read();
      let aggregate = guard.aggregate.as_ref().ok_or_else(|| {
        AppError::Internal("Checkout completed without an order.".to_string())
      })?;
      info!(
        order_id = %aggregate.order.id,
        deferred = guard.deferred_inventory_updates,
        "Checkout completed."
      );
      Ok(HttpResponse::Created().json(json!({
        "order": {
          "id": aggregate.order.id,
          "totalAmountCents": aggregate.order.total_amount_cents,
          "currency": aggregate.order.currency,
          "status": aggregate.order.status,
        },
        "payment": {
          "id": aggregate.payment.id,
          "amountCents": aggregate.payment.amount_cents,
          "method": aggregate.payment.payment_method,
          "status": aggregate.payment.status,
        },
        "deferredInventoryUpdates": guard.deferred_inventory_updates,
      })))
    }
    Ok(Outcome::Stopped) => Err(AppError::Internal("Checkout was halted unexpectedly.".to_string())),
    Err(app_err) => {
      warn!("Checkout failed for user {}: {}", auth_user.user_id, app_err);
      Err(app_err)
    }
  }
}

#[instrument(name = "handler::list_orders", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.orders.list_orders_for_user(auth_user.user_id).await?;

  let mut summaries = Vec::with_capacity(orders.len());
  for order in &orders {
    let items = app_state.orders.find_items(order.id).await?;
    let payment = app_state.orders.find_payment(order.id).await?;
    summaries.push(json!({
      "id": order.id,
      "status": order.status,
      "totalAmountCents": order.total_amount_cents,
      "currency": order.currency,
      "createdAt": order.created_at,
      "itemCount": items.iter().map(|i| i64::from(i.quantity)).sum::<i64>(),
      "items": items.iter().map(|i| json!({
        "productId": i.product_id,
        "quantity": i.quantity,
        "priceCents": i.price_cents,
      })).collect::<Vec<_>>(),
      "payment": payment.as_ref().map(payment_summary),
    }));
  }
  info!("Listed {} orders.", summaries.len());
  Ok(HttpResponse::Ok().json(json!({ "orders": summaries })))
}

#[instrument(name = "handler::get_order", skip(app_state, auth_user, path), fields(user_id = %auth_user.user_id, order_id = %path.as_ref()))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let (order, payment) = common_steps::load_owned_order(app_state.orders.as_ref(), auth_user.user_id, order_id).await?;
  let items = app_state.orders.find_items(order_id).await?;

  let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
  let products: HashMap<Uuid, _> = app_state
    .catalog
    .find_products(&product_ids)
    .await?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

  let lines: Vec<Value> = items
    .iter()
    .map(|item| {
      let product = match products.get(&item.product_id) {
        Some(p) => json!({
          "available": true,
          "name": p.name,
          "currentPriceCents": p.price_cents,
        }),
        None => json!({ "available": false }),
      };
      item_detail(item, product)
    })
    .collect();

  Ok(HttpResponse::Ok().json(json!({
    "order": order_detail(&order),
    "items": lines,
    "payment": payment_summary(&payment),
  })))
}

#[instrument(name = "handler::cancel_order", skip(app_state, auth_user, path), fields(user_id = %auth_user.user_id, order_id = %path.as_ref()))]
pub async fn cancel_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let ctx = Ctx::new(CancelCtxData::new(app_state.get_ref().clone(), auth_user.user_id, order_id));

  match app_state.flows.run(ctx.clone()).await {
    Ok(Outcome::Completed) => {
      let guard = ctx.read();
      let order = guard
        .cancelled
        .as_ref()
        .ok_or_else(|| AppError::Internal("Cancellation completed without an order.".to_string()))?;
      Ok(HttpResponse::Ok().json(json!({
        "order": { "id": order.id, "status": order.status },
        "refunded": guard.refund_details.is_some(),
        "restockFailures": guard.restock_failures,
        "withdrawnDecrements": guard.withdrawn_decrements.len(),
      })))
    }
    Ok(Outcome::Stopped) => Err(AppError::Internal("Cancellation was halted unexpectedly.".to_string())),
    Err(app_err) => {
      warn!("Cancellation of order {} failed: {}", order_id, app_err);
      Err(app_err)
    }
  }
}

fn order_detail(order: &Order) -> Value {
  json!({
    "id": order.id,
    "status": order.status,
    "totalAmountCents": order.total_amount_cents,
    "currency": order.currency,
    "shippingAddress": order.shipping_address,
    "trackingNumber": order.tracking_number,
    "createdAt": order.created_at,
    "updatedAt": order.updated_at,
  })
}

fn item_detail(item: &OrderItem, product: Value) -> Value {
  json!({
    "id": item.id,
    "productId": item.product_id,
    "quantity": item.quantity,
    "priceCents": item.price_cents,
    "lineTotalCents": item.line_total_cents(),
    "product": product,
  })
}

fn payment_summary(payment: &Payment) -> Value {
  json!({
    "id": payment.id,
    "status": payment.status,
    "method": payment.payment_method,
    "amountCents": payment.amount_cents,
    "transactionId": payment.transaction_id,
  })
}
