// storefront/src/pipelines/contexts.rs

//! Data carried through each flow. Handlers receive these wrapped in
//! `waypoint::Ctx`.

use crate::models::address::ShippingAddress;
use crate::models::order::Order;
use crate::models::outbox::DecrementOutboxEntry;
use crate::models::payment::{Payment, PaymentMethod};
use crate::models::settlement::SettleResult;
use crate::services::payment::{PaymentIntent, PaymentProcessor, WebhookEvent};
use crate::state::AppState;
use crate::store::OrderAggregate;
use actix_web::http::header::HeaderMap;
use actix_web::web::Bytes;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

// --- Checkout ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItemInput {
  pub product_id: Uuid,
  pub quantity: i64,
}

/// One product with its combined requested quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedLine {
  pub product_id: Uuid,
  pub quantity: i32,
}

/// A requested line after the inventory check, with the catalog price
/// snapshot the order is written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedLine {
  pub product_id: Uuid,
  pub product_name: String,
  pub quantity: i32,
  pub price_cents: i64,
  pub available: i32,
}

#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub items: Vec<CheckoutItemInput>,
  pub shipping_address: ShippingAddress,
  pub requested_method: Option<String>,
  // Filled in by the flow:
  pub lines: Vec<RequestedLine>,
  pub payment_method: Option<PaymentMethod>,
  pub checked: Vec<CheckedLine>,
  pub aggregate: Option<OrderAggregate>,
  pub deferred_inventory_updates: usize,
}

impl CheckoutCtxData {
  pub fn new(
    app_state: AppState,
    user_id: Uuid,
    items: Vec<CheckoutItemInput>,
    shipping_address: ShippingAddress,
    requested_method: Option<String>,
  ) -> Self {
    Self {
      app_state,
      user_id,
      items,
      shipping_address,
      requested_method,
      lines: Vec::new(),
      payment_method: None,
      checked: Vec::new(),
      aggregate: None,
      deferred_inventory_updates: 0,
    }
  }
}

// --- Payment intent ---

#[derive(Clone)]
pub struct IntentCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub order_id: Uuid,
  pub requested_method: String,
  pub method: Option<PaymentMethod>,
  pub processor: Option<Arc<dyn PaymentProcessor>>,
  pub order: Option<Order>,
  pub payment: Option<Payment>,
  pub intent: Option<PaymentIntent>,
}

impl IntentCtxData {
  pub fn new(app_state: AppState, user_id: Uuid, order_id: Uuid, requested_method: String) -> Self {
    Self {
      app_state,
      user_id,
      order_id,
      requested_method,
      method: None,
      processor: None,
      order: None,
      payment: None,
      intent: None,
    }
  }
}

// --- Synchronous confirmation ---

#[derive(Clone)]
pub struct ConfirmCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub order_id: Uuid,
  pub requested_method: String,
  pub payment_data: Value,
  pub method: Option<PaymentMethod>,
  pub processor: Option<Arc<dyn PaymentProcessor>>,
  pub order: Option<Order>,
  pub payment: Option<Payment>,
  pub result: Option<SettleResult>,
  /// Processor details of a declined attempt, for the response body.
  pub failure_details: Option<Value>,
}

impl ConfirmCtxData {
  pub fn new(app_state: AppState, user_id: Uuid, order_id: Uuid, requested_method: String, payment_data: Value) -> Self {
    Self {
      app_state,
      user_id,
      order_id,
      requested_method,
      payment_data,
      method: None,
      processor: None,
      order: None,
      payment: None,
      result: None,
      failure_details: None,
    }
  }
}

// --- Webhooks ---

#[derive(Clone)]
pub struct WebhookCtxData {
  pub app_state: AppState,
  pub processor_name: String,
  pub headers: HeaderMap,
  pub payload: Bytes,
  pub processor: Option<Arc<dyn PaymentProcessor>>,
  pub event: Option<WebhookEvent>,
  pub result: Option<SettleResult>,
}

impl WebhookCtxData {
  pub fn new(app_state: AppState, processor_name: String, headers: HeaderMap, payload: Bytes) -> Self {
    Self {
      app_state,
      processor_name,
      headers,
      payload,
      processor: None,
      event: None,
      result: None,
    }
  }
}

// --- Cancellation ---

#[derive(Clone)]
pub struct CancelCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub order_id: Uuid,
  pub order: Option<Order>,
  pub payment: Option<Payment>,
  pub refund_details: Option<Value>,
  pub cancelled: Option<Order>,
  /// Outbox rows withdrawn by the cancellation; their stock was never taken.
  pub withdrawn_decrements: Vec<DecrementOutboxEntry>,
  pub restock_failures: usize,
}

impl CancelCtxData {
  pub fn new(app_state: AppState, user_id: Uuid, order_id: Uuid) -> Self {
    Self {
      app_state,
      user_id,
      order_id,
      order: None,
      payment: None,
      refund_details: None,
      cancelled: None,
      withdrawn_decrements: Vec::new(),
      restock_failures: 0,
    }
  }
}
