// storefront/src/pipelines/checkout_pipeline.rs

//! Checkout: validate the cart, check inventory, write the order aggregate,
//! then decrement catalog stock outside the order transaction.

use crate::errors::{AppError, Result as AppResult};
use crate::models::outbox::NewDecrementFailure;
use crate::models::product::Decrement;
use crate::pipelines::common_steps;
use crate::pipelines::contexts::{CheckedLine, CheckoutCtxData, CheckoutItemInput, RequestedLine};
use crate::state::AppState;
use crate::store::{CatalogStore, NewOrder, NewOrderLine, OrderStore};
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};
use waypoint::{Control, Ctx, Flow, Registry, StepPolicy};

pub fn register_checkout_pipeline(registry: &Registry<AppError>, _app_state: &AppState) {
  let mut p = Flow::<CheckoutCtxData, AppError>::new(
    "checkout",
    &[
      ("validate_request", StepPolicy::Required),
      ("check_inventory", StepPolicy::Required),
      ("write_order_aggregate", StepPolicy::Required),
      ("decrement_inventory", StepPolicy::BestEffort),
    ],
  );

  // Step 1: Validate and normalise the request
  p.on("validate_request", |ctx: Ctx<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, items, missing_field, requested_method) = {
        let guard = ctx.read();
        (
          guard.app_state.clone(),
          guard.items.clone(),
          guard.shipping_address.missing_field(),
          guard.requested_method.clone(),
        )
      };

      let lines = normalize_items(&items)?;
      if let Some(field) = missing_field {
        return Err(AppError::Validation(format!("shippingAddress.{} is required", field)));
      }
      let payment_method = match requested_method.as_deref() {
        Some(name) => Some(common_steps::resolve_processor(&app_state, name)?.0),
        None => None,
      };

      let mut guard = ctx.write();
      info!(user_id = %guard.user_id, lines = lines.len(), "Checkout request validated.");
      guard.lines = lines;
      guard.payment_method = payment_method;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  // Step 2: Inventory check against the catalog
  p.on("check_inventory", |ctx: Ctx<CheckoutCtxData>| {
    Box::pin(async move {
      let (catalog, lines) = {
        let guard = ctx.read();
        (guard.app_state.catalog.clone(), guard.lines.clone())
      };
      let checked = check_inventory(catalog.as_ref(), &lines).await?;
      ctx.write().checked = checked;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  // Step 3: Order, items and payment in one transaction
  p.on("write_order_aggregate", |ctx: Ctx<CheckoutCtxData>| {
    Box::pin(async move {
      let (orders, new_order) = {
        let guard = ctx.read();
        let new_order = NewOrder {
          user_id: guard.user_id,
          currency: guard.app_state.config.currency.clone(),
          total_amount_cents: order_total_cents(&guard.checked)?,
          shipping_address: guard.shipping_address.clone(),
          payment_method: guard.payment_method,
          lines: guard
            .checked
            .iter()
            .map(|line| NewOrderLine {
              product_id: line.product_id,
              quantity: line.quantity,
              price_cents: line.price_cents,
            })
            .collect(),
        };
        (guard.app_state.orders.clone(), new_order)
      };

      let aggregate = orders.create_order_aggregate(new_order).await?;
      info!(
        order_id = %aggregate.order.id,
        total_amount_cents = aggregate.order.total_amount_cents,
        "Order aggregate written."
      );
      ctx.write().aggregate = Some(aggregate);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  // Step 4: Catalog decrements, never failing the checkout
  p.on("decrement_inventory", |ctx: Ctx<CheckoutCtxData>| {
    Box::pin(async move {
      let (orders, catalog, aggregate) = {
        let guard = ctx.read();
        (
          guard.app_state.orders.clone(),
          guard.app_state.catalog.clone(),
          guard.aggregate.clone(),
        )
      };
      let Some(aggregate) = aggregate else {
        return Err(AppError::Internal("decrement_inventory ran without an order".to_string()));
      };

      let lines: Vec<(uuid::Uuid, i32)> = aggregate.items.iter().map(|i| (i.product_id, i.quantity)).collect();
      let deferred = decrement_inventory(orders.as_ref(), catalog.as_ref(), aggregate.order.id, &lines).await;
      ctx.write().deferred_inventory_updates = deferred;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  registry.register(p);
}

/// Rejects empty carts and non-positive quantities, and merges duplicate
/// products by summing their quantities. First-seen order is kept.
pub fn normalize_items(items: &[CheckoutItemInput]) -> AppResult<Vec<RequestedLine>> {
  if items.is_empty() {
    return Err(AppError::Validation("Order must contain at least one item".to_string()));
  }

  let mut lines: Vec<RequestedLine> = Vec::with_capacity(items.len());
  let mut index: HashMap<uuid::Uuid, usize> = HashMap::new();
  for item in items {
    if item.quantity < 1 {
      return Err(AppError::Validation(format!(
        "Quantity for product {} must be at least 1",
        item.product_id
      )));
    }
    let quantity_too_large = || AppError::Validation(format!("Quantity for product {} is too large", item.product_id));
    let quantity = i32::try_from(item.quantity).map_err(|_| quantity_too_large())?;
    match index.get(&item.product_id) {
      Some(&pos) => {
        lines[pos].quantity = lines[pos].quantity.checked_add(quantity).ok_or_else(quantity_too_large)?;
      }
      None => {
        index.insert(item.product_id, lines.len());
        lines.push(RequestedLine {
          product_id: item.product_id,
          quantity,
        });
      }
    }
  }
  Ok(lines)
}

/// Reads stock and price for every line. Fails on the first product that is
/// missing or short; nothing is reserved.
#[instrument(name = "checkout::check_inventory", skip_all, fields(lines = lines.len()))]
pub async fn check_inventory(catalog: &dyn CatalogStore, lines: &[RequestedLine]) -> AppResult<Vec<CheckedLine>> {
  let ids: Vec<uuid::Uuid> = lines.iter().map(|l| l.product_id).collect();
  let products: HashMap<uuid::Uuid, _> = catalog
    .find_products(&ids)
    .await?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

  let mut checked = Vec::with_capacity(lines.len());
  for line in lines {
    let product = products
      .get(&line.product_id)
      .ok_or(AppError::ProductNotFound(line.product_id))?;
    if product.inventory < line.quantity {
      info!(
        product_id = %product.id,
        available = product.inventory,
        requested = line.quantity,
        "Inventory check failed."
      );
      return Err(AppError::OutOfStock {
        product_id: product.id,
        product_name: product.name.clone(),
        available: product.inventory,
        requested: line.quantity,
      });
    }
    checked.push(CheckedLine {
      product_id: product.id,
      product_name: product.name.clone(),
      quantity: line.quantity,
      price_cents: product.price_cents,
      available: product.inventory,
    });
  }
  Ok(checked)
}

/// Σ price × quantity with overflow reported as an integrity failure.
pub fn order_total_cents(lines: &[CheckedLine]) -> AppResult<i64> {
  lines.iter().try_fold(0i64, |acc, line| {
    line
      .price_cents
      .checked_mul(i64::from(line.quantity))
      .and_then(|subtotal| acc.checked_add(subtotal))
      .ok_or_else(|| AppError::Integrity("Order total overflows".to_string()))
  })
}

/// Decrements catalog stock for each `(product_id, quantity)`. Every decrement
/// that does not apply is logged and recorded in the outbox. Returns how many
/// were deferred.
#[instrument(name = "checkout::decrement_inventory", skip(orders, catalog, lines), fields(lines = lines.len()))]
pub async fn decrement_inventory(
  orders: &dyn OrderStore,
  catalog: &dyn CatalogStore,
  order_id: uuid::Uuid,
  lines: &[(uuid::Uuid, i32)],
) -> usize {
  let mut deferred = 0;
  for &(product_id, quantity) in lines {
    let reason = match catalog.decrement_inventory(product_id, quantity).await {
      Ok(Decrement::Applied { remaining }) => {
        info!(%product_id, quantity, remaining, "Inventory decremented.");
        continue;
      }
      Ok(Decrement::Insufficient { available }) => {
        format!("insufficient stock at decrement time: {} available", available)
      }
      Ok(Decrement::NotFound) => "product no longer exists".to_string(),
      Err(e) => format!("catalog error: {}", e),
    };

    deferred += 1;
    warn!(%order_id, %product_id, quantity, reason = %reason, "Inventory decrement deferred to reconciliation.");
    let failure = NewDecrementFailure {
      order_id,
      product_id,
      quantity,
      reason,
    };
    if let Err(e) = orders.record_decrement_failure(failure).await {
      error!(%order_id, %product_id, quantity, error = %e, "Could not record deferred decrement; manual reconciliation required.");
    }
  }
  deferred
}

#[cfg(test)]
mod tests {
  use super::*;
  use uuid::Uuid;

  #[test]
  fn merges_duplicate_products() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let items = vec![
      CheckoutItemInput { product_id: a, quantity: 1 },
      CheckoutItemInput { product_id: b, quantity: 2 },
      CheckoutItemInput { product_id: a, quantity: 3 },
    ];
    let lines = normalize_items(&items).unwrap();
    assert_eq!(
      lines,
      vec![
        RequestedLine { product_id: a, quantity: 4 },
        RequestedLine { product_id: b, quantity: 2 },
      ]
    );
  }

  #[test]
  fn rejects_empty_and_non_positive() {
    assert!(matches!(normalize_items(&[]), Err(AppError::Validation(_))));
    let items = vec![CheckoutItemInput {
      product_id: Uuid::new_v4(),
      quantity: 0,
    }];
    assert!(matches!(normalize_items(&items), Err(AppError::Validation(_))));
  }

  #[test]
  fn total_is_exact_and_overflow_checked() {
    let line = |price_cents, quantity| CheckedLine {
      product_id: Uuid::new_v4(),
      product_name: "x".to_string(),
      quantity,
      price_cents,
      available: quantity,
    };
    assert_eq!(order_total_cents(&[line(1000, 2), line(500, 1)]).unwrap(), 2500);
    assert!(matches!(
      order_total_cents(&[line(i64::MAX, 2)]),
      Err(AppError::Integrity(_))
    ));
  }
}
