// storefront/src/reconcile.rs

//! Retries catalog decrements that did not apply at checkout.

use crate::config::ReconcileConfig;
use crate::errors::Result as AppResult;
use crate::models::outbox::OutboxStatus;
use crate::models::product::Decrement;
use crate::state::AppState;
use crate::store::{CatalogStore, OrderStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
  pub examined: usize,
  pub resolved: usize,
  pub retrying: usize,
  pub abandoned: usize,
  /// Applied after their order was cancelled, then given back.
  pub withdrawn: usize,
}

/// One pass over the pending outbox, oldest entries first.
#[instrument(name = "reconcile::run_pass", skip_all)]
pub async fn run_pass(
  orders: &dyn OrderStore,
  catalog: &dyn CatalogStore,
  settings: &ReconcileConfig,
) -> AppResult<PassSummary> {
  let entries = orders.pending_decrements(settings.batch_size).await?;
  let mut summary = PassSummary {
    examined: entries.len(),
    ..Default::default()
  };

  for entry in entries {
    let failure = match catalog.decrement_inventory(entry.product_id, entry.quantity).await {
      Ok(Decrement::Applied { remaining }) => {
        if !orders.resolve_decrement(entry.id).await? {
          warn!(
            entry_id = %entry.id,
            order_id = %entry.order_id,
            product_id = %entry.product_id,
            "Order cancelled while its decrement was in flight; returning the stock."
          );
          if let Err(e) = catalog.restock(entry.product_id, entry.quantity).await {
            error!(entry_id = %entry.id, product_id = %entry.product_id, quantity = entry.quantity, error = %e, "Return of withdrawn decrement failed.");
          }
          summary.withdrawn += 1;
          continue;
        }
        info!(
          entry_id = %entry.id,
          order_id = %entry.order_id,
          product_id = %entry.product_id,
          quantity = entry.quantity,
          remaining,
          "Deferred decrement applied."
        );
        summary.resolved += 1;
        continue;
      }
      Ok(Decrement::Insufficient { available }) => format!("insufficient stock: {} available", available),
      Ok(Decrement::NotFound) => "product no longer exists".to_string(),
      Err(e) => format!("catalog error: {}", e),
    };

    match orders
      .fail_decrement_attempt(entry.id, &failure, settings.max_attempts)
      .await?
    {
      OutboxStatus::Abandoned => {
        error!(
          entry_id = %entry.id,
          order_id = %entry.order_id,
          product_id = %entry.product_id,
          quantity = entry.quantity,
          error = %failure,
          "Deferred decrement abandoned; manual reconciliation required."
        );
        summary.abandoned += 1;
      }
      _ => {
        warn!(entry_id = %entry.id, product_id = %entry.product_id, error = %failure, "Deferred decrement still failing.");
        summary.retrying += 1;
      }
    }
  }

  if summary.examined > 0 {
    info!(?summary, "Reconciliation pass finished.");
  }
  Ok(summary)
}

/// Runs [`run_pass`] every `reconcile.interval` until the runtime shuts down.
pub fn spawn(app_state: AppState) -> JoinHandle<()> {
  let orders: Arc<dyn OrderStore> = app_state.orders.clone();
  let catalog: Arc<dyn CatalogStore> = app_state.catalog.clone();
  let settings = app_state.config.reconcile;

  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(interval_secs = settings.interval.as_secs(), "Reconciliation loop started.");
    loop {
      ticker.tick().await;
      if let Err(e) = run_pass(orders.as_ref(), catalog.as_ref(), &settings).await {
        error!(error = %e, "Reconciliation pass failed.");
      }
    }
  })
}
