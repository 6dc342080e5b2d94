// storefront/src/pipelines/mod.rs

//! Defines and registers every workflow the storefront runs.

use crate::errors::AppError;
use crate::state::AppState;
use waypoint::Registry;

pub mod contexts;
pub mod common_steps;

pub mod cancel_pipeline;
pub mod checkout_pipeline;
pub mod confirmation_pipeline;
pub mod intent_pipeline;
pub mod webhook_pipeline;

/// Registers all flows with `registry`. Called once at startup.
pub fn register_all_pipelines(registry: &Registry<AppError>, app_state: &AppState) {
  tracing::info!("Registering pipelines...");

  checkout_pipeline::register_checkout_pipeline(registry, app_state);
  intent_pipeline::register_intent_pipeline(registry, app_state);
  confirmation_pipeline::register_confirmation_pipeline(registry, app_state);
  webhook_pipeline::register_webhook_pipeline(registry, app_state);
  cancel_pipeline::register_cancel_pipeline(registry, app_state);

  tracing::info!(flows = registry.len(), "All application pipelines registered.");
}
