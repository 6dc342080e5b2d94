// storefront/src/state.rs
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::payment::ProcessorRegistry;
use crate::store::{CatalogStore, OrderStore};
use std::sync::Arc;
use waypoint::Registry;

/// Everything a request needs, built once in `main` and cloned into every
/// handler and flow context.
#[derive(Clone)]
pub struct AppState {
  pub orders: Arc<dyn OrderStore>,
  pub catalog: Arc<dyn CatalogStore>,
  pub processors: Arc<ProcessorRegistry>,
  pub flows: Arc<Registry<AppError>>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Flows still have to be registered with
  /// [`crate::pipelines::register_all_pipelines`].
  pub fn new(
    config: Arc<AppConfig>,
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn CatalogStore>,
    processors: ProcessorRegistry,
  ) -> Self {
    Self {
      orders,
      catalog,
      processors: Arc::new(processors),
      flows: Arc::new(Registry::new()),
      config,
    }
  }
}
