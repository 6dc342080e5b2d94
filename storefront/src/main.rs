// storefront/src/main.rs

use storefront::config::{AppConfig, LogFormat, StorageBackend};
use storefront::errors::{AppError, Result as AppResult};
use storefront::pipelines;
use storefront::reconcile;
use storefront::seed;
use storefront::services::payment::ProcessorRegistry;
use storefront::state::AppState;
use storefront::store::memory::{MemoryCatalogStore, MemoryOrderStore};
use storefront::store::postgres::{self, PgCatalogStore, PgOrderStore};
use storefront::store::{CatalogStore, OrderStore};
use storefront::web::configure_app_routes;

use actix_web::{web as actix_data, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

async fn build_stores(config: &AppConfig) -> AppResult<(Arc<dyn OrderStore>, Arc<dyn CatalogStore>)> {
  match config.storage_backend {
    StorageBackend::Memory => {
      tracing::warn!("Using in-memory storage; all data is lost on shutdown.");
      Ok((Arc::new(MemoryOrderStore::new()), Arc::new(MemoryCatalogStore::new())))
    }
    StorageBackend::Postgres => {
      let orders_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| AppError::Config("DATABASE_URL is not set".to_string()))?;
      let orders_pool = postgres::connect(orders_url).await?;
      postgres::migrate_orders(&orders_pool).await?;

      let catalog_pool = match config.catalog_database_url.as_deref() {
        Some(url) if url != orders_url => postgres::connect(url).await?,
        _ => orders_pool.clone(),
      };
      postgres::migrate_catalog(&catalog_pool).await?;

      Ok((
        Arc::new(PgOrderStore::new(orders_pool)),
        Arc::new(PgCatalogStore::new(catalog_pool)),
      ))
    }
  }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  let loaded = AppConfig::from_env();
  // A config error is still reported, in the default format.
  init_tracing(loaded.as_ref().map(|cfg| cfg.log_format).unwrap_or(LogFormat::Pretty));
  tracing::info!("Starting storefront server...");

  let app_config = match loaded {
    Ok(cfg) => {
      tracing::info!(backend = ?cfg.storage_backend, log_format = ?cfg.log_format, "Application configuration loaded successfully.");
      Arc::new(cfg)
    }
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }
  };

  let (orders, catalog) = match build_stores(&app_config).await {
    Ok(stores) => stores,
    Err(e) => {
      tracing::error!(error = %e, "Failed to initialise storage.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };

  if app_config.seed_db {
    match seed::seed_catalog(catalog.as_ref()).await {
      Ok(count) => tracing::info!(count, "Catalog seeded with demo products."),
      Err(e) => tracing::error!(error = %e, "Failed to seed the catalog."),
    }
  }

  let processors = ProcessorRegistry::from_config(&app_config);
  let app_state = AppState::new(app_config.clone(), orders, catalog, processors);
  pipelines::register_all_pipelines(&app_state.flows, &app_state);

  let _reconciler = reconcile::spawn(app_state.clone());

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
