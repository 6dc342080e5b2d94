// storefront/src/store/postgres/mod.rs

mod catalog;
mod orders;

pub use catalog::PgCatalogStore;
pub use orders::PgOrderStore;

use crate::errors::Result;
use sqlx::PgPool;
use tracing::info;

pub async fn connect(database_url: &str) -> Result<PgPool> {
  let pool = PgPool::connect(database_url).await?;
  info!("Successfully connected to the database.");
  Ok(pool)
}

/// Applies the order schema. Both migrators may share one database, so each
/// ignores versions it does not know.
pub async fn migrate_orders(pool: &PgPool) -> Result<()> {
  let mut migrator = sqlx::migrate!("./migrations");
  migrator.set_ignore_missing(true);
  migrator.run(pool).await?;
  info!("Order schema is up to date.");
  Ok(())
}

pub async fn migrate_catalog(pool: &PgPool) -> Result<()> {
  let mut migrator = sqlx::migrate!("./catalog_migrations");
  migrator.set_ignore_missing(true);
  migrator.run(pool).await?;
  info!("Catalog schema is up to date.");
  Ok(())
}
