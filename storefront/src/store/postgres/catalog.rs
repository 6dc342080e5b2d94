// storefront/src/store/postgres/catalog.rs

use crate::errors::Result;
use crate::models::product::{Decrement, Product};
use crate::store::CatalogStore;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, inventory, created_at, updated_at";

#[derive(Clone)]
pub struct PgCatalogStore {
  pool: PgPool,
}

impl PgCatalogStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
  async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>> {
    let product = sqlx::query_as(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(product)
  }

  async fn find_products(&self, product_ids: &[Uuid]) -> Result<Vec<Product>> {
    let products = sqlx::query_as(&format!("SELECT {} FROM products WHERE id = ANY($1)", PRODUCT_COLUMNS))
      .bind(product_ids)
      .fetch_all(&self.pool)
      .await?;
    Ok(products)
  }

  async fn list_products(&self) -> Result<Vec<Product>> {
    let products = sqlx::query_as(&format!("SELECT {} FROM products ORDER BY name ASC", PRODUCT_COLUMNS))
      .fetch_all(&self.pool)
      .await?;
    Ok(products)
  }

  #[instrument(name = "pg::decrement_inventory", skip(self))]
  async fn decrement_inventory(&self, product_id: Uuid, quantity: i32) -> Result<Decrement> {
    let remaining: Option<i32> = sqlx::query_scalar(
      "UPDATE products SET inventory = inventory - $2, updated_at = now() \
       WHERE id = $1 AND inventory >= $2 RETURNING inventory",
    )
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&self.pool)
    .await?;
    if let Some(remaining) = remaining {
      return Ok(Decrement::Applied { remaining });
    }

    let available: Option<i32> = sqlx::query_scalar("SELECT inventory FROM products WHERE id = $1")
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(match available {
      Some(available) => Decrement::Insufficient { available },
      None => Decrement::NotFound,
    })
  }

  async fn restock(&self, product_id: Uuid, quantity: i32) -> Result<bool> {
    let updated = sqlx::query("UPDATE products SET inventory = inventory + $2, updated_at = now() WHERE id = $1")
      .bind(product_id)
      .bind(quantity)
      .execute(&self.pool)
      .await?
      .rows_affected();
    Ok(updated > 0)
  }

  async fn upsert_product(&self, product: &Product) -> Result<()> {
    sqlx::query(
      "INSERT INTO products (id, name, description, price_cents, inventory, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7) \
       ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, description = EXCLUDED.description, \
       price_cents = EXCLUDED.price_cents, inventory = EXCLUDED.inventory, updated_at = EXCLUDED.updated_at",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price_cents)
    .bind(product.inventory)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }
}
