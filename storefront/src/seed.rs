// storefront/src/seed.rs

use crate::errors::Result as AppResult;
use crate::models::product::Product;
use crate::store::CatalogStore;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Fixed ids so reseeding updates rather than duplicates.
const DEMO_PRODUCTS: &[(&str, &str, &str, i64, i32)] = &[
  (
    "6f1c1e0a-3b1d-4c55-9d0e-1a2b3c4d5e01",
    "Espresso Cup",
    "Double-walled glass, 80 ml",
    1000,
    120,
  ),
  (
    "6f1c1e0a-3b1d-4c55-9d0e-1a2b3c4d5e02",
    "Pour-over Kettle",
    "Gooseneck, 1 l",
    4500,
    25,
  ),
  (
    "6f1c1e0a-3b1d-4c55-9d0e-1a2b3c4d5e03",
    "Filter Papers",
    "Pack of 100",
    500,
    400,
  ),
  (
    "6f1c1e0a-3b1d-4c55-9d0e-1a2b3c4d5e04",
    "Hand Grinder",
    "Conical burr",
    8900,
    3,
  ),
];

pub fn demo_products() -> Vec<Product> {
  let now = Utc::now();
  DEMO_PRODUCTS
    .iter()
    .filter_map(|(id, name, description, price_cents, inventory)| {
      Some(Product {
        id: Uuid::parse_str(id).ok()?,
        name: name.to_string(),
        description: Some(description.to_string()),
        price_cents: *price_cents,
        inventory: *inventory,
        created_at: now,
        updated_at: now,
      })
    })
    .collect()
}

pub async fn seed_catalog(catalog: &dyn CatalogStore) -> AppResult<usize> {
  let products = demo_products();
  for product in &products {
    catalog.upsert_product(product).await?;
  }
  info!(count = products.len(), "Demo catalog seeded.");
  Ok(products.len())
}
