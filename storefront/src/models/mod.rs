// storefront/src/models/mod.rs

pub mod address;
pub mod order;
pub mod order_item;
pub mod outbox;
pub mod payment;
pub mod product;
pub mod settlement;
