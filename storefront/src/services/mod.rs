// storefront/src/services/mod.rs

pub mod payment;
