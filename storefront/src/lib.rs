// storefront/src/lib.rs

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod reconcile;
pub mod seed;
pub mod services;
pub mod state;
pub mod store;
pub mod web;
