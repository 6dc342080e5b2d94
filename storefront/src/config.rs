// storefront/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
  Postgres,
  Memory,
}

impl FromStr for StorageBackend {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "postgres" => Ok(StorageBackend::Postgres),
      "memory" => Ok(StorageBackend::Memory),
      other => Err(AppError::Config(format!(
        "Invalid STORAGE_BACKEND '{}', expected 'postgres' or 'memory'",
        other
      ))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

/// Credentials for one mock payment processor.
#[derive(Clone)]
pub struct ProcessorConfig {
  pub account_id: String,
  pub webhook_secret: String,
}

impl std::fmt::Debug for ProcessorConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProcessorConfig")
      .field("account_id", &self.account_id)
      .field("webhook_secret", &"[REDACTED]")
      .finish()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileConfig {
  pub interval: Duration,
  pub max_attempts: i32,
  pub batch_size: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub storage_backend: StorageBackend,
  pub database_url: Option<String>,
  pub catalog_database_url: Option<String>,
  pub currency: String,
  pub card: ProcessorConfig,
  pub wallet: ProcessorConfig,
  pub reconcile: ReconcileConfig,
  pub seed_db: bool,
  pub log_format: LogFormat,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };
    let get_or = |var_name: &str, default: &str| get_env(var_name).unwrap_or_else(|_| default.to_string());

    let server_host = get_or("SERVER_HOST", "127.0.0.1");
    let server_port = parse_var("SERVER_PORT", &get_or("SERVER_PORT", "8080"))?;
    let storage_backend: StorageBackend = get_or("STORAGE_BACKEND", "postgres").parse()?;

    let database_url = get_env("DATABASE_URL").ok();
    if storage_backend == StorageBackend::Postgres && database_url.is_none() {
      return Err(AppError::Config(
        "DATABASE_URL is required when STORAGE_BACKEND=postgres".to_string(),
      ));
    }
    let catalog_database_url = get_env("CATALOG_DATABASE_URL").ok().or_else(|| database_url.clone());

    let currency = get_or("CURRENCY", "USD").to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
      return Err(AppError::Config(format!("Invalid CURRENCY '{}'", currency)));
    }

    let card = ProcessorConfig {
      account_id: get_or("CARD_PROCESSOR_ACCOUNT_ID", "mock_card_acct"),
      webhook_secret: get_or("CARD_WEBHOOK_SECRET", "whsec_mock_card"),
    };
    let wallet = ProcessorConfig {
      account_id: get_or("WALLET_PROCESSOR_ACCOUNT_ID", "mock_wallet_acct"),
      webhook_secret: get_or("WALLET_WEBHOOK_SECRET", "whsec_mock_wallet"),
    };

    let interval_secs: u64 = parse_var("RECONCILE_INTERVAL_SECS", &get_or("RECONCILE_INTERVAL_SECS", "30"))?;
    let max_attempts: i32 = parse_var("RECONCILE_MAX_ATTEMPTS", &get_or("RECONCILE_MAX_ATTEMPTS", "10"))?;
    let batch_size: i64 = parse_var("RECONCILE_BATCH_SIZE", &get_or("RECONCILE_BATCH_SIZE", "50"))?;
    if interval_secs == 0 || max_attempts < 1 || batch_size < 1 {
      return Err(AppError::Config(
        "RECONCILE_INTERVAL_SECS, RECONCILE_MAX_ATTEMPTS and RECONCILE_BATCH_SIZE must be positive".to_string(),
      ));
    }

    let seed_db = parse_var("SEED_DB", &get_or("SEED_DB", "false"))?;
    let log_format = match get_or("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
      "json" => LogFormat::Json,
      _ => LogFormat::Pretty,
    };

    Ok(Self {
      server_host,
      server_port,
      storage_backend,
      database_url,
      catalog_database_url,
      currency,
      card,
      wallet,
      reconcile: ReconcileConfig {
        interval: Duration::from_secs(interval_secs),
        max_attempts,
        batch_size,
      },
      seed_db,
      log_format,
    })
  }
}

fn parse_var<T>(var_name: &str, raw: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", var_name, raw, e)))
}
