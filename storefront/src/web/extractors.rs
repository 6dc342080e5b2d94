// storefront/src/web/extractors.rs

use crate::errors::AppError;
use actix_web::{FromRequest, HttpRequest};
use tracing::warn;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// The caller's identity as established by the authentication layer in front
/// of this service, which forwards it in `X-User-ID`.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = futures_util::future::Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let user_id = req
      .headers()
      .get(USER_ID_HEADER)
      .and_then(|h| h.to_str().ok())
      .and_then(|s| Uuid::parse_str(s.trim()).ok());

    futures_util::future::ready(match user_id {
      Some(user_id) => Ok(AuthenticatedUser { user_id }),
      None => {
        warn!("AuthenticatedUser extractor: missing or invalid X-User-ID header.");
        Err(AppError::Auth(
          "User authentication required. Missing or invalid X-User-ID header.".to_string(),
        ))
      }
    })
  }
}
