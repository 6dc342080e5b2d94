// storefront/src/services/payment/signature.rs

//! Webhook signatures: lowercase hex of `HMAC-SHA256(secret, payload)`.
//! Header values may carry a `sha256=` prefix.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC accepts keys of any length, so this is always `Some`.
fn keyed(secret: &str, payload: &[u8]) -> Option<HmacSha256> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
  mac.update(payload);
  Some(mac)
}

pub fn sign(secret: &str, payload: &[u8]) -> String {
  keyed(secret, payload)
    .map(|mac| hex::encode(mac.finalize().into_bytes()))
    .unwrap_or_default()
}

/// Constant-time check of `signature` against the payload's HMAC.
pub fn verify(secret: &str, payload: &[u8], signature: &str) -> bool {
  let provided = signature.trim();
  let provided = provided.strip_prefix("sha256=").unwrap_or(provided);
  let Ok(provided) = hex::decode(provided) else {
    return false;
  };
  keyed(secret, payload).is_some_and(|mac| mac.verify_slice(&provided).is_ok())
}

#[cfg(test)]
mod tests {
  use super::*;
  use sha2::Digest;

  #[test]
  fn matches_the_rfc_4231_vector() {
    assert_eq!(
      sign("Jefe", b"what do ya want for nothing?"),
      "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
    );
  }

  #[test]
  fn accepts_own_signature_with_or_without_prefix() {
    let sig = sign("whsec", b"{\"id\":1}");
    assert!(verify("whsec", b"{\"id\":1}", &sig));
    assert!(verify("whsec", b"{\"id\":1}", &format!("sha256={}", sig)));
  }

  #[test]
  fn rejects_tampered_payload_or_wrong_secret() {
    let sig = sign("whsec", b"{\"id\":1}");
    assert!(!verify("whsec", b"{\"id\":2}", &sig));
    assert!(!verify("other", b"{\"id\":1}", &sig));
    assert!(!verify("whsec", b"{\"id\":1}", "not-hex"));
    assert!(!verify("whsec", b"{\"id\":1}", &sig[..10]));
  }

  #[test]
  fn rejects_secret_prefixed_plain_hash() {
    let mut hasher = sha2::Sha256::new();
    hasher.update(b"whsec.");
    hasher.update(b"{\"id\":1}");
    let prefixed = hex::encode(hasher.finalize());
    assert!(!verify("whsec", b"{\"id\":1}", &prefixed));
  }
}
